//! Error types for modelhub.
//!
//! [`HubError`] is the workspace-wide error. [`ValidationError`] is the
//! narrower type produced by endpoint and model validation; it always carries
//! exactly one actionable reason and converts into [`HubError::Validation`].

/// A single unmet validation condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field is empty or absent.
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// A URL field does not parse as an http(s) URL.
    #[error("{field} must be an http(s) URL: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    /// A model payload or test target lacks a deployment name.
    #[error("deployment name required")]
    DeploymentNameRequired,

    /// The deployment name of a discovered model cannot be edited.
    #[error("deployment name of discovered model '{current}' cannot be changed")]
    DeploymentNameLocked { current: String },

    /// Another model on the same endpoint already uses this deployment name.
    #[error("a model with deployment name '{0}' already exists on this endpoint")]
    DuplicateDeployment(String),
}

impl ValidationError {
    /// Create a missing-field error.
    pub fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    /// Dotted path of the field this error refers to.
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field } | Self::InvalidUrl { field, .. } => field,
            Self::DeploymentNameRequired
            | Self::DeploymentNameLocked { .. }
            | Self::DuplicateDeployment(_) => "deploymentName",
        }
    }
}

/// The main error type for modelhub operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid configuration value
    #[error("Invalid configuration for '{field}': {message}")]
    InvalidConfig { field: String, message: String },

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(String),

    /// Endpoint or model payload failed validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Endpoint not found
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    /// Model not found on the given endpoint
    #[error("Model '{model}' not found on endpoint '{endpoint}'")]
    ModelNotFound { endpoint: String, model: String },

    /// The requested default is disabled or missing
    #[error("Model '{model}' on endpoint '{endpoint}' is not selectable")]
    NotSelectable { endpoint: String, model: String },

    /// Model discovery failed
    #[error("Failed to discover models from endpoint '{endpoint}': {message}")]
    Discovery { endpoint: String, message: String },

    /// Connection test could not be performed
    #[error("Connection test for endpoint '{endpoint}' failed: {message}")]
    ConnectionTest { endpoint: String, message: String },

    /// HTTP request errors
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// HTTP client errors (wraps reqwest errors)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// JSON serialization errors (wraps serde_json errors)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Operation not supported
    #[error("Operation not supported: {0}")]
    Unsupported(String),
}

impl HubError {
    /// Create a config error with a message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid config error
    pub fn invalid_config<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a model-not-found error
    pub fn model_not_found<S: Into<String>>(endpoint: S, model: S) -> Self {
        Self::ModelNotFound {
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }

    /// Create a model discovery error
    pub fn discovery<S: Into<String>>(endpoint: S, message: S) -> Self {
        Self::Discovery {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a connection test error
    pub fn connection_test<S: Into<String>>(endpoint: S, message: S) -> Self {
        Self::ConnectionTest {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage(message.into())
    }

    /// Whether the operator can fix this by editing the payload and retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::EndpointNotFound(_)
                | Self::ModelNotFound { .. }
                | Self::NotSelectable { .. }
        )
    }

    /// Whether this error came from an external collaborator call.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Self::Discovery { .. }
                | Self::ConnectionTest { .. }
                | Self::Http(_)
                | Self::HttpClient(_)
        )
    }
}

/// Result type alias for modelhub operations
pub type Result<T> = std::result::Result<T, HubError>;
