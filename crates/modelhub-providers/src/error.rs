use modelhub_core::{HubError, ValidationError};
use thiserror::Error;

/// Errors raised while talking to a provider.
///
/// Messages returned by the provider are kept verbatim so they can be shown
/// to the operator unchanged.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The endpoint payload is not valid enough to build a request from
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A request URL could not be built from the endpoint
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Transport failure (connect, timeout, decode)
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response body did not have the expected shape
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The provider answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// No token could be obtained for a non-key auth mode
    #[error("token acquisition failed: {0}")]
    Token(String),

    /// The auth mode needs a collaborator that was not configured
    #[error("{0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Build a status error, pulling `error.message` out of an Azure-style
    /// error body when there is one and falling back to the raw body.
    pub fn from_status(status: u16, body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct Payload {
            message: String,
        }

        #[derive(serde::Deserialize)]
        struct Envelope {
            error: Payload,
        }

        let message = match serde_json::from_str::<Envelope>(body) {
            Ok(envelope) => envelope.error.message,
            Err(_) if body.trim().is_empty() => "no response body".to_string(),
            Err(_) => body.trim().to_string(),
        };

        ProviderError::Status { status, message }
    }

    /// Convert into a discovery error for `endpoint`.
    pub fn into_discovery(self, endpoint: &str) -> HubError {
        match self {
            ProviderError::Validation(err) => HubError::Validation(err),
            ProviderError::Unsupported(msg) => HubError::Unsupported(msg),
            other => HubError::discovery(endpoint.to_string(), other.to_string()),
        }
    }

    /// Convert into a connection-test error for `endpoint`.
    pub fn into_connection_test(self, endpoint: &str) -> HubError {
        match self {
            ProviderError::Validation(err) => HubError::Validation(err),
            ProviderError::Unsupported(msg) => HubError::Unsupported(msg),
            other => HubError::connection_test(endpoint.to_string(), other.to_string()),
        }
    }
}
