//! Core types, errors, and shared functionality for modelhub.
//!
//! This crate provides the foundational types used throughout modelhub:
//!
//! - **Error types**: [`HubError`], [`ValidationError`] and [`Result`]
//! - **Endpoint types**: endpoints, their models and the tagged auth union
//! - **Selection types**: the default-model pointer and selectable options
//!
//! # Overview
//!
//! modelhub-core holds the domain model only. Validation, merging and the
//! registry itself live in `modelhub-registry`.
//!
//! # Examples
//!
//! ## Creating an endpoint
//!
//! ```rust
//! use modelhub_core::endpoint::{Auth, Connection, Endpoint, Model, Provider};
//!
//! let endpoint = Endpoint::new(
//!     "prod",
//!     Provider::AzureOpenAI,
//!     Connection::new("https://prod.openai.azure.com", "2024-10-21"),
//!     Auth::api_key("secret"),
//! )
//! .with_model(Model::new("gpt-4o"));
//!
//! assert_eq!(endpoint.model_count(), 1);
//! ```
//!
//! ## Error handling
//!
//! ```rust
//! use modelhub_core::{HubError, Result, ValidationError};
//!
//! fn example_operation() -> Result<String> {
//!     Err(ValidationError::missing("name").into())
//! }
//!
//! match example_operation() {
//!     Ok(val) => println!("Success: {}", val),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```

pub mod endpoint;
pub mod error;
pub mod selection;

// Re-export commonly used types for convenience
pub use endpoint::{
    deployment_key, Auth, Connection, Endpoint, FetchedModel, ManagedIdentityType, Management,
    ManagementCloud, Model, Provider,
};
pub use error::{HubError, Result, ValidationError};
pub use selection::{DefaultModelSelection, SelectableOption, SelectionWarning};

/// Generate a fresh opaque identifier for an endpoint or model.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Prelude module for convenient imports.
///
/// ```rust
/// use modelhub_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::endpoint::{Auth, Connection, Endpoint, FetchedModel, Model, Provider};
    pub use crate::error::{HubError, Result, ValidationError};
    pub use crate::selection::{DefaultModelSelection, SelectableOption, SelectionWarning};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _model = Model::new("gpt-4o");
        let _error = HubError::config("test");
        let _selection = DefaultModelSelection::empty();
    }

    #[test]
    fn test_new_id_is_unique() {
        let a = new_id();
        let b = new_id();
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }
}
