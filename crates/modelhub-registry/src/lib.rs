//! Endpoint registry and default-model resolution for modelhub.
//!
//! [`EndpointRegistry`] is the in-memory working copy of every configured
//! model endpoint and the platform-wide default model. All mutations go
//! through it, so the rules that tie those pieces together are enforced in
//! one place:
//!
//! - payloads are validated and normalized before they are stored
//!   ([`validation`])
//! - discovered deployments are merged without touching existing models
//!   ([`discovery`])
//! - deletes need a second request within a short window ([`gate`])
//! - the default selection is reconciled after every change ([`resolver`])
//!
//! Snapshots of the registry are persisted through a [`RegistryStore`]; the
//! bundled [`JsonFileStore`] keeps them in a single JSON file.
//!
//! ```rust
//! use modelhub_core::{Auth, Connection, Endpoint, Model, Provider};
//! use modelhub_registry::EndpointRegistry;
//!
//! let mut registry = EndpointRegistry::new();
//! let endpoint = registry
//!     .upsert_endpoint(Endpoint::new(
//!         "prod",
//!         Provider::AzureOpenAI,
//!         Connection::new("https://prod.openai.azure.com", "2024-10-21"),
//!         Auth::api_key("secret"),
//!     ))
//!     .unwrap()
//!     .value;
//! let model = registry
//!     .upsert_model(&endpoint.id, Model::new("gpt-4o"))
//!     .unwrap()
//!     .value;
//!
//! registry.set_default(&endpoint.id, &model.id).unwrap();
//! assert!(!registry.default_model().is_empty());
//! ```

pub mod discovery;
pub mod gate;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod tester;
pub mod validation;

pub use discovery::{merge, MergeResult};
pub use gate::{Clock, DeleteOutcome, DeletionGate, SystemClock, DEFAULT_CONFIRM_WINDOW};
pub use registry::{DeletionTarget, EndpointRegistry, EndpointRegistryBuilder, Outcome};
pub use resolver::{compute_selectable_options, reconcile};
pub use store::{JsonFileStore, RegistrySnapshot, RegistryStore};
pub use tester::{build_test_request, TestRequest, TestTarget};
pub use validation::{validate, validate_model};
