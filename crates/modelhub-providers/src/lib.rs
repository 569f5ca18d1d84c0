//! Provider-facing collaborators for modelhub.
//!
//! The registry itself never performs I/O. This crate supplies the two
//! outbound calls it relies on:
//!
//! - [`DiscoverySource`]: list the deployments an endpoint currently exposes
//! - [`ConnectionProbe`]: send a minimal request to one deployment
//!
//! [`HttpProviderClient`] implements both against Azure OpenAI and AI Foundry.
//! [`discover_models`] and [`test_connection`] glue a collaborator to the
//! registry: a failed call leaves the registry untouched and its message is
//! passed through unchanged.

use async_trait::async_trait;

use modelhub_core::{Endpoint, FetchedModel, HubError, Result};
use modelhub_registry::{build_test_request, validate, EndpointRegistry, Outcome, TestRequest};

pub mod client;
pub mod error;
pub mod routes;

pub use client::{HttpProviderClient, API_KEY_HEADER};
pub use error::ProviderError;

/// Supplies bearer tokens for managed-identity and service-principal auth.
///
/// Acquiring tokens (IMDS, client-credential flows) is left to the embedding
/// application.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self, endpoint: &Endpoint, scope: &str) -> std::result::Result<String, ProviderError>;
}

/// Lists the deployments behind an endpoint.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    async fn discover(&self, endpoint: &Endpoint) -> std::result::Result<Vec<FetchedModel>, ProviderError>;
}

/// Runs a connection test for one deployment.
#[async_trait]
pub trait ConnectionProbe: Send + Sync {
    async fn probe(&self, request: &TestRequest) -> std::result::Result<ProbeResult, ProviderError>;
}

/// Pass/fail verdict of a connection test, with the provider's message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub success: bool,
    pub message: String,
}

impl ProbeResult {
    pub fn passed<S: Into<String>>(message: S) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Fetch deployments for one endpoint and merge them into the registry.
///
/// Returns how many models were added. The endpoint is validated first so
/// the collaborator only ever sees a normalized payload.
pub async fn discover_models(
    registry: &mut EndpointRegistry,
    source: &dyn DiscoverySource,
    endpoint_id: &str,
) -> Result<Outcome<usize>> {
    let endpoint = registry
        .get(endpoint_id)
        .ok_or_else(|| HubError::EndpointNotFound(endpoint_id.to_string()))?;
    let normalized = validate(endpoint)?;

    let fetched = match source.discover(&normalized).await {
        Ok(fetched) => fetched,
        Err(err) => {
            tracing::warn!(endpoint = %normalized.name, "model discovery failed: {}", err);
            return Err(err.into_discovery(&normalized.name));
        }
    };

    registry.merge_discovered(endpoint_id, &fetched)
}

/// Build a test request for `deployment_name` and hand it to `probe`.
pub async fn test_connection(
    probe: &dyn ConnectionProbe,
    endpoint: &Endpoint,
    deployment_name: &str,
) -> Result<ProbeResult> {
    let request = build_test_request(endpoint, deployment_name)?;

    probe
        .probe(&request)
        .await
        .map_err(|err| err.into_connection_test(&request.endpoint.name))
}
