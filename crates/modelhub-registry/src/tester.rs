//! Connection test request building.
//!
//! The request is the validated endpoint with the target deployment
//! appended. Sending it is left to a `ConnectionProbe` implementation.

use serde::{Deserialize, Serialize};

use modelhub_core::{Endpoint, ValidationError};

use crate::validation;

/// Deployment the connection test should call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestTarget {
    pub deployment_name: String,
}

/// Normalized endpoint payload plus `{ "model": { "deploymentName": … } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestRequest {
    #[serde(flatten)]
    pub endpoint: Endpoint,

    pub model: TestTarget,
}

/// Build a test request for one deployment of `endpoint`.
///
/// The endpoint is validated first, so a broken endpoint reports its own
/// missing field before a missing deployment name does.
pub fn build_test_request(
    endpoint: &Endpoint,
    deployment_name: &str,
) -> Result<TestRequest, ValidationError> {
    let mut normalized = validation::validate(endpoint)?;
    normalized.models.clear();

    let deployment_name = deployment_name.trim();
    if deployment_name.is_empty() {
        return Err(ValidationError::DeploymentNameRequired);
    }

    Ok(TestRequest {
        endpoint: normalized,
        model: TestTarget {
            deployment_name: deployment_name.to_string(),
        },
    })
}
