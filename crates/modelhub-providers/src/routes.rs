//! Request URLs and token scopes per provider.
//!
//! Everything here is a pure function of a normalized endpoint, so the
//! routing rules can be tested without a network.

use modelhub_core::endpoint::PROJECT_PATH_SEGMENT;
use modelhub_core::{Auth, Endpoint, ManagementCloud, Provider};
use url::Url;

use crate::error::ProviderError;

/// Public Azure Resource Manager host.
pub const MANAGEMENT_HOST: &str = "https://management.azure.com";

/// API version for the Cognitive Services deployments listing.
pub const MANAGEMENT_API_VERSION: &str = "2023-05-01";

/// Scope for Azure Resource Manager tokens.
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Scope for Azure OpenAI data-plane tokens.
pub const COGNITIVE_SERVICES_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

/// Scope for AI Foundry project tokens in the public cloud.
pub const FOUNDRY_SCOPE: &str = "https://ai.azure.com/.default";

/// Scheme and host of the endpoint, without any path.
///
/// Foundry project URLs carry `/api/projects/{name}`; the OpenAI-compatible
/// routes live at the root of the same host.
pub fn resource_root(endpoint: &Endpoint) -> Result<String, ProviderError> {
    let base = endpoint.connection.endpoint.trim_end_matches('/');
    match endpoint.provider {
        Provider::AzureOpenAI => Ok(base.to_string()),
        Provider::AiFoundry => {
            let url = Url::parse(base)?;
            Ok(url.origin().ascii_serialization())
        }
    }
}

/// Full Foundry project URL, appending the project name when the endpoint
/// does not already include it.
pub fn project_endpoint(endpoint: &Endpoint) -> String {
    let connection = &endpoint.connection;
    let base = connection.endpoint.trim_end_matches('/');
    if connection.has_project_segment() {
        base.to_string()
    } else {
        format!(
            "{}{}{}",
            base,
            PROJECT_PATH_SEGMENT,
            connection.project_name.trim_matches('/')
        )
    }
}

/// Account name of an Azure OpenAI resource: the first label of its host.
pub fn account_name(endpoint: &Endpoint) -> Result<String, ProviderError> {
    let url = Url::parse(&endpoint.connection.endpoint)?;
    url.host_str()
        .and_then(|host| host.split('.').next())
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Unsupported("endpoint url has no host".to_string()))
}

/// Data-plane deployments listing, usable with an API key.
pub fn data_plane_deployments_url(endpoint: &Endpoint) -> Result<Url, ProviderError> {
    let url = Url::parse_with_params(
        &format!(
            "{}/openai/deployments",
            endpoint.connection.endpoint.trim_end_matches('/')
        ),
        &[("api-version", endpoint.connection.openai_api_version.as_str())],
    )?;
    Ok(url)
}

/// Management-plane deployments listing for an Azure OpenAI account.
pub fn management_deployments_url(endpoint: &Endpoint) -> Result<Url, ProviderError> {
    let management = endpoint.management.as_ref().ok_or_else(|| {
        ProviderError::Unsupported(format!(
            "endpoint '{}' has no management coordinates",
            endpoint.name
        ))
    })?;
    let account = account_name(endpoint)?;

    let url = Url::parse_with_params(
        &format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.CognitiveServices/accounts/{}/deployments",
            MANAGEMENT_HOST, management.subscription_id, management.resource_group, account
        ),
        &[("api-version", MANAGEMENT_API_VERSION)],
    )?;
    Ok(url)
}

/// Foundry project deployments listing.
pub fn foundry_deployments_url(endpoint: &Endpoint) -> Result<Url, ProviderError> {
    let url = Url::parse_with_params(
        &format!("{}/deployments", project_endpoint(endpoint)),
        &[(
            "api-version",
            endpoint.connection.project_api_version.as_str(),
        )],
    )?;
    Ok(url)
}

/// Chat completions route used by the connection test.
pub fn chat_completions_url(endpoint: &Endpoint, deployment_name: &str) -> Result<Url, ProviderError> {
    let mut url = Url::parse(&format!("{}/", resource_root(endpoint)?))?;
    url.path_segments_mut()
        .map_err(|_| ProviderError::Unsupported("endpoint url cannot have a path".to_string()))?
        .pop_if_empty()
        .extend(["openai", "deployments", deployment_name, "chat", "completions"]);
    url.query_pairs_mut()
        .append_pair("api-version", &endpoint.connection.openai_api_version);
    Ok(url)
}

/// Which listing discovery should call for this endpoint.
pub fn discovery_url(endpoint: &Endpoint) -> Result<Url, ProviderError> {
    match (endpoint.provider, endpoint.auth.is_api_key()) {
        (Provider::AzureOpenAI, true) => data_plane_deployments_url(endpoint),
        (Provider::AzureOpenAI, false) => management_deployments_url(endpoint),
        (Provider::AiFoundry, _) => foundry_deployments_url(endpoint),
    }
}

/// Token scope for discovery calls.
pub fn discovery_scope(endpoint: &Endpoint) -> String {
    match endpoint.provider {
        Provider::AzureOpenAI => MANAGEMENT_SCOPE.to_string(),
        Provider::AiFoundry => foundry_scope(&endpoint.auth),
    }
}

/// Token scope for data-plane inference calls.
pub fn inference_scope(_endpoint: &Endpoint) -> String {
    COGNITIVE_SERVICES_SCOPE.to_string()
}

fn foundry_scope(auth: &Auth) -> String {
    match auth {
        Auth::ServicePrincipal {
            management_cloud: ManagementCloud::Custom,
            foundry_scope,
            ..
        } if !foundry_scope.is_empty() => foundry_scope.clone(),
        _ => FOUNDRY_SCOPE.to_string(),
    }
}
