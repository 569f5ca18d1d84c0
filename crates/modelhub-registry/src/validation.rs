//! Endpoint and model payload validation.
//!
//! [`validate`] walks the required-field matrix in a fixed order and reports
//! the first unmet condition only, so operators fix one thing at a time and
//! the message for a given payload is always the same:
//!
//! 1. `name`, `connection.endpoint` (an http(s) URL), `connection.openaiApiVersion`
//! 2. `aiFoundry`: `connection.projectApiVersion`, then `connection.projectName`
//!    unless the endpoint URL already names a project
//! 3. `azureOpenAI` without API-key auth: `management.subscriptionId`,
//!    `management.resourceGroup`
//! 4. service principal: `auth.tenantId`, `auth.clientId`, `auth.clientSecret`
//! 5. service principal on `aiFoundry` in a custom cloud:
//!    `auth.customAuthority`, `auth.foundryScope`
//! 6. API key: `auth.apiKey`
//!
//! On success the returned endpoint is normalized: strings trimmed, fields
//! that do not apply to the provider/auth combination cleared, and
//! `management` present only when it is required.

use modelhub_core::{
    Auth, Connection, Endpoint, ManagedIdentityType, Management, ManagementCloud, Model, Provider,
    ValidationError,
};
use url::Url;

type Result<T> = std::result::Result<T, ValidationError>;

/// Validate a candidate endpoint and return its normalized form.
///
/// `id`, `enabled` and `models` are carried over untouched; assigning ids is
/// the registry's job.
pub fn validate(candidate: &Endpoint) -> Result<Endpoint> {
    let name = required(&candidate.name, "name")?;
    let endpoint_url = required(&candidate.connection.endpoint, "connection.endpoint")?;
    check_http_url(&endpoint_url, "connection.endpoint")?;
    let openai_api_version = required(
        &candidate.connection.openai_api_version,
        "connection.openaiApiVersion",
    )?;

    let mut connection = Connection {
        endpoint: endpoint_url.trim_end_matches('/').to_string(),
        openai_api_version,
        project_api_version: String::new(),
        project_name: String::new(),
    };

    if candidate.provider == Provider::AiFoundry {
        connection.project_api_version = required(
            &candidate.connection.project_api_version,
            "connection.projectApiVersion",
        )?;
        connection.project_name = if connection.has_project_segment() {
            candidate.connection.project_name.trim().to_string()
        } else {
            required(&candidate.connection.project_name, "connection.projectName")?
        };
    }

    let management = if candidate.provider == Provider::AzureOpenAI && !candidate.auth.is_api_key()
    {
        let given = candidate.management.clone().unwrap_or_default();
        Some(Management {
            subscription_id: required(&given.subscription_id, "management.subscriptionId")?,
            resource_group: required(&given.resource_group, "management.resourceGroup")?,
        })
    } else {
        None
    };

    let auth = normalize_auth(&candidate.auth, candidate.provider)?;

    Ok(Endpoint {
        id: candidate.id.trim().to_string(),
        name,
        provider: candidate.provider,
        enabled: candidate.enabled,
        connection,
        management,
        auth,
        models: candidate.models.clone(),
    })
}

fn normalize_auth(auth: &Auth, provider: Provider) -> Result<Auth> {
    match auth {
        Auth::ManagedIdentity {
            managed_identity_type,
            client_id,
        } => {
            // A system-assigned identity has no client id of its own.
            let client_id = match managed_identity_type {
                ManagedIdentityType::SystemAssigned => String::new(),
                ManagedIdentityType::UserAssigned => client_id.trim().to_string(),
            };
            Ok(Auth::ManagedIdentity {
                managed_identity_type: *managed_identity_type,
                client_id,
            })
        }
        Auth::ServicePrincipal {
            tenant_id,
            client_id,
            client_secret,
            management_cloud,
            custom_authority,
            foundry_scope,
        } => {
            let tenant_id = required(tenant_id, "auth.tenantId")?;
            let client_id = required(client_id, "auth.clientId")?;
            let client_secret = required(client_secret, "auth.clientSecret")?;

            let (custom_authority, foundry_scope) = match management_cloud {
                ManagementCloud::Custom if provider == Provider::AiFoundry => (
                    required(custom_authority, "auth.customAuthority")?,
                    required(foundry_scope, "auth.foundryScope")?,
                ),
                ManagementCloud::Custom => (
                    custom_authority.trim().to_string(),
                    foundry_scope.trim().to_string(),
                ),
                ManagementCloud::Public => (String::new(), String::new()),
            };

            Ok(Auth::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
                management_cloud: *management_cloud,
                custom_authority,
                foundry_scope,
            })
        }
        Auth::ApiKey { api_key } => Ok(Auth::ApiKey {
            api_key: required(api_key, "auth.apiKey")?,
        }),
    }
}

/// Validate a model payload and return its normalized form.
///
/// The deployment name is mandatory; the display name falls back to it.
pub fn validate_model(candidate: &Model) -> Result<Model> {
    let deployment_name = candidate.deployment_name.trim();
    if deployment_name.is_empty() {
        return Err(ValidationError::DeploymentNameRequired);
    }

    let display_name = match candidate.display_name.trim() {
        "" => deployment_name.to_string(),
        label => label.to_string(),
    };

    Ok(Model {
        id: candidate.id.trim().to_string(),
        deployment_name: deployment_name.to_string(),
        model_name: candidate.model_name.trim().to_string(),
        display_name,
        description: candidate.description.trim().to_string(),
        enabled: candidate.enabled,
        is_discovered: candidate.is_discovered,
    })
}

fn required(value: &str, field: &'static str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::missing(field));
    }
    Ok(trimmed.to_string())
}

fn check_http_url(value: &str, field: &'static str) -> Result<()> {
    let url = Url::parse(value).map_err(|e| ValidationError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ValidationError::InvalidUrl {
            field,
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}
