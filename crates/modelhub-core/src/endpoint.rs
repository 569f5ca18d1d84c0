//! Endpoint, model and authentication types.
//!
//! These are the records the registry owns and persists. Field names
//! serialize in camelCase so the snapshot matches what the admin surface
//! reads and writes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Path segment that marks an AI Foundry project endpoint URL.
pub const PROJECT_PATH_SEGMENT: &str = "/api/projects/";

/// Backend provider flavour of an endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Azure OpenAI resource
    #[default]
    #[serde(rename = "azureOpenAI")]
    AzureOpenAI,

    /// Azure AI Foundry project
    #[serde(rename = "aiFoundry")]
    AiFoundry,
}

impl Provider {
    /// Wire name of the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AzureOpenAI => "azureOpenAI",
            Self::AiFoundry => "aiFoundry",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data-plane connection settings.
///
/// `project_api_version` and `project_name` are only meaningful for
/// [`Provider::AiFoundry`]; validation clears them for other providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Base URL of the resource or project
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub openai_api_version: String,

    #[serde(default)]
    pub project_api_version: String,

    #[serde(default)]
    pub project_name: String,
}

impl Connection {
    /// Create a connection with an endpoint URL and OpenAI API version.
    pub fn new<S: Into<String>>(endpoint: S, openai_api_version: S) -> Self {
        Self {
            endpoint: endpoint.into(),
            openai_api_version: openai_api_version.into(),
            ..Self::default()
        }
    }

    /// Whether the endpoint URL already names a project,
    /// e.g. `https://x.services.ai.azure.com/api/projects/myproj`.
    pub fn has_project_segment(&self) -> bool {
        match self.endpoint.find(PROJECT_PATH_SEGMENT) {
            Some(idx) => {
                let rest = &self.endpoint[idx + PROJECT_PATH_SEGMENT.len()..];
                !rest.trim_matches('/').is_empty()
            }
            None => false,
        }
    }
}

/// Management-plane coordinates used to enumerate deployments of an Azure
/// OpenAI resource when no API key is available.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Management {
    #[serde(default)]
    pub subscription_id: String,

    #[serde(default)]
    pub resource_group: String,
}

/// Cloud whose authority issues service-principal tokens.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ManagementCloud {
    #[default]
    Public,
    Custom,
}

/// Which managed identity the host should use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ManagedIdentityType {
    #[default]
    SystemAssigned,
    UserAssigned,
}

/// Authentication settings, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Auth {
    /// Host-provided managed identity
    #[serde(rename_all = "camelCase")]
    ManagedIdentity {
        #[serde(default)]
        managed_identity_type: ManagedIdentityType,

        /// Client id of a user-assigned identity
        #[serde(default)]
        client_id: String,
    },

    /// Entra ID application credentials
    #[serde(rename_all = "camelCase")]
    ServicePrincipal {
        #[serde(default)]
        tenant_id: String,

        #[serde(default)]
        client_id: String,

        #[serde(default)]
        client_secret: String,

        #[serde(default)]
        management_cloud: ManagementCloud,

        /// Authority host, only for [`ManagementCloud::Custom`]
        #[serde(default)]
        custom_authority: String,

        /// Token scope for Foundry calls, only for [`ManagementCloud::Custom`]
        #[serde(default)]
        foundry_scope: String,
    },

    /// Static resource key sent on the data plane
    #[serde(rename_all = "camelCase")]
    ApiKey {
        #[serde(default)]
        api_key: String,
    },
}

impl Auth {
    /// A system-assigned managed identity.
    pub fn managed_identity() -> Self {
        Self::ManagedIdentity {
            managed_identity_type: ManagedIdentityType::SystemAssigned,
            client_id: String::new(),
        }
    }

    /// API-key authentication.
    pub fn api_key<S: Into<String>>(key: S) -> Self {
        Self::ApiKey {
            api_key: key.into(),
        }
    }

    /// Service principal in the public cloud.
    pub fn service_principal<S: Into<String>>(tenant_id: S, client_id: S, client_secret: S) -> Self {
        Self::ServicePrincipal {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            management_cloud: ManagementCloud::Public,
            custom_authority: String::new(),
            foundry_scope: String::new(),
        }
    }

    /// Wire name of the auth discriminant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ManagedIdentity { .. } => "managedIdentity",
            Self::ServicePrincipal { .. } => "servicePrincipal",
            Self::ApiKey { .. } => "apiKey",
        }
    }

    /// Whether calls authenticate with a static key.
    pub fn is_api_key(&self) -> bool {
        matches!(self, Self::ApiKey { .. })
    }
}

impl Default for Auth {
    fn default() -> Self {
        Self::managed_identity()
    }
}

/// A deployed model hosted under an endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Stable identifier, generated when empty
    #[serde(default)]
    pub id: String,

    /// Provider-side deployment identifier; identity key for discovery
    #[serde(default)]
    pub deployment_name: String,

    /// Underlying base model family (informational)
    #[serde(default)]
    pub model_name: String,

    /// Operator-facing label, defaults to the deployment name
    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Set when the record came from a discovery call
    #[serde(default)]
    pub is_discovered: bool,
}

impl Model {
    /// Create a hand-entered, enabled model for a deployment.
    pub fn new<S: Into<String>>(deployment_name: S) -> Self {
        let deployment_name = deployment_name.into();
        Self {
            display_name: deployment_name.clone(),
            deployment_name,
            enabled: true,
            ..Self::default()
        }
    }

    /// Set the id
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// Set the display name
    pub fn with_display_name<S: Into<String>>(mut self, display_name: S) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Set the model family
    pub fn with_model_name<S: Into<String>>(mut self, model_name: S) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Set whether the model is enabled
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Case-insensitive identity key used for discovery deduplication.
    pub fn deployment_key(&self) -> String {
        deployment_key(&self.deployment_name)
    }

    /// Label shown to operators.
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.deployment_name
        } else {
            &self.display_name
        }
    }
}

/// Normalize a deployment name into its identity key.
pub fn deployment_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A registered backend connection to one provider account or project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Opaque identifier, empty on a payload for a new endpoint
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub provider: Provider,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub connection: Connection,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management: Option<Management>,

    pub auth: Auth,

    #[serde(default)]
    pub models: Vec<Model>,
}

fn default_true() -> bool {
    true
}

impl Endpoint {
    /// Create an enabled endpoint payload without an id.
    pub fn new<S: Into<String>>(name: S, provider: Provider, connection: Connection, auth: Auth) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            provider,
            enabled: true,
            connection,
            management: None,
            auth,
            models: Vec::new(),
        }
    }

    /// Set the id
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// Set management-plane coordinates
    pub fn with_management<S: Into<String>>(mut self, subscription_id: S, resource_group: S) -> Self {
        self.management = Some(Management {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
        });
        self
    }

    /// Append a model
    pub fn with_model(mut self, model: Model) -> Self {
        self.models.push(model);
        self
    }

    /// Look up a model by id.
    pub fn model(&self, model_id: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.id == model_id)
    }

    /// Look up a model by id, mutably.
    pub fn model_mut(&mut self, model_id: &str) -> Option<&mut Model> {
        self.models.iter_mut().find(|m| m.id == model_id)
    }

    /// Find a model by case-insensitive deployment name.
    pub fn model_by_deployment(&self, deployment_name: &str) -> Option<&Model> {
        let key = deployment_key(deployment_name);
        self.models.iter().find(|m| m.deployment_key() == key)
    }

    /// Number of models attached to this endpoint.
    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}

/// One entry returned by a model discovery call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FetchedModel {
    pub deployment_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

impl FetchedModel {
    pub fn new<S: Into<String>>(deployment_name: S) -> Self {
        Self {
            deployment_name: deployment_name.into(),
            model_name: None,
        }
    }

    pub fn with_model_name<S: Into<String>>(mut self, model_name: S) -> Self {
        self.model_name = Some(model_name.into());
        self
    }
}
