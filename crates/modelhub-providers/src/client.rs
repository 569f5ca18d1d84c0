use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;

use modelhub_core::{Auth, Endpoint, FetchedModel, Provider};
use modelhub_registry::TestRequest;

use crate::error::ProviderError;
use crate::routes;
use crate::{ConnectionProbe, DiscoverySource, ProbeResult, TokenSource};

/// Header carrying a resource key on Azure data-plane calls.
pub const API_KEY_HEADER: &str = "api-key";

/// Upper bound on `nextLink` pages followed during one discovery call.
const MAX_PAGES: usize = 50;

/* Listing payloads */

#[derive(Deserialize, Debug)]
struct DataPlaneList {
    #[serde(default)]
    data: Vec<DataPlaneDeployment>,
}

#[derive(Deserialize, Debug)]
struct DataPlaneDeployment {
    id: String,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ManagementList {
    #[serde(default)]
    value: Vec<ManagementDeployment>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ManagementDeployment {
    name: String,
    #[serde(default)]
    properties: Option<ManagementProperties>,
}

#[derive(Deserialize, Debug)]
struct ManagementProperties {
    #[serde(default)]
    model: Option<ManagementModel>,
}

#[derive(Deserialize, Debug)]
struct ManagementModel {
    name: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FoundryList {
    #[serde(default)]
    value: Vec<FoundryDeployment>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FoundryDeployment {
    name: String,
    #[serde(default)]
    model_name: Option<String>,
}

/// One page of a deployments listing.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeploymentPage {
    pub models: Vec<FetchedModel>,
    pub next_link: Option<String>,
}

/// Parse one page of the deployments listing `endpoint` would return.
pub fn parse_deployments(endpoint: &Endpoint, body: &str) -> Result<DeploymentPage, ProviderError> {
    let page = match (endpoint.provider, endpoint.auth.is_api_key()) {
        (Provider::AzureOpenAI, true) => {
            let list: DataPlaneList = serde_json::from_str(body)?;
            DeploymentPage {
                models: list
                    .data
                    .into_iter()
                    .map(|d| FetchedModel {
                        deployment_name: d.id,
                        model_name: d.model,
                    })
                    .collect(),
                next_link: None,
            }
        }
        (Provider::AzureOpenAI, false) => {
            let list: ManagementList = serde_json::from_str(body)?;
            DeploymentPage {
                models: list
                    .value
                    .into_iter()
                    .map(|d| FetchedModel {
                        deployment_name: d.name,
                        model_name: d.properties.and_then(|p| p.model).map(|m| m.name),
                    })
                    .collect(),
                next_link: list.next_link,
            }
        }
        (Provider::AiFoundry, _) => {
            let list: FoundryList = serde_json::from_str(body)?;
            DeploymentPage {
                models: list
                    .value
                    .into_iter()
                    .map(|d| FetchedModel {
                        deployment_name: d.name,
                        model_name: d.model_name,
                    })
                    .collect(),
                next_link: list.next_link,
            }
        }
    };

    Ok(page)
}

/// Minimal chat payload for the connection test: one user message, one
/// completion token.
pub fn ping_body() -> serde_json::Value {
    serde_json::json!({
        "messages": [{ "role": "user", "content": "ping" }],
        "max_tokens": 1,
    })
}

/// `DiscoverySource` and `ConnectionProbe` over HTTP.
///
/// API-key endpoints send the key in the `api-key` header. Every other auth
/// mode asks the configured [`TokenSource`] for a bearer token and fails
/// with [`ProviderError::Unsupported`] when none is set.
#[derive(Clone)]
pub struct HttpProviderClient {
    http: Client,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl HttpProviderClient {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, tokens: None })
    }

    /// Use `tokens` for managed-identity and service-principal endpoints.
    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    async fn authorize(
        &self,
        request: RequestBuilder,
        endpoint: &Endpoint,
        scope: &str,
    ) -> Result<RequestBuilder, ProviderError> {
        if let Auth::ApiKey { api_key } = &endpoint.auth {
            return Ok(request.header(API_KEY_HEADER, api_key));
        }

        let tokens = self.tokens.as_ref().ok_or_else(|| {
            ProviderError::Unsupported(format!(
                "{} auth on endpoint '{}' needs a token source",
                endpoint.auth.kind(),
                endpoint.name
            ))
        })?;
        let token = tokens.token(endpoint, scope).await?;

        Ok(request.bearer_auth(token))
    }

    async fn get_page(
        &self,
        endpoint: &Endpoint,
        url: &str,
        scope: &str,
    ) -> Result<DeploymentPage, ProviderError> {
        tracing::debug!(endpoint = %endpoint.name, url, "listing deployments");

        let request = self.authorize(self.http.get(url), endpoint, scope).await?;
        let body = success_body(request.send().await?).await?;

        parse_deployments(endpoint, &body)
    }
}

/// Body of a 2xx response, or a status error carrying the provider's message.
async fn success_body(response: Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(ProviderError::from_status(status.as_u16(), &body))
    }
}

#[async_trait]
impl DiscoverySource for HttpProviderClient {
    async fn discover(&self, endpoint: &Endpoint) -> Result<Vec<FetchedModel>, ProviderError> {
        let scope = routes::discovery_scope(endpoint);
        let mut next = Some(routes::discovery_url(endpoint)?.to_string());
        let mut models = Vec::new();
        let mut pages = 0;

        while let Some(url) = next.take() {
            let page = self.get_page(endpoint, &url, &scope).await?;
            models.extend(page.models);

            pages += 1;
            if pages >= MAX_PAGES {
                tracing::warn!(endpoint = %endpoint.name, pages, "stopping deployment listing early");
                break;
            }
            next = page.next_link.filter(|link| !link.is_empty());
        }

        tracing::info!(endpoint = %endpoint.name, count = models.len(), "discovered deployments");
        Ok(models)
    }
}

#[async_trait]
impl ConnectionProbe for HttpProviderClient {
    async fn probe(&self, request: &TestRequest) -> Result<ProbeResult, ProviderError> {
        let endpoint = &request.endpoint;
        let deployment = &request.model.deployment_name;
        let url = routes::chat_completions_url(endpoint, deployment)?;

        let builder = self.http.post(url).json(&ping_body());
        let builder = self
            .authorize(builder, endpoint, &routes::inference_scope(endpoint))
            .await?;

        let response = builder.send().await?;
        let status = response.status();

        let result = if status.is_success() {
            ProbeResult::passed(format!(
                "deployment '{}' answered with HTTP {}",
                deployment,
                status.as_u16()
            ))
        } else {
            let body = response.text().await?;
            // Status errors are a test verdict, not a transport failure.
            ProbeResult::failed(ProviderError::from_status(status.as_u16(), &body).to_string())
        };

        tracing::info!(
            endpoint = %endpoint.name,
            deployment = %deployment,
            success = result.success,
            "connection test finished"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelhub_core::Connection;

    fn endpoint(provider: Provider, auth: Auth) -> Endpoint {
        Endpoint::new(
            "prod",
            provider,
            Connection::new("https://contoso.openai.azure.com", "2024-10-21"),
            auth,
        )
    }

    #[test]
    fn parses_data_plane_listing() {
        let body = r#"{"data":[{"id":"gpt-4o","model":"gpt-4o","status":"succeeded"},{"id":"emb"}],"object":"list"}"#;
        let page = parse_deployments(&endpoint(Provider::AzureOpenAI, Auth::api_key("k")), body).unwrap();

        assert_eq!(
            page.models,
            vec![
                FetchedModel::new("gpt-4o").with_model_name("gpt-4o"),
                FetchedModel::new("emb"),
            ]
        );
        assert!(page.next_link.is_none());
    }

    #[test]
    fn parses_management_listing() {
        let body = r#"{
            "value": [
                {"name": "chat", "properties": {"model": {"format": "OpenAI", "name": "gpt-4o", "version": "2024-08-06"}}},
                {"name": "bare"}
            ],
            "nextLink": "https://management.azure.com/next"
        }"#;
        let page =
            parse_deployments(&endpoint(Provider::AzureOpenAI, Auth::managed_identity()), body).unwrap();

        assert_eq!(page.models[0].deployment_name, "chat");
        assert_eq!(page.models[0].model_name.as_deref(), Some("gpt-4o"));
        assert_eq!(page.models[1].model_name, None);
        assert_eq!(page.next_link.as_deref(), Some("https://management.azure.com/next"));
    }

    #[test]
    fn parses_foundry_listing() {
        let body = r#"{"value":[{"name":"phi-4","modelName":"Phi-4","type":"ModelDeployment"}]}"#;
        let page = parse_deployments(&endpoint(Provider::AiFoundry, Auth::managed_identity()), body).unwrap();

        assert_eq!(page.models, vec![FetchedModel::new("phi-4").with_model_name("Phi-4")]);
    }

    #[test]
    fn malformed_listing_is_a_decode_error() {
        let err = parse_deployments(&endpoint(Provider::AiFoundry, Auth::managed_identity()), "[]")
            .unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[test]
    fn ping_asks_for_one_token() {
        let body = ping_body();
        assert_eq!(body["max_tokens"], 1);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn token_auth_without_source_is_unsupported() {
        let client = HttpProviderClient::new(Duration::from_secs(1)).unwrap();
        let endpoint = endpoint(Provider::AzureOpenAI, Auth::managed_identity())
            .with_management("sub", "rg");

        let err = client.discover(&endpoint).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }
}
