//! Client for the Azure OpenAI deployments used by the pipeline.
//!
//! Every call goes to `{endpoint}/openai/deployments/{deployment}/...` with the
//! `api-version` query parameter and the `api-key` header.

use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::AzureConfig;
use crate::error::{ApiError, ConfigurationError};

/// HTTP client bound to one Azure OpenAI resource.
#[derive(Clone, Debug)]
pub struct AzureClient {
    http: reqwest::Client,
    config: AzureConfig,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletion {
    #[serde(default)]
    pub(crate) choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub(crate) message: ChatMessage,
    #[serde(default)]
    pub(crate) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatMessage {
    #[serde(default)]
    pub(crate) content: Option<String>,
    #[serde(default)]
    pub(crate) refusal: Option<String>,
}

/// Request body for POST .../images/generations
#[derive(Debug, Serialize)]
pub(crate) struct ImagesGenerateRequest<'a> {
    pub(crate) model: &'a str,
    pub(crate) prompt: &'a str,
    pub(crate) size: &'a str,
    pub(crate) n: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImagesResponse {
    #[serde(default)]
    pub(crate) data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageData {
    pub(crate) b64_json: Option<String>,
    pub(crate) url: Option<String>,
    pub(crate) revised_prompt: Option<String>,
}

impl AzureClient {
    /// Builds a client whose calls are bounded by `config.request_timeout`.
    pub fn new(config: AzureConfig) -> Result<Self, ConfigurationError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ConfigurationError::InvalidValue {
                name: "http_client",
                reason: err.to_string(),
            })?;
        Ok(Self { http, config })
    }

    /// The settings this client was built from.
    pub fn config(&self) -> &AzureConfig {
        &self.config
    }

    fn deployment_url(&self, deployment: &str, operation: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.config.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(self.config.endpoint.to_string()))?
            .pop_if_empty()
            .extend(["openai", "deployments", deployment])
            .extend(operation);
        url.query_pairs_mut()
            .append_pair("api-version", &self.config.api_version);
        Ok(url)
    }

    pub(crate) async fn chat_completion(&self, body: &Value) -> Result<ChatCompletion, ApiError> {
        let url = self.deployment_url(&self.config.chat_deployment, &["chat", "completions"])?;
        debug!("POST {}", url.path());
        let response = self
            .http
            .post(url)
            .header("api-key", &self.config.api_key)
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    pub(crate) async fn generate_images(&self, prompt: &str, size: &str) -> Result<ImagesResponse, ApiError> {
        let url = self.deployment_url(&self.config.image_deployment, &["images", "generations"])?;
        debug!("POST {}", url.path());
        let body = ImagesGenerateRequest {
            model: &self.config.image_deployment,
            prompt,
            size,
            n: 1,
        };
        let response = self
            .http
            .post(url)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        read_json(response).await
    }

    pub(crate) async fn edit_image(&self, form: Form) -> Result<ImagesResponse, ApiError> {
        let url = self.deployment_url(&self.config.image_deployment, &["images", "edits"])?;
        debug!("POST {}", url.path());
        let response = self
            .http
            .post(url)
            .header("api-key", &self.config.api_key)
            .multipart(form)
            .send()
            .await?;
        read_json(response).await
    }

    /// Fetches an image the service handed back by URL instead of inline.
    pub(crate) async fn download(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes.to_vec())
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Body(err.to_string()))
}
