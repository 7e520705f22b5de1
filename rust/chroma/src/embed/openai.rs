//! OpenAI embedding function implementation.
//!
//! This module provides [`OpenAIEmbeddingFunction`], which calls the OpenAI `/embeddings`
//! endpoint (or any API-compatible proxy configured through `base_api`).

use chroma_collection_types::EmbeddingFunctionSpec;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingFunctionOptions;
use crate::embed::{
    check_embedding_count, http_client, spec_with_common_fields, trim_base_url,
    DenseEmbeddingFunction, EmbeddingFunctionError, ProviderConfig,
};

/// Canonical provider name.
pub const OPENAI_PROVIDER: &str = "openai";
/// Environment variable consulted when a spec does not name one.
pub const DEFAULT_OPENAI_API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";
/// Model used when a spec does not name one.
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-ada-002";

////////////////////////////////////// OpenAIEmbeddingFunction /////////////////////////////////////

/// Generates embeddings with the OpenAI embeddings API.
pub struct OpenAIEmbeddingFunction {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_key_env_var: Option<String>,
    base_api: Option<String>,
    model: String,
    organization_id: Option<String>,
}

impl OpenAIEmbeddingFunction {
    /// Builds the function from normalised provider settings.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingFunctionError::MissingApiKey`] when no API key is available.
    pub fn from_provider_config(
        config: ProviderConfig,
        options: &EmbeddingFunctionOptions,
    ) -> Result<Self, EmbeddingFunctionError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| EmbeddingFunctionError::MissingApiKey {
                provider: OPENAI_PROVIDER,
                env_var: config.api_key_env_var.clone(),
            })?;
        let base_url = trim_base_url(
            config
                .base_api
                .as_deref()
                .unwrap_or(&options.openai_base_url),
        );
        Ok(Self {
            client: http_client(options.request_timeout())?,
            base_url,
            api_key,
            organization_id: config.extra_str("organization_id").map(str::to_string),
            model: config
                .model_name
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            api_key_env_var: config.api_key_env_var,
            base_api: config.base_api,
        })
    }

    async fn embed(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingFunctionError> {
        let req = EmbedRequest {
            model: &self.model,
            input: batches,
        };
        let mut resp = req
            .make_request(self)
            .send()
            .await?
            .error_for_status()?
            .json::<EmbedResponse>()
            .await?;
        // The API documents `index` as the input position; do not rely on response order.
        resp.data.sort_by_key(|datum| datum.index);
        let embeddings = resp.data.into_iter().map(|datum| datum.embedding).collect();
        check_embedding_count(OPENAI_PROVIDER, batches.len(), embeddings)
    }
}

#[async_trait::async_trait]
impl DenseEmbeddingFunction for OpenAIEmbeddingFunction {
    async fn embed_strs(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingFunctionError> {
        if batches.is_empty() {
            return Ok(vec![]);
        }
        self.embed(batches).await
    }

    fn name(&self) -> &'static str {
        OPENAI_PROVIDER
    }

    fn spec(&self) -> EmbeddingFunctionSpec {
        let mut spec = spec_with_common_fields(
            EmbeddingFunctionSpec::known(OPENAI_PROVIDER),
            &self.model,
            self.api_key_env_var.as_deref(),
            self.base_api.as_deref(),
        );
        if let Some(organization_id) = &self.organization_id {
            spec = spec.with_config("organization_id", organization_id.as_str());
        }
        spec
    }
}

/////////////////////////////////////////// EmbedRequest ///////////////////////////////////////////

/// A request to embed multiple input documents.
#[derive(Clone, Debug, Serialize)]
pub struct EmbedRequest<'a> {
    /// The name of the model to use for embedding.
    pub model: &'a str,
    /// The input texts to embed.
    pub input: &'a [&'a str],
}

impl EmbedRequest<'_> {
    /// Create a new RequestBuilder for this embed request.
    pub fn make_request(&self, ef: &OpenAIEmbeddingFunction) -> RequestBuilder {
        let mut builder = ef
            .client
            .post(format!("{}/embeddings", ef.base_url))
            .bearer_auth(&ef.api_key)
            .json(self);
        if let Some(organization_id) = &ef.organization_id {
            builder = builder.header("OpenAI-Organization", organization_id);
        }
        builder
    }
}

/////////////////////////////////////////// EmbedResponse //////////////////////////////////////////

/// A response to an embed request.
#[derive(Clone, Debug, Deserialize)]
pub struct EmbedResponse {
    /// One entry per input.
    pub data: Vec<EmbeddingDatum>,
    /// The model that produced the embeddings.
    pub model: Option<String>,
}

/// A single embedding in an [`EmbedResponse`].
#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingDatum {
    /// Position of the input this embedding belongs to.
    #[serde(default)]
    pub index: usize,
    /// The embedding.
    pub embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn options_for(server: &MockServer) -> EmbeddingFunctionOptions {
        EmbeddingFunctionOptions {
            openai_base_url: server.url("/v1"),
            ..Default::default()
        }
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_embed_strs_posts_to_embeddings() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/embeddings")
                    .header("authorization", "Bearer sk-test")
                    .json_body(json!({"model": "text-embedding-3-small", "input": ["a", "b"]}));
                then.status(200).json_body(json!({
                    "model": "text-embedding-3-small",
                    "data": [
                        {"index": 1, "embedding": [0.5, 0.5]},
                        {"index": 0, "embedding": [1.0, 0.0]}
                    ]
                }));
            })
            .await;

        let ef = OpenAIEmbeddingFunction::from_provider_config(
            ProviderConfig {
                api_key: Some("sk-test".to_string()),
                model_name: Some("text-embedding-3-small".to_string()),
                ..Default::default()
            },
            &options_for(&server),
        )
        .unwrap();
        let embeddings = ef.embed_strs(&["a", "b"]).await.unwrap();
        mock.assert_async().await;
        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.5, 0.5]]);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(401).json_body(json!({"error": "bad key"}));
            })
            .await;
        let ef = OpenAIEmbeddingFunction::from_provider_config(
            ProviderConfig {
                api_key: Some("sk-wrong".to_string()),
                ..Default::default()
            },
            &options_for(&server),
        )
        .unwrap();
        let err = ef.embed_strs(&["a"]).await.unwrap_err();
        assert!(matches!(err, EmbeddingFunctionError::Reqwest(_)));
    }

    #[test]
    fn test_missing_api_key() {
        let result = OpenAIEmbeddingFunction::from_provider_config(
            ProviderConfig {
                api_key_env_var: Some(DEFAULT_OPENAI_API_KEY_ENV_VAR.to_string()),
                ..Default::default()
            },
            &EmbeddingFunctionOptions::default(),
        );
        assert!(matches!(
            result,
            Err(EmbeddingFunctionError::MissingApiKey {
                provider: OPENAI_PROVIDER,
                ..
            })
        ));
    }

    #[test]
    fn test_spec_omits_api_key() {
        let ef = OpenAIEmbeddingFunction::from_provider_config(
            ProviderConfig {
                api_key: Some("sk-secret".to_string()),
                api_key_env_var: Some("MY_OPENAI_KEY".to_string()),
                base_api: Some("http://proxy/v1".to_string()),
                ..Default::default()
            },
            &EmbeddingFunctionOptions::default(),
        )
        .unwrap();
        let spec = ef.spec();
        assert_eq!(spec.name(), OPENAI_PROVIDER);
        assert_eq!(
            spec.config_value("model_name"),
            Some(&json!(DEFAULT_OPENAI_MODEL))
        );
        assert_eq!(
            spec.config_value("api_key_env_var"),
            Some(&json!("MY_OPENAI_KEY"))
        );
        assert_eq!(spec.config_value("base_api"), Some(&json!("http://proxy/v1")));
        assert!(spec.config_value("api_key").is_none());
    }
}
