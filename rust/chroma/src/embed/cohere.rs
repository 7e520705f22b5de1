//! Cohere embedding function implementation.

use chroma_collection_types::EmbeddingFunctionSpec;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingFunctionOptions;
use crate::embed::{
    check_embedding_count, http_client, spec_with_common_fields, trim_base_url,
    DenseEmbeddingFunction, EmbeddingFunctionError, ProviderConfig,
};

/// Canonical provider name.
pub const COHERE_PROVIDER: &str = "cohere";
/// Environment variable consulted when a spec does not name one.
pub const DEFAULT_COHERE_API_KEY_ENV_VAR: &str = "COHERE_API_KEY";
/// Model used when a spec does not name one.
pub const DEFAULT_COHERE_MODEL: &str = "large";

/// Generates embeddings with the Cohere `/embed` endpoint.
///
/// The optional `input_type` and `truncate` config entries are forwarded verbatim; v3
/// models require `input_type`.
pub struct CohereEmbeddingFunction {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_key_env_var: Option<String>,
    base_api: Option<String>,
    model: String,
    input_type: Option<String>,
    truncate: Option<String>,
}

impl CohereEmbeddingFunction {
    /// Builds the function from normalised provider settings.
    pub fn from_provider_config(
        config: ProviderConfig,
        options: &EmbeddingFunctionOptions,
    ) -> Result<Self, EmbeddingFunctionError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| EmbeddingFunctionError::MissingApiKey {
                provider: COHERE_PROVIDER,
                env_var: config.api_key_env_var.clone(),
            })?;
        let base_url = trim_base_url(
            config
                .base_api
                .as_deref()
                .unwrap_or(&options.cohere_base_url),
        );
        Ok(Self {
            client: http_client(options.request_timeout())?,
            base_url,
            api_key,
            input_type: config.extra_str("input_type").map(str::to_string),
            truncate: config.extra_str("truncate").map(str::to_string),
            model: config
                .model_name
                .unwrap_or_else(|| DEFAULT_COHERE_MODEL.to_string()),
            api_key_env_var: config.api_key_env_var,
            base_api: config.base_api,
        })
    }

    async fn embed(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingFunctionError> {
        let req = EmbedRequest {
            model: &self.model,
            texts: batches,
            input_type: self.input_type.as_deref(),
            truncate: self.truncate.as_deref(),
        };
        let resp = req
            .make_request(self)
            .send()
            .await?
            .error_for_status()?
            .json::<EmbedResponse>()
            .await?;
        check_embedding_count(COHERE_PROVIDER, batches.len(), resp.embeddings)
    }
}

#[async_trait::async_trait]
impl DenseEmbeddingFunction for CohereEmbeddingFunction {
    async fn embed_strs(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingFunctionError> {
        if batches.is_empty() {
            return Ok(vec![]);
        }
        self.embed(batches).await
    }

    fn name(&self) -> &'static str {
        COHERE_PROVIDER
    }

    fn spec(&self) -> EmbeddingFunctionSpec {
        let mut spec = spec_with_common_fields(
            EmbeddingFunctionSpec::known(COHERE_PROVIDER),
            &self.model,
            self.api_key_env_var.as_deref(),
            self.base_api.as_deref(),
        );
        if let Some(input_type) = &self.input_type {
            spec = spec.with_config("input_type", input_type.as_str());
        }
        if let Some(truncate) = &self.truncate {
            spec = spec.with_config("truncate", truncate.as_str());
        }
        spec
    }
}

/// A request to embed multiple input documents.
#[derive(Clone, Debug, Serialize)]
pub struct EmbedRequest<'a> {
    /// The name of the model to use for embedding.
    pub model: &'a str,
    /// The input texts to embed.
    pub texts: &'a [&'a str],
    /// How the embeddings will be used (`search_document`, `search_query`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<&'a str>,
    /// Truncation strategy for over-long inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncate: Option<&'a str>,
}

impl EmbedRequest<'_> {
    /// Create a new RequestBuilder for this embed request.
    pub fn make_request(&self, ef: &CohereEmbeddingFunction) -> RequestBuilder {
        ef.client
            .post(format!("{}/embed", ef.base_url))
            .bearer_auth(&ef.api_key)
            .json(self)
    }
}

/// A response to an embed request.
#[derive(Clone, Debug, Deserialize)]
pub struct EmbedResponse {
    /// The embeddings of the input, in the same order.
    pub embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    #[test_log::test]
    async fn test_embed_strs_forwards_input_type() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/embed")
                    .header("authorization", "Bearer co-test")
                    .json_body(json!({
                        "model": "embed-english-v3.0",
                        "texts": ["hello"],
                        "input_type": "search_query"
                    }));
                then.status(200)
                    .json_body(json!({"id": "x", "embeddings": [[0.25, 0.75]]}));
            })
            .await;

        let mut config = ProviderConfig {
            api_key: Some("co-test".to_string()),
            model_name: Some("embed-english-v3.0".to_string()),
            ..Default::default()
        };
        config
            .extra
            .insert("input_type".to_string(), json!("search_query"));
        let options = EmbeddingFunctionOptions {
            cohere_base_url: server.url("/v1/"),
            ..Default::default()
        };
        let ef = CohereEmbeddingFunction::from_provider_config(config, &options).unwrap();
        let embeddings = ef.embed_strs(&["hello"]).await.unwrap();
        mock.assert_async().await;
        assert_eq!(embeddings, vec![vec![0.25, 0.75]]);
        assert_eq!(
            ef.spec().config_value("input_type"),
            Some(&json!("search_query"))
        );
    }

    #[tokio::test]
    async fn test_short_response_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200).json_body(json!({"embeddings": [[1.0]]}));
            })
            .await;
        let ef = CohereEmbeddingFunction::from_provider_config(
            ProviderConfig {
                api_key: Some("co-test".to_string()),
                base_api: Some(server.base_url()),
                ..Default::default()
            },
            &EmbeddingFunctionOptions::default(),
        )
        .unwrap();
        let err = ef.embed_strs(&["a", "b"]).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingFunctionError::MalformedResponse {
                provider: COHERE_PROVIDER,
                ..
            }
        ));
    }
}
