//! HuggingFace embedding function implementation.
//!
//! Two server flavours are supported, picked with the `api_type` config entry:
//! the hosted inference API (`hf_api`, the default) and a self-hosted
//! text-embeddings-inference server (`hfei_api`).

use std::fmt;
use std::str::FromStr;

use chroma_collection_types::EmbeddingFunctionSpec;
use reqwest::RequestBuilder;
use serde::Serialize;

use crate::config::EmbeddingFunctionOptions;
use crate::embed::{
    check_embedding_count, http_client, spec_with_common_fields, trim_base_url,
    DenseEmbeddingFunction, EmbeddingFunctionError, ProviderConfig,
};

/// Canonical provider name.
pub const HUGGINGFACE_PROVIDER: &str = "huggingface";
/// Environment variable consulted when a spec does not name one.
pub const DEFAULT_HUGGINGFACE_API_KEY_ENV_VAR: &str = "HF_API_KEY";
/// Model used when a spec does not name one.
pub const DEFAULT_HUGGINGFACE_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
/// Config key selecting the server flavour.
pub const API_TYPE_KEY: &str = "api_type";

/// The HuggingFace server flavour an embedding function talks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HuggingFaceApiType {
    /// The hosted inference API.
    #[default]
    HfApi,
    /// A text-embeddings-inference server.
    HfeiApi,
}

impl HuggingFaceApiType {
    /// Canonical wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            HuggingFaceApiType::HfApi => "hf_api",
            HuggingFaceApiType::HfeiApi => "hfei_api",
        }
    }
}

impl fmt::Display for HuggingFaceApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HuggingFaceApiType {
    type Err = EmbeddingFunctionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        [HuggingFaceApiType::HfApi, HuggingFaceApiType::HfeiApi]
            .into_iter()
            .find(|api_type| api_type.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| EmbeddingFunctionError::InvalidConfig {
                provider: HUGGINGFACE_PROVIDER,
                key: API_TYPE_KEY.to_string(),
                message: format!("must be one of hf_api, hfei_api, got `{value}`"),
            })
    }
}

/// Generates embeddings with HuggingFace.
pub struct HuggingFaceEmbeddingFunction {
    client: reqwest::Client,
    base_url: String,
    api_type: HuggingFaceApiType,
    api_key: Option<String>,
    api_key_env_var: Option<String>,
    base_api: Option<String>,
    model: String,
}

impl HuggingFaceEmbeddingFunction {
    /// Builds the function from normalised provider settings.
    ///
    /// # Errors
    ///
    /// Fails on an unknown `api_type`, or when the hosted API is selected without an API key.
    pub fn from_provider_config(
        config: ProviderConfig,
        options: &EmbeddingFunctionOptions,
    ) -> Result<Self, EmbeddingFunctionError> {
        let api_type = match config.extra_str(API_TYPE_KEY) {
            Some(value) => value.parse()?,
            None => HuggingFaceApiType::default(),
        };
        if api_type == HuggingFaceApiType::HfApi && config.api_key.is_none() {
            return Err(EmbeddingFunctionError::MissingApiKey {
                provider: HUGGINGFACE_PROVIDER,
                env_var: config.api_key_env_var.clone(),
            });
        }
        let base_url = trim_base_url(
            config
                .base_api
                .as_deref()
                .unwrap_or(&options.huggingface_base_url),
        );
        Ok(Self {
            client: http_client(options.request_timeout())?,
            base_url,
            api_type,
            api_key: config.api_key,
            api_key_env_var: config.api_key_env_var,
            base_api: config.base_api,
            model: config
                .model_name
                .unwrap_or_else(|| DEFAULT_HUGGINGFACE_MODEL.to_string()),
        })
    }

    /// The server flavour in use.
    pub fn api_type(&self) -> HuggingFaceApiType {
        self.api_type
    }

    async fn embed(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingFunctionError> {
        let req = EmbedRequest { inputs: batches };
        let embeddings = req
            .make_request(self)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Vec<f32>>>()
            .await?;
        check_embedding_count(HUGGINGFACE_PROVIDER, batches.len(), embeddings)
    }
}

#[async_trait::async_trait]
impl DenseEmbeddingFunction for HuggingFaceEmbeddingFunction {
    async fn embed_strs(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingFunctionError> {
        if batches.is_empty() {
            return Ok(vec![]);
        }
        self.embed(batches).await
    }

    fn name(&self) -> &'static str {
        HUGGINGFACE_PROVIDER
    }

    fn spec(&self) -> EmbeddingFunctionSpec {
        spec_with_common_fields(
            EmbeddingFunctionSpec::known(HUGGINGFACE_PROVIDER),
            &self.model,
            self.api_key_env_var.as_deref(),
            self.base_api.as_deref(),
        )
        .with_config(API_TYPE_KEY, self.api_type.as_str())
    }
}

/// A request to embed multiple input documents.
#[derive(Clone, Debug, Serialize)]
pub struct EmbedRequest<'a> {
    /// The input texts to embed.
    pub inputs: &'a [&'a str],
}

impl EmbedRequest<'_> {
    /// Create a new RequestBuilder for this embed request.
    pub fn make_request(&self, ef: &HuggingFaceEmbeddingFunction) -> RequestBuilder {
        let url = match ef.api_type {
            HuggingFaceApiType::HfApi => format!(
                "{}/pipeline/feature-extraction/{}",
                ef.base_url, ef.model
            ),
            HuggingFaceApiType::HfeiApi => format!("{}/embed", ef.base_url),
        };
        let builder = ef.client.post(url).json(self);
        match &ef.api_key {
            Some(api_key) => builder.bearer_auth(api_key),
            None => builder,
        }
    }
}
