//! Ollama embedding function implementation for local model inference.
//!
//! This module provides [`OllamaEmbeddingFunction`], which connects to a locally running
//! Ollama instance to generate embeddings using models like `nomic-embed-text` or `mxbai-embed-large`.
//! Ollama enables privacy-preserving embeddings without sending data to external APIs.

use std::time::Duration;

use chroma_collection_types::EmbeddingFunctionSpec;
use reqwest::RequestBuilder;
use serde_json::Value;

use crate::config::EmbeddingFunctionOptions;
use crate::embed::{
    check_embedding_count, http_client, trim_base_url, DenseEmbeddingFunction,
    EmbeddingFunctionError, ProviderConfig,
};

/// Canonical provider name.
pub const OLLAMA_PROVIDER: &str = "ollama";
/// Model used when a spec does not name one.
pub const DEFAULT_OLLAMA_MODEL: &str = "chroma/all-minilm-l6-v2-f32";
/// Config key holding the request timeout in seconds.
pub const TIMEOUT_KEY: &str = "timeout";

////////////////////////////////////// OllamaEmbeddingFunction /////////////////////////////////////

/// Generates embeddings using a locally running Ollama instance.
///
/// Connects to an Ollama server (typically at `http://localhost:11434`) and uses the specified
/// model to transform text into vector embeddings. This enables privacy-preserving semantic search
/// without external API dependencies.
///
/// # Examples
///
/// ```ignore
/// use chroma_collection::embed::ollama::OllamaEmbeddingFunction;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let embedder = OllamaEmbeddingFunction::new(
///     "http://localhost:11434",
///     "nomic-embed-text"
/// ).await?;
/// # Ok(())
/// # }
/// ```
pub struct OllamaEmbeddingFunction {
    client: reqwest::Client,
    host: String,
    model: String,
    timeout: Duration,
}

impl OllamaEmbeddingFunction {
    /// Constructs a new Ollama embedding function and verifies connectivity.
    ///
    /// Connects to the specified Ollama host and performs a heartbeat check to ensure
    /// the server is reachable and the model is available. The model must already be
    /// pulled locally using `ollama pull <model>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the Ollama server is unreachable, the model is not found,
    /// or the heartbeat request fails.
    pub async fn new(
        host: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, EmbeddingFunctionError> {
        let options = EmbeddingFunctionOptions::default();
        let timeout = options.request_timeout();
        let this = Self {
            client: http_client(timeout)?,
            host: trim_base_url(&host.into()),
            model: model.into(),
            timeout,
        };
        this.heartbeat().await?;
        Ok(this)
    }

    /// Builds the function from normalised provider settings without contacting the server.
    ///
    /// The `timeout` entry, when present, is a number of seconds.
    pub fn from_provider_config(
        config: ProviderConfig,
        options: &EmbeddingFunctionOptions,
    ) -> Result<Self, EmbeddingFunctionError> {
        let timeout = match config.extra.get(TIMEOUT_KEY) {
            None => options.request_timeout(),
            Some(value) => timeout_from_value(value)?,
        };
        let host = trim_base_url(
            config
                .base_api
                .as_deref()
                .unwrap_or(&options.ollama_base_url),
        );
        Ok(Self {
            client: http_client(timeout)?,
            host,
            model: config
                .model_name
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            timeout,
        })
    }

    /// Verifies that the Ollama server is responsive and the model is accessible.
    ///
    /// Sends a minimal embedding request to confirm the connection is healthy. This is
    /// automatically called by [`OllamaEmbeddingFunction::new`] but can be invoked manually
    /// to check server status after initialization.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or the model is unavailable.
    pub async fn heartbeat(&self) -> Result<(), EmbeddingFunctionError> {
        self.embed(&["heartbeat"]).await?;
        Ok(())
    }

    async fn embed(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingFunctionError> {
        let model = &self.model;
        let input = batches;
        let req = EmbedRequest { model, input };
        let resp = req
            .make_request(self)
            .send()
            .await?
            .error_for_status()?
            .json::<EmbedResponse>()
            .await?;
        check_embedding_count(OLLAMA_PROVIDER, batches.len(), resp.embeddings)
    }
}

fn timeout_from_value(value: &Value) -> Result<Duration, EmbeddingFunctionError> {
    let invalid = || EmbeddingFunctionError::InvalidConfig {
        provider: OLLAMA_PROVIDER,
        key: TIMEOUT_KEY.to_string(),
        message: "must be a positive number of seconds".to_string(),
    };
    let seconds = value.as_f64().ok_or_else(invalid)?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs_f64(seconds))
}

#[async_trait::async_trait]
impl DenseEmbeddingFunction for OllamaEmbeddingFunction {
    async fn embed_strs(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingFunctionError> {
        if batches.is_empty() {
            return Ok(vec![]);
        }
        self.embed(batches).await
    }

    fn name(&self) -> &'static str {
        OLLAMA_PROVIDER
    }

    fn spec(&self) -> EmbeddingFunctionSpec {
        EmbeddingFunctionSpec::known(OLLAMA_PROVIDER)
            .with_config("url", self.host.as_str())
            .with_config("model_name", self.model.as_str())
            .with_config(TIMEOUT_KEY, self.timeout.as_secs())
    }
}

/////////////////////////////////////////// EmbedRequest ///////////////////////////////////////////

/// A request to embed multiple input documents.
#[derive(Clone, Debug, serde::Serialize)]
pub struct EmbedRequest<'a> {
    /// The name of the model to use for embedding.
    pub model: &'a str,
    /// The input texts to embed.
    pub input: &'a [&'a str],
}

impl EmbedRequest<'_> {
    /// Create a new RequestBuilder for this embed request.
    pub fn make_request(&self, ef: &OllamaEmbeddingFunction) -> RequestBuilder {
        ef.client.post(format!("{}/api/embed", ef.host)).json(self)
    }
}

/////////////////////////////////////////// EmbedResponse //////////////////////////////////////////

/// A response to an embed request.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct EmbedResponse {
    /// The name of the model used to generate the response.
    pub model: String,
    /// The embeddings of the input, in the same order.
    pub embeddings: Vec<Vec<f32>>,
    /// The duration of the response.
    pub total_duration: Option<f64>,
    /// The duration of loading the model.
    pub load_duration: Option<f64>,
    /// The number of tokens counted in the prompt.
    pub prompt_eval_count: Option<f64>,
}
