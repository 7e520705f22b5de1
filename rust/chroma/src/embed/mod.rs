//! Embedding function abstractions for converting text to vector representations.
//!
//! This module provides the [`DenseEmbeddingFunction`] trait that defines how to transform
//! text strings into embeddings, the hosted providers a collection's embedding function spec
//! can name, and the [`EmbeddingFunctionResolver`] that turns a spec into a live function.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chroma_collection_types::{is_secret_key, EmbeddingFunctionSpec, REDACTED};
use chroma_error::{ChromaError, ErrorCodes};
use serde_json::Value;

/// Cohere hosted embeddings.
pub mod cohere;
/// HuggingFace inference API and text-embeddings-inference servers.
pub mod huggingface;
/// Locally running Ollama models.
pub mod ollama;
/// OpenAI hosted embeddings.
pub mod openai;
mod resolver;

pub use resolver::*;

/// A resolved embedding function, shareable across tasks.
pub type ResolvedEmbeddingFunction = Arc<dyn DenseEmbeddingFunction>;

///////////////////////////////////// EmbeddingFunctionError /////////////////////////////////////

/// Errors raised while constructing or invoking an embedding function.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingFunctionError {
    /// The provider needs an API key and none was configured or found in the environment.
    #[error("{provider} requires an API key; set `api_key` or point `api_key_env_var` at a set variable{}", env_var_hint(.env_var))]
    MissingApiKey {
        /// Canonical provider name.
        provider: &'static str,
        /// Environment variable that was consulted, if any.
        env_var: Option<String>,
    },
    /// A provider option holds a value the provider does not accept.
    #[error("{provider} {key} {message}")]
    InvalidConfig {
        /// Canonical provider name.
        provider: &'static str,
        /// Offending config key.
        key: String,
        /// What the provider expected.
        message: String,
    },
    /// Network request to the provider failed.
    ///
    /// This includes connection errors, timeouts, and error statuses from the provider.
    #[error("request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// Serialization or deserialization of JSON data failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    /// The provider answered with something other than one embedding per input.
    #[error("{provider} returned a malformed response: {message}")]
    MalformedResponse {
        /// Canonical provider name.
        provider: &'static str,
        /// Description of the mismatch.
        message: String,
    },
}

fn env_var_hint(env_var: &Option<String>) -> String {
    env_var
        .as_ref()
        .map(|name| format!(" (looked for `{name}`)"))
        .unwrap_or_default()
}

impl ChromaError for EmbeddingFunctionError {
    fn code(&self) -> ErrorCodes {
        match self {
            EmbeddingFunctionError::MissingApiKey { .. } => ErrorCodes::FailedPrecondition,
            EmbeddingFunctionError::InvalidConfig { .. } => ErrorCodes::InvalidArgument,
            EmbeddingFunctionError::Reqwest(_) => ErrorCodes::Unavailable,
            EmbeddingFunctionError::SerializationError(_) => ErrorCodes::Internal,
            EmbeddingFunctionError::MalformedResponse { .. } => ErrorCodes::Internal,
        }
    }
}

///////////////////////////////////// DenseEmbeddingFunction /////////////////////////////////////

/// Transforms text strings into dense embeddings.
///
/// Embedding functions are the bridge between human-readable text and the vector space
/// where similarity search operates. Implementations must be thread-safe and support
/// batch processing for efficiency. The trait is object safe so that functions resolved
/// from a collection's configuration can be handed around as [`ResolvedEmbeddingFunction`].
///
/// # Examples
///
/// ```
/// use chroma_collection::embed::DenseEmbeddingFunction;
///
/// async fn process_documents(embedder: &dyn DenseEmbeddingFunction, docs: Vec<&str>) {
///     let embeddings = embedder.embed_strs(&docs).await.unwrap();
///     assert_eq!(embeddings.len(), docs.len());
/// }
/// ```
#[async_trait::async_trait]
pub trait DenseEmbeddingFunction: Send + Sync + 'static {
    /// Converts a batch of text strings into their embedding representations.
    ///
    /// Processes all inputs in a single request to the underlying model, returning embeddings
    /// in the same order as the input strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding model is unreachable, the input exceeds model limits,
    /// or the model returns malformed data.
    async fn embed_strs(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingFunctionError>;

    /// Returns the canonical provider name of the embedding function implementation.
    fn name(&self) -> &'static str;

    /// Describes this function as a spec suitable for persisting with a collection.
    ///
    /// The raw API key is never included; only the environment variable it came from.
    fn spec(&self) -> EmbeddingFunctionSpec;
}

///////////////////////////////////////// ProviderConfig /////////////////////////////////////////

/// Provider settings after config-key normalisation.
///
/// The resolver fills the slots from whichever aliases a spec used, so providers only ever
/// see canonical fields.
#[derive(Clone, Default, PartialEq)]
pub struct ProviderConfig {
    /// API key, either given directly or read from the environment.
    pub api_key: Option<String>,
    /// Environment variable the API key is read from.
    pub api_key_env_var: Option<String>,
    /// Model to embed with.
    pub model_name: Option<String>,
    /// Base URL overriding the option default.
    pub base_api: Option<String>,
    /// Provider-specific keys passed through unchanged.
    pub extra: BTreeMap<String, Value>,
}

impl ProviderConfig {
    /// Returns a provider-specific string option.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let extra: BTreeMap<&str, String> = self
            .extra
            .iter()
            .map(|(key, value)| {
                let shown = if is_secret_key(key) {
                    REDACTED.to_string()
                } else {
                    value.to_string()
                };
                (key.as_str(), shown)
            })
            .collect();
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("api_key_env_var", &self.api_key_env_var)
            .field("model_name", &self.model_name)
            .field("base_api", &self.base_api)
            .field("extra", &extra)
            .finish()
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, EmbeddingFunctionError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Strips trailing slashes so paths can be appended with `format!`.
pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

pub(crate) fn check_embedding_count(
    provider: &'static str,
    expected: usize,
    embeddings: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, EmbeddingFunctionError> {
    if embeddings.len() != expected {
        return Err(EmbeddingFunctionError::MalformedResponse {
            provider,
            message: format!(
                "expected {expected} embeddings, received {}",
                embeddings.len()
            ),
        });
    }
    Ok(embeddings)
}

/// Adds the persistable parts of a provider config to `spec`.
pub(crate) fn spec_with_common_fields(
    mut spec: EmbeddingFunctionSpec,
    model_name: &str,
    api_key_env_var: Option<&str>,
    base_api: Option<&str>,
) -> EmbeddingFunctionSpec {
    spec = spec.with_config("model_name", model_name);
    if let Some(env_var) = api_key_env_var {
        spec = spec.with_config("api_key_env_var", env_var);
    }
    if let Some(base_api) = base_api {
        spec = spec.with_config("base_api", base_api);
    }
    spec
}
