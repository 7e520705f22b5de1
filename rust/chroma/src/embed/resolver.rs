use std::collections::HashMap;
use std::sync::Arc;

use chroma_collection_types::EmbeddingFunctionSpec;
use chroma_error::{ChromaError, ErrorCodes};
use serde_json::Value;
use thiserror::Error;

use crate::config::EmbeddingFunctionOptions;
use crate::embed::cohere::{CohereEmbeddingFunction, COHERE_PROVIDER, DEFAULT_COHERE_API_KEY_ENV_VAR};
use crate::embed::huggingface::{
    HuggingFaceEmbeddingFunction, API_TYPE_KEY, DEFAULT_HUGGINGFACE_API_KEY_ENV_VAR,
    HUGGINGFACE_PROVIDER,
};
use crate::embed::ollama::{OllamaEmbeddingFunction, OLLAMA_PROVIDER, TIMEOUT_KEY};
use crate::embed::openai::{OpenAIEmbeddingFunction, DEFAULT_OPENAI_API_KEY_ENV_VAR, OPENAI_PROVIDER};
use crate::embed::{EmbeddingFunctionError, ProviderConfig, ResolvedEmbeddingFunction};

/////////////////////////////////////////// ResolveError ///////////////////////////////////////////

/// Errors raised while turning an [`EmbeddingFunctionSpec`] into a live embedding function.
///
/// Every message names the offending type or provider and tells the caller to fall back to
/// passing query embeddings instead of query texts.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The spec is not of the `known` type, so no client-side provider can serve it.
    #[error("Embedding function type `{kind}` cannot be resolved by the client; supply query embeddings directly")]
    UnsupportedType {
        /// The type tag found in the spec.
        kind: String,
    },
    /// The spec names a provider this client does not implement.
    #[error("Unknown embedding function provider `{name}`; supply query embeddings directly")]
    UnknownProvider {
        /// The provider name found in the spec.
        name: String,
    },
    /// A config entry has the wrong JSON type.
    #[error("Embedding function `{provider}` config `{key}` must be a string; supply query embeddings directly")]
    InvalidConfigValue {
        /// Canonical provider name.
        provider: &'static str,
        /// The offending config key as written in the spec.
        key: String,
    },
    /// The provider rejected its configuration.
    #[error("Failed to construct embedding function `{provider}`: {source}; supply query embeddings directly")]
    Construction {
        /// Canonical provider name.
        provider: &'static str,
        /// The provider's own error.
        #[source]
        source: EmbeddingFunctionError,
    },
}

impl ChromaError for ResolveError {
    fn code(&self) -> ErrorCodes {
        match self {
            ResolveError::UnsupportedType { .. }
            | ResolveError::UnknownProvider { .. }
            | ResolveError::InvalidConfigValue { .. } => ErrorCodes::InvalidArgument,
            ResolveError::Construction { .. } => ErrorCodes::FailedPrecondition,
        }
    }
}

//////////////////////////////////////////// EnvLookup /////////////////////////////////////////////

/// Read access to environment variables.
pub trait EnvLookup: Send + Sync {
    /// Returns the value of `name`, or `None` when it is unset or not valid unicode.
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

////////////////////////////////////////// Provider table //////////////////////////////////////////

/// Where a provider config key is stored after normalisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigSlot {
    /// [`ProviderConfig::api_key`].
    ApiKey,
    /// [`ProviderConfig::api_key_env_var`], resolved into the API key slot.
    ApiKeyEnvVar,
    /// [`ProviderConfig::model_name`].
    ModelName,
    /// [`ProviderConfig::base_api`].
    BaseApi,
    /// Kept under its own name in [`ProviderConfig::extra`].
    Passthrough,
}

type Constructor = fn(
    ProviderConfig,
    &EmbeddingFunctionOptions,
) -> Result<ResolvedEmbeddingFunction, EmbeddingFunctionError>;

struct ProviderEntry {
    name: &'static str,
    aliases: &'static [&'static str],
    keys: &'static [(&'static str, ConfigSlot)],
    string_only: bool,
    default_api_key_env_var: Option<&'static str>,
    construct: Constructor,
}

impl ProviderEntry {
    fn matches(&self, name: &str) -> bool {
        std::iter::once(&self.name)
            .chain(self.aliases)
            .any(|candidate| candidate.eq_ignore_ascii_case(name))
    }

    fn slot(&self, key: &str) -> Option<ConfigSlot> {
        self.keys
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
            .map(|(_, slot)| *slot)
    }
}

static PROVIDERS: &[ProviderEntry] = &[
    ProviderEntry {
        name: OPENAI_PROVIDER,
        aliases: &["open_ai"],
        keys: &[
            ("api_key", ConfigSlot::ApiKey),
            ("api_key_env_var", ConfigSlot::ApiKeyEnvVar),
            ("model_name", ConfigSlot::ModelName),
            ("model", ConfigSlot::ModelName),
            ("base_api", ConfigSlot::BaseApi),
            ("api_base", ConfigSlot::BaseApi),
            ("base_url", ConfigSlot::BaseApi),
            ("url", ConfigSlot::BaseApi),
            ("organization_id", ConfigSlot::Passthrough),
        ],
        string_only: true,
        default_api_key_env_var: Some(DEFAULT_OPENAI_API_KEY_ENV_VAR),
        construct: |config, options| {
            Ok(Arc::new(OpenAIEmbeddingFunction::from_provider_config(
                config, options,
            )?))
        },
    },
    ProviderEntry {
        name: COHERE_PROVIDER,
        aliases: &[],
        keys: &[
            ("api_key", ConfigSlot::ApiKey),
            ("api_key_env_var", ConfigSlot::ApiKeyEnvVar),
            ("model_name", ConfigSlot::ModelName),
            ("model", ConfigSlot::ModelName),
            ("base_api", ConfigSlot::BaseApi),
            ("api_base", ConfigSlot::BaseApi),
            ("base_url", ConfigSlot::BaseApi),
            ("url", ConfigSlot::BaseApi),
            ("input_type", ConfigSlot::Passthrough),
            ("truncate", ConfigSlot::Passthrough),
        ],
        string_only: true,
        default_api_key_env_var: Some(DEFAULT_COHERE_API_KEY_ENV_VAR),
        construct: |config, options| {
            Ok(Arc::new(CohereEmbeddingFunction::from_provider_config(
                config, options,
            )?))
        },
    },
    ProviderEntry {
        name: HUGGINGFACE_PROVIDER,
        aliases: &["hf", "hugging_face"],
        keys: &[
            ("api_key", ConfigSlot::ApiKey),
            ("api_key_env_var", ConfigSlot::ApiKeyEnvVar),
            ("model_name", ConfigSlot::ModelName),
            ("model", ConfigSlot::ModelName),
            ("base_api", ConfigSlot::BaseApi),
            ("api_base", ConfigSlot::BaseApi),
            ("base_url", ConfigSlot::BaseApi),
            ("url", ConfigSlot::BaseApi),
            (API_TYPE_KEY, ConfigSlot::Passthrough),
        ],
        string_only: true,
        default_api_key_env_var: Some(DEFAULT_HUGGINGFACE_API_KEY_ENV_VAR),
        construct: |config, options| {
            Ok(Arc::new(HuggingFaceEmbeddingFunction::from_provider_config(
                config, options,
            )?))
        },
    },
    ProviderEntry {
        name: OLLAMA_PROVIDER,
        aliases: &[],
        keys: &[
            ("url", ConfigSlot::BaseApi),
            ("base_api", ConfigSlot::BaseApi),
            ("api_base", ConfigSlot::BaseApi),
            ("base_url", ConfigSlot::BaseApi),
            ("model_name", ConfigSlot::ModelName),
            ("model", ConfigSlot::ModelName),
            (TIMEOUT_KEY, ConfigSlot::Passthrough),
        ],
        string_only: false,
        default_api_key_env_var: None,
        construct: |config, options| {
            Ok(Arc::new(OllamaEmbeddingFunction::from_provider_config(
                config, options,
            )?))
        },
    },
];

fn find_provider(name: &str) -> Option<&'static ProviderEntry> {
    let name = name.trim();
    PROVIDERS.iter().find(|entry| entry.matches(name))
}

/// Maps a provider name or alias to its canonical name, folding ASCII case.
pub fn canonical_provider_name(name: &str) -> Option<&'static str> {
    find_provider(name).map(|entry| entry.name)
}

/// Canonical names of every provider the resolver can construct.
pub fn supported_providers() -> impl Iterator<Item = &'static str> {
    PROVIDERS.iter().map(|entry| entry.name)
}

/// Where `key` lands for `provider` after normalisation, if the provider accepts it.
pub fn config_slot(provider: &str, key: &str) -> Option<ConfigSlot> {
    find_provider(provider).and_then(|entry| entry.slot(key))
}

//////////////////////////////////// EmbeddingFunctionResolver /////////////////////////////////////

/// Turns embedding function specs into live embedding functions.
///
/// Resolution reads environment variables through `E` but performs no network I/O; providers
/// only contact their servers when asked to embed.
///
/// # Examples
///
/// ```
/// use chroma_collection::embed::EmbeddingFunctionResolver;
/// use chroma_collection::EmbeddingFunctionOptions;
/// use chroma_collection_types::EmbeddingFunctionSpec;
///
/// let resolver = EmbeddingFunctionResolver::new(EmbeddingFunctionOptions::default());
/// let spec = EmbeddingFunctionSpec::known("consistent_hash");
/// let err = resolver.resolve(Some(&spec)).err().unwrap();
/// assert!(err.to_string().contains("supply query embeddings directly"));
/// ```
#[derive(Clone, Debug)]
pub struct EmbeddingFunctionResolver<E: EnvLookup = ProcessEnv> {
    env: E,
    options: EmbeddingFunctionOptions,
}

impl EmbeddingFunctionResolver<ProcessEnv> {
    /// Creates a resolver reading the process environment.
    pub fn new(options: EmbeddingFunctionOptions) -> Self {
        Self::with_env(ProcessEnv, options)
    }
}

impl Default for EmbeddingFunctionResolver<ProcessEnv> {
    fn default() -> Self {
        Self::new(EmbeddingFunctionOptions::default())
    }
}

impl<E: EnvLookup> EmbeddingFunctionResolver<E> {
    /// Creates a resolver reading environment variables from `env`.
    pub fn with_env(env: E, options: EmbeddingFunctionOptions) -> Self {
        Self { env, options }
    }

    /// The options handed to every provider.
    pub fn options(&self) -> &EmbeddingFunctionOptions {
        &self.options
    }

    /// Resolves `spec` into an embedding function.
    ///
    /// A missing spec resolves to `None`.
    ///
    /// # Errors
    ///
    /// Fails for non-`known` types, unknown providers, wrongly typed config values and
    /// provider construction failures.
    pub fn resolve(
        &self,
        spec: Option<&EmbeddingFunctionSpec>,
    ) -> Result<Option<ResolvedEmbeddingFunction>, ResolveError> {
        let Some(spec) = spec else {
            return Ok(None);
        };
        if !spec.is_known() {
            return Err(ResolveError::UnsupportedType {
                kind: spec.kind().as_str().to_string(),
            });
        }
        let entry = find_provider(spec.name()).ok_or_else(|| ResolveError::UnknownProvider {
            name: spec.name().to_string(),
        })?;
        let config = self.normalize(entry, spec)?;
        let function = (entry.construct)(config, &self.options).map_err(|source| {
            ResolveError::Construction {
                provider: entry.name,
                source,
            }
        })?;
        tracing::debug!(provider = entry.name, spec = %spec, "Resolved embedding function");
        Ok(Some(function))
    }

    fn normalize(
        &self,
        entry: &ProviderEntry,
        spec: &EmbeddingFunctionSpec,
    ) -> Result<ProviderConfig, ResolveError> {
        let mut config = ProviderConfig::default();
        for (key, value) in spec.config() {
            if value.is_null() {
                continue;
            }
            if entry.string_only && !value.is_string() {
                return Err(invalid_value(entry, key));
            }
            let Some(slot) = entry.slot(key) else {
                tracing::warn!(
                    provider = entry.name,
                    key = key.as_str(),
                    "Ignoring unrecognised embedding function config key"
                );
                continue;
            };
            match slot {
                ConfigSlot::ApiKey => config.api_key = Some(string_value(entry, key, value)?),
                ConfigSlot::ApiKeyEnvVar => {
                    config.api_key_env_var = Some(string_value(entry, key, value)?)
                }
                ConfigSlot::ModelName => config.model_name = Some(string_value(entry, key, value)?),
                ConfigSlot::BaseApi => config.base_api = Some(string_value(entry, key, value)?),
                ConfigSlot::Passthrough => {
                    config.extra.insert(key.to_ascii_lowercase(), value.clone());
                }
            }
        }

        let explicit_env_var = config.api_key_env_var.is_some();
        if config.api_key_env_var.is_none() {
            config.api_key_env_var = entry.default_api_key_env_var.map(str::to_string);
        }
        if config.api_key.is_none() {
            if let Some(env_var) = &config.api_key_env_var {
                config.api_key = self.env.var(env_var);
                if config.api_key.is_none() && explicit_env_var {
                    tracing::warn!(
                        provider = entry.name,
                        env_var = env_var.as_str(),
                        "Embedding function API key variable is not set"
                    );
                }
            }
        }
        Ok(config)
    }
}

fn invalid_value(entry: &ProviderEntry, key: &str) -> ResolveError {
    ResolveError::InvalidConfigValue {
        provider: entry.name,
        key: key.to_string(),
    }
}

fn string_value(entry: &ProviderEntry, key: &str, value: &Value) -> Result<String, ResolveError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid_value(entry, key))
}
