//! Options shared by every embedding function the resolver constructs.
//!
//! Options load from an optional YAML file merged under environment variables prefixed
//! with `CHROMA_EF_`. Nested keys use `__` as the separator.

use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use serde::{Deserialize, Serialize};

/// Path [`EmbeddingFunctionOptions::load`] reads from when the file exists.
pub const DEFAULT_CONFIG_PATH: &str = "./embedding_functions.yaml";
/// Prefix of the environment variables that override file values.
pub const CONFIG_ENV_PREFIX: &str = "CHROMA_EF_";

/// Provider defaults applied when a spec does not override them.
///
/// A `base_api` (or alias) entry in an embedding function spec takes precedence over the
/// matching `*_base_url` here for that one instance.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmbeddingFunctionOptions {
    /// Timeout applied to every embedding request, in milliseconds.
    #[serde(default = "EmbeddingFunctionOptions::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Base URL of the OpenAI API.
    #[serde(default = "EmbeddingFunctionOptions::default_openai_base_url")]
    pub openai_base_url: String,
    /// Base URL of the Cohere API.
    #[serde(default = "EmbeddingFunctionOptions::default_cohere_base_url")]
    pub cohere_base_url: String,
    /// Base URL of the HuggingFace inference API.
    #[serde(default = "EmbeddingFunctionOptions::default_huggingface_base_url")]
    pub huggingface_base_url: String,
    /// Base URL of the Ollama server.
    #[serde(default = "EmbeddingFunctionOptions::default_ollama_base_url")]
    pub ollama_base_url: String,
}

impl EmbeddingFunctionOptions {
    fn default_request_timeout_ms() -> u64 {
        60_000
    }

    fn default_openai_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    fn default_cohere_base_url() -> String {
        "https://api.cohere.ai/v1".to_string()
    }

    fn default_huggingface_base_url() -> String {
        "https://api-inference.huggingface.co".to_string()
    }

    fn default_ollama_base_url() -> String {
        "http://localhost:11434".to_string()
    }

    /// Loads options from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Loads options from `path` (skipped when the file does not exist) and the environment.
    ///
    /// Environment variables win over file values.
    pub fn load_from_path(path: &str) -> Result<Self, figment::Error> {
        // Figment cannot tell a nested key from a key containing underscores, so nesting uses `__`.
        let mut f = figment::Figment::from(
            Env::prefixed(CONFIG_ENV_PREFIX).map(|k| k.as_str().replace("__", ".").into()),
        );
        if std::path::Path::new(path).exists() {
            f = figment::Figment::from(Yaml::file(path)).merge(f);
        }
        f.extract()
    }

    /// The request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for EmbeddingFunctionOptions {
    fn default() -> Self {
        EmbeddingFunctionOptions {
            request_timeout_ms: Self::default_request_timeout_ms(),
            openai_base_url: Self::default_openai_base_url(),
            cohere_base_url: Self::default_cohere_base_url(),
            huggingface_base_url: Self::default_huggingface_base_url(),
            ollama_base_url: Self::default_ollama_base_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults_without_file_or_env() {
        Jail::expect_with(|_| {
            let options = EmbeddingFunctionOptions::load().expect("defaults should load");
            assert_eq!(options, EmbeddingFunctionOptions::default());
            assert_eq!(options.request_timeout(), Duration::from_secs(60));
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_config_from_default_path() {
        Jail::expect_with(|jail| {
            let _ = jail.create_file(
                "embedding_functions.yaml",
                r#"
                request_timeout_ms: 5000
                ollama_base_url: "http://ollama:11434"
                "#,
            );
            let options = EmbeddingFunctionOptions::load().expect("file should load");
            assert_eq!(options.request_timeout_ms, 5000);
            assert_eq!(options.ollama_base_url, "http://ollama:11434");
            assert_eq!(options.openai_base_url, "https://api.openai.com/v1");
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            let _ = jail.create_file(
                "custom.yaml",
                r#"
                request_timeout_ms: 5000
                cohere_base_url: "http://file-cohere"
                "#,
            );
            jail.set_env("CHROMA_EF_REQUEST_TIMEOUT_MS", 250);
            jail.set_env("CHROMA_EF_OPENAI_BASE_URL", "http://proxy/v1");
            let options =
                EmbeddingFunctionOptions::load_from_path("custom.yaml").expect("should load");
            assert_eq!(options.request_timeout_ms, 250);
            assert_eq!(options.openai_base_url, "http://proxy/v1");
            assert_eq!(options.cohere_base_url, "http://file-cohere");
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_invalid_value_is_an_error() {
        Jail::expect_with(|jail| {
            jail.set_env("CHROMA_EF_REQUEST_TIMEOUT_MS", "soon");
            assert!(EmbeddingFunctionOptions::load().is_err());
            Ok(())
        });
    }
}
