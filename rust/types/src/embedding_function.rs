//! Provider-agnostic description of an embedding function.
//!
//! An [`EmbeddingFunctionSpec`] names a provider and carries its flat configuration.
//! It is what gets persisted with a collection; turning it into a live embedding
//! function is the job of the resolver in the client crate.

use crate::validators::ConfigurationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const KNOWN_EMBEDDING_FUNCTION_TYPE: &str = "known";
pub const REDACTED: &str = "***";

const SECRET_MARKERS: &[&str] = &["api_key", "apikey", "token", "secret", "password", "credential"];

/// Returns true when a config key likely holds a secret value.
///
/// Keys naming an environment variable (`*_env_var`) only hold the variable's name
/// and are not treated as secrets.
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    if key.ends_with("_env_var") {
        return false;
    }
    SECRET_MARKERS.iter().any(|marker| key.contains(marker))
}

/// Classification of an embedding function spec. Only `known` specs can be resolved.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EmbeddingFunctionType {
    Known,
    Custom(String),
}

impl EmbeddingFunctionType {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case(KNOWN_EMBEDDING_FUNCTION_TYPE) {
            EmbeddingFunctionType::Known
        } else {
            EmbeddingFunctionType::Custom(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EmbeddingFunctionType::Known => KNOWN_EMBEDDING_FUNCTION_TYPE,
            EmbeddingFunctionType::Custom(value) => value,
        }
    }
}

impl fmt::Display for EmbeddingFunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedding function descriptor: a type tag, a provider name and a flat config map.
///
/// Wire shape: `{"type": "known", "name": "openai", "config": {...}}`.
/// Both `Display` and `Debug` redact secret-like config values.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEmbeddingFunctionSpec", into = "RawEmbeddingFunctionSpec")]
pub struct EmbeddingFunctionSpec {
    kind: EmbeddingFunctionType,
    name: String,
    config: BTreeMap<String, Value>,
}

impl EmbeddingFunctionSpec {
    /// The type tag is re-parsed, so `Custom("KNOWN")` becomes `Known`.
    pub fn new(kind: EmbeddingFunctionType, name: impl Into<String>) -> Self {
        EmbeddingFunctionSpec {
            kind: EmbeddingFunctionType::parse(kind.as_str()),
            name: name.into(),
            config: BTreeMap::new(),
        }
    }

    pub fn known(name: impl Into<String>) -> Self {
        Self::new(EmbeddingFunctionType::Known, name)
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_config_map(mut self, config: BTreeMap<String, Value>) -> Self {
        self.config.extend(config);
        self
    }

    /// Fails for a `known` spec without a provider name. Builders taking a spec call this
    /// so that anything they accept also parses back from the wire.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.is_known() && self.name.trim().is_empty() {
            return Err(ConfigurationError::BlankEmbeddingFunctionName);
        }
        Ok(())
    }

    pub fn kind(&self) -> &EmbeddingFunctionType {
        &self.kind
    }

    pub fn is_known(&self) -> bool {
        self.kind == EmbeddingFunctionType::Known
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BTreeMap<String, Value> {
        &self.config
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    fn redacted_config(&self) -> BTreeMap<&str, String> {
        self.config
            .iter()
            .map(|(key, value)| {
                let rendered = if is_secret_key(key) {
                    REDACTED.to_string()
                } else {
                    value.to_string()
                };
                (key.as_str(), rendered)
            })
            .collect()
    }
}

impl Hash for EmbeddingFunctionSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.name.hash(state);
        for (key, value) in &self.config {
            key.hash(state);
            value.to_string().hash(state);
        }
    }
}

impl fmt::Display for EmbeddingFunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EmbeddingFunctionSpec(type={}, name={}, config={{", self.kind, self.name)?;
        for (index, (key, value)) in self.redacted_config().into_iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("})")
    }
}

impl fmt::Debug for EmbeddingFunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingFunctionSpec")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("config", &self.redacted_config())
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct RawEmbeddingFunctionSpec {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    config: BTreeMap<String, Value>,
}

impl TryFrom<RawEmbeddingFunctionSpec> for EmbeddingFunctionSpec {
    type Error = String;

    fn try_from(raw: RawEmbeddingFunctionSpec) -> Result<Self, Self::Error> {
        let spec = EmbeddingFunctionSpec {
            kind: EmbeddingFunctionType::parse(&raw.kind),
            name: raw.name,
            config: raw.config,
        };
        spec.validate().map_err(|err| err.to_string())?;
        Ok(spec)
    }
}

impl From<EmbeddingFunctionSpec> for RawEmbeddingFunctionSpec {
    fn from(spec: EmbeddingFunctionSpec) -> Self {
        RawEmbeddingFunctionSpec {
            kind: spec.kind.as_str().to_string(),
            name: spec.name,
            config: spec.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_is_case_insensitive() {
        assert_eq!(EmbeddingFunctionType::parse("KNOWN"), EmbeddingFunctionType::Known);
        assert_eq!(EmbeddingFunctionType::parse(" Known "), EmbeddingFunctionType::Known);
        assert_eq!(
            EmbeddingFunctionType::parse("legacy"),
            EmbeddingFunctionType::Custom("legacy".to_string())
        );
    }

    #[test]
    fn test_new_normalises_the_type_tag() {
        let spec = EmbeddingFunctionSpec::new(
            EmbeddingFunctionType::Custom(" KNOWN ".to_string()),
            "openai",
        );
        assert!(spec.is_known());
        assert_eq!(spec.kind(), &EmbeddingFunctionType::Known);

        let value = serde_json::to_value(&spec).unwrap();
        let parsed: EmbeddingFunctionSpec = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, spec);

        let custom = EmbeddingFunctionSpec::new(
            EmbeddingFunctionType::Custom("legacy".to_string()),
            "mine",
        );
        assert!(!custom.is_known());
    }

    #[test]
    fn test_blank_known_name_is_invalid() {
        assert_eq!(
            EmbeddingFunctionSpec::known("  ").validate(),
            Err(ConfigurationError::BlankEmbeddingFunctionName)
        );
        assert_eq!(EmbeddingFunctionSpec::known("openai").validate(), Ok(()));
        let custom = EmbeddingFunctionSpec::new(EmbeddingFunctionType::Custom("legacy".into()), "");
        assert_eq!(custom.validate(), Ok(()));

        let err = serde_json::from_value::<EmbeddingFunctionSpec>(
            json!({"type": "known", "name": ""}),
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("a known embedding function must have a non-blank name"));
    }

    #[test]
    fn test_display_redacts_api_key() {
        let spec = EmbeddingFunctionSpec::known("openai")
            .with_config("api_key", "secret-value")
            .with_config("api_key_env_var", "OPENAI_API_KEY")
            .with_config("model_name", "text-embedding-3-small");
        let rendered = spec.to_string();
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains(REDACTED));
        assert!(rendered.contains("OPENAI_API_KEY"));
        assert!(rendered.contains("text-embedding-3-small"));

        let debugged = format!("{spec:?}");
        assert!(!debugged.contains("secret-value"));
        assert!(debugged.contains(REDACTED));
    }

    #[test]
    fn test_secret_key_detection() {
        assert!(is_secret_key("api_key"));
        assert!(is_secret_key("OPENAI_API_KEY"));
        assert!(is_secret_key("access_token"));
        assert!(!is_secret_key("api_key_env_var"));
        assert!(!is_secret_key("model_name"));
    }

    #[test]
    fn test_wire_shape() {
        let spec = EmbeddingFunctionSpec::known("ollama")
            .with_config("url", "http://localhost:11434")
            .with_config("timeout", 30);
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "known",
                "name": "ollama",
                "config": {"url": "http://localhost:11434", "timeout": 30}
            })
        );
        let parsed: EmbeddingFunctionSpec = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, spec);

        let legacy: EmbeddingFunctionSpec = serde_json::from_value(json!({"type": "legacy"})).unwrap();
        assert!(!legacy.is_known());
        assert!(legacy.config().is_empty());

        assert!(serde_json::from_value::<EmbeddingFunctionSpec>(json!({"type": "known"})).is_err());
    }
}
