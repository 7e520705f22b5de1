use crate::validators::{fold_token, ParseEnumError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A record field that a read operation may return.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Include {
    Embeddings,
    Documents,
    Metadatas,
    Distances,
    Uris,
}

impl Include {
    pub fn as_str(&self) -> &'static str {
        match self {
            Include::Embeddings => "embeddings",
            Include::Documents => "documents",
            Include::Metadatas => "metadatas",
            Include::Distances => "distances",
            Include::Uris => "uris",
        }
    }
}

impl fmt::Display for Include {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Include {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_token(s).as_str() {
            "embeddings" => Ok(Include::Embeddings),
            "documents" => Ok(Include::Documents),
            "metadatas" => Ok(Include::Metadatas),
            "distances" => Ok(Include::Distances),
            "uris" => Ok(Include::Uris),
            _ => Err(ParseEnumError {
                kind: "include",
                value: s.to_string(),
                expected: "embeddings, documents, metadatas, distances, uris",
            }),
        }
    }
}

impl TryFrom<String> for Include {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Include> for String {
    fn from(include: Include) -> Self {
        include.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncludeList(pub Vec<Include>);

impl IncludeList {
    pub fn default_query() -> Self {
        Self(vec![
            Include::Documents,
            Include::Metadatas,
            Include::Distances,
        ])
    }

    pub fn default_get() -> Self {
        Self(vec![Include::Documents, Include::Metadatas])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_include_parse() {
        assert_eq!(" Embeddings".parse::<Include>().unwrap(), Include::Embeddings);
        assert_eq!("URIS".parse::<Include>().unwrap(), Include::Uris);
        assert!("embedding".parse::<Include>().is_err());
        assert!("metadatas".parse::<Include>().is_ok());
    }

    #[test]
    fn test_include_list_wire_shape() {
        let list = IncludeList::default_query();
        assert_eq!(
            serde_json::to_value(&list).unwrap(),
            json!(["documents", "metadatas", "distances"])
        );
        let parsed: IncludeList = serde_json::from_value(json!(["DOCUMENTS", "uris"])).unwrap();
        assert_eq!(parsed.0, vec![Include::Documents, Include::Uris]);
    }
}
