use crate::validators::{fold_token, ConfigurationError, ParseEnumError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

const GCP_PATTERN: &str = r"^projects/[^/]+/locations/[^/]+/keyRings/[^/]+/cryptoKeys/[^/]+$";

static GCP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(GCP_PATTERN).expect("The GCP CMEK regex should be valid"));

/// Key management service that hosts a customer-managed encryption key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmekProvider {
    Gcp,
}

impl CmekProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmekProvider::Gcp => "gcp",
        }
    }

    fn pattern(&self) -> (&'static Regex, &'static str) {
        match self {
            CmekProvider::Gcp => (&GCP_RE, GCP_PATTERN),
        }
    }
}

impl fmt::Display for CmekProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CmekProvider {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_token(s).as_str() {
            "gcp" => Ok(CmekProvider::Gcp),
            _ => Err(ParseEnumError {
                kind: "CMEK provider",
                value: s.to_string(),
                expected: "gcp",
            }),
        }
    }
}

/// Customer-managed encryption key reference. Wire shape: `{"gcp": "<resource>"}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCmek", into = "RawCmek")]
pub struct Cmek {
    provider: CmekProvider,
    resource: String,
}

impl Cmek {
    pub fn new(
        provider: CmekProvider,
        resource: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let resource = resource.into();
        let (regex, pattern) = provider.pattern();
        if !regex.is_match(&resource) {
            return Err(ConfigurationError::InvalidCmek {
                provider: provider.as_str(),
                resource,
                pattern,
            });
        }
        Ok(Cmek { provider, resource })
    }

    pub fn gcp(resource: impl Into<String>) -> Result<Self, ConfigurationError> {
        Self::new(CmekProvider::Gcp, resource)
    }

    pub fn provider(&self) -> CmekProvider {
        self.provider
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawCmek {
    Gcp(String),
}

impl TryFrom<RawCmek> for Cmek {
    type Error = ConfigurationError;

    fn try_from(raw: RawCmek) -> Result<Self, Self::Error> {
        match raw {
            RawCmek::Gcp(resource) => Cmek::gcp(resource),
        }
    }
}

impl From<Cmek> for RawCmek {
    fn from(cmek: Cmek) -> Self {
        match cmek.provider {
            CmekProvider::Gcp => RawCmek::Gcp(cmek.resource),
        }
    }
}
