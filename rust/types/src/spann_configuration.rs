use crate::validators::{ensure_at_least, ensure_in_range, ConfigurationError, ParseEnumError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SPANN_SEARCH_NPROBE_KEY: &str = "spann:search_nprobe";
pub const SPANN_EF_SEARCH_KEY: &str = "spann:ef_search";
pub const SPANN_MERGE_THRESHOLD_KEY: &str = "spann:merge_threshold";
pub const SPANN_QUANTIZATION_KEY: &str = "spann:quantization";

pub const MIN_SEARCH_NPROBE: i64 = 1;
pub const MAX_SEARCH_NPROBE: i64 = 128;
pub const MIN_MERGE_THRESHOLD: i64 = 25;
pub const MAX_MERGE_THRESHOLD: i64 = 100;

pub fn default_search_nprobe() -> u32 {
    64
}

pub fn default_search_ef_spann() -> usize {
    200
}

pub fn default_merge_threshold() -> u32 {
    25
}

/// Vector quantization applied to SPANN posting lists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Quantization {
    #[default]
    None,
    FourBitRabitQWithUSearch,
}

// Accepted spellings after trimming, ASCII case folding and mapping '-' and ' ' to '_'.
const QUANTIZATION_ALIASES: &[(&str, Quantization)] = &[
    ("none", Quantization::None),
    ("off", Quantization::None),
    ("disabled", Quantization::None),
    (
        "four_bit_rabit_q_with_u_search",
        Quantization::FourBitRabitQWithUSearch,
    ),
    ("four_bit_rabitq", Quantization::FourBitRabitQWithUSearch),
    ("four_bit", Quantization::FourBitRabitQWithUSearch),
    ("4bit", Quantization::FourBitRabitQWithUSearch),
    ("rabitq", Quantization::FourBitRabitQWithUSearch),
    ("rabitq_4bit", Quantization::FourBitRabitQWithUSearch),
];

impl Quantization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quantization::None => "none",
            Quantization::FourBitRabitQWithUSearch => "four_bit_rabit_q_with_u_search",
        }
    }

    pub fn aliases() -> &'static [(&'static str, Quantization)] {
        QUANTIZATION_ALIASES
    }
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quantization {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        QUANTIZATION_ALIASES
            .iter()
            .find(|(alias, _)| *alias == folded)
            .map(|(_, quantization)| *quantization)
            .ok_or_else(|| ParseEnumError {
                kind: "quantization",
                value: s.to_string(),
                expected: "none, four_bit_rabit_q_with_u_search",
            })
    }
}

impl TryFrom<String> for Quantization {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Quantization> for String {
    fn from(quantization: Quantization) -> Self {
        quantization.as_str().to_string()
    }
}

/// SPANN parameter group. Every field is optional and validated when set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSpannIndexConfig")]
pub struct SpannIndexConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    search_nprobe: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ef_search: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    merge_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantization: Option<Quantization>,
}

impl SpannIndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_nprobe(mut self, value: u32) -> Result<Self, ConfigurationError> {
        self.search_nprobe = Some(ensure_in_range(
            SPANN_SEARCH_NPROBE_KEY,
            i64::from(value),
            MIN_SEARCH_NPROBE,
            MAX_SEARCH_NPROBE,
        )?);
        Ok(self)
    }

    pub fn with_ef_search(mut self, value: usize) -> Result<Self, ConfigurationError> {
        let value = i64::try_from(value).unwrap_or(i64::MAX);
        self.ef_search = Some(ensure_at_least(SPANN_EF_SEARCH_KEY, value, 1)?);
        Ok(self)
    }

    pub fn with_merge_threshold(mut self, value: u32) -> Result<Self, ConfigurationError> {
        self.merge_threshold = Some(ensure_in_range(
            SPANN_MERGE_THRESHOLD_KEY,
            i64::from(value),
            MIN_MERGE_THRESHOLD,
            MAX_MERGE_THRESHOLD,
        )?);
        Ok(self)
    }

    pub fn with_quantization(mut self, value: Quantization) -> Self {
        self.quantization = Some(value);
        self
    }

    pub fn search_nprobe(&self) -> Option<u32> {
        self.search_nprobe
    }

    pub fn ef_search(&self) -> Option<usize> {
        self.ef_search
    }

    pub fn merge_threshold(&self) -> Option<u32> {
        self.merge_threshold
    }

    pub fn quantization(&self) -> Option<Quantization> {
        self.quantization
    }

    pub fn is_empty(&self) -> bool {
        self.search_nprobe.is_none()
            && self.ef_search.is_none()
            && self.merge_threshold.is_none()
            && self.quantization.is_none()
    }

    /// Unset fields count as default.
    pub fn is_default(&self) -> bool {
        self.search_nprobe
            .map_or(true, |value| value == default_search_nprobe())
            && self
                .ef_search
                .map_or(true, |value| value == default_search_ef_spann())
            && self
                .merge_threshold
                .map_or(true, |value| value == default_merge_threshold())
            && self
                .quantization
                .map_or(true, |value| value == Quantization::default())
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSpannIndexConfig {
    search_nprobe: Option<i64>,
    ef_search: Option<i64>,
    merge_threshold: Option<i64>,
    quantization: Option<Quantization>,
}

impl TryFrom<RawSpannIndexConfig> for SpannIndexConfig {
    type Error = ConfigurationError;

    fn try_from(raw: RawSpannIndexConfig) -> Result<Self, Self::Error> {
        Ok(SpannIndexConfig {
            search_nprobe: raw
                .search_nprobe
                .map(|value| {
                    ensure_in_range(
                        SPANN_SEARCH_NPROBE_KEY,
                        value,
                        MIN_SEARCH_NPROBE,
                        MAX_SEARCH_NPROBE,
                    )
                })
                .transpose()?,
            ef_search: raw
                .ef_search
                .map(|value| ensure_at_least(SPANN_EF_SEARCH_KEY, value, 1))
                .transpose()?,
            merge_threshold: raw
                .merge_threshold
                .map(|value| {
                    ensure_in_range(
                        SPANN_MERGE_THRESHOLD_KEY,
                        value,
                        MIN_MERGE_THRESHOLD,
                        MAX_MERGE_THRESHOLD,
                    )
                })
                .transpose()?,
            quantization: raw.quantization,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_nprobe_bounds() {
        assert!(SpannIndexConfig::new().with_search_nprobe(0).is_err());
        assert_eq!(
            SpannIndexConfig::new()
                .with_search_nprobe(129)
                .unwrap_err()
                .to_string(),
            "spann:search_nprobe must be <= 128"
        );
        assert_eq!(
            SpannIndexConfig::new()
                .with_search_nprobe(128)
                .unwrap()
                .search_nprobe(),
            Some(128)
        );
        assert!(SpannIndexConfig::new().with_search_nprobe(1).is_ok());
    }

    #[test]
    fn test_merge_threshold_lower_bound_is_inclusive() {
        assert_eq!(
            SpannIndexConfig::new()
                .with_merge_threshold(24)
                .unwrap_err()
                .to_string(),
            "spann:merge_threshold must be >= 25"
        );
        assert_eq!(
            SpannIndexConfig::new()
                .with_merge_threshold(25)
                .unwrap()
                .merge_threshold(),
            Some(25)
        );
        assert!(SpannIndexConfig::new().with_merge_threshold(101).is_err());
    }

    #[test]
    fn test_ef_search_must_be_positive() {
        assert_eq!(
            SpannIndexConfig::new()
                .with_ef_search(0)
                .unwrap_err()
                .to_string(),
            "spann:ef_search must be > 0"
        );
    }

    #[test]
    fn test_quantization_aliases() {
        for (alias, expected) in Quantization::aliases() {
            assert_eq!(alias.parse::<Quantization>().unwrap(), *expected);
            assert_eq!(
                alias.to_ascii_uppercase().parse::<Quantization>().unwrap(),
                *expected
            );
        }
        assert_eq!(
            " Four-Bit-RabitQ ".parse::<Quantization>().unwrap(),
            Quantization::FourBitRabitQWithUSearch
        );
        assert!("eight_bit".parse::<Quantization>().is_err());
        // Dotless/dotted I must not fold to ASCII.
        assert!("dİsabled".parse::<Quantization>().is_err());
    }

    #[test]
    fn test_deserialize_rejects_out_of_range() {
        let err = serde_json::from_value::<SpannIndexConfig>(json!({"search_nprobe": 500}))
            .unwrap_err();
        assert!(err.to_string().contains("spann:search_nprobe must be <= 128"));

        let config: SpannIndexConfig = serde_json::from_value(
            json!({"search_nprobe": 32, "quantization": "RABITQ"}),
        )
        .unwrap();
        assert_eq!(config.search_nprobe(), Some(32));
        assert_eq!(
            config.quantization(),
            Some(Quantization::FourBitRabitQWithUSearch)
        );
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({"search_nprobe": 32, "quantization": "four_bit_rabit_q_with_u_search"})
        );
    }
}
