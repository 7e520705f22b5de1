use crate::validators::{
    ensure_at_least, ensure_positive_finite, ensure_usize_at_least, fold_token, ConfigurationError,
    ParseEnumError,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

pub const HNSW_SPACE_KEY: &str = "hnsw:space";
pub const HNSW_CONSTRUCTION_EF_KEY: &str = "hnsw:construction_ef";
pub const HNSW_M_KEY: &str = "hnsw:M";
pub const HNSW_SEARCH_EF_KEY: &str = "hnsw:search_ef";
pub const HNSW_NUM_THREADS_KEY: &str = "hnsw:num_threads";
pub const HNSW_BATCH_SIZE_KEY: &str = "hnsw:batch_size";
pub const HNSW_SYNC_THRESHOLD_KEY: &str = "hnsw:sync_threshold";
pub const HNSW_RESIZE_FACTOR_KEY: &str = "hnsw:resize_factor";

/// Distance function used to compare vectors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Space {
    #[default]
    L2,
    Ip,
    Cosine,
}

pub fn default_space() -> Space {
    Space::L2
}

impl Space {
    pub fn as_str(&self) -> &'static str {
        match self {
            Space::L2 => "l2",
            Space::Ip => "ip",
            Space::Cosine => "cosine",
        }
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Space {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_token(s).as_str() {
            "l2" => Ok(Space::L2),
            "ip" => Ok(Space::Ip),
            "cosine" => Ok(Space::Cosine),
            _ => Err(ParseEnumError {
                kind: "distance function",
                value: s.to_string(),
                expected: "l2, ip, cosine",
            }),
        }
    }
}

impl TryFrom<String> for Space {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Space> for String {
    fn from(space: Space) -> Self {
        space.as_str().to_string()
    }
}

pub fn default_construction_ef() -> usize {
    100
}

pub fn default_search_ef() -> usize {
    100
}

pub fn default_m() -> usize {
    16
}

pub fn default_batch_size() -> usize {
    100
}

pub fn default_sync_threshold() -> usize {
    1000
}

pub fn default_resize_factor() -> f64 {
    1.2
}

/// HNSW parameter group. Every field is optional; each setter validates its
/// argument on the spot and rejects out-of-range values.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "RawHnswIndexConfig")]
pub struct HnswIndexConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    ef_construction: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_neighbors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ef_search: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_threshold: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resize_factor: Option<f64>,
}

impl HnswIndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ef_construction(mut self, value: usize) -> Result<Self, ConfigurationError> {
        self.ef_construction = Some(ensure_usize_at_least(HNSW_CONSTRUCTION_EF_KEY, value, 1)?);
        Ok(self)
    }

    pub fn with_max_neighbors(mut self, value: usize) -> Result<Self, ConfigurationError> {
        self.max_neighbors = Some(ensure_usize_at_least(HNSW_M_KEY, value, 1)?);
        Ok(self)
    }

    pub fn with_ef_search(mut self, value: usize) -> Result<Self, ConfigurationError> {
        self.ef_search = Some(ensure_usize_at_least(HNSW_SEARCH_EF_KEY, value, 1)?);
        Ok(self)
    }

    pub fn with_num_threads(mut self, value: usize) -> Result<Self, ConfigurationError> {
        self.num_threads = Some(ensure_usize_at_least(HNSW_NUM_THREADS_KEY, value, 1)?);
        Ok(self)
    }

    pub fn with_batch_size(mut self, value: usize) -> Result<Self, ConfigurationError> {
        self.batch_size = Some(ensure_usize_at_least(HNSW_BATCH_SIZE_KEY, value, 2)?);
        Ok(self)
    }

    pub fn with_sync_threshold(mut self, value: usize) -> Result<Self, ConfigurationError> {
        self.sync_threshold = Some(ensure_usize_at_least(HNSW_SYNC_THRESHOLD_KEY, value, 2)?);
        Ok(self)
    }

    pub fn with_resize_factor(mut self, value: f64) -> Result<Self, ConfigurationError> {
        self.resize_factor = Some(ensure_positive_finite(HNSW_RESIZE_FACTOR_KEY, value)?);
        Ok(self)
    }

    pub fn ef_construction(&self) -> Option<usize> {
        self.ef_construction
    }

    pub fn max_neighbors(&self) -> Option<usize> {
        self.max_neighbors
    }

    pub fn ef_search(&self) -> Option<usize> {
        self.ef_search
    }

    pub fn num_threads(&self) -> Option<usize> {
        self.num_threads
    }

    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    pub fn sync_threshold(&self) -> Option<usize> {
        self.sync_threshold
    }

    pub fn resize_factor(&self) -> Option<f64> {
        self.resize_factor
    }

    pub fn is_empty(&self) -> bool {
        self.ef_construction.is_none()
            && self.max_neighbors.is_none()
            && self.ef_search.is_none()
            && self.num_threads.is_none()
            && self.batch_size.is_none()
            && self.sync_threshold.is_none()
            && self.resize_factor.is_none()
    }

    /// Unset fields count as default. `num_threads` is skipped since its
    /// server-side default depends on the host.
    pub fn is_default(&self) -> bool {
        self.ef_construction
            .map_or(true, |value| value == default_construction_ef())
            && self.max_neighbors.map_or(true, |value| value == default_m())
            && self.ef_search.map_or(true, |value| value == default_search_ef())
            && self.batch_size.map_or(true, |value| value == default_batch_size())
            && self
                .sync_threshold
                .map_or(true, |value| value == default_sync_threshold())
            && self
                .resize_factor
                .map_or(true, |value| value == default_resize_factor())
    }
}

// resize_factor is always finite, so bitwise comparison is a total equivalence.
impl PartialEq for HnswIndexConfig {
    fn eq(&self, other: &Self) -> bool {
        self.ef_construction == other.ef_construction
            && self.max_neighbors == other.max_neighbors
            && self.ef_search == other.ef_search
            && self.num_threads == other.num_threads
            && self.batch_size == other.batch_size
            && self.sync_threshold == other.sync_threshold
            && self.resize_factor.map(f64::to_bits) == other.resize_factor.map(f64::to_bits)
    }
}

impl Eq for HnswIndexConfig {}

impl Hash for HnswIndexConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ef_construction.hash(state);
        self.max_neighbors.hash(state);
        self.ef_search.hash(state);
        self.num_threads.hash(state);
        self.batch_size.hash(state);
        self.sync_threshold.hash(state);
        self.resize_factor.map(f64::to_bits).hash(state);
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHnswIndexConfig {
    ef_construction: Option<i64>,
    max_neighbors: Option<i64>,
    ef_search: Option<i64>,
    num_threads: Option<i64>,
    batch_size: Option<i64>,
    sync_threshold: Option<i64>,
    resize_factor: Option<f64>,
}

impl TryFrom<RawHnswIndexConfig> for HnswIndexConfig {
    type Error = ConfigurationError;

    fn try_from(raw: RawHnswIndexConfig) -> Result<Self, Self::Error> {
        Ok(HnswIndexConfig {
            ef_construction: raw
                .ef_construction
                .map(|value| ensure_at_least(HNSW_CONSTRUCTION_EF_KEY, value, 1))
                .transpose()?,
            max_neighbors: raw
                .max_neighbors
                .map(|value| ensure_at_least(HNSW_M_KEY, value, 1))
                .transpose()?,
            ef_search: raw
                .ef_search
                .map(|value| ensure_at_least(HNSW_SEARCH_EF_KEY, value, 1))
                .transpose()?,
            num_threads: raw
                .num_threads
                .map(|value| ensure_at_least(HNSW_NUM_THREADS_KEY, value, 1))
                .transpose()?,
            batch_size: raw
                .batch_size
                .map(|value| ensure_at_least(HNSW_BATCH_SIZE_KEY, value, 2))
                .transpose()?,
            sync_threshold: raw
                .sync_threshold
                .map(|value| ensure_at_least(HNSW_SYNC_THRESHOLD_KEY, value, 2))
                .transpose()?,
            resize_factor: raw
                .resize_factor
                .map(|value| ensure_positive_finite(HNSW_RESIZE_FACTOR_KEY, value))
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_space_parse_is_case_insensitive_and_trimmed() {
        assert_eq!(" COSINE ".parse::<Space>().unwrap(), Space::Cosine);
        assert_eq!("Ip".parse::<Space>().unwrap(), Space::Ip);
        assert_eq!("l2".parse::<Space>().unwrap(), Space::L2);
        let err = "manhattan".parse::<Space>().unwrap_err();
        assert_eq!(err.value, "manhattan");
    }

    #[test]
    fn test_space_serializes_canonically() {
        assert_eq!(serde_json::to_value(Space::Cosine).unwrap(), json!("cosine"));
        let space: Space = serde_json::from_value(json!("L2")).unwrap();
        assert_eq!(space, Space::L2);
    }

    #[test]
    fn test_setters_reject_out_of_range_values() {
        assert_eq!(
            HnswIndexConfig::new()
                .with_max_neighbors(0)
                .unwrap_err()
                .to_string(),
            "hnsw:M must be > 0"
        );
        assert!(HnswIndexConfig::new().with_batch_size(1).is_err());
        assert!(HnswIndexConfig::new().with_sync_threshold(1).is_err());
        assert!(HnswIndexConfig::new().with_resize_factor(f64::NAN).is_err());
        assert!(HnswIndexConfig::new().with_ef_construction(0).is_err());
        assert!(HnswIndexConfig::new().with_ef_search(0).is_err());
        assert!(HnswIndexConfig::new().with_num_threads(0).is_err());
    }

    #[test]
    fn test_setters_accept_valid_values() {
        let config = HnswIndexConfig::new()
            .with_max_neighbors(32)
            .and_then(|c| c.with_batch_size(2))
            .and_then(|c| c.with_resize_factor(1.25))
            .unwrap();
        assert_eq!(config.max_neighbors(), Some(32));
        assert_eq!(config.batch_size(), Some(2));
        assert_eq!(config.resize_factor(), Some(1.25));
        assert_eq!(config.ef_search(), None);
    }

    #[test]
    fn test_deserialize_validates_ranges() {
        let err = serde_json::from_value::<HnswIndexConfig>(json!({"max_neighbors": -1}))
            .unwrap_err();
        assert!(err.to_string().contains("hnsw:M must be > 0"));

        let config: HnswIndexConfig =
            serde_json::from_value(json!({"ef_search": 50, "resize_factor": 1.5})).unwrap();
        assert_eq!(config.ef_search(), Some(50));
        assert_eq!(serde_json::to_value(&config).unwrap(), json!({"ef_search": 50, "resize_factor": 1.5}));
    }

    #[test]
    fn test_is_default() {
        assert!(HnswIndexConfig::new().is_default());
        let config = HnswIndexConfig::new()
            .with_max_neighbors(default_m())
            .unwrap();
        assert!(config.is_default());
        let config = config.with_ef_search(7).unwrap();
        assert!(!config.is_default());
    }
}
