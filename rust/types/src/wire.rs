//! Conversions between configuration objects and their JSON wire shapes.
//!
//! The create shape is a flat map with `hnsw:`/`spann:` prefixed keys. The update
//! shape nests the changed fields under a single `hnsw` or `spann` group.

use crate::validators::{ensure_at_least, ensure_in_range, ConfigurationError};
use crate::{
    CollectionConfiguration, EmbeddingFunctionSpec, IndexParams, Quantization, Schema, Space,
    UpdateCollectionConfiguration, UpdateIndexParams, ValueTypes, HNSW_BATCH_SIZE_KEY,
    HNSW_CONSTRUCTION_EF_KEY, HNSW_M_KEY, HNSW_NUM_THREADS_KEY, HNSW_RESIZE_FACTOR_KEY,
    HNSW_SEARCH_EF_KEY, HNSW_SPACE_KEY, HNSW_SYNC_THRESHOLD_KEY, MAX_MERGE_THRESHOLD,
    MAX_SEARCH_NPROBE, MIN_MERGE_THRESHOLD, MIN_SEARCH_NPROBE, SPANN_EF_SEARCH_KEY,
    SPANN_MERGE_THRESHOLD_KEY, SPANN_QUANTIZATION_KEY, SPANN_SEARCH_NPROBE_KEY,
};
use chroma_error::{ChromaError, ErrorCodes};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub type WireMap = Map<String, Value>;

pub const EMBEDDING_FUNCTION_KEY: &str = "embedding_function";
pub const SCHEMA_KEY: &str = "schema";
pub const CONFIGURATION_PATH: &str = "configuration";

/// Failure while reading wire data, located by a dotted field path.
#[derive(Debug, Error)]
#[error("{path} {message}")]
pub struct DeserializationError {
    pub path: String,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DeserializationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        DeserializationError {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Prefixes the path with the path of the enclosing value.
    pub fn nested(mut self, parent: &str) -> Self {
        self.path = if self.path.is_empty() {
            parent.to_string()
        } else {
            format!("{parent}.{}", self.path)
        };
        self
    }

    fn from_configuration(path: &str, err: ConfigurationError) -> Self {
        match &err {
            ConfigurationError::InvalidValue { field, constraint } => {
                DeserializationError::new(*field, format!("must be {constraint}"))
            }
            _ => DeserializationError::new(path, err.to_string()),
        }
        .with_source(err)
    }
}

impl ChromaError for DeserializationError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// Decodes a JSON value into `T`, reporting failures at `path`.
pub fn decode<T: DeserializeOwned>(path: &str, value: &Value) -> Result<T, DeserializationError> {
    serde_json::from_value(value.clone()).map_err(|err| {
        DeserializationError::new(path, format!("is invalid: {err}")).with_source(err)
    })
}

// Serializing these types cannot fail: every map key is a string and every float is finite.
fn to_wire_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn to_wire_map<T: Serialize>(value: &T) -> WireMap {
    match to_wire_value(value) {
        Value::Object(map) => map,
        _ => WireMap::new(),
    }
}

fn present<'a>(map: &'a WireMap, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|value| !value.is_null())
}

fn read_string<'a>(map: &'a WireMap, key: &str) -> Result<Option<&'a str>, DeserializationError> {
    match present(map, key) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(DeserializationError::new(key, "must be a string")),
    }
}

fn read_integer(map: &WireMap, key: &str) -> Result<Option<i64>, DeserializationError> {
    match present(map, key) {
        None => Ok(None),
        Some(Value::Number(number)) if number.is_u64() && number.as_i64().is_none() => Err(
            DeserializationError::new(key, format!("must be <= {}", i64::MAX)),
        ),
        Some(Value::Number(number)) => number
            .as_i64()
            .map(Some)
            .ok_or_else(|| DeserializationError::new(key, "must be an integer")),
        Some(_) => Err(DeserializationError::new(key, "must be numeric")),
    }
}

fn read_float(map: &WireMap, key: &str) -> Result<Option<f64>, DeserializationError> {
    match present(map, key) {
        None => Ok(None),
        Some(Value::Number(number)) => number
            .as_f64()
            .map(Some)
            .ok_or_else(|| DeserializationError::new(key, "must be numeric")),
        Some(_) => Err(DeserializationError::new(key, "must be numeric")),
    }
}

fn read_object<'a>(map: &'a WireMap, key: &str) -> Result<Option<&'a WireMap>, DeserializationError> {
    match present(map, key) {
        None => Ok(None),
        Some(Value::Object(object)) => Ok(Some(object)),
        Some(_) => Err(DeserializationError::new(key, "must be an object")),
    }
}

fn parse_enum<T>(key: &str, raw: &str) -> Result<T, DeserializationError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>().map_err(|err| {
        DeserializationError::new(key, format!("has unsupported value '{raw}'")).with_source(err)
    })
}

////////////////////// Create shape //////////////////////

/// Flattens a configuration into the create shape. Unset fields are omitted.
pub fn to_configuration_map(configuration: &CollectionConfiguration) -> WireMap {
    let mut map = WireMap::new();
    if let Some(space) = configuration.space {
        map.insert(HNSW_SPACE_KEY.to_string(), Value::from(space.as_str()));
    }

    match &configuration.index {
        IndexParams::Hnsw(hnsw) => {
            let fields = [
                (HNSW_CONSTRUCTION_EF_KEY, hnsw.ef_construction()),
                (HNSW_M_KEY, hnsw.max_neighbors()),
                (HNSW_SEARCH_EF_KEY, hnsw.ef_search()),
                (HNSW_NUM_THREADS_KEY, hnsw.num_threads()),
                (HNSW_BATCH_SIZE_KEY, hnsw.batch_size()),
                (HNSW_SYNC_THRESHOLD_KEY, hnsw.sync_threshold()),
            ];
            for (key, value) in fields {
                if let Some(value) = value {
                    map.insert(key.to_string(), Value::from(value));
                }
            }
            if let Some(resize_factor) = hnsw.resize_factor() {
                map.insert(
                    HNSW_RESIZE_FACTOR_KEY.to_string(),
                    Value::from(resize_factor),
                );
            }
        }
        IndexParams::Spann(spann) => {
            if let Some(search_nprobe) = spann.search_nprobe() {
                map.insert(
                    SPANN_SEARCH_NPROBE_KEY.to_string(),
                    Value::from(search_nprobe),
                );
            }
            if let Some(ef_search) = spann.ef_search() {
                map.insert(SPANN_EF_SEARCH_KEY.to_string(), Value::from(ef_search));
            }
            if let Some(merge_threshold) = spann.merge_threshold() {
                map.insert(
                    SPANN_MERGE_THRESHOLD_KEY.to_string(),
                    Value::from(merge_threshold),
                );
            }
            if let Some(quantization) = spann.quantization() {
                map.insert(
                    SPANN_QUANTIZATION_KEY.to_string(),
                    Value::from(quantization.as_str()),
                );
            }
        }
        IndexParams::None => {}
    }

    if let Some(spec) = &configuration.embedding_function {
        map.insert(EMBEDDING_FUNCTION_KEY.to_string(), to_wire_value(spec));
    }
    if let Some(schema) = &configuration.schema {
        map.insert(SCHEMA_KEY.to_string(), Value::Object(to_schema_map(schema)));
    }
    map
}

/// Reads a configuration from the create shape. Unknown keys are ignored.
pub fn parse_configuration(map: &WireMap) -> Result<CollectionConfiguration, DeserializationError> {
    let mut builder = CollectionConfiguration::builder();

    if let Some(raw) = read_string(map, HNSW_SPACE_KEY)? {
        builder = builder.space(parse_enum::<Space>(HNSW_SPACE_KEY, raw)?);
    }

    let invalid = |err| DeserializationError::from_configuration(CONFIGURATION_PATH, err);

    let positive = [
        (HNSW_CONSTRUCTION_EF_KEY, 1),
        (HNSW_M_KEY, 1),
        (HNSW_SEARCH_EF_KEY, 1),
        (HNSW_NUM_THREADS_KEY, 1),
        (HNSW_BATCH_SIZE_KEY, 2),
        (HNSW_SYNC_THRESHOLD_KEY, 2),
    ];
    for (key, min) in positive {
        let Some(value) = read_integer(map, key)? else {
            continue;
        };
        let value = ensure_at_least(key, value, min).map_err(invalid)?;
        builder = match key {
            HNSW_CONSTRUCTION_EF_KEY => builder.hnsw_construction_ef(value),
            HNSW_M_KEY => builder.hnsw_m(value),
            HNSW_SEARCH_EF_KEY => builder.hnsw_search_ef(value),
            HNSW_NUM_THREADS_KEY => builder.hnsw_num_threads(value),
            HNSW_BATCH_SIZE_KEY => builder.hnsw_batch_size(value),
            _ => builder.hnsw_sync_threshold(value),
        }
        .map_err(invalid)?;
    }
    if let Some(resize_factor) = read_float(map, HNSW_RESIZE_FACTOR_KEY)? {
        builder = builder.hnsw_resize_factor(resize_factor).map_err(invalid)?;
    }

    if let Some(value) = read_integer(map, SPANN_SEARCH_NPROBE_KEY)? {
        let value = ensure_in_range(
            SPANN_SEARCH_NPROBE_KEY,
            value,
            MIN_SEARCH_NPROBE,
            MAX_SEARCH_NPROBE,
        )
        .map_err(invalid)?;
        builder = builder.spann_search_nprobe(value).map_err(invalid)?;
    }
    if let Some(value) = read_integer(map, SPANN_EF_SEARCH_KEY)? {
        let value = ensure_at_least(SPANN_EF_SEARCH_KEY, value, 1).map_err(invalid)?;
        builder = builder.spann_ef_search(value).map_err(invalid)?;
    }
    if let Some(value) = read_integer(map, SPANN_MERGE_THRESHOLD_KEY)? {
        let value = ensure_in_range(
            SPANN_MERGE_THRESHOLD_KEY,
            value,
            MIN_MERGE_THRESHOLD,
            MAX_MERGE_THRESHOLD,
        )
        .map_err(invalid)?;
        builder = builder.spann_merge_threshold(value).map_err(invalid)?;
    }
    if let Some(raw) = read_string(map, SPANN_QUANTIZATION_KEY)? {
        let quantization = parse_enum::<Quantization>(SPANN_QUANTIZATION_KEY, raw)?;
        builder = builder.spann_quantization(quantization).map_err(invalid)?;
    }

    if let Some(value) = present(map, EMBEDDING_FUNCTION_KEY) {
        builder = builder.embedding_function(decode::<EmbeddingFunctionSpec>(
            EMBEDDING_FUNCTION_KEY,
            value,
        )?);
    }
    if let Some(schema) = read_object(map, SCHEMA_KEY)? {
        builder = builder.schema(parse_schema(schema)?);
    }

    builder.build().map_err(invalid)
}

impl From<CollectionConfiguration> for WireMap {
    fn from(configuration: CollectionConfiguration) -> Self {
        to_configuration_map(&configuration)
    }
}

impl TryFrom<WireMap> for CollectionConfiguration {
    type Error = DeserializationError;

    fn try_from(map: WireMap) -> Result<Self, Self::Error> {
        parse_configuration(&map)
    }
}

////////////////////// Update shape //////////////////////

/// Nests an update under its index group. Returns `None` when there is no update.
pub fn to_update_configuration_map(
    update: Option<&UpdateCollectionConfiguration>,
) -> Option<WireMap> {
    let update = update?;
    let mut map = WireMap::new();
    match update.index() {
        UpdateIndexParams::Hnsw(hnsw) => {
            map.insert("hnsw".to_string(), to_wire_value(hnsw));
        }
        UpdateIndexParams::Spann(spann) => {
            map.insert("spann".to_string(), to_wire_value(spann));
        }
        UpdateIndexParams::None => {}
    }
    if let Some(spec) = update.embedding_function() {
        map.insert(EMBEDDING_FUNCTION_KEY.to_string(), to_wire_value(spec));
    }
    Some(map)
}

////////////////////// Schema //////////////////////

pub fn to_schema_map(schema: &Schema) -> WireMap {
    to_wire_map(schema)
}

/// Reads a schema, locating failures under the `schema` path.
pub fn parse_schema(map: &WireMap) -> Result<Schema, DeserializationError> {
    let mut builder = Schema::builder();

    let nested = |err: DeserializationError| err.nested(SCHEMA_KEY);

    if let Some(defaults) = present(map, "defaults") {
        builder = builder.defaults(decode::<ValueTypes>("defaults", defaults).map_err(nested)?);
    }

    let keys = match read_object(map, "keys").map_err(nested)? {
        Some(keys) => Some(("keys", keys)),
        None => read_object(map, "key_overrides")
            .map_err(nested)?
            .map(|keys| ("key_overrides", keys)),
    };
    if let Some((field, keys)) = keys {
        for (name, value) in keys {
            let path = format!("{SCHEMA_KEY}.{field}.{name}");
            let value_types = decode::<ValueTypes>(&path, value)?;
            builder = builder
                .key(name.clone(), value_types)
                .map_err(|err| DeserializationError::from_configuration(&path, err))?;
        }
    }

    if let Some(cmek) = present(map, "cmek") {
        builder = builder.cmek(decode("cmek", cmek).map_err(nested)?);
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::{arbitrary_collection_configuration, arbitrary_schema};
    use crate::{Cmek, HnswIndexConfig, VectorIndexConfig, EMBEDDING_KEY};
    use proptest::prelude::*;
    use serde_json::json;
    use std::error::Error;

    fn wire(value: Value) -> WireMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_hnsw_create_shape() {
        let configuration = CollectionConfiguration::builder()
            .space(Space::Cosine)
            .hnsw_m(32)
            .and_then(|b| b.hnsw_construction_ef(200))
            .and_then(|b| b.hnsw_resize_factor(1.25))
            .and_then(|b| b.build())
            .unwrap();
        let map = to_configuration_map(&configuration);
        assert_eq!(
            Value::Object(map.clone()),
            json!({
                "hnsw:space": "cosine",
                "hnsw:M": 32,
                "hnsw:construction_ef": 200,
                "hnsw:resize_factor": 1.25
            })
        );
        assert_eq!(parse_configuration(&map).unwrap(), configuration);
    }

    #[test]
    fn test_spann_create_shape() {
        let configuration = CollectionConfiguration::builder()
            .spann_search_nprobe(32)
            .and_then(|b| b.spann_ef_search(64))
            .and_then(|b| b.spann_merge_threshold(50))
            .and_then(|b| b.build())
            .unwrap();
        let map = to_configuration_map(&configuration);
        assert_eq!(
            Value::Object(map.clone()),
            json!({"spann:search_nprobe": 32, "spann:ef_search": 64, "spann:merge_threshold": 50})
        );
        assert_eq!(parse_configuration(&map).unwrap(), configuration);
    }

    #[test]
    fn test_parse_space_must_be_a_string() {
        let err = parse_configuration(&wire(json!({"hnsw:space": 3}))).unwrap_err();
        assert_eq!(err.path, "hnsw:space");
        assert_eq!(err.to_string(), "hnsw:space must be a string");
    }

    #[test]
    fn test_parse_unsupported_space_keeps_cause() {
        let err = parse_configuration(&wire(json!({"hnsw:space": "manhattan"}))).unwrap_err();
        assert_eq!(err.path, "hnsw:space");
        let cause = err.source().unwrap();
        assert!(cause.to_string().contains("manhattan"));
    }

    #[test]
    fn test_parse_rejects_non_numeric_values() {
        let err = parse_configuration(&wire(json!({"spann:search_nprobe": "32"}))).unwrap_err();
        assert_eq!(err.to_string(), "spann:search_nprobe must be numeric");

        let err = parse_configuration(&wire(json!({"hnsw:resize_factor": true}))).unwrap_err();
        assert_eq!(err.to_string(), "hnsw:resize_factor must be numeric");
    }

    #[test]
    fn test_parse_rejects_non_positive_values() {
        let err = parse_configuration(&wire(json!({"hnsw:M": 0}))).unwrap_err();
        assert_eq!(err.to_string(), "hnsw:M must be > 0");
        assert!(err.source().is_some());

        let err = parse_configuration(&wire(json!({"hnsw:search_ef": -5}))).unwrap_err();
        assert_eq!(err.to_string(), "hnsw:search_ef must be > 0");

        let err = parse_configuration(&wire(json!({"spann:merge_threshold": 24}))).unwrap_err();
        assert_eq!(err.to_string(), "spann:merge_threshold must be >= 25");
    }

    #[test]
    fn test_parse_reports_oversized_integers_as_out_of_range() {
        let err = parse_configuration(&wire(json!({"hnsw:M": u64::MAX}))).unwrap_err();
        assert_eq!(err.path, "hnsw:M");
        assert_eq!(err.to_string(), format!("hnsw:M must be <= {}", i64::MAX));

        let err = parse_configuration(&wire(json!({"hnsw:M": 1.5}))).unwrap_err();
        assert_eq!(err.to_string(), "hnsw:M must be an integer");
    }

    #[test]
    fn test_parse_rejects_mixed_groups() {
        let err = parse_configuration(&wire(json!({"hnsw:M": 16, "spann:ef_search": 10})))
            .unwrap_err();
        assert_eq!(err.path, CONFIGURATION_PATH);
        assert!(err.message.contains("cannot mix HNSW and SPANN"));
    }

    #[test]
    fn test_parse_embedding_function_and_schema() {
        let map = wire(json!({
            "hnsw:space": "ip",
            "embedding_function": {"type": "known", "name": "openai", "config": {"model_name": "m"}},
            "schema": {"keys": {"#embedding": {"float_list": {"vector_index": {
                "enabled": true,
                "config": {"embedding_function": {"type": "known", "name": "cohere", "config": {}}}
            }}}}},
            "unrelated": 1
        }));
        let configuration = parse_configuration(&map).unwrap();
        assert_eq!(configuration.space(), Some(Space::Ip));
        assert_eq!(configuration.embedding_function().map(|s| s.name()), Some("openai"));
        assert_eq!(
            configuration
                .schema()
                .and_then(Schema::embedding_function)
                .map(|s| s.name()),
            Some("cohere")
        );
    }

    #[test]
    fn test_parse_reports_nested_path() {
        let err = parse_configuration(&wire(json!({
            "schema": {"keys": {"flag": {"bool": {"bool_inverted_index": {"enabled": "yes"}}}}}
        })))
        .unwrap_err();
        assert_eq!(err.path, "schema.keys.flag");

        let err = parse_schema(&wire(json!({"cmek": {"gcp": "nope"}}))).unwrap_err();
        assert_eq!(err.path, "schema.cmek");
    }

    #[test]
    fn test_configuration_serde_uses_create_shape() {
        let configuration = CollectionConfiguration::builder()
            .hnsw_search_ef(64)
            .and_then(|b| b.build())
            .unwrap();
        let value = serde_json::to_value(&configuration).unwrap();
        assert_eq!(value, json!({"hnsw:search_ef": 64}));
        let parsed: CollectionConfiguration = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, configuration);
    }

    #[test]
    fn test_update_shape_hnsw() {
        let update = UpdateCollectionConfiguration::builder()
            .hnsw_search_ef(200)
            .and_then(|b| b.hnsw_num_threads(4))
            .and_then(|b| b.build())
            .unwrap();
        assert_eq!(
            to_update_configuration_map(Some(&update)).map(Value::Object),
            Some(json!({"hnsw": {"ef_search": 200, "num_threads": 4}}))
        );
    }

    #[test]
    fn test_update_shape_spann() {
        let update = UpdateCollectionConfiguration::builder()
            .spann_search_nprobe(32)
            .and_then(|b| b.spann_ef_search(64))
            .and_then(|b| b.build())
            .unwrap();
        assert_eq!(
            to_update_configuration_map(Some(&update)).map(Value::Object),
            Some(json!({"spann": {"search_nprobe": 32, "ef_search": 64}}))
        );
        assert_eq!(to_update_configuration_map(None), None);
    }

    #[test]
    fn test_schema_round_trip_with_cmek() {
        let vector = VectorIndexConfig::builder()
            .space(Space::Cosine)
            .hnsw(HnswIndexConfig::new().with_max_neighbors(24).unwrap())
            .embedding_function(
                EmbeddingFunctionSpec::known("huggingface").with_config("api_key_env_var", "HF_KEY"),
            )
            .build()
            .unwrap();
        let schema = Schema::builder()
            .key(EMBEDDING_KEY, ValueTypes::vector(vector))
            .unwrap()
            .cmek(Cmek::gcp("projects/p/locations/l/keyRings/r/cryptoKeys/k").unwrap())
            .build();
        let map = to_schema_map(&schema);
        assert_eq!(
            map.get("cmek"),
            Some(&json!({"gcp": "projects/p/locations/l/keyRings/r/cryptoKeys/k"}))
        );
        assert_eq!(parse_schema(&map).unwrap(), schema);
    }

    proptest! {
        #[test]
        fn configuration_round_trips(configuration in arbitrary_collection_configuration()) {
            let map = to_configuration_map(&configuration);
            prop_assert_eq!(parse_configuration(&map).unwrap(), configuration);
        }

        #[test]
        fn configuration_parse_is_idempotent(configuration in arbitrary_collection_configuration()) {
            let map = to_configuration_map(&configuration);
            prop_assert_eq!(parse_configuration(&map).unwrap(), parse_configuration(&map).unwrap());
        }

        #[test]
        fn schema_round_trips(schema in arbitrary_schema()) {
            let map = to_schema_map(&schema);
            prop_assert_eq!(parse_schema(&map).unwrap(), schema);
        }
    }
}
