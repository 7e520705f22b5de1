use crate::validators::ConfigurationError;
use crate::{Cmek, EmbeddingFunctionSpec, VectorIndexConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Value type names
pub const STRING_VALUE_NAME: &str = "string";
pub const INT_VALUE_NAME: &str = "int";
pub const BOOL_VALUE_NAME: &str = "bool";
pub const FLOAT_VALUE_NAME: &str = "float";
pub const FLOAT_LIST_VALUE_NAME: &str = "float_list";
pub const SPARSE_VECTOR_VALUE_NAME: &str = "sparse_vector";

// Index type names
pub const FTS_INDEX_NAME: &str = "fts_index";
pub const VECTOR_INDEX_NAME: &str = "vector_index";
pub const SPARSE_VECTOR_INDEX_NAME: &str = "sparse_vector_index";
pub const STRING_INVERTED_INDEX_NAME: &str = "string_inverted_index";
pub const INT_INVERTED_INDEX_NAME: &str = "int_inverted_index";
pub const FLOAT_INVERTED_INDEX_NAME: &str = "float_inverted_index";
pub const BOOL_INVERTED_INDEX_NAME: &str = "bool_inverted_index";

// Reserved keys
pub const DOCUMENT_KEY: &str = "#document";
pub const EMBEDDING_KEY: &str = "#embedding";

/// Per-key value type definitions. Each populated value type lists the indexes
/// configured for values of that type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueTypes {
    #[serde(
        rename = "string",
        alias = "#string",
        default,
        skip_serializing_if = "Option::is_none"
    )] // STRING_VALUE_NAME
    pub string: Option<StringValueType>,

    #[serde(
        rename = "float_list",
        alias = "#float_list",
        default,
        skip_serializing_if = "Option::is_none"
    )] // FLOAT_LIST_VALUE_NAME
    pub float_list: Option<FloatListValueType>,

    #[serde(
        rename = "sparse_vector",
        alias = "#sparse_vector",
        default,
        skip_serializing_if = "Option::is_none"
    )] // SPARSE_VECTOR_VALUE_NAME
    pub sparse_vector: Option<SparseVectorValueType>,

    #[serde(
        rename = "int",
        alias = "#int",
        default,
        skip_serializing_if = "Option::is_none"
    )] // INT_VALUE_NAME
    pub int: Option<IntValueType>,

    #[serde(
        rename = "float",
        alias = "#float",
        default,
        skip_serializing_if = "Option::is_none"
    )] // FLOAT_VALUE_NAME
    pub float: Option<FloatValueType>,

    #[serde(
        rename = "bool",
        alias = "#bool",
        default,
        skip_serializing_if = "Option::is_none"
    )] // BOOL_VALUE_NAME
    pub boolean: Option<BoolValueType>,
}

impl ValueTypes {
    pub fn is_empty(&self) -> bool {
        self.string.is_none()
            && self.float_list.is_none()
            && self.sparse_vector.is_none()
            && self.int.is_none()
            && self.float.is_none()
            && self.boolean.is_none()
    }

    /// A float-list entry carrying the given vector index config.
    pub fn vector(config: VectorIndexConfig) -> Self {
        ValueTypes {
            float_list: Some(FloatListValueType {
                vector_index: Some(VectorIndexType {
                    enabled: true,
                    config,
                }),
            }),
            ..Default::default()
        }
    }

    /// Checks the specs carried by the vector and sparse vector index configs.
    pub fn validate_embedding_functions(&self) -> Result<(), ConfigurationError> {
        let sparse = self
            .sparse_vector
            .as_ref()
            .and_then(|sparse| sparse.sparse_vector_index.as_ref())
            .and_then(|index| index.config.embedding_function.as_ref());
        let vector = self
            .vector_index_config()
            .and_then(VectorIndexConfig::embedding_function);
        sparse
            .into_iter()
            .chain(vector)
            .try_for_each(EmbeddingFunctionSpec::validate)
    }

    pub fn vector_index_config(&self) -> Option<&VectorIndexConfig> {
        self.float_list
            .as_ref()
            .and_then(|float_list| float_list.vector_index.as_ref())
            .map(|vector_index| &vector_index.config)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringValueType {
    #[serde(
        rename = "fts_index",
        alias = "$fts_index",
        default,
        skip_serializing_if = "Option::is_none"
    )] // FTS_INDEX_NAME
    pub fts_index: Option<FtsIndexType>,

    #[serde(
        rename = "string_inverted_index",
        alias = "$string_inverted_index",
        default,
        skip_serializing_if = "Option::is_none"
    )] // STRING_INVERTED_INDEX_NAME
    pub string_inverted_index: Option<StringInvertedIndexType>,
}

/// Float list value type index configurations (for vectors)
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FloatListValueType {
    #[serde(
        rename = "vector_index",
        alias = "$vector_index",
        default,
        skip_serializing_if = "Option::is_none"
    )] // VECTOR_INDEX_NAME
    pub vector_index: Option<VectorIndexType>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SparseVectorValueType {
    #[serde(
        rename = "sparse_vector_index",
        alias = "$sparse_vector_index",
        default,
        skip_serializing_if = "Option::is_none"
    )] // SPARSE_VECTOR_INDEX_NAME
    pub sparse_vector_index: Option<SparseVectorIndexType>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntValueType {
    #[serde(
        rename = "int_inverted_index",
        alias = "$int_inverted_index",
        default,
        skip_serializing_if = "Option::is_none"
    )] // INT_INVERTED_INDEX_NAME
    pub int_inverted_index: Option<IntInvertedIndexType>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FloatValueType {
    #[serde(
        rename = "float_inverted_index",
        alias = "$float_inverted_index",
        default,
        skip_serializing_if = "Option::is_none"
    )] // FLOAT_INVERTED_INDEX_NAME
    pub float_inverted_index: Option<FloatInvertedIndexType>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoolValueType {
    #[serde(
        rename = "bool_inverted_index",
        alias = "$bool_inverted_index",
        default,
        skip_serializing_if = "Option::is_none"
    )] // BOOL_INVERTED_INDEX_NAME
    pub bool_inverted_index: Option<BoolInvertedIndexType>,
}

// Index entries pair an enabled flag with the index config.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FtsIndexType {
    pub enabled: bool,
    #[serde(default)]
    pub config: FtsIndexConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorIndexType {
    pub enabled: bool,
    #[serde(default)]
    pub config: VectorIndexConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SparseVectorIndexType {
    pub enabled: bool,
    #[serde(default)]
    pub config: SparseVectorIndexConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringInvertedIndexType {
    pub enabled: bool,
    #[serde(default)]
    pub config: StringInvertedIndexConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntInvertedIndexType {
    pub enabled: bool,
    #[serde(default)]
    pub config: IntInvertedIndexConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FloatInvertedIndexType {
    pub enabled: bool,
    #[serde(default)]
    pub config: FloatInvertedIndexConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoolInvertedIndexType {
    pub enabled: bool,
    #[serde(default)]
    pub config: BoolInvertedIndexConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SparseVectorIndexConfig {
    /// Embedding function configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_function: Option<EmbeddingFunctionSpec>,
    /// Key to source the sparse vector from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    /// Whether this embedding is BM25
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bm25: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FtsIndexConfig {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StringInvertedIndexConfig {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntInvertedIndexConfig {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FloatInvertedIndexConfig {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoolInvertedIndexConfig {}

////////////////////// Schema //////////////////////

/// Typed per-key schema of a collection.
///
/// `defaults` apply to any key without an explicit entry in `keys`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSchema", into = "RawSchema")]
pub struct Schema {
    defaults: ValueTypes,
    keys: BTreeMap<String, ValueTypes>,
    cmek: Option<Cmek>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn defaults(&self) -> &ValueTypes {
        &self.defaults
    }

    pub fn keys(&self) -> &BTreeMap<String, ValueTypes> {
        &self.keys
    }

    pub fn cmek(&self) -> Option<&Cmek> {
        self.cmek.as_ref()
    }

    pub fn get_key(&self, key: &str) -> Option<&ValueTypes> {
        self.keys.get(key)
    }

    /// Vector index config of the reserved embedding key, if any.
    pub fn embedding_config(&self) -> Option<&VectorIndexConfig> {
        self.get_key(EMBEDDING_KEY)
            .and_then(ValueTypes::vector_index_config)
    }

    /// Default embedding function declared on the reserved embedding key.
    pub fn embedding_function(&self) -> Option<&EmbeddingFunctionSpec> {
        self.embedding_config()
            .and_then(VectorIndexConfig::embedding_function)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SchemaBuilder {
    defaults: ValueTypes,
    keys: BTreeMap<String, ValueTypes>,
    cmek: Option<Cmek>,
}

impl SchemaBuilder {
    pub fn defaults(mut self, defaults: ValueTypes) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn key(
        mut self,
        name: impl Into<String>,
        value_types: ValueTypes,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigurationError::BlankKey);
        }
        if value_types.is_empty() {
            return Err(ConfigurationError::EmptyValueTypes(name));
        }
        value_types.validate_embedding_functions()?;
        self.keys.insert(name, value_types);
        Ok(self)
    }

    pub fn keys(
        self,
        keys: impl IntoIterator<Item = (String, ValueTypes)>,
    ) -> Result<Self, ConfigurationError> {
        keys.into_iter()
            .try_fold(self, |builder, (name, value_types)| {
                builder.key(name, value_types)
            })
    }

    pub fn cmek(mut self, cmek: Cmek) -> Self {
        self.cmek = Some(cmek);
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            defaults: self.defaults,
            keys: self.keys,
            cmek: self.cmek,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawSchema {
    #[serde(default)]
    defaults: ValueTypes,
    #[serde(default, alias = "key_overrides")]
    keys: BTreeMap<String, ValueTypes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cmek: Option<Cmek>,
}

impl TryFrom<RawSchema> for Schema {
    type Error = ConfigurationError;

    fn try_from(raw: RawSchema) -> Result<Self, Self::Error> {
        let mut builder = Schema::builder().defaults(raw.defaults).keys(raw.keys)?;
        if let Some(cmek) = raw.cmek {
            builder = builder.cmek(cmek);
        }
        Ok(builder.build())
    }
}

impl From<Schema> for RawSchema {
    fn from(schema: Schema) -> Self {
        RawSchema {
            defaults: schema.defaults,
            keys: schema.keys,
            cmek: schema.cmek,
        }
    }
}
