use crate::validators::{
    ensure_at_least, ensure_in_range, ensure_positive_finite, ensure_usize_at_least,
    ConfigurationError,
};
use crate::{
    EmbeddingFunctionSpec, HnswIndexConfig, Quantization, Schema, Space, SpannIndexConfig,
    HNSW_BATCH_SIZE_KEY, HNSW_NUM_THREADS_KEY, HNSW_RESIZE_FACTOR_KEY, HNSW_SEARCH_EF_KEY,
    HNSW_SYNC_THRESHOLD_KEY, MAX_SEARCH_NPROBE, MIN_SEARCH_NPROBE, SPANN_EF_SEARCH_KEY,
    SPANN_SEARCH_NPROBE_KEY,
};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// The two ANN index families a collection can be configured with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexFamily {
    Hnsw,
    Spann,
}

/// Index parameters of a collection. At most one family can be present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum IndexParams {
    Hnsw(HnswIndexConfig),
    Spann(SpannIndexConfig),
    #[default]
    None,
}

impl IndexParams {
    fn from_parts(
        hnsw: Option<HnswIndexConfig>,
        spann: Option<SpannIndexConfig>,
    ) -> Result<Self, ConfigurationError> {
        match (hnsw, spann) {
            (Some(_), Some(_)) => Err(ConfigurationError::MixedIndexParams),
            (Some(hnsw), None) => Ok(IndexParams::Hnsw(hnsw)),
            (None, Some(spann)) => Ok(IndexParams::Spann(spann)),
            (None, None) => Ok(IndexParams::None),
        }
    }

    pub fn family(&self) -> Option<IndexFamily> {
        match self {
            IndexParams::Hnsw(_) => Some(IndexFamily::Hnsw),
            IndexParams::Spann(_) => Some(IndexFamily::Spann),
            IndexParams::None => None,
        }
    }

    pub fn hnsw(&self) -> Option<&HnswIndexConfig> {
        match self {
            IndexParams::Hnsw(config) => Some(config),
            _ => None,
        }
    }

    pub fn spann(&self) -> Option<&SpannIndexConfig> {
        match self {
            IndexParams::Spann(config) => Some(config),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, IndexParams::None)
    }
}

impl From<HnswIndexConfig> for IndexParams {
    fn from(config: HnswIndexConfig) -> Self {
        IndexParams::Hnsw(config)
    }
}

impl From<SpannIndexConfig> for IndexParams {
    fn from(config: SpannIndexConfig) -> Self {
        IndexParams::Spann(config)
    }
}

////////////////////// VectorIndexConfig //////////////////////

/// Vector index settings attached to a float-list schema entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawVectorIndexConfig", into = "RawVectorIndexConfig")]
pub struct VectorIndexConfig {
    space: Option<Space>,
    index: IndexParams,
    embedding_function: Option<EmbeddingFunctionSpec>,
    source_key: Option<String>,
}

impl VectorIndexConfig {
    pub fn builder() -> VectorIndexConfigBuilder {
        VectorIndexConfigBuilder::default()
    }

    pub fn space(&self) -> Option<Space> {
        self.space
    }

    pub fn index(&self) -> &IndexParams {
        &self.index
    }

    pub fn hnsw(&self) -> Option<&HnswIndexConfig> {
        self.index.hnsw()
    }

    pub fn spann(&self) -> Option<&SpannIndexConfig> {
        self.index.spann()
    }

    pub fn embedding_function(&self) -> Option<&EmbeddingFunctionSpec> {
        self.embedding_function.as_ref()
    }

    pub fn source_key(&self) -> Option<&str> {
        self.source_key.as_deref()
    }

    pub fn is_default(&self) -> bool {
        self.space.map_or(true, |space| space == Space::default())
            && self.embedding_function.is_none()
            && self.source_key.is_none()
            && match &self.index {
                IndexParams::Hnsw(hnsw) => hnsw.is_default(),
                IndexParams::Spann(spann) => spann.is_default(),
                IndexParams::None => true,
            }
    }
}

#[derive(Clone, Debug, Default)]
pub struct VectorIndexConfigBuilder {
    space: Option<Space>,
    hnsw: Option<HnswIndexConfig>,
    spann: Option<SpannIndexConfig>,
    embedding_function: Option<EmbeddingFunctionSpec>,
    source_key: Option<String>,
}

impl VectorIndexConfigBuilder {
    pub fn space(mut self, space: Space) -> Self {
        self.space = Some(space);
        self
    }

    pub fn hnsw(mut self, hnsw: HnswIndexConfig) -> Self {
        self.hnsw = Some(hnsw);
        self
    }

    pub fn spann(mut self, spann: SpannIndexConfig) -> Self {
        self.spann = Some(spann);
        self
    }

    pub fn embedding_function(mut self, spec: EmbeddingFunctionSpec) -> Self {
        self.embedding_function = Some(spec);
        self
    }

    pub fn source_key(mut self, source_key: impl Into<String>) -> Self {
        self.source_key = Some(source_key.into());
        self
    }

    pub fn build(self) -> Result<VectorIndexConfig, ConfigurationError> {
        if let Some(spec) = &self.embedding_function {
            spec.validate()?;
        }
        Ok(VectorIndexConfig {
            space: self.space,
            index: IndexParams::from_parts(self.hnsw, self.spann)?,
            embedding_function: self.embedding_function,
            source_key: self.source_key,
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVectorIndexConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    space: Option<Space>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding_function: Option<EmbeddingFunctionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hnsw: Option<HnswIndexConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    spann: Option<SpannIndexConfig>,
}

impl TryFrom<RawVectorIndexConfig> for VectorIndexConfig {
    type Error = ConfigurationError;

    fn try_from(raw: RawVectorIndexConfig) -> Result<Self, Self::Error> {
        let mut builder = VectorIndexConfig::builder();
        builder.space = raw.space;
        builder.hnsw = raw.hnsw;
        builder.spann = raw.spann;
        builder.embedding_function = raw.embedding_function;
        builder.source_key = raw.source_key;
        builder.build()
    }
}

impl From<VectorIndexConfig> for RawVectorIndexConfig {
    fn from(config: VectorIndexConfig) -> Self {
        let (hnsw, spann) = match config.index {
            IndexParams::Hnsw(hnsw) => (Some(hnsw), None),
            IndexParams::Spann(spann) => (None, Some(spann)),
            IndexParams::None => (None, None),
        };
        RawVectorIndexConfig {
            space: config.space,
            embedding_function: config.embedding_function,
            source_key: config.source_key,
            hnsw,
            spann,
        }
    }
}

////////////////////// CollectionConfiguration //////////////////////

/// Create-time configuration of a collection.
///
/// Serializes to the flat create shape (`hnsw:M`, `spann:search_nprobe`, ...).
/// Absent fields stay absent on the wire; defaults are applied server side.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "crate::WireMap", into = "crate::WireMap")]
pub struct CollectionConfiguration {
    pub(crate) space: Option<Space>,
    pub(crate) index: IndexParams,
    pub(crate) embedding_function: Option<EmbeddingFunctionSpec>,
    pub(crate) schema: Option<Schema>,
}

impl CollectionConfiguration {
    pub fn builder() -> CollectionConfigurationBuilder {
        CollectionConfigurationBuilder::default()
    }

    pub fn space(&self) -> Option<Space> {
        self.space
    }

    pub fn index(&self) -> &IndexParams {
        &self.index
    }

    pub fn hnsw(&self) -> Option<&HnswIndexConfig> {
        self.index.hnsw()
    }

    pub fn spann(&self) -> Option<&SpannIndexConfig> {
        self.index.spann()
    }

    pub fn embedding_function(&self) -> Option<&EmbeddingFunctionSpec> {
        self.embedding_function.as_ref()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Overlays an update on this configuration.
    ///
    /// Fails when the update targets the other index family. A configuration without
    /// index parameters takes whichever family the update carries.
    pub fn apply_update(
        &self,
        update: &UpdateCollectionConfiguration,
    ) -> Result<CollectionConfiguration, ConfigurationError> {
        let index = match (&self.index, &update.index) {
            (current, UpdateIndexParams::None) => current.clone(),
            (IndexParams::Hnsw(current), UpdateIndexParams::Hnsw(hnsw)) => {
                IndexParams::Hnsw(hnsw.apply_to(current.clone())?)
            }
            (IndexParams::None, UpdateIndexParams::Hnsw(hnsw)) => {
                IndexParams::Hnsw(hnsw.apply_to(HnswIndexConfig::default())?)
            }
            (IndexParams::Spann(current), UpdateIndexParams::Spann(spann)) => {
                IndexParams::Spann(spann.apply_to(current.clone())?)
            }
            (IndexParams::None, UpdateIndexParams::Spann(spann)) => {
                IndexParams::Spann(spann.apply_to(SpannIndexConfig::default())?)
            }
            (IndexParams::Hnsw(_), UpdateIndexParams::Spann(_))
            | (IndexParams::Spann(_), UpdateIndexParams::Hnsw(_)) => {
                return Err(ConfigurationError::IndexFamilySwitch)
            }
        };
        Ok(CollectionConfiguration {
            space: self.space,
            index,
            embedding_function: update
                .embedding_function
                .clone()
                .or_else(|| self.embedding_function.clone()),
            schema: self.schema.clone(),
        })
    }
}

/// Builder for [`CollectionConfiguration`]. Numeric setters validate their argument
/// and fail on the spot; `build()` rejects a mix of HNSW and SPANN setters.
#[derive(Clone, Debug, Default)]
pub struct CollectionConfigurationBuilder {
    space: Option<Space>,
    hnsw: Option<HnswIndexConfig>,
    spann: Option<SpannIndexConfig>,
    embedding_function: Option<EmbeddingFunctionSpec>,
    schema: Option<Schema>,
}

impl CollectionConfigurationBuilder {
    pub fn space(mut self, space: Space) -> Self {
        self.space = Some(space);
        self
    }

    pub fn embedding_function(mut self, spec: EmbeddingFunctionSpec) -> Self {
        self.embedding_function = Some(spec);
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn hnsw(mut self, hnsw: HnswIndexConfig) -> Self {
        self.hnsw = Some(hnsw);
        self
    }

    pub fn spann(mut self, spann: SpannIndexConfig) -> Self {
        self.spann = Some(spann);
        self
    }

    fn update_hnsw(
        mut self,
        set: impl FnOnce(HnswIndexConfig) -> Result<HnswIndexConfig, ConfigurationError>,
    ) -> Result<Self, ConfigurationError> {
        self.hnsw = Some(set(self.hnsw.take().unwrap_or_default())?);
        Ok(self)
    }

    fn update_spann(
        mut self,
        set: impl FnOnce(SpannIndexConfig) -> Result<SpannIndexConfig, ConfigurationError>,
    ) -> Result<Self, ConfigurationError> {
        self.spann = Some(set(self.spann.take().unwrap_or_default())?);
        Ok(self)
    }

    pub fn hnsw_construction_ef(self, value: usize) -> Result<Self, ConfigurationError> {
        self.update_hnsw(|hnsw| hnsw.with_ef_construction(value))
    }

    pub fn hnsw_m(self, value: usize) -> Result<Self, ConfigurationError> {
        self.update_hnsw(|hnsw| hnsw.with_max_neighbors(value))
    }

    pub fn hnsw_search_ef(self, value: usize) -> Result<Self, ConfigurationError> {
        self.update_hnsw(|hnsw| hnsw.with_ef_search(value))
    }

    pub fn hnsw_num_threads(self, value: usize) -> Result<Self, ConfigurationError> {
        self.update_hnsw(|hnsw| hnsw.with_num_threads(value))
    }

    pub fn hnsw_batch_size(self, value: usize) -> Result<Self, ConfigurationError> {
        self.update_hnsw(|hnsw| hnsw.with_batch_size(value))
    }

    pub fn hnsw_sync_threshold(self, value: usize) -> Result<Self, ConfigurationError> {
        self.update_hnsw(|hnsw| hnsw.with_sync_threshold(value))
    }

    pub fn hnsw_resize_factor(self, value: f64) -> Result<Self, ConfigurationError> {
        self.update_hnsw(|hnsw| hnsw.with_resize_factor(value))
    }

    pub fn spann_search_nprobe(self, value: u32) -> Result<Self, ConfigurationError> {
        self.update_spann(|spann| spann.with_search_nprobe(value))
    }

    pub fn spann_ef_search(self, value: usize) -> Result<Self, ConfigurationError> {
        self.update_spann(|spann| spann.with_ef_search(value))
    }

    pub fn spann_merge_threshold(self, value: u32) -> Result<Self, ConfigurationError> {
        self.update_spann(|spann| spann.with_merge_threshold(value))
    }

    pub fn spann_quantization(self, value: Quantization) -> Result<Self, ConfigurationError> {
        self.update_spann(|spann| Ok(spann.with_quantization(value)))
    }

    pub fn build(self) -> Result<CollectionConfiguration, ConfigurationError> {
        // The flat wire shape has no way to express an empty parameter group.
        let index = match IndexParams::from_parts(self.hnsw, self.spann)? {
            IndexParams::Hnsw(hnsw) if hnsw.is_empty() => IndexParams::None,
            IndexParams::Spann(spann) if spann.is_empty() => IndexParams::None,
            index => index,
        };
        if let Some(spec) = &self.embedding_function {
            spec.validate()?;
        }
        Ok(CollectionConfiguration {
            space: self.space,
            index,
            embedding_function: self.embedding_function,
            schema: self.schema,
        })
    }
}

////////////////////// UpdateCollectionConfiguration //////////////////////

/// HNSW fields that can change after a collection is created.
#[derive(Clone, Debug, Default, Serialize)]
pub struct UpdateHnswConfiguration {
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

impl UpdateHnswConfiguration {
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

    fn apply_to(&self, mut config: HnswIndexConfig) -> Result<HnswIndexConfig, ConfigurationError> {
        if let Some(ef_search) = self.ef_search {
            config = config.with_ef_search(ef_search)?;
        }
        if let Some(num_threads) = self.num_threads {
            config = config.with_num_threads(num_threads)?;
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size)?;
        }
        if let Some(sync_threshold) = self.sync_threshold {
            config = config.with_sync_threshold(sync_threshold)?;
        }
        if let Some(resize_factor) = self.resize_factor {
            config = config.with_resize_factor(resize_factor)?;
        }
        Ok(config)
    }
}

impl PartialEq for UpdateHnswConfiguration {
    fn eq(&self, other: &Self) -> bool {
        self.ef_search == other.ef_search
            && self.num_threads == other.num_threads
            && self.batch_size == other.batch_size
            && self.sync_threshold == other.sync_threshold
            && self.resize_factor.map(f64::to_bits) == other.resize_factor.map(f64::to_bits)
    }
}

impl Eq for UpdateHnswConfiguration {}

impl Hash for UpdateHnswConfiguration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ef_search.hash(state);
        self.num_threads.hash(state);
        self.batch_size.hash(state);
        self.sync_threshold.hash(state);
        self.resize_factor.map(f64::to_bits).hash(state);
    }
}

/// SPANN fields that can change after a collection is created.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct UpdateSpannConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    search_nprobe: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ef_search: Option<usize>,
}

impl UpdateSpannConfiguration {
    pub fn search_nprobe(&self) -> Option<u32> {
        self.search_nprobe
    }

    pub fn ef_search(&self) -> Option<usize> {
        self.ef_search
    }

    fn apply_to(
        &self,
        mut config: SpannIndexConfig,
    ) -> Result<SpannIndexConfig, ConfigurationError> {
        if let Some(search_nprobe) = self.search_nprobe {
            config = config.with_search_nprobe(search_nprobe)?;
        }
        if let Some(ef_search) = self.ef_search {
            config = config.with_ef_search(ef_search)?;
        }
        Ok(config)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum UpdateIndexParams {
    Hnsw(UpdateHnswConfiguration),
    Spann(UpdateSpannConfiguration),
    #[default]
    None,
}

impl UpdateIndexParams {
    pub fn family(&self) -> Option<IndexFamily> {
        match self {
            UpdateIndexParams::Hnsw(_) => Some(IndexFamily::Hnsw),
            UpdateIndexParams::Spann(_) => Some(IndexFamily::Spann),
            UpdateIndexParams::None => None,
        }
    }
}

/// Changes to apply to an existing collection. Only produces a wire payload; it is
/// never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UpdateCollectionConfiguration {
    index: UpdateIndexParams,
    embedding_function: Option<EmbeddingFunctionSpec>,
}

impl UpdateCollectionConfiguration {
    pub fn builder() -> UpdateCollectionConfigurationBuilder {
        UpdateCollectionConfigurationBuilder::default()
    }

    pub fn index(&self) -> &UpdateIndexParams {
        &self.index
    }

    pub fn hnsw(&self) -> Option<&UpdateHnswConfiguration> {
        match &self.index {
            UpdateIndexParams::Hnsw(hnsw) => Some(hnsw),
            _ => None,
        }
    }

    pub fn spann(&self) -> Option<&UpdateSpannConfiguration> {
        match &self.index {
            UpdateIndexParams::Spann(spann) => Some(spann),
            _ => None,
        }
    }

    pub fn embedding_function(&self) -> Option<&EmbeddingFunctionSpec> {
        self.embedding_function.as_ref()
    }
}

#[derive(Clone, Debug, Default)]
pub struct UpdateCollectionConfigurationBuilder {
    hnsw: Option<UpdateHnswConfiguration>,
    spann: Option<UpdateSpannConfiguration>,
    embedding_function: Option<EmbeddingFunctionSpec>,
}

impl UpdateCollectionConfigurationBuilder {
    fn hnsw_mut(&mut self) -> &mut UpdateHnswConfiguration {
        self.hnsw.get_or_insert_with(UpdateHnswConfiguration::default)
    }

    fn spann_mut(&mut self) -> &mut UpdateSpannConfiguration {
        self.spann
            .get_or_insert_with(UpdateSpannConfiguration::default)
    }

    pub fn hnsw_search_ef(mut self, value: usize) -> Result<Self, ConfigurationError> {
        self.hnsw_mut().ef_search = Some(ensure_usize_at_least(HNSW_SEARCH_EF_KEY, value, 1)?);
        Ok(self)
    }

    pub fn hnsw_num_threads(mut self, value: usize) -> Result<Self, ConfigurationError> {
        self.hnsw_mut().num_threads =
            Some(ensure_usize_at_least(HNSW_NUM_THREADS_KEY, value, 1)?);
        Ok(self)
    }

    pub fn hnsw_batch_size(mut self, value: usize) -> Result<Self, ConfigurationError> {
        self.hnsw_mut().batch_size = Some(ensure_usize_at_least(HNSW_BATCH_SIZE_KEY, value, 2)?);
        Ok(self)
    }

    pub fn hnsw_sync_threshold(mut self, value: usize) -> Result<Self, ConfigurationError> {
        self.hnsw_mut().sync_threshold =
            Some(ensure_usize_at_least(HNSW_SYNC_THRESHOLD_KEY, value, 2)?);
        Ok(self)
    }

    pub fn hnsw_resize_factor(mut self, value: f64) -> Result<Self, ConfigurationError> {
        self.hnsw_mut().resize_factor = Some(ensure_positive_finite(HNSW_RESIZE_FACTOR_KEY, value)?);
        Ok(self)
    }

    pub fn spann_search_nprobe(mut self, value: u32) -> Result<Self, ConfigurationError> {
        self.spann_mut().search_nprobe = Some(ensure_in_range(
            SPANN_SEARCH_NPROBE_KEY,
            i64::from(value),
            MIN_SEARCH_NPROBE,
            MAX_SEARCH_NPROBE,
        )?);
        Ok(self)
    }

    pub fn spann_ef_search(mut self, value: usize) -> Result<Self, ConfigurationError> {
        let value = i64::try_from(value).unwrap_or(i64::MAX);
        self.spann_mut().ef_search = Some(ensure_at_least(SPANN_EF_SEARCH_KEY, value, 1)?);
        Ok(self)
    }

    pub fn embedding_function(mut self, spec: EmbeddingFunctionSpec) -> Self {
        self.embedding_function = Some(spec);
        self
    }

    pub fn build(self) -> Result<UpdateCollectionConfiguration, ConfigurationError> {
        let index = match (self.hnsw, self.spann) {
            (Some(_), Some(_)) => return Err(ConfigurationError::UpdateBothIndexParams),
            (Some(hnsw), None) => UpdateIndexParams::Hnsw(hnsw),
            (None, Some(spann)) => UpdateIndexParams::Spann(spann),
            (None, None) => UpdateIndexParams::None,
        };
        if index == UpdateIndexParams::None && self.embedding_function.is_none() {
            return Err(ConfigurationError::EmptyUpdate);
        }
        if let Some(spec) = &self.embedding_function {
            spec.validate()?;
        }
        Ok(UpdateCollectionConfiguration {
            index,
            embedding_function: self.embedding_function,
        })
    }
}
