use crate::{
    BoolInvertedIndexConfig, BoolInvertedIndexType, BoolValueType, Cmek, CollectionConfiguration,
    EmbeddingFunctionSpec, FtsIndexConfig, FtsIndexType, HnswIndexConfig, IntInvertedIndexConfig,
    IntInvertedIndexType, IntValueType, Quantization, Schema, Space, SpannIndexConfig,
    SparseVectorIndexConfig, SparseVectorIndexType, SparseVectorValueType, StringValueType,
    ValueTypes, VectorIndexConfig, EMBEDDING_KEY, MAX_MERGE_THRESHOLD, MAX_SEARCH_NPROBE,
    MIN_MERGE_THRESHOLD, MIN_SEARCH_NPROBE,
};
use proptest::{collection, option, prelude::*, string::string_regex};
use serde_json::Value;
use std::collections::BTreeMap;

pub fn arbitrary_space() -> impl Strategy<Value = Space> {
    prop_oneof![Just(Space::L2), Just(Space::Ip), Just(Space::Cosine)]
}

pub fn arbitrary_quantization() -> impl Strategy<Value = Quantization> {
    prop_oneof![
        Just(Quantization::None),
        Just(Quantization::FourBitRabitQWithUSearch)
    ]
}

fn arbitrary_resize_factor() -> impl Strategy<Value = f64> {
    f64::MIN_POSITIVE..f64::MAX
}

#[derive(Debug, Clone)]
struct HnswFields {
    ef_construction: Option<usize>,
    max_neighbors: Option<usize>,
    ef_search: Option<usize>,
    num_threads: Option<usize>,
    batch_size: Option<usize>,
    sync_threshold: Option<usize>,
    resize_factor: Option<f64>,
}

fn hnsw_fields() -> BoxedStrategy<HnswFields> {
    (
        option::of(1usize..1000),
        option::of(1usize..128),
        option::of(1usize..1000),
        option::of(1usize..32),
        option::of(2usize..10_000),
        option::of(2usize..10_000),
        option::of(arbitrary_resize_factor()),
    )
        .prop_map(
            |(
                ef_construction,
                max_neighbors,
                ef_search,
                num_threads,
                batch_size,
                sync_threshold,
                resize_factor,
            )| HnswFields {
                ef_construction,
                max_neighbors,
                ef_search,
                num_threads,
                batch_size,
                sync_threshold,
                resize_factor,
            },
        )
        .boxed()
}

pub fn arbitrary_hnsw_config() -> BoxedStrategy<HnswIndexConfig> {
    hnsw_fields().prop_filter_map("hnsw fields are generated in range", |fields| {
        let mut config = HnswIndexConfig::new();
        if let Some(value) = fields.ef_construction {
            config = config.with_ef_construction(value).ok()?;
        }
        if let Some(value) = fields.max_neighbors {
            config = config.with_max_neighbors(value).ok()?;
        }
        if let Some(value) = fields.ef_search {
            config = config.with_ef_search(value).ok()?;
        }
        if let Some(value) = fields.num_threads {
            config = config.with_num_threads(value).ok()?;
        }
        if let Some(value) = fields.batch_size {
            config = config.with_batch_size(value).ok()?;
        }
        if let Some(value) = fields.sync_threshold {
            config = config.with_sync_threshold(value).ok()?;
        }
        if let Some(value) = fields.resize_factor {
            config = config.with_resize_factor(value).ok()?;
        }
        Some(config)
    })
    .boxed()
}

pub fn arbitrary_spann_config() -> BoxedStrategy<SpannIndexConfig> {
    (
        option::of(MIN_SEARCH_NPROBE as u32..=MAX_SEARCH_NPROBE as u32),
        option::of(1usize..1000),
        option::of(MIN_MERGE_THRESHOLD as u32..=MAX_MERGE_THRESHOLD as u32),
        option::of(arbitrary_quantization()),
    )
        .prop_filter_map(
            "spann fields are generated in range",
            |(search_nprobe, ef_search, merge_threshold, quantization)| {
                let mut config = SpannIndexConfig::new();
                if let Some(value) = search_nprobe {
                    config = config.with_search_nprobe(value).ok()?;
                }
                if let Some(value) = ef_search {
                    config = config.with_ef_search(value).ok()?;
                }
                if let Some(value) = merge_threshold {
                    config = config.with_merge_threshold(value).ok()?;
                }
                if let Some(value) = quantization {
                    config = config.with_quantization(value);
                }
                Some(config)
            },
        )
        .boxed()
}

fn config_key() -> impl Strategy<Value = String> {
    string_regex("[a-z][a-z_]{0,15}").expect("The config key regex should be valid")
}

pub fn arbitrary_embedding_function_spec() -> BoxedStrategy<EmbeddingFunctionSpec> {
    (
        prop_oneof![
            Just("openai"),
            Just("cohere"),
            Just("huggingface"),
            Just("ollama")
        ],
        collection::btree_map(config_key(), "[a-zA-Z0-9_./:-]{0,24}", 0..4),
    )
        .prop_map(|(name, config)| {
            let config: BTreeMap<String, Value> = config
                .into_iter()
                .map(|(key, value)| (key, Value::from(value)))
                .collect();
            EmbeddingFunctionSpec::known(name).with_config_map(config)
        })
        .boxed()
}

pub fn arbitrary_vector_index_config() -> BoxedStrategy<VectorIndexConfig> {
    (
        option::of(arbitrary_space()),
        option::of(arbitrary_hnsw_config()),
        option::of(arbitrary_spann_config()),
        option::of(arbitrary_embedding_function_spec()),
        option::of(config_key()),
    )
        .prop_map(|(space, hnsw, spann, embedding_function, source_key)| {
            let mut builder = VectorIndexConfig::builder();
            if let Some(space) = space {
                builder = builder.space(space);
            }
            // Keep at most one family so the result always builds.
            match (hnsw, spann) {
                (Some(hnsw), _) => builder = builder.hnsw(hnsw),
                (None, Some(spann)) => builder = builder.spann(spann),
                (None, None) => {}
            }
            if let Some(spec) = embedding_function {
                builder = builder.embedding_function(spec);
            }
            if let Some(source_key) = source_key {
                builder = builder.source_key(source_key);
            }
            builder.build().unwrap_or_default()
        })
        .boxed()
}

fn arbitrary_scalar_value_types() -> BoxedStrategy<ValueTypes> {
    (
        option::of(any::<bool>()),
        option::of(any::<bool>()),
        option::of(any::<bool>()),
        option::of(any::<(bool, Option<bool>)>()),
    )
        .prop_map(|(fts, int, boolean, sparse)| ValueTypes {
            string: fts.map(|enabled| StringValueType {
                fts_index: Some(FtsIndexType {
                    enabled,
                    config: FtsIndexConfig {},
                }),
                string_inverted_index: None,
            }),
            int: int.map(|enabled| IntValueType {
                int_inverted_index: Some(IntInvertedIndexType {
                    enabled,
                    config: IntInvertedIndexConfig {},
                }),
            }),
            boolean: boolean.map(|enabled| BoolValueType {
                bool_inverted_index: Some(BoolInvertedIndexType {
                    enabled,
                    config: BoolInvertedIndexConfig {},
                }),
            }),
            sparse_vector: sparse.map(|(enabled, bm25)| SparseVectorValueType {
                sparse_vector_index: Some(SparseVectorIndexType {
                    enabled,
                    config: SparseVectorIndexConfig {
                        embedding_function: None,
                        source_key: None,
                        bm25,
                    },
                }),
            }),
            ..Default::default()
        })
        .boxed()
}

fn arbitrary_cmek() -> impl Strategy<Value = Cmek> {
    string_regex(
        "projects/[a-z0-9-]{1,8}/locations/[a-z0-9-]{1,8}/keyRings/[a-z0-9-]{1,8}/cryptoKeys/[a-z0-9-]{1,8}",
    )
    .expect("The CMEK resource regex should be valid")
    .prop_filter_map("resource matches the GCP pattern", |resource| {
        Cmek::gcp(resource).ok()
    })
}

pub fn arbitrary_schema() -> BoxedStrategy<Schema> {
    (
        arbitrary_scalar_value_types(),
        collection::btree_map(
            string_regex("[a-z][a-z0-9_]{0,10}").expect("The schema key regex should be valid"),
            arbitrary_scalar_value_types(),
            0..4,
        ),
        option::of(arbitrary_vector_index_config()),
        option::of(arbitrary_cmek()),
    )
        .prop_filter_map(
            "schema keys need at least one value type",
            |(defaults, keys, embedding, cmek)| {
                let mut builder = Schema::builder().defaults(defaults);
                for (name, value_types) in keys {
                    if !value_types.is_empty() {
                        builder = builder.key(name, value_types).ok()?;
                    }
                }
                if let Some(config) = embedding {
                    builder = builder.key(EMBEDDING_KEY, ValueTypes::vector(config)).ok()?;
                }
                if let Some(cmek) = cmek {
                    builder = builder.cmek(cmek);
                }
                Some(builder.build())
            },
        )
        .boxed()
}

/// Configurations with HNSW fields only, SPANN fields only, or neither.
pub fn arbitrary_collection_configuration() -> BoxedStrategy<CollectionConfiguration> {
    let index: BoxedStrategy<(Option<HnswIndexConfig>, Option<SpannIndexConfig>)> = prop_oneof![
        Just((None, None)),
        arbitrary_hnsw_config().prop_map(|hnsw| (Some(hnsw), None)),
        arbitrary_spann_config().prop_map(|spann| (None, Some(spann))),
    ]
    .boxed();
    (
        option::of(arbitrary_space()),
        index,
        option::of(arbitrary_embedding_function_spec()),
        option::of(arbitrary_schema()),
    )
        .prop_filter_map(
            "configuration builds",
            |(space, (hnsw, spann), embedding_function, schema)| {
                let mut builder = CollectionConfiguration::builder();
                if let Some(space) = space {
                    builder = builder.space(space);
                }
                if let Some(hnsw) = hnsw {
                    builder = builder.hnsw(hnsw);
                }
                if let Some(spann) = spann {
                    builder = builder.spann(spann);
                }
                if let Some(spec) = embedding_function {
                    builder = builder.embedding_function(spec);
                }
                if let Some(schema) = schema {
                    builder = builder.schema(schema);
                }
                builder.build().ok()
            },
        )
        .boxed()
}
