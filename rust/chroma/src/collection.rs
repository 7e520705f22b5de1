//! Collection handles and the client-side rules that apply to a collection's configuration.
//!
//! This module provides the [`ChromaCollection`] type, which represents a handle to a specific
//! collection within a Chroma database.
//!
//! # Operations
//!
//! - **Metadata access**: [`database()`](ChromaCollection::database), [`metadata()`](ChromaCollection::metadata), [`schema()`](ChromaCollection::schema), [`tenant()`](ChromaCollection::tenant), [`configuration()`](ChromaCollection::configuration)
//! - **Embedding functions**: [`effective_embedding_function_spec()`](ChromaCollection::effective_embedding_function_spec), [`embedding_function()`](ChromaCollection::embedding_function), [`embed_query_texts()`](ChromaCollection::embed_query_texts)
//! - **Write operations**: [`modify_configuration()`](ChromaCollection::modify_configuration)

use std::sync::Arc;

use chroma_collection_types::{
    to_update_configuration_map, CollectionConfiguration, ConfigurationError,
    DeserializationError, EmbeddingFunctionSpec, Schema, UpdateCollectionConfiguration,
};
use chroma_error::{ChromaError, ErrorCodes};
use reqwest::Method;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::client::ChromaClient;
use crate::embed::{
    EmbeddingFunctionError, EmbeddingFunctionResolver, EnvLookup, ResolveError,
    ResolvedEmbeddingFunction,
};
use crate::transport::{Transport, TransportError, TransportRequest};
use crate::types::{Collection, Metadata};

////////////////////////////////////////// CollectionError /////////////////////////////////////////

/// Errors raised by operations on a [`ChromaCollection`].
#[derive(Error, Debug)]
pub enum CollectionError {
    /// The transport failed to deliver the request or the server rejected it.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The requested configuration change is invalid for this collection.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The server response could not be parsed.
    #[error("Invalid response: {0}")]
    Deserialization(#[from] DeserializationError),
    /// The collection's embedding function could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The embedding function failed to embed the inputs.
    #[error(transparent)]
    Embedding(#[from] EmbeddingFunctionError),
    /// Texts were given but the collection declares no embedding function.
    #[error("Collection `{collection}` has no embedding function; supply query embeddings directly")]
    NoEmbeddingFunction {
        /// Name of the collection.
        collection: String,
    },
}

impl ChromaError for CollectionError {
    fn code(&self) -> ErrorCodes {
        match self {
            CollectionError::Transport(err) => err.code(),
            CollectionError::Configuration(err) => err.code(),
            CollectionError::Deserialization(_) => ErrorCodes::Internal,
            CollectionError::Resolve(err) => err.code(),
            CollectionError::Embedding(err) => err.code(),
            CollectionError::NoEmbeddingFunction { .. } => ErrorCodes::FailedPrecondition,
        }
    }
}

/////////////////////////////////////// Effective spec lookup //////////////////////////////////////

type SpecLookup = fn(&Collection) -> Option<&EmbeddingFunctionSpec>;

fn top_level_schema_spec(collection: &Collection) -> Option<&EmbeddingFunctionSpec> {
    collection.schema.as_ref()?.embedding_function()
}

fn configuration_spec(collection: &Collection) -> Option<&EmbeddingFunctionSpec> {
    collection.configuration.as_ref()?.embedding_function()
}

fn configuration_schema_spec(collection: &Collection) -> Option<&EmbeddingFunctionSpec> {
    collection
        .configuration
        .as_ref()?
        .schema()?
        .embedding_function()
}

/// Places an embedding function spec can live, highest precedence first.
const EMBEDDING_FUNCTION_LOOKUPS: &[(&str, SpecLookup)] = &[
    ("schema", top_level_schema_spec),
    ("configuration.embedding_function", configuration_spec),
    ("configuration.schema", configuration_schema_spec),
];

///////////////////////////////////////// ChromaCollection /////////////////////////////////////////

/// A handle to a specific collection within a Chroma database.
///
/// A `ChromaCollection` is a lightweight reference to collection metadata that shares the
/// client's transport. Operations on the collection are executed immediately against the server.
///
/// # Examples
///
/// ```
/// # use chroma_collection::ChromaCollection;
/// # use chroma_collection::embed::EmbeddingFunctionResolver;
/// # use chroma_collection::transport::Transport;
/// # async fn example<T: Transport>(collection: ChromaCollection<T>) -> Result<(), Box<dyn std::error::Error>> {
/// # use chroma_collection::EmbeddingFunctionOptions;
/// let resolver = EmbeddingFunctionResolver::new(EmbeddingFunctionOptions::default());
/// let embeddings = collection
///     .embed_query_texts(&resolver, &["what is a vector database?"])
///     .await?;
/// assert_eq!(embeddings.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct ChromaCollection<T: Transport> {
    pub(crate) client: ChromaClient<T>,
    pub(crate) collection: Arc<Collection>,
}

impl<T: Transport> Clone for ChromaCollection<T> {
    fn clone(&self) -> Self {
        ChromaCollection {
            client: self.client.clone(),
            collection: Arc::clone(&self.collection),
        }
    }
}

impl<T: Transport> std::fmt::Debug for ChromaCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromaCollection")
            .field("database", &self.collection.database)
            .field("tenant", &self.collection.tenant)
            .field("name", &self.collection.name)
            .field("collection_id", &self.collection.collection_id)
            .finish()
    }
}

impl<T: Transport> ChromaCollection<T> {
    pub(crate) fn new(client: ChromaClient<T>, collection: Collection) -> Self {
        ChromaCollection {
            client,
            collection: Arc::new(collection),
        }
    }

    /// Returns the database that contains this collection.
    pub fn database(&self) -> &str {
        &self.collection.database
    }

    /// Returns the collection's metadata, if any was specified during creation.
    pub fn metadata(&self) -> &Option<Metadata> {
        &self.collection.metadata
    }

    /// Returns the collection's top-level schema, if available.
    pub fn schema(&self) -> Option<&Schema> {
        self.collection.schema.as_ref()
    }

    /// Returns the collection's persisted configuration, if available.
    pub fn configuration(&self) -> Option<&CollectionConfiguration> {
        self.collection.configuration.as_ref()
    }

    /// Returns the tenant that owns this collection.
    pub fn tenant(&self) -> &str {
        &self.collection.tenant
    }

    /// Returns the user-assigned name of this collection.
    pub fn name(&self) -> &str {
        &self.collection.name
    }

    /// Returns the unique identifier assigned to this collection by Chroma.
    pub fn id(&self) -> Uuid {
        self.collection.collection_id
    }

    /// Returns the embedding function spec that query-by-text operations use.
    ///
    /// A collection can carry a spec in three places. The first one present wins:
    /// 1. the top-level schema's embedding key,
    /// 2. the configuration's `embedding_function`,
    /// 3. the configuration's own schema's embedding key.
    ///
    /// Lower-precedence locations are not consulted once a spec is found.
    pub fn effective_embedding_function_spec(&self) -> Option<&EmbeddingFunctionSpec> {
        EMBEDDING_FUNCTION_LOOKUPS
            .iter()
            .find_map(|(source, lookup)| {
                let spec = lookup(&self.collection)?;
                tracing::debug!(
                    collection = %self.collection.name,
                    source = *source,
                    spec = %spec,
                    "Selected embedding function spec"
                );
                Some(spec)
            })
    }

    /// Resolves the collection's effective embedding function.
    ///
    /// Returns `None` when the collection declares no embedding function.
    ///
    /// # Errors
    ///
    /// Fails when the effective spec names a provider the resolver cannot construct.
    pub fn embedding_function<E: EnvLookup>(
        &self,
        resolver: &EmbeddingFunctionResolver<E>,
    ) -> Result<Option<ResolvedEmbeddingFunction>, ResolveError> {
        resolver.resolve(self.effective_embedding_function_spec())
    }

    /// Embeds query texts with the collection's effective embedding function.
    ///
    /// # Errors
    ///
    /// Fails when the collection has no embedding function, the function cannot be resolved,
    /// or the provider request fails.
    pub async fn embed_query_texts<E: EnvLookup>(
        &self,
        resolver: &EmbeddingFunctionResolver<E>,
        texts: &[&str],
    ) -> Result<Vec<Vec<f32>>, CollectionError> {
        let function =
            self.embedding_function(resolver)?
                .ok_or_else(|| CollectionError::NoEmbeddingFunction {
                    collection: self.collection.name.clone(),
                })?;
        Ok(function.embed_strs(texts).await?)
    }

    /// Applies a configuration update to the collection.
    ///
    /// The update is checked against the persisted configuration before anything is sent: an
    /// update that switches between HNSW and SPANN is rejected without issuing a request.
    /// Otherwise the server is updated and the local handle takes the merged configuration.
    ///
    /// Note that this method takes a mutable reference to self because it updates the
    /// local collection configuration after the server-side modification succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the update switches index family, a merged parameter is out of
    /// range, or the server rejects the request.
    pub async fn modify_configuration(
        &mut self,
        update: &UpdateCollectionConfiguration,
    ) -> Result<(), CollectionError> {
        let current = self.collection.configuration.clone().unwrap_or_default();
        let merged = current.apply_update(update)?;

        let new_configuration = to_update_configuration_map(Some(update))
            .map(Value::Object)
            .unwrap_or(Value::Null);
        // Returns empty map ({})
        self.send(
            "modify_configuration",
            Method::PUT,
            Some(json!({ "new_configuration": new_configuration })),
        )
        .await?;

        let mut updated_collection = (*self.collection).clone();
        updated_collection.configuration = Some(merged);
        self.collection = Arc::new(updated_collection);

        Ok(())
    }

    /// Constructs the collection's API path and delegates to the client.
    async fn send(
        &self,
        operation: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        let path = format!(
            "{}/{}",
            self.client.collections_path(),
            self.collection.collection_id
        );
        let mut request = TransportRequest::new(format!("collection_{operation}"), method, path);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        self.client.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingFunctionOptions;
    use crate::tests::{wire_collection, RecordingTransport};
    use chroma_collection_types::{
        EmbeddingFunctionSpec, IndexFamily, Space, ValueTypes, VectorIndexConfig, EMBEDDING_KEY,
    };
    use httpmock::prelude::*;
    use std::collections::HashMap;

    fn schema_naming(provider: &str) -> Schema {
        let vector = VectorIndexConfig::builder()
            .space(Space::Cosine)
            .embedding_function(EmbeddingFunctionSpec::known(provider))
            .build()
            .unwrap();
        Schema::builder()
            .key(EMBEDDING_KEY, ValueTypes::vector(vector))
            .unwrap()
            .build()
    }

    fn collection_with(
        schema: Option<&str>,
        configuration_spec: Option<&str>,
        configuration_schema: Option<&str>,
    ) -> ChromaCollection<RecordingTransport> {
        let mut builder = CollectionConfiguration::builder();
        if let Some(provider) = configuration_spec {
            builder = builder.embedding_function(EmbeddingFunctionSpec::known(provider));
        }
        if let Some(provider) = configuration_schema {
            builder = builder.schema(schema_naming(provider));
        }
        let mut collection = Collection::from_wire(&wire_collection(json!({}))).unwrap();
        collection.configuration = Some(builder.build().unwrap());
        collection.schema = schema.map(schema_naming);
        let client = ChromaClient::new(RecordingTransport::default(), "tenant", "db");
        ChromaCollection::new(client, collection)
    }

    fn effective_name(collection: &ChromaCollection<RecordingTransport>) -> Option<&str> {
        collection
            .effective_embedding_function_spec()
            .map(EmbeddingFunctionSpec::name)
    }

    #[test_log::test]
    fn test_top_level_schema_wins() {
        let collection = collection_with(Some("cohere"), Some("openai"), Some("huggingface"));
        assert_eq!(effective_name(&collection), Some("cohere"));
    }

    #[test_log::test]
    fn test_configuration_spec_wins_over_configuration_schema() {
        let collection = collection_with(None, Some("openai"), Some("huggingface"));
        assert_eq!(effective_name(&collection), Some("openai"));
    }

    #[test_log::test]
    fn test_configuration_schema_is_last_resort() {
        let collection = collection_with(None, None, Some("huggingface"));
        assert_eq!(effective_name(&collection), Some("huggingface"));

        let collection = collection_with(None, None, None);
        assert_eq!(effective_name(&collection), None);
    }

    #[test]
    fn test_higher_precedence_invalid_spec_is_not_skipped() {
        let collection = collection_with(Some("consistent_hash"), Some("openai"), None);
        let resolver = EmbeddingFunctionResolver::with_env(
            HashMap::from([("OPENAI_API_KEY".to_string(), "sk-test".to_string())]),
            EmbeddingFunctionOptions::default(),
        );
        let err = collection.embedding_function(&resolver).err().unwrap();
        assert!(err.to_string().contains("consistent_hash"));
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_embed_query_texts_uses_effective_function() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/embed")
                    .json_body(json!({"model": "nomic-embed-text", "input": ["hello"]}));
                then.status(200)
                    .json_body(json!({"model": "nomic-embed-text", "embeddings": [[0.5, 0.5]]}));
            })
            .await;

        let mut collection = Collection::from_wire(&wire_collection(json!({}))).unwrap();
        collection.configuration = Some(
            CollectionConfiguration::builder()
                .embedding_function(
                    EmbeddingFunctionSpec::known("ollama")
                        .with_config("url", server.base_url())
                        .with_config("model_name", "nomic-embed-text"),
                )
                .build()
                .unwrap(),
        );
        let client = ChromaClient::new(RecordingTransport::default(), "tenant", "db");
        let collection = ChromaCollection::new(client, collection);

        let resolver = EmbeddingFunctionResolver::with_env(
            HashMap::new(),
            EmbeddingFunctionOptions::default(),
        );
        let embeddings = collection
            .embed_query_texts(&resolver, &["hello"])
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(embeddings, vec![vec![0.5, 0.5]]);
    }

    #[tokio::test]
    async fn test_embed_query_texts_without_function() {
        let collection = collection_with(None, None, None);
        let resolver = EmbeddingFunctionResolver::new(EmbeddingFunctionOptions::default());
        let err = collection
            .embed_query_texts(&resolver, &["hello"])
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::NoEmbeddingFunction { .. }));
        assert!(err.to_string().contains("supply query embeddings directly"));
    }

    fn hnsw_collection(transport: Arc<RecordingTransport>) -> ChromaCollection<RecordingTransport> {
        let collection = Collection::from_wire(&wire_collection(json!({
            "hnsw:space": "cosine",
            "hnsw:M": 16,
            "hnsw:search_ef": 100,
            "hnsw:num_threads": 2
        })))
        .unwrap();
        let client = ChromaClient::from_shared(transport, "tenant", "db");
        ChromaCollection::new(client, collection)
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_family_switch_is_rejected_before_any_request() {
        let transport = Arc::new(RecordingTransport::default());
        let mut collection = hnsw_collection(Arc::clone(&transport));
        let update = UpdateCollectionConfiguration::builder()
            .spann_search_nprobe(32)
            .and_then(|builder| builder.build())
            .unwrap();

        let err = collection.modify_configuration(&update).await.unwrap_err();
        assert!(matches!(
            err,
            CollectionError::Configuration(ConfigurationError::IndexFamilySwitch)
        ));
        assert!(err
            .to_string()
            .contains("cannot switch collection index parameters between HNSW and SPANN"));
        assert_eq!(err.code(), ErrorCodes::InvalidArgument);
        assert!(transport.requests().is_empty());
        assert_eq!(
            collection.configuration().unwrap().index().family(),
            Some(IndexFamily::Hnsw)
        );
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_update_is_sent_and_merged() {
        let transport = Arc::new(RecordingTransport::default());
        let mut collection = hnsw_collection(Arc::clone(&transport));
        let collection_id = collection.id();
        let update = UpdateCollectionConfiguration::builder()
            .hnsw_search_ef(200)
            .and_then(|builder| builder.hnsw_num_threads(4))
            .and_then(|builder| builder.build())
            .unwrap();

        collection.modify_configuration(&update).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::PUT);
        assert_eq!(requests[0].operation, "collection_modify_configuration");
        assert_eq!(
            requests[0].path,
            format!("/api/v2/tenants/tenant/databases/db/collections/{collection_id}")
        );
        assert_eq!(
            requests[0].body,
            Some(json!({"new_configuration": {"hnsw": {"ef_search": 200, "num_threads": 4}}}))
        );

        let hnsw = collection.configuration().unwrap().hnsw().unwrap();
        assert_eq!(hnsw.ef_search(), Some(200));
        assert_eq!(hnsw.num_threads(), Some(4));
        assert_eq!(hnsw.max_neighbors(), Some(16));
        assert_eq!(collection.configuration().unwrap().space(), Some(Space::Cosine));
    }

    #[tokio::test]
    async fn test_failed_request_leaves_configuration_untouched() {
        let transport = Arc::new(RecordingTransport::failing(500));
        let mut collection = hnsw_collection(Arc::clone(&transport));
        let before = collection.configuration().cloned();
        let update = UpdateCollectionConfiguration::builder()
            .hnsw_search_ef(300)
            .and_then(|builder| builder.build())
            .unwrap();

        let err = collection.modify_configuration(&update).await.unwrap_err();
        assert!(matches!(err, CollectionError::Transport(_)));
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(collection.configuration().cloned(), before);
    }
}
