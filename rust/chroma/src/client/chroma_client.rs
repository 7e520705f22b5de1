use std::sync::Arc;

use chroma_collection_types::DeserializationError;
use chroma_error::{ChromaError, ErrorCodes};
use reqwest::Method;
use thiserror::Error;

use crate::collection::ChromaCollection;
use crate::transport::{Transport, TransportError, TransportRequest};
use crate::types::{Collection, CreateCollectionRequest};

/// Errors that originate from the Chroma client during request execution.
#[derive(Error, Debug)]
pub enum ChromaClientError {
    /// The transport failed to deliver the request or the server rejected it.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The server response could not be parsed.
    #[error("Invalid response: {0}")]
    Deserialization(#[from] DeserializationError),
}

impl ChromaError for ChromaClientError {
    fn code(&self) -> ErrorCodes {
        match self {
            ChromaClientError::Transport(err) => err.code(),
            ChromaClientError::Deserialization(_) => ErrorCodes::Internal,
        }
    }
}

/// Client handle scoped to one tenant and database.
///
/// Requests go through the [`Transport`] the client was built with, so authentication,
/// retries and connection pooling are whatever the caller plugs in.
///
/// # Examples
///
/// ```
/// use chroma_collection::ChromaClient;
/// use chroma_collection::types::CreateCollectionRequest;
/// use chroma_collection::transport::Transport;
///
/// # async fn example<T: Transport>(transport: T) -> Result<(), Box<dyn std::error::Error>> {
/// let client = ChromaClient::new(transport, "default_tenant", "default_database");
/// let collection = client
///     .create_collection(CreateCollectionRequest::builder().name("docs").build())
///     .await?;
/// assert_eq!(collection.name(), "docs");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChromaClient<T: Transport> {
    transport: Arc<T>,
    tenant: String,
    database: String,
}

impl<T: Transport> Clone for ChromaClient<T> {
    fn clone(&self) -> Self {
        ChromaClient {
            transport: Arc::clone(&self.transport),
            tenant: self.tenant.clone(),
            database: self.database.clone(),
        }
    }
}

impl<T: Transport> ChromaClient<T> {
    /// Creates a client that sends every request through `transport`.
    pub fn new(transport: T, tenant: impl Into<String>, database: impl Into<String>) -> Self {
        Self::from_shared(Arc::new(transport), tenant, database)
    }

    /// Creates a client sharing an existing transport.
    pub fn from_shared(
        transport: Arc<T>,
        tenant: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        ChromaClient {
            transport,
            tenant: tenant.into(),
            database: database.into(),
        }
    }

    /// The tenant requests are scoped to.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// The database requests are scoped to.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Creates a collection, or returns the existing one when `get_or_create` is set.
    ///
    /// # Errors
    ///
    /// Fails when the server rejects the request or returns a malformed collection.
    pub async fn create_collection(
        &self,
        request: CreateCollectionRequest,
    ) -> Result<ChromaCollection<T>, ChromaClientError> {
        let request = TransportRequest::new(
            "create_collection",
            Method::POST,
            self.collections_path(),
        )
        .with_body(request.to_body());
        let collection = self.send_for_collection(request).await?;
        Ok(ChromaCollection::new(self.clone(), collection))
    }

    /// Fetches a collection by name.
    ///
    /// # Errors
    ///
    /// Fails when the collection does not exist or the response is malformed.
    pub async fn get_collection(
        &self,
        name: impl AsRef<str>,
    ) -> Result<ChromaCollection<T>, ChromaClientError> {
        let request = TransportRequest::new(
            "get_collection",
            Method::GET,
            format!("{}/{}", self.collections_path(), name.as_ref()),
        );
        let collection = self.send_for_collection(request).await?;
        Ok(ChromaCollection::new(self.clone(), collection))
    }

    pub(crate) fn collections_path(&self) -> String {
        format!(
            "/api/v2/tenants/{}/databases/{}/collections",
            self.tenant, self.database
        )
    }

    pub(crate) async fn send(
        &self,
        request: TransportRequest,
    ) -> Result<serde_json::Value, TransportError> {
        tracing::trace!(operation = %request.operation, method = %request.method, path = %request.path, "Sending request");
        let response = self.transport.send(request).await;
        if let Err(err) = &response {
            tracing::trace!(error = %err, "Request failed");
        }
        response
    }

    async fn send_for_collection(
        &self,
        request: TransportRequest,
    ) -> Result<Collection, ChromaClientError> {
        let response = self.send(request).await?;
        Ok(Collection::from_wire(&response)?)
    }
}
