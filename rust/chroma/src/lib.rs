//! Collection handles and embedding function resolution for the Chroma AI-native database.
//!
//! This crate covers the client side of a Chroma collection's configuration: how the
//! configuration travels on the wire, which embedding function a collection uses, and how
//! configuration updates are checked before they reach the server.
//!
//! # Core Types
//!
//! - [`ChromaClient`] - Creates and fetches collections through a pluggable [`transport::Transport`]
//! - [`ChromaCollection`] - Collection handle exposing the effective embedding function and configuration updates
//! - [`EmbeddingFunctionResolver`] - Builds a live embedding function from a persisted spec
//! - [`EmbeddingFunctionOptions`] - Provider endpoints and timeouts, loaded from YAML and the environment
//!
//! # Quick Start
//!
//! ```
//! use chroma_collection::{ChromaClient, EmbeddingFunctionOptions, EmbeddingFunctionResolver};
//! use chroma_collection::transport::Transport;
//!
//! # async fn example<T: Transport>(transport: T) -> Result<(), Box<dyn std::error::Error>> {
//! let client = ChromaClient::new(transport, "default_tenant", "default_database");
//! let collection = client.get_collection("docs").await?;
//!
//! let resolver = EmbeddingFunctionResolver::new(EmbeddingFunctionOptions::load()?);
//! let embeddings = collection
//!     .embed_query_texts(&resolver, &["how do I tune HNSW?"])
//!     .await?;
//! println!("Embedded into {} dimensions", embeddings[0].len());
//! # Ok(())
//! # }
//! ```
//!
//! # Updating a Collection's Configuration
//!
//! ```
//! # use chroma_collection::ChromaCollection;
//! # use chroma_collection::transport::Transport;
//! use chroma_collection_types::UpdateCollectionConfiguration;
//!
//! # async fn example<T: Transport>(mut collection: ChromaCollection<T>) -> Result<(), Box<dyn std::error::Error>> {
//! let update = UpdateCollectionConfiguration::builder()
//!     .hnsw_search_ef(200)?
//!     .build()?;
//! collection.modify_configuration(&update).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Every error type implements [`chroma_error::ChromaError`], so callers can branch on
//! [`chroma_error::ErrorCodes`] without matching individual variants.
//!
//! # Feature Flags
//!
//! - `default` - Enables `rustls` for TLS support
//! - `native-tls` - Use native system TLS (OpenSSL on Linux, Secure Transport on macOS)
//! - `rustls` - Use pure-Rust TLS implementation

#![deny(missing_docs)]

pub mod client;
mod collection;
pub mod config;
pub mod embed;
pub mod transport;
pub mod types;

pub use client::ChromaClient;
pub use collection::{ChromaCollection, CollectionError};
pub use config::EmbeddingFunctionOptions;
pub use embed::EmbeddingFunctionResolver;

#[cfg(test)]
pub(crate) mod tests {
    use crate::transport::{Transport, TransportError, TransportRequest};
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    #[derive(Debug)]
    enum Response {
        Body(Value),
        Status(u16),
    }

    /// Records every request and answers each one the same way.
    #[derive(Debug)]
    pub(crate) struct RecordingTransport {
        response: Response,
        requests: Mutex<Vec<TransportRequest>>,
    }

    impl Default for RecordingTransport {
        fn default() -> Self {
            Self::returning(json!({}))
        }
    }

    impl RecordingTransport {
        pub(crate) fn returning(body: Value) -> Self {
            RecordingTransport {
                response: Response::Body(body),
                requests: Mutex::new(vec![]),
            }
        }

        pub(crate) fn failing(status: u16) -> Self {
            RecordingTransport {
                response: Response::Status(status),
                requests: Mutex::new(vec![]),
            }
        }

        pub(crate) fn requests(&self) -> Vec<TransportRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait::async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: TransportRequest) -> Result<Value, TransportError> {
            let operation = request.operation.clone();
            self.requests.lock().push(request);
            match &self.response {
                Response::Body(body) => Ok(body.clone()),
                Response::Status(status) => Err(TransportError::Status {
                    operation,
                    status: *status,
                    message: "rejected".to_string(),
                }),
            }
        }
    }

    /// A server collection response carrying `configuration_json`.
    pub(crate) fn wire_collection(configuration_json: Value) -> Value {
        json!({
            "id": "0b9e7c1e-4f0c-4d7f-a0a4-3c1c0f5e2a61",
            "name": "docs",
            "configuration_json": configuration_json,
            "metadata": null,
            "tenant": "tenant",
            "database": "db",
        })
    }
}
