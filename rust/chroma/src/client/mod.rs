//! Client handle for collection-level operations against a Chroma deployment.
//!
//! This module contains:
//! - [`ChromaClient`] - Creates and fetches collections through a pluggable [`Transport`](crate::transport::Transport)
//! - [`ChromaClientError`] - Error type for client operations

mod chroma_client;

pub use chroma_client::*;
