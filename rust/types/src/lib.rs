mod api_types;
mod cmek;
mod collection_configuration;
mod collection_schema;
mod embedding_function;
mod hnsw_configuration;
mod spann_configuration;
#[cfg(any(test, feature = "testing"))]
pub mod strategies;
mod validators;
mod wire;

pub use api_types::*;
pub use cmek::*;
pub use collection_configuration::*;
pub use collection_schema::*;
pub use embedding_function::*;
pub use hnsw_configuration::*;
pub use spann_configuration::*;
pub use validators::{ConfigurationError, ParseEnumError};
pub use wire::*;
