//! Collection records and request payloads exchanged with the server.

mod collection;
mod requests;

pub use collection::*;
pub use requests::*;
