//! Transport-facing helpers: error-to-response mapping and token
//! extraction. Routing itself belongs to the embedding server.

pub mod error;

pub use error::*;
