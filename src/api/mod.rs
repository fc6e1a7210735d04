//! HTTP API Module
//!
//! A single wildcard route under the configured upload prefix accepts signed
//! PUT uploads and serves GET/HEAD downloads, either by proxying object bytes
//! or by redirecting to a presigned storage URL.

mod conditional;
mod error;
mod http;
mod read;

pub use error::ApiError;
pub use http::{router, storage_key, AppState, HttpServer, ALLOWED_METHODS};
pub use read::{ProxyRead, ReadRequest, ReadStrategy, RedirectRead};
