//! WolfDrop - Signed Upload Gateway
//!
//! A small HTTP gateway that accepts HMAC-signed uploads and stores them in
//! an S3-compatible bucket. Uploaded files are served back either by
//! streaming them through the gateway or by redirecting to a presigned
//! storage URL.
//!
//! # Architecture
//!
//! An upload URL is `/<subdir>/<key>?v=<mac>` where `mac` is the hex
//! HMAC-SHA256 of `"<key> <content length>"` under a secret shared with
//! the issuing chat server. Everything the gateway knows about a file
//! lives in the bucket; the gateway itself is stateless.
//!
//! # Features
//!
//! - Constant-time signature verification bound to key and length
//! - Streaming uploads with content type and disposition metadata
//! - Proxy mode with conditional and range requests
//! - Redirect mode with presigned URLs and response header overrides
//! - CORS headers for browser clients
//!
//! # Configuration
//!
//! The TOML file uses `[server]`, `[s3]` and `[logging]` tables. Existing
//! prosody-filer `config.toml` files with flat keys such as `listenport`
//! or `s3bucket` are rejected and need converting; see [`config`].

pub mod api;
pub mod config;
pub mod content;
pub mod error;
pub mod signature;
pub mod storage;

pub use config::GatewayConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{AppState, HttpServer, ReadStrategy};
    pub use crate::config::GatewayConfig;
    pub use crate::content::{ContentMeta, Disposition};
    pub use crate::error::{Error, Result};
    pub use crate::storage::{ObjectStore, S3Store};
}
