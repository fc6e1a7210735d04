//! Object Storage Module
//!
//! The gateway keeps no state of its own: every object lives in a single
//! bucket of an S3-compatible store. This module defines the narrow contract
//! the HTTP layer relies on and the S3 implementation of it.

mod s3;
#[cfg(test)]
pub(crate) mod memory;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::io::AsyncRead;

use crate::config::GatewayConfig;
use crate::content::ContentMeta;
use crate::error::Result;

pub use self::s3::S3Store;

/// Request body handed to [`ObjectStore::put`]
pub type ObjectBody = Box<dyn AsyncRead + Send + Unpin>;

/// Object bytes returned by [`ObjectStore::get`]
pub type ObjectStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Result of a successful upload.
///
/// Only the size is reported: rust-s3's streaming upload discards the
/// response headers, so the backend's ETag is not available here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTag {
    /// Bytes written
    pub size: u64,
}

/// Object metadata fetched without transferring the body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub size: u64,
    pub etag: Option<String>,
}

/// Inclusive byte range within an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for an object of `size` bytes
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Response headers the backend should set when serving a presigned URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseOverrides {
    pub content_type: String,
    pub content_disposition: String,
}

impl ResponseOverrides {
    /// Query parameters understood by S3 presigned GETs
    pub fn to_query(&self) -> HashMap<String, String> {
        let mut query = HashMap::new();
        query.insert("response-content-type".to_string(), self.content_type.clone());
        query.insert(
            "response-content-disposition".to_string(),
            self.content_disposition.clone(),
        );
        query
    }
}

impl From<&ContentMeta> for ResponseOverrides {
    fn from(meta: &ContentMeta) -> Self {
        Self {
            content_type: meta.content_type.clone(),
            content_disposition: meta.disposition.as_str().to_string(),
        }
    }
}

/// Operations the gateway needs from an object store.
///
/// The bucket is fixed when the store is constructed. No call is retried;
/// a failure is reported once and the client decides whether to try again.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket this store writes to
    fn bucket(&self) -> &str;

    /// Check whether the bucket exists
    async fn bucket_exists(&self) -> Result<bool>;

    /// Stream `body` into `key`, storing content type and disposition with it.
    ///
    /// When `length` is known the body is cut off after that many bytes.
    async fn put(
        &self,
        key: &str,
        body: ObjectBody,
        length: Option<u64>,
        meta: &ContentMeta,
    ) -> Result<ObjectTag>;

    /// Fetch object metadata only
    async fn stat(&self, key: &str) -> Result<ObjectInfo>;

    /// Stream the object, or a byte range of it.
    ///
    /// With `etag` set the read is conditional: if the object was replaced
    /// since it was stat'ed, the backend refuses it instead of sending bytes
    /// that disagree with headers already computed from the old version.
    async fn get(
        &self,
        key: &str,
        range: Option<ByteRange>,
        etag: Option<&str>,
    ) -> Result<ObjectStream>;

    /// Build a time-limited GET URL. Works for keys that do not exist;
    /// the backend answers 404 when the URL is used.
    async fn presign_get(
        &self,
        key: &str,
        ttl: Duration,
        overrides: &ResponseOverrides,
    ) -> Result<String>;
}

/// Build the configured store and check that its bucket is reachable.
///
/// Failing to query the bucket is fatal. A bucket reported as missing only
/// logs a warning: some providers report existing buckets as absent, and the
/// query succeeding already proves the credentials work.
pub async fn connect(config: &GatewayConfig) -> Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(config)?);
    check_bucket(store.as_ref()).await?;
    Ok(store)
}

async fn check_bucket(store: &dyn ObjectStore) -> Result<()> {
    if store.bucket_exists().await? {
        tracing::info!("S3 bucket '{}' found", store.bucket());
    } else {
        tracing::warn!(
            "Bucket does not exist (or the S3 service misreports it): {}",
            store.bucket()
        );
    }
    Ok(())
}
