//! S3-compatible backend built on rust-s3

use std::time::Duration;

use ::s3::creds::Credentials;
use ::s3::region::Region;
use ::s3::Bucket;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use tokio::io::AsyncReadExt;

use super::{ByteRange, ObjectBody, ObjectInfo, ObjectStore, ObjectStream, ObjectTag, ResponseOverrides};
use crate::config::GatewayConfig;
use crate::content::ContentMeta;
use crate::error::{Error, Result};

/// Object store backed by a bucket on an S3-compatible service
pub struct S3Store {
    bucket: Box<Bucket>,
}

impl S3Store {
    /// Create a client for the configured endpoint and bucket.
    ///
    /// This does not touch the network.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let region = Region::Custom {
            region: config.s3.region.clone(),
            endpoint: config.endpoint_url(),
        };
        let credentials = Credentials::new(
            Some(&config.s3.access_key),
            Some(&config.s3.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| Error::Config(format!("invalid S3 credentials: {}", e)))?;

        let mut bucket = Bucket::new(&config.s3.bucket, region, credentials)?;
        if config.s3.path_style {
            bucket = bucket.with_path_style();
        }

        tracing::debug!(
            "S3 client for bucket '{}' at {}",
            config.s3.bucket,
            config.endpoint_url()
        );

        Ok(Self { bucket })
    }
}

fn check_status(operation: &'static str, key: &str, status: u16) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        404 => Err(Error::ObjectNotFound(key.to_string())),
        _ => Err(Error::S3Status {
            operation,
            key: key.to_string(),
            status,
        }),
    }
}

/// rust-s3 refuses ranges whose start equals their end. A one-byte range
/// is fetched as two bytes and `skip` says where the wanted byte starts.
fn widen_range(range: ByteRange) -> (u64, u64, usize) {
    if range.end > range.start {
        (range.start, range.end, 0)
    } else if range.start > 0 {
        (range.start - 1, range.start, 1)
    } else {
        (0, 1, 0)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket.name
    }

    async fn bucket_exists(&self) -> Result<bool> {
        // HEAD on the bucket itself; listing all buckets needs account-wide
        // rights that bucket-scoped credentials lack
        let (_, status) = self.bucket.head_object("/").await?;
        match status {
            200..=299 => Ok(true),
            404 => Ok(false),
            _ => Err(Error::S3Status {
                operation: "head bucket",
                key: self.bucket.name.clone(),
                status,
            }),
        }
    }

    async fn put(
        &self,
        key: &str,
        body: ObjectBody,
        length: Option<u64>,
        meta: &ContentMeta,
    ) -> Result<ObjectTag> {
        // rust-s3 has no per-request headers; extra headers live on the bucket handle
        let mut bucket = self.bucket.as_ref().clone();
        bucket.add_header("Content-Disposition", meta.disposition.as_str());

        let mut reader: ObjectBody = match length {
            Some(len) => Box::new(body.take(len)),
            None => body,
        };

        let response = bucket
            .put_object_stream_with_content_type(&mut reader, key, &meta.content_type)
            .await?;
        check_status("put", key, response.status_code())?;

        Ok(ObjectTag {
            size: response.uploaded_bytes() as u64,
        })
    }

    async fn stat(&self, key: &str) -> Result<ObjectInfo> {
        let (head, status) = self.bucket.head_object(key).await?;
        check_status("head", key, status)?;

        Ok(ObjectInfo {
            size: head.content_length.unwrap_or(0).max(0) as u64,
            etag: head.e_tag,
        })
    }

    async fn get(
        &self,
        key: &str,
        range: Option<ByteRange>,
        etag: Option<&str>,
    ) -> Result<ObjectStream> {
        let mut bucket = self.bucket.as_ref().clone();
        if let Some(etag) = etag {
            bucket.add_header("If-Match", etag);
        }

        match range {
            None => {
                let response = bucket.get_object_stream(key).await?;
                check_status("get", key, response.status_code)?;
                Ok(response
                    .bytes
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
                    .boxed())
            }
            Some(range) => {
                // Ranges are bounded by the client, so buffering the slice is fine
                let (start, end, skip) = widen_range(range);
                let response = bucket.get_object_range(key, start, Some(end)).await?;
                check_status("get", key, response.status_code())?;

                let data = response.bytes();
                let stop = (skip + range.len() as usize).min(data.len());
                let data = data.slice(skip.min(stop)..stop);
                Ok(futures::stream::once(async move { Ok(data) }).boxed())
            }
        }
    }

    async fn presign_get(
        &self,
        key: &str,
        ttl: Duration,
        overrides: &ResponseOverrides,
    ) -> Result<String> {
        // Offline operation: signed with our credentials, valid for any key
        let expiry = u32::try_from(ttl.as_secs()).unwrap_or(u32::MAX);
        let url = self
            .bucket
            .presign_get(key, expiry, Some(overrides.to_query()))
            .await?;
        Ok(url)
    }
}
