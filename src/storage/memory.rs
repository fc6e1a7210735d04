//! In-memory object store for handler tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::io::AsyncReadExt;

use super::{ByteRange, ObjectBody, ObjectInfo, ObjectStore, ObjectStream, ObjectTag, ResponseOverrides};
use crate::content::ContentMeta;
use crate::error::{Error, Result};

/// Stored object with the metadata it was uploaded with
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub meta: ContentMeta,
}

/// HashMap-backed [`ObjectStore`] that counts body transfers
pub struct MemoryStore {
    bucket: String,
    objects: RwLock<HashMap<String, StoredObject>>,
    bucket_exists: AtomicBool,
    failing: AtomicBool,
    body_reads: AtomicUsize,
    replace_after_stat: Mutex<Option<(String, Bytes)>>,
}

fn etag_for(data: &Bytes) -> String {
    format!("\"{:016x}\"", data.len())
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: RwLock::new(HashMap::new()),
            bucket_exists: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            body_reads: AtomicUsize::new(0),
            replace_after_stat: Mutex::new(None),
        }
    }

    /// Insert an object directly, bypassing signature checks
    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        let object = StoredObject {
            data: data.into(),
            meta: ContentMeta::for_key(key),
        };
        self.objects.write().unwrap().insert(key.to_string(), object);
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    /// Number of `get` calls that transferred object bytes
    pub fn body_reads(&self) -> usize {
        self.body_reads.load(Ordering::SeqCst)
    }

    pub fn set_bucket_exists(&self, exists: bool) {
        self.bucket_exists.store(exists, Ordering::SeqCst);
    }

    /// Make every operation fail as if the backend were unreachable
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Overwrite `key` right after the next `stat` of it, as a concurrent
    /// upload landing between two backend calls would
    pub fn replace_after_stat(&self, key: &str, data: impl Into<Bytes>) {
        *self.replace_after_stat.lock().unwrap() = Some((key.to_string(), data.into()));
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::Network("backend unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_exists(&self) -> Result<bool> {
        self.check_available()?;
        Ok(self.bucket_exists.load(Ordering::SeqCst))
    }

    async fn put(
        &self,
        key: &str,
        body: ObjectBody,
        length: Option<u64>,
        meta: &ContentMeta,
    ) -> Result<ObjectTag> {
        self.check_available()?;

        let mut data = Vec::new();
        match length {
            Some(len) => body.take(len).read_to_end(&mut data).await?,
            None => {
                let mut body = body;
                body.read_to_end(&mut data).await?
            }
        };

        let size = data.len() as u64;
        let object = StoredObject {
            data: Bytes::from(data),
            meta: meta.clone(),
        };
        self.objects.write().unwrap().insert(key.to_string(), object);

        Ok(ObjectTag { size })
    }

    async fn stat(&self, key: &str) -> Result<ObjectInfo> {
        self.check_available()?;
        let object = self
            .object(key)
            .ok_or_else(|| Error::ObjectNotFound(key.to_string()))?;

        let info = ObjectInfo {
            size: object.data.len() as u64,
            etag: Some(etag_for(&object.data)),
        };

        let pending = self.replace_after_stat.lock().unwrap().take();
        if let Some((pending_key, data)) = pending {
            if pending_key == key {
                self.insert(key, data);
            } else {
                *self.replace_after_stat.lock().unwrap() = Some((pending_key, data));
            }
        }

        Ok(info)
    }

    async fn get(
        &self,
        key: &str,
        range: Option<ByteRange>,
        etag: Option<&str>,
    ) -> Result<ObjectStream> {
        self.check_available()?;
        let object = self
            .object(key)
            .ok_or_else(|| Error::ObjectNotFound(key.to_string()))?;
        if let Some(expected) = etag {
            if expected != etag_for(&object.data) {
                return Err(Error::S3Status {
                    operation: "get",
                    key: key.to_string(),
                    status: 412,
                });
            }
        }
        self.body_reads.fetch_add(1, Ordering::SeqCst);

        let data = match range {
            Some(range) => object.data.slice(range.start as usize..=range.end as usize),
            None => object.data,
        };
        Ok(futures::stream::once(async move { Ok(data) }).boxed())
    }

    async fn presign_get(
        &self,
        key: &str,
        ttl: Duration,
        overrides: &ResponseOverrides,
    ) -> Result<String> {
        self.check_available()?;
        Ok(format!(
            "https://storage.test/{}{}?X-Amz-Expires={}&response-content-type={}&response-content-disposition={}",
            self.bucket,
            key,
            ttl.as_secs(),
            urlencoding::encode(&overrides.content_type),
            urlencoding::encode(&overrides.content_disposition),
        ))
    }
}
