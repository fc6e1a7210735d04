//! Download strategies for GET and HEAD
//!
//! The gateway either streams objects itself (proxy mode) or hands out a
//! presigned storage URL (redirect mode). The choice is made once at startup.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use super::conditional::{self, ServePlan};
use super::error::ApiError;
use crate::content::ContentMeta;
use crate::storage::{ObjectStore, ResponseOverrides};

/// A GET or HEAD for one storage key
pub struct ReadRequest<'a> {
    pub key: &'a str,
    /// HEAD: headers only, no object bytes are fetched
    pub head_only: bool,
    /// Request headers, for conditional and range handling
    pub headers: &'a HeaderMap,
    pub meta: ContentMeta,
}

/// Resolves a download into a response
#[async_trait]
pub trait ReadStrategy: Send + Sync {
    async fn resolve(
        &self,
        store: &dyn ObjectStore,
        request: ReadRequest<'_>,
    ) -> Result<Response, ApiError>;
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::debug!("Dropping unrepresentable {} header: {:?}", name, value),
    }
}

/// Streams object bytes through the gateway
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyRead;

#[async_trait]
impl ReadStrategy for ProxyRead {
    async fn resolve(
        &self,
        store: &dyn ObjectStore,
        request: ReadRequest<'_>,
    ) -> Result<Response, ApiError> {
        let info = store.stat(request.key).await.map_err(|e| {
            if e.is_not_found() {
                tracing::warn!("Storage error: {}", e);
            } else {
                tracing::error!("Storage error: {}", e);
            }
            ApiError::Storage
        })?;

        // Modification times are not tracked, so every response is "fresh"
        let modified = SystemTime::now();

        let mut headers = HeaderMap::new();
        set_header(&mut headers, header::CONTENT_DISPOSITION, request.meta.disposition.as_str());
        set_header(&mut headers, header::LAST_MODIFIED, &httpdate::fmt_http_date(modified));
        if let Some(etag) = &info.etag {
            set_header(&mut headers, header::ETAG, etag);
        }

        let plan = conditional::evaluate(request.headers, &info, modified);
        let (status, range) = match plan {
            ServePlan::NotModified => return Ok((StatusCode::NOT_MODIFIED, headers).into_response()),
            ServePlan::PreconditionFailed => {
                return Ok((StatusCode::PRECONDITION_FAILED, headers).into_response())
            }
            ServePlan::Unsatisfiable => {
                return Err(ApiError::RangeNotSatisfiable { size: info.size })
            }
            ServePlan::Full => (StatusCode::OK, None),
            ServePlan::Partial(range) => (StatusCode::PARTIAL_CONTENT, Some(range)),
        };

        set_header(&mut headers, header::CONTENT_TYPE, &request.meta.content_type);
        set_header(&mut headers, header::ACCEPT_RANGES, "bytes");
        let length = match range {
            Some(range) => {
                set_header(&mut headers, header::CONTENT_RANGE, &range.content_range(info.size));
                range.len()
            }
            None => info.size,
        };
        set_header(&mut headers, header::CONTENT_LENGTH, &length.to_string());

        if request.head_only {
            return Ok((status, headers).into_response());
        }

        // Pinned to the stat'ed version so a concurrent overwrite cannot
        // produce a body that disagrees with Content-Length
        let stream = store
            .get(request.key, range, info.etag.as_deref())
            .await
            .map_err(|e| {
                tracing::error!("Storage error: {}", e);
                ApiError::Storage
            })?;

        Ok((status, headers, Body::from_stream(stream)).into_response())
    }
}

/// Redirects clients to a presigned storage URL
#[derive(Debug, Clone, Copy)]
pub struct RedirectRead {
    ttl: Duration,
}

impl RedirectRead {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }
}

#[async_trait]
impl ReadStrategy for RedirectRead {
    async fn resolve(
        &self,
        store: &dyn ObjectStore,
        request: ReadRequest<'_>,
    ) -> Result<Response, ApiError> {
        // Existence is checked by the backend when the URL is followed
        let overrides = ResponseOverrides::from(&request.meta);
        let url = store
            .presign_get(request.key, self.ttl, &overrides)
            .await
            .map_err(|e| {
                tracing::error!("Storage error: {}", e);
                ApiError::Storage
            })?;

        let location = HeaderValue::from_str(&url).map_err(|_| {
            tracing::error!("Storage error: presigned URL is not a valid header value");
            ApiError::Storage
        })?;

        Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
    }
}
