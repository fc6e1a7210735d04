//! HTTP API Server
//!
//! One wildcard route under the upload prefix. PUT stores a signed upload,
//! GET/HEAD serve it back, OPTIONS answers CORS preflights.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::{Query, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::read::{ProxyRead, ReadRequest, ReadStrategy, RedirectRead};
use crate::config::GatewayConfig;
use crate::content::ContentMeta;
use crate::error::{Error, Result};
use crate::signature;
use crate::storage::ObjectStore;

/// Methods served on the upload route
pub const ALLOWED_METHODS: &str = "OPTIONS, HEAD, GET, PUT";

/// Query parameter carrying the upload signature
const SIGNATURE_PARAM: &str = "v";

/// Shared application state, built once before serving
pub struct AppState {
    /// Shared HMAC secret
    pub secret: Vec<u8>,
    /// Path prefix stripped to obtain storage keys
    pub prefix: String,
    /// Object storage backend
    pub store: Arc<dyn ObjectStore>,
    /// Proxy or redirect downloads
    pub reader: Arc<dyn ReadStrategy>,
}

impl AppState {
    /// Create state from configuration and a connected store
    pub fn new(config: &GatewayConfig, store: Arc<dyn ObjectStore>) -> Self {
        let reader: Arc<dyn ReadStrategy> = if config.server.proxy_mode {
            Arc::new(ProxyRead)
        } else {
            Arc::new(RedirectRead::new(config.presign_ttl()))
        };

        Self {
            secret: config.server.secret.as_bytes().to_vec(),
            prefix: config.route_prefix(),
            store,
            reader,
        }
    }
}

/// HTTP server
pub struct HttpServer {
    listen: String,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: &GatewayConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            listen: config.server.listen.clone(),
            state: Arc::new(AppState::new(config, store)),
        }
    }

    /// Get the state for sharing with other components
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Start the HTTP server and run until Ctrl+C
    pub async fn start(&self) -> Result<()> {
        let app = router(Arc::clone(&self.state));

        let listener = tokio::net::TcpListener::bind(&self.listen).await?;
        tracing::info!(
            "Server started on {} (uploads under '{}/'). Waiting for requests.",
            self.listen,
            self.state.prefix
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Network(format!("HTTP server error: {}", e)))?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

/// Create the router.
///
/// CORS headers are set on every response, including errors.
pub fn router(state: Arc<AppState>) -> Router {
    let route = format!("{}/*key", state.prefix);

    Router::new()
        .route(&route, any(handle_request))
        .fallback(handle_unrouted)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static(ALLOWED_METHODS),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static("Authorization, Content-Type"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_MAX_AGE,
                    HeaderValue::from_static("7200"),
                )),
        )
        .with_state(state)
}

// ============ Handlers ============

async fn handle_request(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> std::result::Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    tracing::info!("Incoming request: {} {}", parts.method, parts.uri);

    let key = storage_key(&state.prefix, parts.uri.path());

    match parts.method {
        Method::OPTIONS => Ok(([(header::ALLOW, ALLOWED_METHODS)]).into_response()),
        Method::PUT => {
            let params = query_params(&parts.uri);
            let length = declared_length(&parts.headers, &body);
            handle_put(&state, &key, &params, length, body).await
        }
        Method::GET | Method::HEAD => {
            let request = ReadRequest {
                head_only: parts.method == Method::HEAD,
                headers: &parts.headers,
                meta: ContentMeta::for_key(&key),
                key: &key,
            };
            state.reader.resolve(state.store.as_ref(), request).await
        }
        _ => {
            tracing::warn!("Invalid method {}", parts.method);
            Err(ApiError::MethodNotAllowed)
        }
    }
}

async fn handle_put(
    state: &AppState,
    key: &str,
    params: &[(String, String)],
    length: Option<u64>,
    body: Body,
) -> std::result::Result<Response, ApiError> {
    let Some(supplied) = params
        .iter()
        .find(|(name, _)| name == SIGNATURE_PARAM)
        .map(|(_, value)| value.as_str())
    else {
        tracing::warn!("No HMAC attached to URL for {}", key);
        return Err(ApiError::MissingSignature);
    };

    tracing::info!(
        "Upload for {} with content length {}",
        key,
        length.map_or_else(|| "unknown".to_string(), |l| l.to_string())
    );

    if let Err(mismatch) = signature::verify(&state.secret, key, length, supplied) {
        tracing::warn!("Invalid MAC for {}, expected: {}", key, mismatch.expected);
        return Err(ApiError::InvalidSignature);
    }

    let meta = ContentMeta::for_key(key);
    let reader = StreamReader::new(
        body.into_data_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
    );

    match state.store.put(key, Box::new(reader), length, &meta).await {
        Ok(tag) => {
            tracing::info!("Successfully stored {} ({} bytes)", key, tag.size);
            Ok(StatusCode::CREATED.into_response())
        }
        Err(e) => {
            tracing::error!("Uploading file failed: {}", e);
            Err(ApiError::Backend)
        }
    }
}

async fn handle_unrouted(method: Method, uri: Uri) -> impl IntoResponse {
    tracing::info!("No route for {} {}", method, uri);
    (StatusCode::NOT_FOUND, "404 page not found\n")
}

// ============ Helpers ============

/// Derive the storage key by removing the route prefix from a request path.
///
/// The path is percent-decoded first. No other normalisation happens:
/// `..` segments are passed to the backend unchanged.
pub fn storage_key(prefix: &str, raw_path: &str) -> String {
    let path = match urlencoding::decode(raw_path) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("Failed to decode URL path {}: {}", raw_path, e);
            Cow::Borrowed(raw_path)
        }
    };
    path.strip_prefix(prefix).unwrap_or(&path).to_string()
}

/// Best-effort query parsing; a malformed query yields no parameters
fn query_params(uri: &Uri) -> Vec<(String, String)> {
    match Query::<Vec<(String, String)>>::try_from_uri(uri) {
        Ok(Query(params)) => params,
        Err(e) => {
            tracing::warn!("Failed to parse URL query params: {}", e);
            Vec::new()
        }
    }
}

/// Content length the client declared, falling back to the body's exact size
fn declared_length(headers: &HeaderMap, body: &Body) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| body.size_hint().exact())
}
