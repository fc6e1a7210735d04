//! WolfDrop Configuration
//!
//! This module provides configuration structures for the WolfDrop
//! upload gateway. The configuration is read once at startup and never
//! mutated afterwards.
//!
//! Settings are grouped into `[server]`, `[s3]` and `[logging]` tables.
//! Flat prosody-filer style files (`listenport`, `uploadSubDir`,
//! `s3endpoint`, `s3bucket`, ...) are not read and must be converted:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:5050"      # listenport
//! secret = "muchsecret"        # secret
//! upload_subdir = "upload"     # uploadSubDir
//! proxy_mode = false           # proxymode
//!
//! [s3]
//! endpoint = "s3.example.com"  # s3endpoint
//! access_key = "..."           # s3accesskey
//! secret_key = "..."           # s3secretkey
//! tls = true                   # s3tls
//! bucket = "uploads"           # s3bucket
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides `s3.access_key`
pub const ENV_ACCESS_KEY: &str = "AWS_ACCESS_KEY_ID";

/// Environment variable that overrides `s3.secret_key`
pub const ENV_SECRET_KEY: &str = "AWS_SECRET_ACCESS_KEY";

/// Main WolfDrop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP server and upload settings
    pub server: ServerConfig,

    /// Object storage backend
    pub s3: S3Config,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Shared secret used to sign upload URLs
    pub secret: String,

    /// URL subpath that uploads are served under
    #[serde(default = "default_upload_subdir")]
    pub upload_subdir: String,

    /// Stream objects through the gateway instead of redirecting to a presigned URL
    #[serde(default)]
    pub proxy_mode: bool,

    /// Lifetime of presigned URLs handed out in redirect mode
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u64,
}

/// S3-compatible object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Endpoint host (`host[:port]`) or full URL
    pub endpoint: String,

    /// Access key
    #[serde(default)]
    pub access_key: String,

    /// Secret access key
    #[serde(default)]
    pub secret_key: String,

    /// Use HTTPS when the endpoint carries no scheme
    #[serde(default = "default_true")]
    pub tls: bool,

    /// Bucket holding uploaded files
    pub bucket: String,

    /// Region name sent in request signatures
    #[serde(default = "default_region")]
    pub region: String,

    /// Path-style bucket addressing (`endpoint/bucket/key`)
    #[serde(default = "default_true")]
    pub path_style: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_listen() -> String {
    "0.0.0.0:5050".to_string()
}

fn default_upload_subdir() -> String {
    "upload".to_string()
}

fn default_presign_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_true() -> bool {
    true
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file, applying environment overrides
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: GatewayConfig = toml::from_str(&content)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: GatewayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace storage credentials with values from the environment.
    ///
    /// The standard AWS variables win over whatever the file contains.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_ACCESS_KEY) {
            tracing::info!("Loading S3 access key from {} instead of config", ENV_ACCESS_KEY);
            self.s3.access_key = key;
        }
        if let Some(secret) = lookup(ENV_SECRET_KEY) {
            tracing::info!("Loading S3 secret key from {} instead of config", ENV_SECRET_KEY);
            self.s3.secret_key = secret;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.secret.is_empty() {
            return Err(crate::Error::Config("server.secret cannot be empty".into()));
        }

        if self.server.listen.parse::<SocketAddr>().is_err() {
            return Err(crate::Error::Config(format!(
                "server.listen is not a valid socket address: {}",
                self.server.listen
            )));
        }

        if self.server.presign_ttl_secs == 0 {
            return Err(crate::Error::Config("server.presign_ttl_secs must be positive".into()));
        }

        if self.s3.endpoint.is_empty() {
            return Err(crate::Error::Config("s3.endpoint cannot be empty".into()));
        }

        if self.s3.bucket.is_empty() {
            return Err(crate::Error::Config("s3.bucket cannot be empty".into()));
        }

        Ok(())
    }

    /// Request path prefix that uploads live under, e.g. `/upload`.
    ///
    /// Empty when the gateway owns the whole URL space.
    pub fn route_prefix(&self) -> String {
        let subdir = self.server.upload_subdir.trim_matches('/');
        if subdir.is_empty() {
            String::new()
        } else {
            format!("/{}", subdir)
        }
    }

    /// Endpoint URL with a scheme chosen from the `tls` flag when missing
    pub fn endpoint_url(&self) -> String {
        let endpoint = self.s3.endpoint.trim_end_matches('/');
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if self.s3.tls {
            format!("https://{}", endpoint)
        } else {
            format!("http://{}", endpoint)
        }
    }

    /// Get presigned URL lifetime as Duration
    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.server.presign_ttl_secs)
    }
}
