//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path where the SQLite database lives.
    /// Env: `DATABASE_PATH`
    /// Default: platform data directory.
    pub database_path: Option<PathBuf>,

    /// Filesystem path where uploaded attachments are stored.
    /// Env: `ATTACHMENT_PATH`
    /// Default: `./attachments`
    pub attachment_path: PathBuf,

    /// Public base URL under which attachments are served.
    /// Env: `ATTACHMENT_BASE_URL`
    /// Default: `http://localhost:8080/attachments`
    pub attachment_base_url: String,

    /// Maximum attachment size in bytes (10 MiB).
    pub max_attachment_size: usize,

    /// Per-IP sustained request rate (requests per second).
    /// Env: `RATE_LIMIT_RPS`
    /// Default: `10`
    pub rate_limit_rps: f64,

    /// Per-IP burst capacity.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: `30`
    pub rate_limit_burst: f64,

    /// Per-user write budget per minute (message/channel creation).
    /// Env: `WRITE_LIMIT_PER_MINUTE`
    /// Default: `40`
    pub write_limit_per_minute: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: None,
            attachment_path: PathBuf::from("./attachments"),
            attachment_base_url: "http://localhost:8080/attachments".to_string(),
            max_attachment_size: 10 * 1024 * 1024, // 10 MiB
            rate_limit_rps: 10.0,
            rate_limit_burst: 30.0,
            write_limit_per_minute: 40,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("ATTACHMENT_PATH") {
            config.attachment_path = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("ATTACHMENT_BASE_URL") {
            config.attachment_base_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(val) = std::env::var("RATE_LIMIT_RPS") {
            if let Ok(n) = val.parse::<f64>() {
                config.rate_limit_rps = n;
            }
        }

        if let Ok(val) = std::env::var("RATE_LIMIT_BURST") {
            if let Ok(n) = val.parse::<f64>() {
                config.rate_limit_burst = n;
            }
        }

        if let Ok(val) = std::env::var("WRITE_LIMIT_PER_MINUTE") {
            if let Ok(n) = val.parse::<usize>() {
                config.write_limit_per_minute = n;
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.write_limit_per_minute, 40);
    }
}
