use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use warp::http::Uri;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_ENV: &str = "FACEGATE_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Daemon configuration.
///
/// Built from defaults, an optional TOML file, then `FACEGATE_*`
/// environment variables, in that order of precedence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Listen address (default: 127.0.0.1).
    pub host: String,
    /// Listen port (default: 3001).
    pub port: u16,
    /// Base URL of the external recognition service.
    pub external_service_base_url: String,
    /// The single browser origin allowed by CORS.
    pub allowed_origin: String,
    /// Upper bound on request body size.
    pub max_payload_bytes: u64,
    /// Directory used for temp artifacts.
    pub scratch_dir: PathBuf,
    /// Timeout in seconds for one upstream call.
    pub upstream_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            external_service_base_url: "http://127.0.0.1:8000".to_string(),
            allowed_origin: "http://localhost:5173".to_string(),
            max_payload_bytes: 10 * 1024 * 1024,
            scratch_dir: std::env::temp_dir().join("facegate"),
            upstream_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration: `$FACEGATE_CONFIG` if set, then env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `FACEGATE_*` environment variables on top of `self`.
    fn with_env_overrides(self) -> Self {
        Self {
            host: env_string("FACEGATE_HOST", self.host),
            port: env_u16("FACEGATE_PORT", self.port),
            external_service_base_url: env_string(
                "FACEGATE_EXTERNAL_SERVICE_BASE_URL",
                self.external_service_base_url,
            ),
            allowed_origin: env_string("FACEGATE_ALLOWED_ORIGIN", self.allowed_origin),
            max_payload_bytes: env_u64("FACEGATE_MAX_PAYLOAD_BYTES", self.max_payload_bytes),
            scratch_dir: std::env::var("FACEGATE_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(self.scratch_dir),
            upstream_timeout_secs: env_u64(
                "FACEGATE_UPSTREAM_TIMEOUT_SECS",
                self.upstream_timeout_secs,
            ),
        }
    }

    /// Reject values the server cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        if self.port == 0 {
            return Err(invalid("port", "must be non-zero"));
        }
        if self.max_payload_bytes == 0 {
            return Err(invalid("max_payload_bytes", "must be non-zero"));
        }
        if self.upstream_timeout_secs == 0 {
            return Err(invalid("upstream_timeout_secs", "must be non-zero"));
        }

        let base = parse_http_uri("external_service_base_url", &self.external_service_base_url)?;
        if base.query().is_some() {
            return Err(invalid("external_service_base_url", "must not carry a query"));
        }

        let origin = parse_http_uri("allowed_origin", &self.allowed_origin)?;
        if !matches!(origin.path(), "" | "/") || origin.query().is_some() {
            return Err(invalid(
                "allowed_origin",
                "must be scheme://host[:port] without a path",
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e| invalid("host", format!("{:?}: {e}", self.host)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Allowed origin in the form CORS compares against (no trailing slash).
    pub fn cors_origin(&self) -> &str {
        self.allowed_origin.trim_end_matches('/')
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn parse_http_uri(field: &'static str, value: &str) -> Result<Uri, ConfigError> {
    let uri: Uri = value
        .parse()
        .map_err(|e| invalid(field, format!("{value:?}: {e}")))?;
    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        _ => return Err(invalid(field, format!("{value:?}: scheme must be http or https"))),
    }
    if uri.authority().is_none() {
        return Err(invalid(field, format!("{value:?}: missing host")));
    }
    Ok(uri)
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
