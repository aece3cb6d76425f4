use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::error::{ClassifiedError, ErrorKind};

/// Construction-time configuration for an [`ApiService`](crate::pipeline::ApiService).
/// There is no runtime reconfiguration; build a new service instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOptions {
    /// Base URL every descriptor path is appended to.
    pub base_url: String,

    /// Transport timeout applied at the HTTP client level.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Response cache capacity (entries).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Response cache entry lifetime.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Maximum simultaneously in-flight requests.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Optional bound on the admission wait queue; unbounded when absent.
    #[serde(default)]
    pub queue_limit: Option<usize>,

    /// Payload encryption secret; the encryption module is only installed
    /// when this is present.
    #[serde(default)]
    pub encryption_secret: Option<String>,

    /// Path (relative to `base_url`) of the token refresh endpoint.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Buffer size of the error event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_timeout_secs() -> u64 {
    10
}
fn default_cache_capacity() -> usize {
    50
}
fn default_cache_ttl_ms() -> u64 {
    60_000
}
fn default_max_concurrent() -> usize {
    8
}
fn default_refresh_path() -> String {
    "/api/user/refresh".to_string()
}
fn default_event_capacity() -> usize {
    64
}

impl ServiceOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_ms: default_cache_ttl_ms(),
            max_concurrent: default_max_concurrent(),
            queue_limit: None,
            encryption_secret: None,
            refresh_path: default_refresh_path(),
            event_capacity: default_event_capacity(),
        }
    }

    pub fn from_file(path: &str) -> Result<Self, ClassifiedError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ClassifiedError::new(ErrorKind::Unknown, format!("reading options file: {e}")))?;
        serde_json::from_str(&raw)
            .map_err(|e| ClassifiedError::new(ErrorKind::Unknown, format!("parsing options file: {e}")))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn refresh_url(&self) -> String {
        format!("{}{}", self.base_url, self.refresh_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let options = ServiceOptions::new("https://api.example.com");
        assert_eq!(options.timeout(), Duration::from_secs(10));
        assert_eq!(options.cache_capacity, 50);
        assert_eq!(options.cache_ttl(), Duration::from_millis(60_000));
        assert_eq!(options.max_concurrent, 8);
        assert!(options.queue_limit.is_none());
        assert!(options.encryption_secret.is_none());
        assert_eq!(options.refresh_url(), "https://api.example.com/api/user/refresh");
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "base_url": "https://api.example.com",
                "max_concurrent": 4,
                "cache_ttl_ms": 5000
            }}"#
        )
        .unwrap();

        let options = ServiceOptions::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(options.base_url, "https://api.example.com");
        assert_eq!(options.max_concurrent, 4);
        assert_eq!(options.cache_ttl(), Duration::from_millis(5000));
        assert_eq!(options.timeout_secs, 10);
    }

    #[test]
    fn test_from_file_missing_path() {
        assert!(ServiceOptions::from_file("/nonexistent/options.json").is_err());
    }
}
