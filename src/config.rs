use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "MarkerVault";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default transmission unit: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// 50 MiB ceiling for a single lab report.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &["application/pdf", "image/*", "text/plain"];

/// Filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "markervault=info,markervault_lib=info,tower_http=warn"
}

/// Get the application data directory
/// ~/MarkerVault/ on all platforms
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// SQLite file used by the reference persistence server.
pub fn database_path() -> PathBuf {
    app_data_dir().join("markers.db")
}

/// Where received chunks are staged and assembled.
pub fn staging_dir() -> PathBuf {
    app_data_dir().join("staging")
}

/// Upload and collaborator settings for the ingestion side.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    pub chunk_size: u64,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_file_size: u64,
    /// Exact media types or `type/*` wildcards.
    pub allowed_types: Vec<String>,
    pub upload_url: String,
    pub extraction_url: String,
    pub markers_url: String,
    pub request_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|s| s.to_string()).collect(),
            upload_url: "http://127.0.0.1:8787/api/uploads/chunk".into(),
            extraction_url: "http://127.0.0.1:8788/api/extract-markers".into(),
            markers_url: "http://127.0.0.1:8787/api/markers".into(),
            request_timeout_secs: 120,
        }
    }
}

impl IngestConfig {
    /// Defaults overridden by `MARKERVAULT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reads variables through `lookup` (testable).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "MARKERVAULT_CHUNK_SIZE") {
            if v > 0 {
                config.chunk_size = v;
            }
        }
        if let Some(v) = parse_var(&lookup, "MARKERVAULT_MAX_ATTEMPTS") {
            if v > 0 {
                config.max_attempts = v;
            }
        }
        if let Some(v) = parse_var::<u64>(&lookup, "MARKERVAULT_BASE_DELAY_MS") {
            config.base_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_var(&lookup, "MARKERVAULT_MAX_FILE_SIZE") {
            config.max_file_size = v;
        }
        if let Some(v) = parse_var(&lookup, "MARKERVAULT_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = v;
        }
        if let Some(types) = lookup("MARKERVAULT_ALLOWED_TYPES") {
            let parsed: Vec<String> = types
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.allowed_types = parsed;
            }
        }
        if let Some(url) = lookup("MARKERVAULT_UPLOAD_URL") {
            config.upload_url = url;
        }
        if let Some(url) = lookup("MARKERVAULT_EXTRACTION_URL") {
            config.extraction_url = url;
        }
        if let Some(url) = lookup("MARKERVAULT_MARKERS_URL") {
            config.markers_url = url;
        }

        config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Settings for the reference persistence server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub staging_dir: PathBuf,
    /// Largest multipart body accepted for one chunk.
    pub max_chunk_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".into(),
            database_path: database_path(),
            staging_dir: staging_dir(),
            max_chunk_bytes: (DEFAULT_CHUNK_SIZE as usize) * 4,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("MARKERVAULT_BIND") {
            config.bind_addr = addr;
        }
        if let Ok(dir) = std::env::var("MARKERVAULT_DATA_DIR") {
            let dir = PathBuf::from(dir);
            config.database_path = dir.join("markers.db");
            config.staging_dir = dir.join("staging");
        }
        config
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring malformed config value");
            None
        }
    }
}
