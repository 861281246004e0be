//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use serde::Deserialize;
use url::Url;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Server Configuration ===
    /// Address the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    // === Earth Engine ===
    /// Path to the service-account JSON key.
    #[serde(default = "default_key_path")]
    pub service_account_key_path: PathBuf,

    /// Cloud project used for Earth Engine calls (falls back to the key's project_id).
    #[serde(default)]
    pub ee_project: Option<String>,

    /// Earth Engine REST API base URL.
    #[serde(default = "default_api_url")]
    pub ee_api_url: String,

    /// Scenes must have CLOUD_COVER strictly below this percentage.
    #[serde(default = "default_cloud_cover_ceiling")]
    pub cloud_cover_ceiling: f64,

    /// Optional request timeout for remote calls. Unset means no timeout.
    #[serde(default)]
    pub http_timeout_ms: Option<u64>,

    // === Observability ===
    /// Expose Prometheus metrics on a separate listener.
    #[serde(default)]
    pub metrics_enabled: bool,

    /// Port for the Prometheus exporter.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_key_path() -> PathBuf {
    PathBuf::from("service-account-key.json")
}

fn default_api_url() -> String {
    "https://earthengine.googleapis.com".to_string()
}

fn default_cloud_cover_ceiling() -> f64 {
    50.0
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            service_account_key_path: default_key_path(),
            ee_project: None,
            ee_api_url: default_api_url(),
            cloud_cover_ceiling: default_cloud_cover_ceiling(),
            http_timeout_ms: None,
            metrics_enabled: false,
            metrics_port: default_metrics_port(),
            rust_log: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("PORT must be non-zero".to_string());
        }

        if !(self.cloud_cover_ceiling > 0.0 && self.cloud_cover_ceiling <= 100.0) {
            return Err("CLOUD_COVER_CEILING must be in (0, 100]".to_string());
        }

        let api = Url::parse(&self.ee_api_url)
            .map_err(|e| format!("EE_API_URL is not a valid URL: {}", e))?;
        if api.scheme() != "http" && api.scheme() != "https" {
            return Err("EE_API_URL must use http or https".to_string());
        }

        if self.metrics_enabled && self.metrics_port == self.port {
            return Err("METRICS_PORT must differ from PORT".to_string());
        }

        Ok(())
    }

    /// API base URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.ee_api_url.trim_end_matches('/')
    }
}
