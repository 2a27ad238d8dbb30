use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::logic::CascadeOptions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cascade: CascadeConfig,
    pub cache: CacheConfig,
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Select the first candidate of each stage as soon as it loads
    pub auto_select: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    /// Share one in-flight fetch between concurrent callers
    pub single_flight: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// JSON resource catalog served by the file-backed provider
    pub catalog_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub reports_dir: String,
    /// Report files the HTTP API may import; relative paths resolve here
    pub imports_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3002,
        }
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self { auto_select: true }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            single_flight: false,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            catalog_path: "resources.json".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            reports_dir: "saved-reports".to_string(),
            imports_dir: "imports".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional config file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        config = config.add_source(config::File::with_name("config").required(false));

        // e.g. MIGRATION_CACHE__TTL_SECONDS=60
        config = config.add_source(
            config::Environment::with_prefix("MIGRATION")
                .separator("__")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn cascade_options(&self) -> CascadeOptions {
        CascadeOptions {
            auto_select: self.cascade.auto_select,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_seconds)
    }
}
