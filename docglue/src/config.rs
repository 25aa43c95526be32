//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `DOCGLUE_`, nested keys separated by `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/docglue/{service_name}/config.toml
//! 4. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DOCGLUE_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// MongoDB connection configuration
    #[serde(default)]
    pub mongodb: MongoConfig,

    /// Cross-origin policy
    #[serde(default)]
    pub cors: CorsConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

/// MongoDB connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// Connection string
    #[serde(default = "default_mongo_uri")]
    pub uri: String,

    /// Default database for typed clients
    #[serde(default = "default_database")]
    pub database: String,

    /// Application name reported to the server
    #[serde(default)]
    pub app_name: Option<String>,

    /// Connect and initial ping timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Server selection timeout in seconds
    #[serde(default = "default_server_selection_timeout")]
    pub server_selection_timeout_secs: u64,
}

impl MongoConfig {
    /// Connect timeout as a `Duration`
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Server selection timeout as a `Duration`
    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_secs(self.server_selection_timeout_secs)
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: default_mongo_uri(),
            database: default_database(),
            app_name: None,
            connect_timeout_secs: default_connect_timeout(),
            server_selection_timeout_secs: default_server_selection_timeout(),
        }
    }
}

/// Cross-origin policy applied by [`CorsLayer`](crate::middleware::CorsLayer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Value of `Access-Control-Allow-Headers`
    #[serde(default = "default_allowed_headers")]
    pub allowed_headers: String,

    /// Value of `Access-Control-Allow-Origin`
    #[serde(default = "default_allow_origin")]
    pub allow_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_headers: default_allowed_headers(),
            allow_origin: default_allow_origin(),
        }
    }
}

impl CorsConfig {
    /// Override the allowed request headers
    pub fn with_allowed_headers(mut self, headers: impl Into<String>) -> Self {
        self.allowed_headers = headers.into();
        self
    }

    /// Override the allowed origin
    pub fn with_allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }
}

fn default_service_name() -> String {
    "docglue".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mongo_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "docglue".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_server_selection_timeout() -> u64 {
    30
}

fn default_allowed_headers() -> String {
    "Content-Type, Authorization".to_string()
}

fn default_allow_origin() -> String {
    "http://localhost".to_string()
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name used for the XDG lookup is inferred from the binary name.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(default_service_name);

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so later files override earlier ones
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// This bypasses XDG directories and loads directly from the given path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Config file paths in priority order (highest first)
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix("docglue");
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Some(path) = xdg_dirs.find_config_file(&config_file_path) {
            paths.push(path);
        }

        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.mongodb.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.cors.allowed_headers, "Content-Type, Authorization");
        assert_eq!(config.cors.allow_origin, "http://localhost");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[service]
name = "orders"

[mongodb]
uri = "mongodb://db:27017"
database = "shop"

[cors]
allow_origin = "https://shop.example"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.service.name, "orders");
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.mongodb.uri, "mongodb://db:27017");
        assert_eq!(config.mongodb.database, "shop");
        assert_eq!(config.mongodb.server_selection_timeout_secs, 30);
        assert_eq!(config.cors.allow_origin, "https://shop.example");
        assert_eq!(config.cors.allowed_headers, "Content-Type, Authorization");
    }

    #[test]
    fn test_cors_builder() {
        let cors = CorsConfig::default()
            .with_allowed_headers("X-Custom")
            .with_allow_origin("https://app.example");
        assert_eq!(cors.allowed_headers, "X-Custom");
        assert_eq!(cors.allow_origin, "https://app.example");
    }
}
