use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use store::BackendConfig;

/// Key used when none is configured. Development only.
pub const DEMO_API_KEY: &str = "demo-key-12345";

/// Which listeners the process runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// Native HTTP/JSON API only.
    Http,
    /// gRPC API only.
    Grpc,
    /// gRPC API plus an HTTP facade that forwards to it.
    #[default]
    Hybrid,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub mode: ServerMode,

    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,

    /// Key every caller must present (`X-Api-Key` header / `x-api-key` metadata)
    #[serde(default)]
    pub api_key: String,

    /// Storage backend
    #[serde(default)]
    pub database: BackendConfig,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How long the HTTP listener may drain in-flight requests on shutdown
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// How long the gRPC listener may drain on shutdown; 0 stops it at once
    #[serde(default)]
    pub grpc_drain_secs: u64,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: ServerMode::default(),
            bind_addr: default_bind_addr(),
            http_port: default_http_port(),
            grpc_port: default_grpc_port(),
            api_key: String::new(),
            database: BackendConfig::default(),
            timeout_secs: default_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            grpc_drain_secs: 0,
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a `.env` file, an optional `recipebox` config
    /// file and `RECIPEBOX_*` environment variables, in increasing priority.
    ///
    /// Nested keys use a double underscore, e.g. `RECIPEBOX_DATABASE__KIND=sqlite`.
    pub fn load() -> anyhow::Result<Self> {
        // A missing .env file is the normal case.
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("recipebox").required(false))
            .add_source(
                config::Environment::with_prefix("RECIPEBOX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: ServerConfig = builder.build()?.try_deserialize()?;

        if config.api_key.is_empty() {
            tracing::warn!("No API key configured, using demo key '{DEMO_API_KEY}'");
            config.api_key = DEMO_API_KEY.to_string();
        }

        Ok(config)
    }

    /// Address the HTTP listener binds to
    pub fn http_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.http_port);
        Ok(addr_str.parse()?)
    }

    /// Address the gRPC listener binds to
    pub fn grpc_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.grpc_port);
        Ok(addr_str.parse()?)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn grpc_drain(&self) -> Duration {
        Duration::from_secs(self.grpc_drain_secs)
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_grpc_port() -> u16 {
    50051
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.mode, ServerMode::Hybrid);
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.grpc_port, 50051);
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(cfg.grpc_drain(), Duration::ZERO);
        assert!(matches!(cfg.database, BackendConfig::InMemory));
    }

    #[test]
    fn test_socket_addrs() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_addr().unwrap().port(), 8080);
        assert_eq!(cfg.grpc_addr().unwrap().port(), 50051);

        let cfg = ServerConfig {
            bind_addr: "not an address".into(),
            ..ServerConfig::default()
        };
        assert!(cfg.http_addr().is_err());
    }

    #[test]
    fn test_deserialize_from_map() {
        let cfg: ServerConfig = config::Config::builder()
            .set_override("mode", "grpc")
            .unwrap()
            .set_override("grpc_port", 6000)
            .unwrap()
            .set_override("api_key", "secret")
            .unwrap()
            .set_override("database.kind", "sqlite")
            .unwrap()
            .set_override("database.url", "sqlite://recipes.db")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.mode, ServerMode::Grpc);
        assert_eq!(cfg.grpc_port, 6000);
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.api_key, "secret");
        assert!(matches!(cfg.database, BackendConfig::Sqlite { ref url, .. } if url == "sqlite://recipes.db"));
    }
}
