// Configuration module entry point
// Loads layered configuration and holds the shared runtime state

mod state;
mod types;

use std::collections::HashSet;
use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    default_resources, BackendKind, Config, DerivedField, FieldDefault, IdPolicy, ResourceConfig,
};

/// Default config file (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("CRUD")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.backlog", 128)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.shutdown_grace", 5)?
            .set_default("http.server_name", "crud-server/0.1")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 1_048_576)? // 1MB
            .set_default("storage.backend", "file")?
            .set_default("storage.path", "data.json")?
            .set_default("storage.url", "redis://127.0.0.1:6379/")?
            .set_default("storage.namespace", "crud")?
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject resource tables that would make routing ambiguous
    fn validate(&self) -> Result<(), config::ConfigError> {
        let mut seen = HashSet::new();
        for resource in &self.resources {
            let name = resource.name.trim_matches('/');
            if name.is_empty() || name.contains('/') {
                return Err(config::ConfigError::Message(format!(
                    "invalid resource name '{}'",
                    resource.name
                )));
            }
            if !seen.insert(name) {
                return Err(config::ConfigError::Message(format!(
                    "resource '{name}' configured twice"
                )));
            }
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
