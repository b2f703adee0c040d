// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub health: HealthConfig,
    pub storage: StorageConfig,
    #[serde(default = "default_resources")]
    pub resources: Vec<ResourceConfig>,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Listen backlog passed to `listen(2)`
    pub backlog: i32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Minimum level written: error, warn, info or debug
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Seconds allowed for buffering a request body
    pub read_timeout: u64,
    pub max_connections: Option<u64>,
    /// Seconds to wait for open connections on shutdown
    pub shutdown_grace: u64,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub max_body_size: u64,
}

/// Health check configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HealthConfig {
    /// Enable health check endpoints
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    /// Liveness probe path (default: /healthz)
    #[serde(default = "default_healthz_path")]
    pub liveness_path: String,
    /// Readiness probe path (default: /readyz)
    #[serde(default = "default_readyz_path")]
    pub readiness_path: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_health_enabled() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_healthz_path() -> String {
    "/healthz".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_readyz_path() -> String {
    "/readyz".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            liveness_path: default_healthz_path(),
            readiness_path: default_readyz_path(),
        }
    }
}

/// Persistence backend selection
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    File,
    Redis,
}

/// Storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Snapshot file for the file backend
    pub path: String,
    /// Connection URL for the redis backend
    pub url: String,
    /// Key prefix for the redis backend
    pub namespace: String,
}

/// How record identifiers are typed, generated and parsed from paths
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// JSON integers, generated from a monotonic counter
    #[default]
    Numeric,
    /// JSON strings, generated as UUID v4
    Text,
}

/// Field filled in on insert when the client leaves it out
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FieldDefault {
    pub field: String,
    pub value: serde_json::Value,
}

/// Read-only field rendered from a `{field}` template
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DerivedField {
    pub name: String,
    pub template: String,
}

/// One exposed resource collection
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ResourceConfig {
    /// Collection name, also the path segment (e.g. "users")
    pub name: String,
    /// Singular display name (e.g. "User"); derived from `name` when absent
    #[serde(default)]
    pub label: Option<String>,
    /// Path prefix in front of the collection segment (e.g. "/api")
    #[serde(default)]
    pub mount: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default)]
    pub id_policy: IdPolicy,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub unique: Vec<String>,
    #[serde(default)]
    pub defaults: Vec<FieldDefault>,
    #[serde(default)]
    pub timestamps: bool,
    #[serde(default)]
    pub derived: Vec<DerivedField>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_id_field() -> String {
    "id".to_string()
}

impl ResourceConfig {
    /// Bare resource with default id handling and no schema rules
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            mount: String::new(),
            id_field: default_id_field(),
            id_policy: IdPolicy::Numeric,
            required: Vec::new(),
            unique: Vec::new(),
            defaults: Vec::new(),
            timestamps: false,
            derived: Vec::new(),
        }
    }
}

/// Resources served when none are configured
pub fn default_resources() -> Vec<ResourceConfig> {
    let mut users = ResourceConfig::named("users");
    users.required = vec!["name".to_string(), "email".to_string()];
    users.unique = vec!["email".to_string()];
    users.timestamps = true;

    let mut products = ResourceConfig::named("products");
    products.required = vec!["name".to_string()];
    products.timestamps = true;
    products.defaults = vec![
        FieldDefault {
            field: "quantity".to_string(),
            value: serde_json::json!(0),
        },
        FieldDefault {
            field: "price".to_string(),
            value: serde_json::json!(0),
        },
    ];

    vec![users, products]
}
