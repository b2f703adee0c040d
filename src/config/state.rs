// Application state module
// Everything a request handler needs, passed in explicitly

use super::types::Config;
use crate::persist::SharedBackend;
use crate::store::Registry;

/// Application state
pub struct AppState {
    pub config: Config,
    pub registry: Registry,
    /// Backend the registry writes through to; probed by readiness checks
    pub backend: SharedBackend,
}

impl AppState {
    pub const fn new(config: Config, registry: Registry, backend: SharedBackend) -> Self {
        Self {
            config,
            registry,
            backend,
        }
    }
}
