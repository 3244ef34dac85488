use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::expand::ExpansionStrategy;

/// Cache behaviour, the `cache` table in config.toml.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Strategy used by `Model::expand` callers that do not pick one.
    /// TOML: `cache.expansion` (`"manual"` or `"aggregate"`). Default: `manual`.
    #[serde(default)]
    pub expansion: ExpansionStrategy,

    /// How long a connection waits on a locked database.
    /// TOML: `cache.busy_timeout_secs`. Default: `5`.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expansion: ExpansionStrategy::default(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl CacheConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

fn default_busy_timeout_secs() -> u64 {
    5
}
