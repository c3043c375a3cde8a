//! Engine configuration
//!
//! Configuration comes from three places, later ones winning:
//! built-in defaults, a JSON document, and environment variables.
//!
//! ```
//! use oxcmm_core::config::Config;
//!
//! let config = Config::from_json_str(r#"{ "module_paths": ["/opt/cmm"] }"#).unwrap();
//! assert_eq!(config.module_paths.len(), 1);
//! assert_eq!(config.module_marker, "_cmm_module");
//! ```

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::cache::CachePolicy;
use crate::error::Result;
use crate::options::Options;
use crate::profile::ProfileDefault;

/// Module search path list, separated like `PATH`
pub const MODULE_PATH_ENV: &str = "OXCMM_MODULE_PATH";

/// Maximum entries per profile/conversion cache; unset or 0 means unbounded
pub const CACHE_LIMIT_ENV: &str = "OXCMM_CACHE_LIMIT";

/// Marker a module library's file name must contain, also the symbol suffix
pub const MODULE_MARKER: &str = "_cmm_module";

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directories scanned for module libraries
    pub module_paths: Vec<PathBuf>,
    /// File name marker of module libraries
    pub module_marker: String,
    /// Eviction policy of the profile and conversion caches
    pub cache_policy: CachePolicy,
    /// Files backing the well-known default profiles
    pub default_profiles: BTreeMap<ProfileDefault, PathBuf>,
    /// Filter option overrides, addressed by slash paths
    pub options: Options,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            module_paths: Vec::new(),
            module_marker: MODULE_MARKER.to_string(),
            cache_policy: CachePolicy::Unbounded,
            default_profiles: BTreeMap::new(),
            options: Options::new(),
        }
    }
}

impl Config {
    /// Defaults overlaid with environment variables
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Apply [`MODULE_PATH_ENV`] and [`CACHE_LIMIT_ENV`].
    ///
    /// Environment module paths are searched before configured ones.
    pub fn with_env(mut self) -> Self {
        if let Some(paths) = env::var_os(MODULE_PATH_ENV) {
            let mut from_env: Vec<PathBuf> = env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            from_env.retain(|p| !self.module_paths.contains(p));
            from_env.append(&mut self.module_paths);
            self.module_paths = from_env;
        }
        if let Ok(limit) = env::var(CACHE_LIMIT_ENV) {
            match limit.trim().parse::<usize>() {
                Ok(0) => self.cache_policy = CachePolicy::Unbounded,
                Ok(n) => self.cache_policy = CachePolicy::MaxEntries(n),
                Err(e) => {
                    tracing::warn!(value = %limit, error = %e, "ignoring {CACHE_LIMIT_ENV}");
                }
            }
        }
        self
    }
}

static CURRENT: Lazy<RwLock<Arc<Config>>> = Lazy::new(|| RwLock::new(Arc::new(Config::from_env())));

/// Install the process-wide configuration
pub fn install(config: Config) {
    *CURRENT.write() = Arc::new(config);
}

/// The process-wide configuration
pub fn current() -> Arc<Config> {
    CURRENT.read().clone()
}
