//! Store configuration.
//!
//! Resolution order, lowest to highest precedence:
//! built-in defaults, `config.toml` (explicit path or the platform config
//! dir), environment variables (a `.env` file is honored), CLI flags.
//!
//! ```toml
//! db_path = "/var/lib/sentences/sentences.db"
//! busy_timeout_ms = 5000
//! default_page_size = 50
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage::sqlite::StoreOptions;

pub const ENV_DB_PATH: &str = "SENTENCES_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "SENTENCES_BUSY_TIMEOUT_MS";
pub const ENV_PAGE_SIZE: &str = "SENTENCES_PAGE_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file; `<data dir>/sentences.db` when unset.
    pub db_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    /// Page size used by `search` when none is given.
    pub default_page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_timeout_ms: 5_000,
            default_page_size: 50,
        }
    }
}

impl StoreConfig {
    /// Load configuration from `path`, or from the platform config file when
    /// `path` is `None` and that file exists, then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = dotenvy::var(ENV_DB_PATH) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Ok(ms) = dotenvy::var(ENV_BUSY_TIMEOUT_MS) {
            self.busy_timeout_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("{ENV_BUSY_TIMEOUT_MS} must be an integer, got '{ms}'"))?;
        }
        if let Ok(size) = dotenvy::var(ENV_PAGE_SIZE) {
            self.default_page_size = size
                .trim()
                .parse()
                .with_context(|| format!("{ENV_PAGE_SIZE} must be an integer, got '{size}'"))?;
        }
        Ok(())
    }

    /// Database path: `db_override`, then the configured path, then the default.
    pub fn resolve_db_path(&self, db_override: Option<PathBuf>) -> PathBuf {
        db_override
            .or_else(|| self.db_path.clone())
            .unwrap_or_else(crate::default_db_path)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

/// `<config dir>/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "classified-sentences", "classified-sentences")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
