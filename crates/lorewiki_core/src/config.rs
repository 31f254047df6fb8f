//! Store configuration.
//!
//! Values resolve in priority order:
//! 1. Environment variables (`LOREWIKI_DATABASE_PATH`, `LOREWIKI_LOG_LEVEL`, ...).
//! 2. The TOML file passed to [`WikiConfig::load`], when it exists.
//! 3. Compiled defaults.
//!
//! | Key | Default |
//! |-----|---------|
//! | `database_path` | `lorewiki.db` |
//! | `busy_timeout_ms` | `5000` |
//! | `list_default_limit` | `20` |
//! | `list_max_limit` | `100` |
//! | `default_category` | `general` |
//! | `slug_scripts` | all supported scripts |
//! | `log_level` | `info` |
//! | `log_dir` | unset (file logging off) |

use crate::model::address::{Category, Script, SlugPolicy, DEFAULT_CATEGORY};
use crate::query::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::service::StoreSettings;
use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] confique::Error),
    #[error("invalid configuration value for `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Configuration for the wiki store, stored in `lorewiki.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WikiConfig {
    /// SQLite database file.
    #[config(env = "LOREWIKI_DATABASE_PATH", default = "lorewiki.db")]
    pub database_path: PathBuf,

    /// Upper bound on waiting for a database lock.
    #[config(env = "LOREWIKI_BUSY_TIMEOUT_MS", default = 5000)]
    pub busy_timeout_ms: u64,

    /// Page size used when a list request names none.
    #[config(env = "LOREWIKI_LIST_DEFAULT_LIMIT", default = 20)]
    pub list_default_limit: u32,

    /// Largest page size a list request may ask for.
    #[config(env = "LOREWIKI_LIST_MAX_LIMIT", default = 100)]
    pub list_max_limit: u32,

    /// Category for pages created from a title without one.
    #[config(env = "LOREWIKI_DEFAULT_CATEGORY", default = "general")]
    pub default_category: String,

    /// Scripts whose letters survive slug normalization.
    #[config(
        env = "LOREWIKI_SLUG_SCRIPTS",
        parse_env = confique::env::parse::list_by_comma,
        default = [
            "latin", "greek", "cyrillic", "hangul", "han", "hiragana",
            "katakana", "arabic", "hebrew", "thai", "devanagari"
        ]
    )]
    pub slug_scripts: Vec<String>,

    #[config(env = "LOREWIKI_LOG_LEVEL", default = "info")]
    pub log_level: String,

    /// Absolute directory for rolling log files; unset keeps logging off.
    #[config(env = "LOREWIKI_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("lorewiki.db"),
            busy_timeout_ms: 5000,
            list_default_limit: DEFAULT_LIST_LIMIT,
            list_max_limit: MAX_LIST_LIMIT,
            default_category: DEFAULT_CATEGORY.to_string(),
            slug_scripts: Script::ALL
                .iter()
                .map(|script| script.as_str().to_string())
                .collect(),
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl WikiConfig {
    /// Loads configuration from the environment, an optional TOML file and
    /// compiled defaults. A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Self::builder().env();
        if let Some(path) = path {
            builder = builder.file(path);
        }
        let config = builder.load()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the store cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.list_max_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "list_max_limit",
                message: "must be at least 1".to_string(),
            });
        }
        if self.list_default_limit > self.list_max_limit {
            return Err(ConfigError::Invalid {
                key: "list_default_limit",
                message: format!("must not exceed list_max_limit ({})", self.list_max_limit),
            });
        }
        if let Some(unknown) = self
            .slug_scripts
            .iter()
            .find(|name| Script::parse(name).is_none())
        {
            return Err(ConfigError::Invalid {
                key: "slug_scripts",
                message: format!("unknown script `{unknown}`"),
            });
        }
        Category::normalize(&self.default_category).map_err(|err| ConfigError::Invalid {
            key: "default_category",
            message: err.to_string(),
        })?;
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Settings the page service runs with.
    pub fn store_settings(&self) -> Result<StoreSettings, ConfigError> {
        self.validate()?;
        let default_category =
            Category::normalize(&self.default_category).map_err(|err| ConfigError::Invalid {
                key: "default_category",
                message: err.to_string(),
            })?;
        Ok(StoreSettings {
            busy_timeout: self.busy_timeout(),
            list_default_limit: self.list_default_limit,
            list_max_limit: self.list_max_limit,
            default_category,
            slug_policy: SlugPolicy::from_names(&self.slug_scripts),
        })
    }
}
