//! Environment-driven configuration.
//!
//! # Responsibility
//! - Collect storage, image and logging settings in one value passed down
//!   to constructors (no process-wide store handle).
//!
//! # Invariants
//! - Blank variables fall back to defaults.
//! - Unknown enum values are rejected rather than silently defaulted.

use crate::logging::{default_log_level, normalize_level};
use crate::model::category::CategoryPolicy;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "CATALOG_DB_PATH";
pub const ENV_JSON_PATH: &str = "CATALOG_JSON_PATH";
pub const ENV_IMAGE_DIR: &str = "CATALOG_IMAGE_DIR";
pub const ENV_BACKEND: &str = "CATALOG_BACKEND";
pub const ENV_CATEGORY_POLICY: &str = "CATALOG_CATEGORY_POLICY";
pub const ENV_LOG_LEVEL: &str = "CATALOG_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CATALOG_LOG_DIR";

const DEFAULT_DB_PATH: &str = "db/mercari.sqlite3";
const DEFAULT_JSON_PATH: &str = "db/items.json";
const DEFAULT_IMAGE_DIR: &str = "images";

/// Which [`crate::repo::ItemRepository`] implementation to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Json,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sql" => Some(Self::Sqlite),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub db_path: PathBuf,
    pub json_path: PathBuf,
    pub image_dir: PathBuf,
    pub backend: StorageBackend,
    pub category_policy: CategoryPolicy,
    pub log_level: String,
    /// `None` logs to stderr.
    pub log_dir: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            json_path: PathBuf::from(DEFAULT_JSON_PATH),
            image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
            backend: StorageBackend::default(),
            category_policy: CategoryPolicy::default(),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        variable: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue {
                variable,
                value,
                expected,
            } => write!(f, "invalid {variable} `{value}`; expected {expected}"),
        }
    }
}

impl Error for ConfigError {}

impl CatalogConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which returns a variable's raw value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(value) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(value);
        }
        if let Some(value) = read(ENV_JSON_PATH) {
            config.json_path = PathBuf::from(value);
        }
        if let Some(value) = read(ENV_IMAGE_DIR) {
            config.image_dir = PathBuf::from(value);
        }
        if let Some(value) = read(ENV_BACKEND) {
            config.backend =
                StorageBackend::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                    variable: ENV_BACKEND,
                    value,
                    expected: "sqlite|json",
                })?;
        }
        if let Some(value) = read(ENV_CATEGORY_POLICY) {
            config.category_policy =
                CategoryPolicy::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                    variable: ENV_CATEGORY_POLICY,
                    value,
                    expected: "lazy|strict",
                })?;
        }
        if let Some(value) = read(ENV_LOG_LEVEL) {
            config.log_level = normalize_level(&value)
                .ok_or_else(|| ConfigError::InvalidValue {
                    variable: ENV_LOG_LEVEL,
                    value,
                    expected: "trace|debug|info|warn|error",
                })?
                .to_string();
        }
        config.log_dir = read(ENV_LOG_DIR).map(PathBuf::from);
        Ok(config)
    }
}
