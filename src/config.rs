use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::constants;
use crate::error::{DedupError, Result};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub roles: RoleConfig,
    pub normalize: NormalizeConfig,
}

/// Which columns play which role in deduplication.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoleConfig {
    pub entity_key_fields: Vec<String>,
    pub recency_field: String,
    /// Only used for duplicate reporting, never for grouping.
    pub identity_fields: Vec<String>,
    /// Count-like payload columns reported in the data-loss exposure summary.
    pub additive_fields: Vec<String>,
    pub flag_column: String,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            entity_key_fields: constants::default_entity_key_fields(),
            recency_field: constants::LAST_ACTIVE_COLUMN.to_string(),
            identity_fields: constants::default_identity_fields(),
            additive_fields: Vec::new(),
            flag_column: constants::IS_LATEST_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Encoding labels tried in order when decoding the input.
    pub encodings: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            encodings: constants::default_encodings(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            DedupError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Loads `path` when given; otherwise the `HOST_DEDUP_CONFIG` path or the
    /// default file name, falling back to built-in defaults if that file does
    /// not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let default_path = std::env::var(constants::CONFIG_PATH_ENV)
            .unwrap_or_else(|_| constants::DEFAULT_CONFIG_PATH.to_string());
        let default_path = Path::new(&default_path);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            tracing::debug!(path = %default_path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }
}
