//! Runtime configuration: defaults, then an optional TOML file, then
//! environment variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::performance::default_start_date;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "stockdash.toml";

/// Directory that bare database file names resolve into.
pub const DATABASE_DIR: &str = "database";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: String, value: String },
    #[error("provider `tiingo` requires TIINGO_API_KEY or `tiingo_api_key` in the config file")]
    MissingApiKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Yahoo,
    Tiingo,
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(Provider::Yahoo),
            "tiingo" => Ok(Provider::Tiingo),
            _ => Err(ConfigError::InvalidValue {
                key: "provider".into(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub stock_screener_path: PathBuf,
    pub etf_screener_path: PathBuf,
    pub history_dir: PathBuf,
    pub watermark_path: PathBuf,
    pub archive_dir: Option<PathBuf>,
    pub default_start_date: NaiveDate,
    pub request_timeout_secs: u64,
    pub request_delay_ms: u64,
    pub provider: Provider,
    #[serde(skip_serializing)]
    pub tiingo_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            database_path: Path::new(DATABASE_DIR).join("mock.db"),
            stock_screener_path: PathBuf::new(),
            etf_screener_path: PathBuf::new(),
            history_dir: PathBuf::new(),
            watermark_path: Path::new(DATABASE_DIR).join("metadata.json"),
            archive_dir: None,
            default_start_date: default_start_date(),
            request_timeout_secs: 10,
            request_delay_ms: 0,
            provider: Provider::Yahoo,
            tiingo_api_key: None,
        };
        config.set_data_dir(Path::new("data"));
        config
    }
}

impl Config {
    pub fn from_toml_str(body: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(body).map_err(|source| ConfigError::Toml {
            path: origin.to_string(),
            source,
        })
    }

    /// Load `path` if given (it must exist), else `stockdash.toml` if present,
    /// else defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
        };
        let mut config = match file {
            Some(file) => {
                let body = std::fs::read_to_string(&file).map_err(|source| ConfigError::Io {
                    path: file.display().to_string(),
                    source,
                })?;
                tracing::debug!(path = %file.display(), "Loaded config file");
                Self::from_toml_str(&body, &file.display().to_string())?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    ///
    /// `TARGET_DATABASE` given as a bare file name resolves inside `database/`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(target) = lookup("TARGET_DATABASE").filter(|v| !v.is_empty()) {
            let target = PathBuf::from(target);
            self.database_path = if target.components().count() == 1 {
                Path::new(DATABASE_DIR).join(target)
            } else {
                target
            };
        }
        if let Some(dir) = lookup("STOCKDASH_DATA_DIR").filter(|v| !v.is_empty()) {
            self.set_data_dir(Path::new(&dir));
        }
        if let Some(path) = lookup("STOCKDASH_WATERMARK").filter(|v| !v.is_empty()) {
            self.watermark_path = PathBuf::from(path);
        }
        if let Some(provider) = lookup("STOCKDASH_PROVIDER").filter(|v| !v.is_empty()) {
            self.provider = provider.parse()?;
        }
        if let Some(key) = lookup("TIINGO_API_KEY").filter(|v| !v.is_empty()) {
            self.tiingo_api_key = Some(key);
        }
        if let Some(secs) = lookup("STOCKDASH_TIMEOUT_SECS").filter(|v| !v.is_empty()) {
            self.request_timeout_secs = secs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "STOCKDASH_TIMEOUT_SECS".into(),
                value: secs.clone(),
            })?;
        }
        Ok(())
    }

    /// Point screener files and the history directory at `dir`.
    pub fn set_data_dir(&mut self, dir: &Path) {
        self.stock_screener_path = dir.join("nasdaq_stock_screener.csv");
        self.etf_screener_path = dir.join("nasdaq_etf_screener.csv");
        self.history_dir = dir.join("nasdaq");
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn tiingo_api_key(&self) -> Result<&str, ConfigError> {
        self.tiingo_api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey)
    }
}
