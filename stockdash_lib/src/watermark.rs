//! Per-symbol fetch checkpoints persisted as a small JSON file.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum WatermarkError {
    #[error("failed to access watermark file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed watermark file {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// Last date successfully stored, per symbol.
///
/// `last_end_date` mirrors the maximum over all symbols so older files that
/// only carry that key still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Watermarks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub symbols: BTreeMap<String, NaiveDate>,
}

impl Watermarks {
    /// Load from `path`. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self, WatermarkError> {
        let body = match std::fs::read_to_string(path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(WatermarkError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&body).map_err(|source| WatermarkError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    /// Write the store, replacing the previous file atomically.
    pub fn save(&self, path: &Path) -> Result<(), WatermarkError> {
        let io_error = |source: std::io::Error| WatermarkError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let body = serde_json::to_string_pretty(self).map_err(|source| WatermarkError::Json {
            path: path.display().to_string(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(io_error)?;
        std::fs::rename(&tmp, path).map_err(io_error)?;
        Ok(())
    }

    /// Remove the file at `path`. A missing file is not an error.
    pub fn clear(path: &Path) -> Result<(), WatermarkError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WatermarkError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// The global date of a file written before per-symbol checkpoints
    /// existed. Once any symbol has its own entry this is `None`.
    pub fn legacy_end_date(&self) -> Option<NaiveDate> {
        if self.symbols.is_empty() {
            self.last_end_date
        } else {
            None
        }
    }

    pub fn get(&self, symbol: &str) -> Option<NaiveDate> {
        self.symbols.get(symbol).copied()
    }

    /// Move `symbol`'s checkpoint to `date` if that is later. Returns whether
    /// anything changed.
    pub fn advance(&mut self, symbol: &str, date: NaiveDate) -> bool {
        let changed = match self.symbols.get(symbol) {
            Some(current) if *current >= date => false,
            _ => {
                self.symbols.insert(symbol.to_string(), date);
                true
            }
        };
        if self.last_end_date.map_or(true, |last| date > last) {
            self.last_end_date = Some(date);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let marks = Watermarks::load(&dir.path().join("metadata.json")).unwrap();
        assert_eq!(marks, Watermarks::default());
    }

    #[test]
    fn legacy_file_loads_global_date_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        std::fs::write(&path, r#"{"last_end_date": "2024-01-10"}"#).unwrap();
        let marks = Watermarks::load(&path).unwrap();
        assert_eq!(marks.last_end_date, Some(date("2024-01-10")));
        assert!(marks.symbols.is_empty());
        assert_eq!(marks.get("AAPL"), None);
        assert_eq!(marks.legacy_end_date(), Some(date("2024-01-10")));
    }

    #[test]
    fn legacy_date_ignored_once_symbols_are_tracked() {
        let mut marks = Watermarks {
            last_end_date: Some(date("2024-01-10")),
            ..Default::default()
        };
        marks.advance("AAPL", date("2024-01-05"));
        assert_eq!(marks.last_end_date, Some(date("2024-01-10")));
        assert_eq!(marks.legacy_end_date(), None);
    }

    #[test]
    fn clear_removes_file_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let mut marks = Watermarks::default();
        marks.advance("AAPL", date("2024-01-10"));
        marks.save(&path).unwrap();

        Watermarks::clear(&path).unwrap();
        assert!(!path.exists());
        Watermarks::clear(&path).unwrap();
        assert_eq!(Watermarks::load(&path).unwrap(), Watermarks::default());
    }

    #[test]
    fn malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Watermarks::load(&path),
            Err(WatermarkError::Json { .. })
        ));
    }

    #[test]
    fn advance_only_moves_forward() {
        let mut marks = Watermarks::default();
        assert!(marks.advance("AAPL", date("2024-01-10")));
        assert!(!marks.advance("AAPL", date("2024-01-05")));
        assert!(!marks.advance("AAPL", date("2024-01-10")));
        assert_eq!(marks.get("AAPL"), Some(date("2024-01-10")));

        assert!(marks.advance("MSFT", date("2024-01-08")));
        assert_eq!(marks.last_end_date, Some(date("2024-01-10")));
        assert!(marks.advance("MSFT", date("2024-01-12")));
        assert_eq!(marks.last_end_date, Some(date("2024-01-12")));
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metadata.json");
        let mut marks = Watermarks::default();
        marks.advance("AAPL", date("2024-01-10"));
        marks.save(&path).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        let reloaded = Watermarks::load(&path).unwrap();
        assert_eq!(reloaded, marks);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["last_end_date"], "2024-01-10");
        assert_eq!(raw["symbols"]["AAPL"], "2024-01-10");
    }
}
