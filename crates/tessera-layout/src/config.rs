#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! Loaded from TOML or JSON; every field has a default, so a partial file
//! only overrides what it names:
//!
//! ```toml
//! columns = 12
//! compaction_delay_ms = 80
//!
//! [[breakpoints]]
//! name = "wide"
//! min_width = 1400
//! columns = 16
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::breakpoint::{Breakpoint, BreakpointTable, standard_breakpoints};
use crate::placement::DEFAULT_SCAN_ROW_LIMIT;
use crate::undo::DEFAULT_UNDO_CAPACITY;

/// Errors that can occur when loading an [`EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tunables for a [`GridEngine`](crate::GridEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Column count of the default (non-responsive) view. The engine never
    /// edits wider than this, whatever the active breakpoint.
    pub columns: u16,
    /// Pixel height of one row. Carried for hosts; the engine ignores it.
    pub row_height: u32,
    /// Height cap for items without an explicit `max_h`.
    pub default_max_h: u16,
    /// Rows scanned by auto-placement before falling back.
    pub scan_row_limit: u16,
    pub undo_capacity: usize,
    /// Quiet period before deferred compaction runs.
    pub compaction_delay_ms: u64,
    /// Key under which the item list is persisted.
    pub storage_key: String,
    pub breakpoints: Vec<Breakpoint>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            columns: 12,
            row_height: 60,
            default_max_h: 10,
            scan_row_limit: DEFAULT_SCAN_ROW_LIMIT,
            undo_capacity: DEFAULT_UNDO_CAPACITY,
            compaction_delay_ms: 50,
            storage_key: "dashboard-layout".to_owned(),
            breakpoints: standard_breakpoints(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&read(path.as_ref())?)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&read(path.as_ref())?)
    }

    /// Load from a file, picking the format from its extension
    /// (`.json` is JSON, anything else is TOML).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Validate all parameters.
    ///
    /// Returns a list of problems. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.columns == 0 {
            errors.push("columns must be > 0".into());
        }
        if self.default_max_h == 0 {
            errors.push("default_max_h must be > 0".into());
        }
        if self.scan_row_limit == 0 {
            errors.push("scan_row_limit must be > 0".into());
        }
        if self.storage_key.is_empty() {
            errors.push("storage_key must not be empty".into());
        }

        for (i, bp) in self.breakpoints.iter().enumerate() {
            if bp.name.is_empty() {
                errors.push(format!("breakpoints[{i}].name must not be empty"));
            }
            if bp.columns == 0 {
                errors.push(format!("breakpoints[{i}] `{}`: columns must be > 0", bp.name));
            }
            if bp.max_h == Some(0) {
                errors.push(format!("breakpoints[{i}] `{}`: max_h must be > 0", bp.name));
            }
            if self.breakpoints[..i].iter().any(|other| other.name == bp.name) {
                errors.push(format!("breakpoints[{i}]: duplicate name `{}`", bp.name));
            }
        }

        errors
    }

    /// Replace invalid values with their defaults.
    ///
    /// Invalid breakpoints are dropped; duplicates keep the first entry.
    #[must_use]
    pub fn sanitize(mut self) -> Self {
        let defaults = Self::default();
        if self.columns == 0 {
            self.columns = defaults.columns;
        }
        if self.default_max_h == 0 {
            self.default_max_h = defaults.default_max_h;
        }
        if self.scan_row_limit == 0 {
            self.scan_row_limit = defaults.scan_row_limit;
        }
        if self.storage_key.is_empty() {
            self.storage_key = defaults.storage_key;
        }

        let mut kept: Vec<Breakpoint> = Vec::with_capacity(self.breakpoints.len());
        for bp in self.breakpoints {
            let valid = !bp.name.is_empty() && bp.columns > 0 && bp.max_h != Some(0);
            if valid && !kept.iter().any(|other| other.name == bp.name) {
                kept.push(bp);
            }
        }
        self.breakpoints = kept;
        self
    }

    /// Compaction debounce as a [`Duration`].
    #[must_use]
    pub fn compaction_delay(&self) -> Duration {
        Duration::from_millis(self.compaction_delay_ms)
    }

    /// Breakpoint table; an empty list yields a single tier of `columns`.
    #[must_use]
    pub fn breakpoint_table(&self) -> BreakpointTable {
        BreakpointTable::new(self.breakpoints.clone(), self.columns)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
