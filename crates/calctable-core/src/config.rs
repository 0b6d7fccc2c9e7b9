//! Engine limits and defaults, loadable from TOML.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, TableError};

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Upper bound on the points a RANGE column may generate.
    pub max_range_points: usize,
    /// Upper bound on the table's row count.
    pub max_rows: usize,
    /// Steps `|dx|` below this mark derivative cells as division-near-zero.
    pub derivative_epsilon: f64,
    /// Significant digits for new columns.
    pub default_precision: usize,
    /// Appended to a calculated column's name for its propagated uncertainty.
    pub uncertainty_suffix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_range_points: 1000,
            max_rows: 100_000,
            derivative_epsilon: 1e-10,
            default_precision: 6,
            uncertainty_suffix: "_u".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<EngineConfig> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| TableError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Read a config file, refusing anything over 1 MiB.
    pub fn load(path: &Path) -> Result<EngineConfig> {
        let meta = std::fs::metadata(path)?;
        if meta.len() > MAX_CONFIG_FILE_BYTES {
            return Err(TableError::Config(format!(
                "Refusing to read {}: file too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                MAX_CONFIG_FILE_BYTES
            )));
        }
        let content = std::fs::read_to_string(path)?;
        EngineConfig::from_toml_str(&content).map_err(|e| match e {
            TableError::Config(msg) => TableError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    fn check(&self) -> Result<()> {
        if self.max_range_points < 2 {
            return Err(TableError::Config("max_range_points must be at least 2".into()));
        }
        if !(self.derivative_epsilon.is_finite() && self.derivative_epsilon >= 0.0) {
            return Err(TableError::Config(
                "derivative_epsilon must be a finite non-negative number".into(),
            ));
        }
        if self.uncertainty_suffix.is_empty() {
            return Err(TableError::Config("uncertainty_suffix must not be empty".into()));
        }
        Ok(())
    }
}
