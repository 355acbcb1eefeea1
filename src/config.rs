//! Server-side selector configuration.
//!
//! Loaded once from TOML; every key is optional and falls back to the
//! defaults below, so an empty document is a valid configuration.
//!
//! ```toml
//! [dance_merge_selector]
//! max_parts_to_break = 5000
//! min_parts_to_merge_base = 3
//!
//! [simple_merge_selector]
//! max_parts_in_window = 8
//! ```

use std::{fs, io, path::Path};

use serde::Deserialize;
use thiserror::Error;

/// Default number of parts after which a candidate range is split in strict mode.
pub const MERGE_MAX_PARTS_TO_BREAK: usize = 10_000;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Errors raised while loading selector configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read selector config: {0}")]
    Io(#[from] io::Error),
    /// The document is not valid TOML or has mistyped keys.
    #[error("failed to parse selector config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level selector configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Knobs of the optimizing selector and range construction.
    pub dance_merge_selector: DanceSelectorConfig,
    /// Knobs of the greedy threshold selector.
    pub simple_merge_selector: SimpleSelectorConfig,
}

impl SelectorConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Range length at which strict-mode range construction starts a new range.
    pub fn max_parts_to_break(&self) -> usize {
        self.dance_merge_selector.max_parts_to_break.max(1)
    }
}

/// Optimizing selector configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DanceSelectorConfig {
    /// Range length at which strict-mode range construction starts a new range.
    pub max_parts_to_break: usize,
    /// Base ratio a window must reach before lowering.
    pub min_parts_to_merge_base: usize,
    /// Windows below this many bytes get the fully lowered base.
    pub min_size_to_lower_base: u64,
    /// Windows above this many bytes keep the full base.
    pub max_size_to_lower_base: u64,
    /// Windows younger than this (seconds) get no age lowering.
    pub min_age_to_lower_base: u64,
    /// Windows older than this (seconds) get the fully lowered base.
    pub max_age_to_lower_base: u64,
    /// Constant per-part cost added to window sizes when scoring.
    pub size_fixed_cost_to_add: u64,
    /// Seconds since the last insert for a partition to count as real-time.
    pub real_time_window: u64,
}

impl Default for DanceSelectorConfig {
    fn default() -> Self {
        Self {
            max_parts_to_break: MERGE_MAX_PARTS_TO_BREAK,
            min_parts_to_merge_base: 5,
            min_size_to_lower_base: MIB,
            max_size_to_lower_base: 100 * GIB,
            min_age_to_lower_base: 10,
            max_age_to_lower_base: 3600,
            size_fixed_cost_to_add: 5 * MIB,
            real_time_window: 3600,
        }
    }
}

/// Greedy selector configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimpleSelectorConfig {
    /// Largest window the greedy scan considers.
    pub max_parts_in_window: usize,
    /// A window is rejected when its largest part exceeds this multiple of the rest.
    pub max_size_ratio: f64,
    /// Windows whose youngest part is at least this old (seconds) are always accepted.
    pub min_age_to_force_merge: u64,
}

impl Default for SimpleSelectorConfig {
    fn default() -> Self {
        Self {
            max_parts_in_window: 10,
            max_size_ratio: 2.0,
            min_age_to_force_merge: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SelectorConfig::from_toml_str("").unwrap();
        assert_eq!(config.max_parts_to_break(), MERGE_MAX_PARTS_TO_BREAK);
        assert_eq!(config.dance_merge_selector.min_parts_to_merge_base, 5);
        assert_eq!(config.simple_merge_selector.max_parts_in_window, 10);
    }

    #[test]
    fn partial_sections_override_only_named_keys() {
        let config = SelectorConfig::from_toml_str(
            r#"
            [dance_merge_selector]
            max_parts_to_break = 3
            size_fixed_cost_to_add = 0

            [simple_merge_selector]
            max_size_ratio = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(config.max_parts_to_break(), 3);
        assert_eq!(config.dance_merge_selector.size_fixed_cost_to_add, 0);
        assert_eq!(config.dance_merge_selector.min_parts_to_merge_base, 5);
        assert_eq!(config.simple_merge_selector.max_size_ratio, 1.5);
        assert_eq!(config.simple_merge_selector.max_parts_in_window, 10);
    }

    #[test]
    fn mistyped_key_is_a_parse_error() {
        let err = SelectorConfig::from_toml_str("[dance_merge_selector]\nmax_parts_to_break = \"x\"")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dance_merge_selector]\nmax_parts_to_break = 42").unwrap();
        let config = SelectorConfig::from_path(file.path()).unwrap();
        assert_eq!(config.max_parts_to_break(), 42);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SelectorConfig::from_path(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
