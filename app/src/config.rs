// ==============================================================================
// config.rs - Processor Configuration
// ==============================================================================
// Description: Runtime settings shared by the library and the CLI
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::input::DEFAULT_MAX_INPUT_BYTES;
use crate::parsers::vcf::{VcfParser, DEFAULT_MAX_EXPANSION_RATIO};

pub const ENV_TABLES_DIR: &str = "PGX_TABLES_DIR";
pub const ENV_MAX_INPUT_BYTES: &str = "PGX_MAX_INPUT_BYTES";
pub const ENV_PREVIEW_ROWS: &str = "PGX_PREVIEW_ROWS";
pub const ENV_MAX_EXPANSION_RATIO: &str = "PGX_MAX_EXPANSION_RATIO";

pub const DEFAULT_TABLES_DIR: &str = "data/tables";

/// Processor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Directory scanned for CPIC tables
    pub tables_dir: PathBuf,

    /// Largest accepted input, compressed size
    pub max_input_bytes: u64,

    /// Decoded bytes allowed per raw input byte
    pub max_expansion_ratio: u64,

    /// Stop after this many data records
    pub preview_rows: Option<usize>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            tables_dir: PathBuf::from(DEFAULT_TABLES_DIR),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            max_expansion_ratio: DEFAULT_MAX_EXPANSION_RATIO,
            preview_rows: None,
        }
    }
}

impl ProcessorConfig {
    /// Load configuration from environment variables, defaults for unset ones
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_TABLES_DIR).filter(|v| !v.trim().is_empty()) {
            config.tables_dir = PathBuf::from(dir.trim());
        }

        if let Some(raw) = lookup(ENV_MAX_INPUT_BYTES) {
            config.max_input_bytes = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a byte count, got '{}'", ENV_MAX_INPUT_BYTES, raw))?;
        }

        if let Some(raw) = lookup(ENV_MAX_EXPANSION_RATIO) {
            let ratio: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number, got '{}'", ENV_MAX_EXPANSION_RATIO, raw))?;
            config.max_expansion_ratio = ratio.max(1);
        }

        if let Some(raw) = lookup(ENV_PREVIEW_ROWS) {
            let rows: usize = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a row count, got '{}'", ENV_PREVIEW_ROWS, raw))?;
            config.preview_rows = Some(rows);
        }

        Ok(config)
    }

    pub fn with_tables_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tables_dir = dir.into();
        self
    }

    pub fn with_max_input_bytes(mut self, max: u64) -> Self {
        self.max_input_bytes = max;
        self
    }

    pub fn with_max_expansion_ratio(mut self, ratio: u64) -> Self {
        self.max_expansion_ratio = ratio.max(1);
        self
    }

    pub fn with_preview_rows(mut self, rows: Option<usize>) -> Self {
        self.preview_rows = rows;
        self
    }

    /// Parser honoring the size limits and early stop
    pub fn parser(&self) -> VcfParser {
        let parser = VcfParser::new()
            .with_max_input_bytes(self.max_input_bytes)
            .with_max_expansion_ratio(self.max_expansion_ratio);
        match self.preview_rows {
            Some(rows) => parser.with_max_records(rows),
            None => parser,
        }
    }
}
