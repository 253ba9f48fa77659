//! Keyword, delimiter and cadence configuration

use crate::{RegionError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prompt keywords that mark region boundaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keywords {
    /// Starts a new row of regions
    pub row: String,
    /// Starts a new cell within the current row
    pub col: String,
    /// Ends the base segment
    pub base: String,
    /// Splits unrelated text inside one region
    pub brk: String,
}

impl Default for Keywords {
    fn default() -> Self {
        Self {
            row: "ADDROW".into(),
            col: "ADDCOL".into(),
            base: "ADDBASE".into(),
            brk: "BREAK".into(),
        }
    }
}

/// Delimiters used in ratio text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delimiters {
    /// Separates rows
    pub row: char,
    /// Separates cells within a row
    pub col: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self { row: ';', col: ',' }
    }
}

/// Configuration shared by planning and compositing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Prompt keywords
    pub keywords: Keywords,
    /// Ratio delimiters
    pub delimiters: Delimiters,
    /// Tokens per packed context block (including start/end tokens)
    pub block_tokens: usize,
    /// Usable prompt tokens per block
    pub chunk_tokens: usize,
    /// Attention layers the host visits per diffusion step
    pub layers_per_step: usize,
    /// Distance from 1.0 under which a range end counts as the trailing edge
    pub edge_tolerance: f64,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            keywords: Keywords::default(),
            delimiters: Delimiters::default(),
            block_tokens: crate::DEFAULT_BLOCK_TOKENS,
            chunk_tokens: crate::DEFAULT_CHUNK_TOKENS,
            layers_per_step: crate::DEFAULT_LAYERS_PER_STEP,
            edge_tolerance: 1e-3,
        }
    }
}

impl RegionConfig {
    /// Parse from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.block_tokens == 0 || self.chunk_tokens == 0 {
            return Err(RegionError::Config(
                "Token block sizes must be non-zero".into(),
            ));
        }
        if self.layers_per_step == 0 {
            return Err(RegionError::Config(
                "layers_per_step must be non-zero".into(),
            ));
        }
        if !(0.0..0.5).contains(&self.edge_tolerance) {
            return Err(RegionError::Config(format!(
                "edge_tolerance {} outside [0, 0.5)",
                self.edge_tolerance
            )));
        }
        if self.delimiters.row == self.delimiters.col {
            return Err(RegionError::Config(
                "Row and column delimiters must differ".into(),
            ));
        }
        let k = &self.keywords;
        for (name, kw) in [("row", &k.row), ("col", &k.col), ("base", &k.base), ("brk", &k.brk)] {
            if kw.is_empty() {
                return Err(RegionError::Config(format!("Empty {} keyword", name)));
            }
        }
        Ok(())
    }
}
