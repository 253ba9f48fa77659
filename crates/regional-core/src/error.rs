//! Error types for region planning

use thiserror::Error;

/// Result type for region planning operations
pub type Result<T> = std::result::Result<T, RegionError>;

/// Errors raised while parsing ratios, building layouts or mapping grids
#[derive(Debug, Error)]
pub enum RegionError {
    /// A ratio token could not be parsed
    #[error("Invalid ratio {token:?} at row {row}, cell {col}: {reason}")]
    InvalidRatio {
        row: usize,
        col: usize,
        token: String,
        reason: String,
    },

    /// Reference structure has rows but the ratio text has no values
    #[error("Ratio text is empty but {expected_rows} region rows were declared")]
    EmptyRatios { expected_rows: usize },

    /// All weights in a row are zero
    #[error("Weights of row {row} sum to zero")]
    ZeroWeightSum { row: usize },

    /// All row weights are zero
    #[error("Row weights sum to zero")]
    ZeroRowWeights,

    /// Layout has no regions at all
    #[error("Layout has no regions")]
    NoRegions,

    /// Declared region count disagrees with the prompt segments
    #[error("Region count mismatch: layout has {expected} regions, prompt has {actual}")]
    RegionCountMismatch { expected: usize, actual: usize },

    /// Base layer requested but the prompt has no base segment
    #[error("Base prompt requested but no '{keyword}' separator found")]
    MissingBase { keyword: String },

    /// Feature map length does not map onto a grid
    #[error("Sequence length {seq_len} does not map onto a {height}x{width} grid")]
    GridMismatch {
        height: usize,
        width: usize,
        seq_len: usize,
    },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration could not be deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegionError {
    /// Create an invalid ratio error
    pub fn invalid_ratio(
        row: usize,
        col: usize,
        token: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RegionError::InvalidRatio {
            row,
            col,
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error stems from user-authored settings rather than the host
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RegionError::InvalidRatio { .. }
                | RegionError::EmptyRatios { .. }
                | RegionError::ZeroWeightSum { .. }
                | RegionError::ZeroRowWeights
                | RegionError::NoRegions
                | RegionError::RegionCountMismatch { .. }
                | RegionError::MissingBase { .. }
                | RegionError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_ratio_message() {
        let err = RegionError::invalid_ratio(1, 2, "x", "not a number");
        assert_eq!(
            err.to_string(),
            "Invalid ratio \"x\" at row 1, cell 2: not a number"
        );
    }

    #[test]
    fn test_configuration_errors() {
        assert!(RegionError::ZeroWeightSum { row: 0 }.is_configuration());
        assert!(RegionError::Config("bad".into()).is_configuration());
        let grid = RegionError::GridMismatch {
            height: 2,
            width: 2,
            seq_len: 5,
        };
        assert!(!grid.is_configuration());
    }
}
