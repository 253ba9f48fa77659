//! Error types for regional attention

use regional_core::RegionError;
use thiserror::Error;

/// Errors that can occur while compositing attention outputs
#[derive(Debug, Error)]
pub enum AttentionError {
    /// Layout, grid or planning error
    #[error(transparent)]
    Region(#[from] RegionError),

    /// Tensor operation failed
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Region walk ran past the end of the packed context
    #[error("Context exhausted: regions need {needed} blocks, context holds {available}")]
    ContextExhausted { needed: usize, available: usize },

    /// Input tensor has an unexpected shape
    #[error("Shape mismatch: expected {expected}, got {actual:?}")]
    ShapeMismatch {
        expected: &'static str,
        actual: Vec<usize>,
    },

    /// Batch cannot be split into positive and negative halves
    #[error("Batch of {batch} cannot be split into positive and negative halves")]
    UnevenBatch { batch: usize },
}

/// Result type for regional attention operations
pub type Result<T> = std::result::Result<T, AttentionError>;
