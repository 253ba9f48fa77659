//! Error types for preset storage

use regional_core::RegionError;
use thiserror::Error;

/// Errors that can occur while reading or writing presets
#[derive(Debug, Error)]
pub enum PresetError {
    /// Row could not be turned into a preset
    #[error("Invalid preset on line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    /// Preset name is empty or contains a field separator
    #[error("Invalid preset name: {0:?}")]
    InvalidName(String),

    /// Divide mode or other setting rejected
    #[error(transparent)]
    Region(#[from] RegionError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for preset operations
pub type Result<T> = std::result::Result<T, PresetError>;
