//! Error types for the adaptive splitter

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside the hot dispatch path.
///
/// The dispatch path itself is infallible: degenerate inputs are clamped
/// to safe defaults rather than surfaced. These variants cover only the
/// cold path (table loading, configuration).
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bandwidth table parse error
    #[error("bandwidth table parse error: {0}")]
    TableParse(#[from] serde_json::Error),

    /// Bandwidth table entry outside the valid operating range
    #[error(
        "invalid bandwidth table entry: io_depth={io_depth} numjobs={numjobs} split_pct={split_pct} (split_pct must be 0..=100)"
    )]
    InvalidTableEntry {
        io_depth: u64,
        numjobs: u64,
        split_pct: u64,
    },

    /// Configuration error
    #[error("invalid configuration: {0}")]
    Config(String),
}
