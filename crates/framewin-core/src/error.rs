//! Error types for FrameWin.

use crate::time::Timestamp;
use thiserror::Error;

/// Failure to open a source. Fatal to the reader instance that tried.
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("I/O error while opening: {0}")]
    Io(#[from] std::io::Error),
}

/// Main error type for FrameWin operations.
#[derive(Error, Debug)]
pub enum FrameWinError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Open failed: {0}")]
    Open(#[from] OpenError),

    /// A frame was handed to the cache at the wrong end of the window.
    /// Always a backend or caller bug.
    #[error("Frame {timestamp} out of order (bound {bound}, prepend: {prepend})")]
    OutOfOrder {
        timestamp: Timestamp,
        bound: Timestamp,
        prepend: bool,
    },

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Capability not supported: {0}")]
    Unsupported(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FrameWinError {
    /// True for errors that indicate a broken contract rather than bad input.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::OutOfOrder { .. } | Self::Internal(_))
    }
}

/// Result type alias for FrameWin operations.
pub type Result<T> = std::result::Result<T, FrameWinError>;
