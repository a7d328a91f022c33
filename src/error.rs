//! Error types for scanning.
//!
//! [`ScanError`] is fatal for one file: [`crate::scan`] maps every variant to
//! [`crate::ScanResult::unknown`], while [`crate::try_scan`] hands it to callers that want
//! to tell "clean" apart from "could not be scanned".
//!
//! [`InflateError`] is per unit (one PDF stream or one ZIP entry). Only
//! [`InflateError::LimitExceeded`] escalates to a [`ScanError`]; the other variants mean the
//! unit is skipped.

use thiserror::Error;

/// Why a file could not be scanned.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("empty input")]
    Empty,

    #[error("unsupported file type (mime type '{mime_type}', file name '{file_name}')")]
    Unsupported { mime_type: String, file_name: String },

    #[error("malformed ZIP archive: {0}")]
    Zip(#[from] ZipError),

    /// Total decompressed output for the file went over the per-file limit.
    #[error("decompressed data exceeds the {limit} byte limit")]
    DecompressionLimit { limit: usize },

    #[error("pattern compilation failed: {0}")]
    Pattern(#[from] regex::Error),

    #[error("scanner panicked: {0}")]
    Panic(String),
}

/// Structural problems in a ZIP archive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZipError {
    #[error("end of central directory record not found")]
    MissingEndOfCentralDirectory,

    #[error("central directory (offset {offset}, size {size}) lies outside the {len} byte buffer")]
    CentralDirectoryOutOfBounds { offset: usize, size: usize, len: usize },

    #[error("bad central directory entry signature at offset {offset}")]
    BadCentralSignature { offset: usize },

    #[error("archive has no readable document or styles entry")]
    NoTargetEntries,
}

/// Failure to inflate one stream or entry.
#[derive(Debug, Error)]
pub enum InflateError {
    #[error("corrupt deflate data: {0}")]
    Corrupt(#[from] flate2::DecompressError),

    #[error("deflate data ended before the final block")]
    Truncated,

    #[error("decompressed data exceeds the {limit} byte limit")]
    LimitExceeded { limit: usize },
}

impl InflateError {
    /// Escalate the limit case to a scan failure; any other failure stays local.
    pub(crate) fn into_fatal(self) -> Result<InflateError, ScanError> {
        match self {
            InflateError::LimitExceeded { limit } => Err(ScanError::DecompressionLimit { limit }),
            other => Ok(other),
        }
    }
}
