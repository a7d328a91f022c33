//! # hidetect
//!
//! Library to detect text that is present in an uploaded document but invisible or visually
//! suppressed when rendered. Hidden text is a common carrier for prompt-injection payloads
//! aimed at AI-based document screening (e.g. a white "ignore previous instructions" line in a
//! résumé).
//!
//! Scanning is pure and synchronous over an in-memory buffer: no I/O, no shared state.
//! Calls are independent and safe to run from many threads at once.
//!
//! ## Supported formats and techniques
//!
//! - **PDF**: content streams are inflated in place and the whole file is matched for
//!   invisible rendering mode (`3 Tr`), zero and microscopic font sizes (`Tf`), white RGB
//!   color (`1 1 1 rg`), repeated grayscale white (`1 g`) and far off-page text positioning
//!   (`Td`/`TD`). See [`pdf`].
//!
//! - **DOCX**: `word/document.xml` and `word/styles.xml` are read through a hand-rolled
//!   ZIP Central Directory walk and matched for hidden (`w:vanish`) and web-hidden run
//!   properties, font sizes of 1pt or less, micro fonts and white font colors. See [`docx`].
//!
//! ## Failure policy
//!
//! [`scan`] never fails: unsupported types, malformed archives, decompression bombs and
//! internal errors all produce [`ScanResult::unknown`] (fail-open). Use [`try_scan`] to tell
//! "clean" apart from "could not be scanned".
//!
//! ## Example
//!
//! ```no_run
//! let bytes = std::fs::read("resume.pdf").unwrap();
//! let result = hidetect::scan(&bytes, "application/pdf", "resume.pdf");
//! if let Some(summary) = hidetect::summarize(&result) {
//!     println!("{summary}");
//! }
//! ```

use std::fmt;
use std::panic;

#[cfg(feature = "serde")]
use serde::Serialize;
use tracing::debug;

mod error;
mod result;
pub mod docx;
pub mod inflate;
pub mod pdf;

pub use error::{InflateError, ScanError, ZipError};
pub use result::{Flag, ScanResult, Severity, Technique};
pub use docx::scan_docx;
pub use pdf::scan_pdf;

/// MIME type routed to the PDF scanner.
pub const PDF_MIME_TYPE: &str = "application/pdf";
/// MIME type routed to the DOCX scanner.
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Maximum number of flag descriptions in a [`summarize`] sentence.
const SUMMARY_MAX_FLAGS: usize = 3;

/// Scanned file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FileType {
    Pdf,
    Docx,
    Unknown,
}

impl FileType {
    /// Preferred extension for this type (e.g. "pdf"); `None` for Unknown.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            FileType::Pdf => Some("pdf"),
            FileType::Docx => Some("docx"),
            FileType::Unknown => None,
        }
    }

    /// MIME type routed to this type's scanner; `None` for Unknown.
    pub fn mime_type(self) -> Option<&'static str> {
        match self {
            FileType::Pdf => Some(PDF_MIME_TYPE),
            FileType::Docx => Some(DOCX_MIME_TYPE),
            FileType::Unknown => None,
        }
    }

    /// Wire name: "pdf", "docx" or "unknown".
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Unknown => "unknown",
        }
    }

    /// Short label for display (e.g. "PDF").
    pub fn label(self) -> &'static str {
        match self {
            FileType::Pdf => "PDF",
            FileType::Docx => "DOCX",
            FileType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn has_extension(file_name: &str, ext: &str) -> bool {
    let name = file_name.as_bytes();
    name.len() > ext.len()
        && name[name.len() - ext.len() - 1] == b'.'
        && name[name.len() - ext.len()..].eq_ignore_ascii_case(ext.as_bytes())
}

/// Pick the scanner for an upload: exact MIME type first, then case-insensitive file name
/// suffix. Both are advisory and may disagree; the MIME type wins.
pub fn detect_file_type(mime_type: &str, file_name: &str) -> FileType {
    match mime_type {
        PDF_MIME_TYPE => return FileType::Pdf,
        DOCX_MIME_TYPE => return FileType::Docx,
        _ => {}
    }
    [FileType::Pdf, FileType::Docx]
        .into_iter()
        .find(|t| t.extension().is_some_and(|ext| has_extension(file_name, ext)))
        .unwrap_or(FileType::Unknown)
}

/// Guess the type from magic bytes. Any ZIP archive guesses DOCX.
/// Not used by [`scan`]; for callers that have neither MIME type nor extension.
pub fn sniff_file_type(data: &[u8]) -> FileType {
    if pdf::is_pdf(data) {
        return FileType::Pdf;
    }
    if docx::is_zip(data) {
        return FileType::Docx;
    }
    FileType::Unknown
}

fn dispatch(data: &[u8], mime_type: &str, file_name: &str) -> Result<ScanResult, ScanError> {
    if data.is_empty() {
        return Err(ScanError::Empty);
    }
    match detect_file_type(mime_type, file_name) {
        FileType::Pdf => pdf::scan_pdf(data),
        FileType::Docx => docx::scan_docx(data),
        FileType::Unknown => Err(ScanError::Unsupported {
            mime_type: mime_type.to_string(),
            file_name: file_name.to_string(),
        }),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Scan an upload and report why it could not be scanned, if it could not.
pub fn try_scan(data: &[u8], mime_type: &str, file_name: &str) -> Result<ScanResult, ScanError> {
    panic::catch_unwind(|| dispatch(data, mime_type, file_name))
        .unwrap_or_else(|payload| Err(ScanError::Panic(panic_message(&*payload))))
}

/// Scan an upload for hidden text. Never fails: anything that prevents scanning yields
/// [`ScanResult::unknown`].
pub fn scan(data: &[u8], mime_type: &str, file_name: &str) -> ScanResult {
    try_scan(data, mime_type, file_name).unwrap_or_else(|e| {
        debug!(file_name, mime_type, error = %e, "scan fell back to unknown result");
        ScanResult::unknown()
    })
}

/// One-sentence summary of a flagged result; `None` when not flagged.
pub fn summarize(result: &ScanResult) -> Option<String> {
    if !result.flagged {
        return None;
    }
    let descriptions: Vec<&str> = result
        .significant_flags()
        .take(SUMMARY_MAX_FLAGS)
        .map(|f| f.description.as_str())
        .collect();
    Some(format!(
        "{} file contains {} hidden-text indicator(s): {}.",
        result.file_type.label(),
        result.total_indicators,
        descriptions.join("; ")
    ))
}

/// An upload to scan: bytes plus advisory MIME type and file name.
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    pub bytes: &'a [u8],
    pub mime_type: &'a str,
    pub file_name: &'a str,
}

impl<'a> Document<'a> {
    pub fn new(bytes: &'a [u8], mime_type: &'a str, file_name: &'a str) -> Self {
        Self {
            bytes,
            mime_type,
            file_name,
        }
    }

    pub fn scan(&self) -> ScanResult {
        scan(self.bytes, self.mime_type, self.file_name)
    }
}

/// Scan many documents in sequence. Results are in input order.
pub fn scan_batch<'a, I>(documents: I) -> Vec<ScanResult>
where
    I: IntoIterator<Item = Document<'a>>,
{
    documents.into_iter().map(|d| d.scan()).collect()
}

/// Scan many documents on the rayon global pool. Results are in input order.
#[cfg(feature = "parallel")]
pub fn par_scan_batch(documents: &[Document<'_>]) -> Vec<ScanResult> {
    use rayon::prelude::*;
    documents.par_iter().map(|d| d.scan()).collect()
}
