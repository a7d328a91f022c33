//! DOCX hidden-text detection.
//!
//! The archive is read with a hand-rolled Central Directory walk; only the document body and
//! style definitions are inflated. Checks look for hidden and web-hidden run properties, tiny
//! font sizes and white font colors. High-value flags carry a short snippet of nearby run text.

mod analyzer;
mod zip;

pub use analyzer::{
    scan_docx, DOCUMENT_XML, MICRO_FONT_MIN_OCCURRENCES, SNIPPET_MAX_CHARS, SNIPPET_WINDOW,
    STYLES_XML,
};
pub use zip::{
    central_directory, extract_entries, find_eocd, CentralEntry, ZipEntry, EOCD_SEARCH_WINDOW,
    METHOD_DEFLATE, METHOD_STORED,
};

/// ZIP local file header magic.
pub const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Check if data starts like a ZIP archive (any OOXML package).
#[inline]
pub fn is_zip(data: &[u8]) -> bool {
    data.starts_with(ZIP_MAGIC)
}
