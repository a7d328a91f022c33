//! PDF hidden-text detection.
//!
//! Builds a search corpus from the raw file with every stream body swapped for its inflated
//! form, then runs pattern checks for text-state operators that make text invisible: rendering
//! mode 3, zero or microscopic font sizes, white fill/stroke colors and far off-page text
//! positioning.
//! No object graph is built.

mod analyzer;
mod parser;

pub use analyzer::{scan_pdf, MICRO_FONT_MAX_SIZE, WHITE_ON_WHITE_MIN_OCCURRENCES};
pub use parser::{build_corpus, is_pdf, stream_regions, PDF_MAGIC};
