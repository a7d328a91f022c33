//! Minimal PDF stream locator and search-corpus builder.
//! Works on the raw bytes; no xref or object parsing.

use std::ops::Range;

use tracing::debug;

use crate::error::ScanError;
use crate::inflate::{inflate_stream, InflateBudget};

/// PDF magic: %PDF.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Header may be preceded by junk within the first 1 KB.
const MAX_HEADER_OFFSET: usize = 1024;

const STREAM_KEYWORD: &[u8] = b"stream";
const ENDSTREAM_KEYWORD: &[u8] = b"endstream";

/// Check if data looks like a PDF.
#[inline]
pub fn is_pdf(data: &[u8]) -> bool {
    let head = &data[..data.len().min(MAX_HEADER_OFFSET + PDF_MAGIC.len())];
    find(head, PDF_MAGIC).is_some()
}

#[inline]
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Locate every `stream<EOL> ... endstream` body. Returned slices exclude both keywords and
/// the end-of-line after `stream`. An unterminated final stream is ignored.
pub fn stream_regions(data: &[u8]) -> Vec<&[u8]> {
    stream_ranges(data).into_iter().map(|r| &data[r]).collect()
}

fn stream_ranges(data: &[u8]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut pos = 0;
    while let Some(rel) = find(&data[pos..], STREAM_KEYWORD) {
        let keyword_at = pos + rel;
        let mut start = keyword_at + STREAM_KEYWORD.len();
        pos = start;
        // Tail of a stray `endstream`.
        if data[..keyword_at].ends_with(b"end") {
            continue;
        }
        match &data[start..] {
            [b'\r', b'\n', ..] => start += 2,
            [b'\n', ..] => start += 1,
            _ => continue,
        }
        let Some(end_rel) = find(&data[start..], ENDSTREAM_KEYWORD) else {
            break;
        };
        ranges.push(start..start + end_rel);
        pos = start + end_rel + ENDSTREAM_KEYWORD.len();
    }
    ranges
}

/// The file with every stream body replaced by its inflated form.
///
/// Bytes outside streams and bodies that fail to inflate are kept as they are, so every
/// operator appears exactly once. Exceeding the budget fails the whole file.
pub fn build_corpus(data: &[u8], budget: &mut InflateBudget) -> Result<Vec<u8>, ScanError> {
    let mut corpus = Vec::with_capacity(data.len());
    let mut cursor = 0;
    let mut inflated = 0usize;
    let ranges = stream_ranges(data);
    for (idx, range) in ranges.iter().enumerate() {
        corpus.extend_from_slice(&data[cursor..range.start]);
        let region = &data[range.clone()];
        match inflate_stream(region, budget) {
            Ok(decoded) => {
                corpus.extend_from_slice(&decoded);
                // Keeps the last operator apart from `endstream`.
                corpus.push(b'\n');
                inflated += 1;
            }
            Err(e) => {
                let e = e.into_fatal()?;
                debug!(stream = idx, len = region.len(), error = %e, "PDF stream kept raw");
                corpus.extend_from_slice(region);
            }
        }
        cursor = range.end;
    }
    corpus.extend_from_slice(&data[cursor..]);
    debug!(
        streams = ranges.len(),
        inflated,
        corpus_len = corpus.len(),
        "PDF corpus built"
    );
    Ok(corpus)
}
