//! Bounded DEFLATE decompression shared by the PDF and DOCX scanners.
//!
//! ZIP entries are raw (headerless) DEFLATE. PDF FlateDecode streams are usually zlib
//! wrapped, so [`inflate_stream`] tries raw first and falls back to the zlib wrapper when the
//! data starts with a valid zlib header.
//!
//! All output for one scanned file is charged to a single [`InflateBudget`], which caps the
//! work a decompression bomb can cause.

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::InflateError;

/// Maximum total decompressed bytes per scanned file.
pub const MAX_DECOMPRESSED_BYTES: usize = 32 * 1024 * 1024;

const CHUNK: usize = 16 * 1024;

/// Remaining decompressed bytes allowed for the current file.
#[derive(Debug, Clone)]
pub struct InflateBudget {
    limit: usize,
    remaining: usize,
}

impl InflateBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    /// Budget for one file, using [`MAX_DECOMPRESSED_BYTES`].
    pub fn per_file() -> Self {
        Self::new(MAX_DECOMPRESSED_BYTES)
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn charge(&mut self, n: usize) -> Result<(), InflateError> {
        if n > self.remaining {
            self.remaining = 0;
            return Err(InflateError::LimitExceeded { limit: self.limit });
        }
        self.remaining -= n;
        Ok(())
    }
}

impl Default for InflateBudget {
    fn default() -> Self {
        Self::per_file()
    }
}

/// Inflate raw (headerless) DEFLATE data.
pub fn inflate_raw(data: &[u8], budget: &mut InflateBudget) -> Result<Vec<u8>, InflateError> {
    inflate_with(Decompress::new(false), data, budget)
}

/// Inflate a PDF stream body: raw DEFLATE first, zlib-wrapped as fallback.
pub fn inflate_stream(data: &[u8], budget: &mut InflateBudget) -> Result<Vec<u8>, InflateError> {
    match inflate_raw(data, budget) {
        Ok(out) => Ok(out),
        Err(InflateError::LimitExceeded { limit }) => Err(InflateError::LimitExceeded { limit }),
        Err(raw_err) if has_zlib_header(data) => {
            inflate_with(Decompress::new(true), data, budget).map_err(|zlib_err| match zlib_err {
                InflateError::LimitExceeded { .. } => zlib_err,
                _ => raw_err,
            })
        }
        Err(raw_err) => Err(raw_err),
    }
}

/// RFC 1950 header: CM = 8, window size <= 32K, and the check bits.
fn has_zlib_header(data: &[u8]) -> bool {
    if data.len() < 2 {
        return false;
    }
    let cmf = data[0];
    let flg = data[1];
    cmf & 0x0F == 8 && cmf >> 4 <= 7 && (u16::from(cmf) << 8 | u16::from(flg)) % 31 == 0
}

fn inflate_with(
    mut decoder: Decompress,
    data: &[u8],
    budget: &mut InflateBudget,
) -> Result<Vec<u8>, InflateError> {
    let mut out = Vec::new();
    let mut buf = [0u8; CHUNK];
    loop {
        let consumed = decoder.total_in() as usize;
        let produced = decoder.total_out();
        let input = data.get(consumed..).unwrap_or(&[]);
        let status = decoder.decompress(input, &mut buf, FlushDecompress::None)?;
        let n = (decoder.total_out() - produced) as usize;
        // Charged before the failure checks so garbage input cannot loop on a fresh budget.
        budget.charge(n)?;
        out.extend_from_slice(&buf[..n]);
        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                if n == 0 && decoder.total_in() as usize == consumed {
                    return Err(InflateError::Truncated);
                }
            }
        }
    }
}
