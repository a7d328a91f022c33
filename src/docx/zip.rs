//! Minimal ZIP reader: EOCD lookup, Central Directory walk and Local File Header resolution.
//! See APPNOTE.TXT sections 4.3.7 (local header), 4.3.12 (central header), 4.3.16 (EOCD).
//! ZIP64 is not supported; such archives fail the bounds checks.

use tracing::debug;

use crate::error::{ScanError, ZipError};
use crate::inflate::{inflate_raw, InflateBudget};

const EOCD_SIGNATURE: u32 = 0x0605_4B50;
const CENTRAL_SIGNATURE: u32 = 0x0201_4B50;
const LOCAL_SIGNATURE: u32 = 0x0403_4B50;

const EOCD_LEN: usize = 22;
const CENTRAL_HEADER_LEN: usize = 46;
const LOCAL_HEADER_LEN: usize = 30;

/// The EOCD record can only be preceded by a comment of at most 65535 bytes.
pub const EOCD_SEARCH_WINDOW: usize = EOCD_LEN + 0xFFFF;

pub const METHOD_STORED: u16 = 0;
pub const METHOD_DEFLATE: u16 = 8;

/// A decompressed archive member. Lives only for the duration of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Central Directory record fields needed to locate an entry's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralEntry {
    pub filename: String,
    pub method: u16,
    pub compressed_size: usize,
    pub local_header_offset: usize,
}

#[inline]
fn read_u16(data: &[u8], off: usize) -> Option<u16> {
    let b = data.get(off..off.checked_add(2)?)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

#[inline]
fn read_u32(data: &[u8], off: usize) -> Option<u32> {
    let b = data.get(off..off.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Offset of the End of Central Directory record, scanning backward from the end of the
/// buffer within [`EOCD_SEARCH_WINDOW`].
pub fn find_eocd(data: &[u8]) -> Option<usize> {
    if data.len() < EOCD_LEN {
        return None;
    }
    let last = data.len() - EOCD_LEN;
    let first = data.len().saturating_sub(EOCD_SEARCH_WINDOW);
    (first..=last)
        .rev()
        .find(|&off| read_u32(data, off) == Some(EOCD_SIGNATURE))
}

/// Walk the Central Directory named by the EOCD record.
pub fn central_directory(data: &[u8]) -> Result<Vec<CentralEntry>, ZipError> {
    let eocd = find_eocd(data).ok_or(ZipError::MissingEndOfCentralDirectory)?;
    let total_entries = read_u16(data, eocd + 10).unwrap_or(0) as usize;
    let cd_size = read_u32(data, eocd + 12).unwrap_or(0) as usize;
    let cd_offset = read_u32(data, eocd + 16).unwrap_or(0) as usize;

    let cd_end = cd_offset
        .checked_add(cd_size)
        .filter(|&end| end <= data.len())
        .ok_or(ZipError::CentralDirectoryOutOfBounds {
            offset: cd_offset,
            size: cd_size,
            len: data.len(),
        })?;

    let mut entries = Vec::new();
    let mut pos = cd_offset;
    while entries.len() < total_entries && pos + CENTRAL_HEADER_LEN <= cd_end {
        if read_u32(data, pos) != Some(CENTRAL_SIGNATURE) {
            return Err(ZipError::BadCentralSignature { offset: pos });
        }
        let method = read_u16(data, pos + 10).unwrap_or(0);
        let compressed_size = read_u32(data, pos + 20).unwrap_or(0) as usize;
        let name_len = read_u16(data, pos + 28).unwrap_or(0) as usize;
        let extra_len = read_u16(data, pos + 30).unwrap_or(0) as usize;
        let comment_len = read_u16(data, pos + 32).unwrap_or(0) as usize;
        let local_header_offset = read_u32(data, pos + 42).unwrap_or(0) as usize;

        let name_start = pos + CENTRAL_HEADER_LEN;
        let Some(name_bytes) = data.get(name_start..name_start + name_len) else {
            break;
        };
        entries.push(CentralEntry {
            filename: String::from_utf8_lossy(name_bytes).into_owned(),
            method,
            compressed_size,
            local_header_offset,
        });
        pos = name_start + name_len + extra_len + comment_len;
    }
    Ok(entries)
}

/// Compressed bytes of an entry, resolved through its Local File Header.
fn entry_payload<'a>(data: &'a [u8], entry: &CentralEntry) -> Option<&'a [u8]> {
    let off = entry.local_header_offset;
    if read_u32(data, off)? != LOCAL_SIGNATURE {
        return None;
    }
    let name_len = read_u16(data, off + 26)? as usize;
    let extra_len = read_u16(data, off + 28)? as usize;
    let start = off + LOCAL_HEADER_LEN + name_len + extra_len;
    data.get(start..start.checked_add(entry.compressed_size)?)
}

/// Extract and decompress the entries whose names match `targets` (ASCII case-insensitive),
/// in Central Directory order.
///
/// Entries that cannot be located or inflated are skipped. Fails when the archive structure is
/// unreadable, when no target entry could be read, or when the inflate budget runs out.
pub fn extract_entries(
    data: &[u8],
    targets: &[&str],
    budget: &mut InflateBudget,
) -> Result<Vec<ZipEntry>, ScanError> {
    let directory = central_directory(data)?;
    let mut out = Vec::new();
    for entry in directory
        .iter()
        .filter(|e| targets.iter().any(|t| e.filename.eq_ignore_ascii_case(t)))
    {
        let Some(payload) = entry_payload(data, entry) else {
            debug!(entry = %entry.filename, "ZIP entry payload out of bounds; skipped");
            continue;
        };
        let decoded = match entry.method {
            METHOD_STORED => payload.to_vec(),
            METHOD_DEFLATE => match inflate_raw(payload, budget) {
                Ok(d) => d,
                Err(e) => {
                    let e = e.into_fatal()?;
                    debug!(entry = %entry.filename, error = %e, "ZIP entry not inflated; skipped");
                    continue;
                }
            },
            other => {
                debug!(entry = %entry.filename, method = other, "unsupported compression method; skipped");
                continue;
            }
        };
        out.push(ZipEntry {
            filename: entry.filename.clone(),
            data: decoded,
        });
    }
    if out.is_empty() {
        return Err(ZipError::NoTargetEntries.into());
    }
    Ok(out)
}
