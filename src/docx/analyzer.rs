//! DOCX analyzer: run-property checks on `word/document.xml` and `word/styles.xml`.

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tracing::{debug, trace};

use crate::docx::zip::extract_entries;
use crate::error::ScanError;
use crate::inflate::InflateBudget;
use crate::result::{Flag, ScanResult, Severity, Technique};
use crate::FileType;

/// Main document body part.
pub const DOCUMENT_XML: &str = "word/document.xml";
/// Style definitions part.
pub const STYLES_XML: &str = "word/styles.xml";

/// Parts scanned, in no particular order; they are concatenated in archive order.
const TARGET_PARTS: &[&str] = &[DOCUMENT_XML, STYLES_XML];

/// Micro font declarations (1.5-3pt) needed before they are reported. A single small heading or
/// footnote marker is common; pervasive use is not.
pub const MICRO_FONT_MIN_OCCURRENCES: usize = 3;

/// Bytes of XML around the first match searched for text runs.
pub const SNIPPET_WINDOW: usize = 400;
/// Maximum snippet length in characters.
pub const SNIPPET_MAX_CHARS: usize = 160;

/// `w:sz` is in half-points: 0-2 is at most 1pt.
const ZERO_FONT_MAX_HALF_POINTS: u32 = 2;
/// 3-6 half-points is 1.5-3pt.
const MICRO_FONT_MAX_HALF_POINTS: u32 = 6;

struct DocxPatterns {
    vanish: Regex,
    web_hidden: Regex,
    /// Capture 1 or 2 = half-point size.
    font_size: Regex,
    white_color: Regex,
    /// Capture 1 = run text.
    text_run: Regex,
}

impl DocxPatterns {
    fn compile() -> Result<Self, regex::Error> {
        // Attribute values may be single- or double-quoted.
        let enabled = r#"(?:\s+w:val\s*=\s*(?:"(?:true|1|on)"|'(?:true|1|on)'))?\s*/?>"#;
        let white = r#"(?:FFFFFF|F[A-F]F[A-F]F[A-F])"#;
        Ok(Self {
            vanish: Regex::new(&format!(r"(?-u)<w:vanish{enabled}"))?,
            web_hidden: Regex::new(&format!(r"(?-u)<w:webHidden{enabled}"))?,
            font_size: Regex::new(
                r#"(?-u)<w:sz\s+w:val\s*=\s*(?:"([0-9]{1,6})"|'([0-9]{1,6})')"#,
            )?,
            white_color: Regex::new(&format!(
                r#"(?i-u)<w:color\b[^>]*?\bw:val\s*=\s*(?:"{white}"|'{white}')"#
            ))?,
            text_run: Regex::new(r"(?-u)<w:t(?:\s[^>]*)?>([^<]*)</w:t>")?,
        })
    }
}

static PATTERNS: Lazy<Result<DocxPatterns, regex::Error>> = Lazy::new(DocxPatterns::compile);

fn patterns() -> Result<&'static DocxPatterns, ScanError> {
    match &*PATTERNS {
        Ok(p) => Ok(p),
        Err(e) => Err(ScanError::Pattern(e.clone())),
    }
}

/// Occurrence count and offset of the first match.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Hits {
    count: usize,
    first: Option<usize>,
}

impl Hits {
    fn record(&mut self, offset: usize) {
        self.count += 1;
        self.first.get_or_insert(offset);
    }
}

fn hits(re: &Regex, xml: &[u8]) -> Hits {
    let mut h = Hits::default();
    for m in re.find_iter(xml) {
        h.record(m.start());
    }
    h
}

fn font_size_hits(re: &Regex, xml: &[u8]) -> (Hits, Hits) {
    let mut zero = Hits::default();
    let mut micro = Hits::default();
    for caps in re.captures_iter(xml) {
        let (Some(whole), Some(val)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2))) else {
            continue;
        };
        let Some(half_points) = std::str::from_utf8(val.as_bytes())
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };
        if half_points <= ZERO_FONT_MAX_HALF_POINTS {
            zero.record(whole.start());
        } else if half_points <= MICRO_FONT_MAX_HALF_POINTS {
            micro.record(whole.start());
        }
    }
    (zero, micro)
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Text of the `<w:t>` runs within [`SNIPPET_WINDOW`] bytes centered on `offset`.
fn snippet_near(xml: &[u8], offset: usize, text_run: &Regex) -> Option<String> {
    let half = SNIPPET_WINDOW / 2;
    let start = offset.saturating_sub(half);
    let end = offset.saturating_add(half).min(xml.len());
    let window = xml.get(start..end)?;
    let mut text = String::new();
    for caps in text_run.captures_iter(window) {
        if let Some(m) = caps.get(1) {
            text.push_str(&String::from_utf8_lossy(m.as_bytes()));
        }
    }
    let text = unescape_xml(text.trim());
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(SNIPPET_MAX_CHARS).collect())
}

/// Run every DOCX check against the concatenated XML parts.
fn check_xml(xml: &[u8], p: &DocxPatterns) -> Vec<Flag> {
    let mut flags = Vec::new();
    let snippet = |h: Hits| h.first.and_then(|off| snippet_near(xml, off, &p.text_run));

    let vanish = hits(&p.vanish, xml);
    if vanish.count > 0 {
        flags.push(
            Flag::new(
                Technique::HiddenProperty,
                Severity::High,
                format!("Hidden text run property (w:vanish) found {} time(s)", vanish.count),
                vanish.count,
            )
            .with_snippet(snippet(vanish)),
        );
    }

    let web_hidden = hits(&p.web_hidden, xml);
    if web_hidden.count > 0 {
        flags.push(Flag::new(
            Technique::HiddenProperty,
            Severity::Medium,
            format!(
                "Web-hidden run property (w:webHidden) found {} time(s)",
                web_hidden.count
            ),
            web_hidden.count,
        ));
    }

    let (zero, micro) = font_size_hits(&p.font_size, xml);
    if zero.count > 0 {
        flags.push(
            Flag::new(
                Technique::ZeroFontSize,
                Severity::High,
                format!("Font size of 1pt or less declared {} time(s)", zero.count),
                zero.count,
            )
            .with_snippet(snippet(zero)),
        );
    }

    let white = hits(&p.white_color, xml);
    if white.count > 0 {
        flags.push(
            Flag::new(
                Technique::WhiteText,
                Severity::High,
                format!("White or near-white font color declared {} time(s)", white.count),
                white.count,
            )
            .with_snippet(snippet(white)),
        );
    }

    if micro.count >= MICRO_FONT_MIN_OCCURRENCES {
        flags.push(Flag::new(
            Technique::MicroFont,
            Severity::Medium,
            format!("Micro font size (1.5-3pt) declared {} time(s)", micro.count),
            micro.count,
        ));
    }

    trace!(
        vanish = vanish.count,
        web_hidden = web_hidden.count,
        zero = zero.count,
        white = white.count,
        micro = micro.count,
        "DOCX check counts"
    );
    flags
}

/// Scan DOCX bytes for hidden-text run properties.
pub fn scan_docx(data: &[u8]) -> Result<ScanResult, ScanError> {
    let p = patterns()?;
    let mut budget = InflateBudget::per_file();
    let entries = extract_entries(data, TARGET_PARTS, &mut budget)?;
    let mut xml = Vec::new();
    for entry in &entries {
        debug!(entry = %entry.filename, len = entry.data.len(), "DOCX part extracted");
        xml.extend_from_slice(&entry.data);
    }
    Ok(ScanResult::from_flags(FileType::Docx, check_xml(&xml, p)))
}
