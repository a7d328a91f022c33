//! PDF analyzer: operator-level checks for invisible, tiny, white and off-page text.

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tracing::trace;

use crate::error::ScanError;
use crate::inflate::InflateBudget;
use crate::pdf::parser::build_corpus;
use crate::result::{Flag, ScanResult, Severity, Technique};
use crate::FileType;

/// `1 g` / `1 G` occurrences needed before grayscale white is reported. White backgrounds and
/// graphics use these legitimately, so one or two are expected in clean files.
pub const WHITE_ON_WHITE_MIN_OCCURRENCES: usize = 3;

/// Font sizes strictly between zero and this value are reported as micro fonts.
pub const MICRO_FONT_MAX_SIZE: f64 = 0.5;

// Numeric operands must not continue a longer number on the left (`13 Tr`, `0.1 1 1 rg`).
const NUM_START: &str = r"(?:^|[^0-9.\-])";

struct PdfPatterns {
    /// `3 Tr`
    invisible_render: Regex,
    /// `/F1 0 Tf`, capture 1 = size operand.
    font_size: Regex,
    /// `1 1 1 rg` / `1 1 1 RG`
    white_rgb: Regex,
    /// `1 g` / `1 G`
    white_gray: Regex,
    /// `-5000 700 Td`
    offpage_move: Regex,
}

impl PdfPatterns {
    fn compile() -> Result<Self, regex::Error> {
        let one = r"1(?:\.0*)?";
        Ok(Self {
            invisible_render: Regex::new(&format!(r"(?-u){NUM_START}3\s+Tr\b"))?,
            font_size: Regex::new(
                r"(?-u)/[^\s/\[\]()<>{}%]+\s+([0-9]+(?:\.[0-9]*)?|\.[0-9]+)\s+Tf\b",
            )?,
            white_rgb: Regex::new(&format!(
                r"(?-u){NUM_START}{one}\s+{one}\s+{one}\s+(?:rg|RG)\b"
            ))?,
            white_gray: Regex::new(&format!(r"(?-u){NUM_START}{one}\s+[gG]\b"))?,
            offpage_move: Regex::new(&format!(
                r"(?-u){NUM_START}-[0-9]{{4,}}(?:\.[0-9]*)?\s+-?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)\s+T[dD]\b"
            ))?,
        })
    }
}

static PATTERNS: Lazy<Result<PdfPatterns, regex::Error>> = Lazy::new(PdfPatterns::compile);

fn patterns() -> Result<&'static PdfPatterns, ScanError> {
    match &*PATTERNS {
        Ok(p) => Ok(p),
        Err(e) => Err(ScanError::Pattern(e.clone())),
    }
}

/// Font size operands split into exact zeros and sub-threshold values.
#[derive(Debug, Default, PartialEq, Eq)]
struct FontSizeCounts {
    zero: usize,
    micro: usize,
}

fn count_font_sizes(corpus: &[u8], re: &Regex) -> FontSizeCounts {
    let mut counts = FontSizeCounts::default();
    for caps in re.captures_iter(corpus) {
        let Some(size) = caps
            .get(1)
            .and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
            .and_then(|s| s.parse::<f64>().ok())
        else {
            continue;
        };
        if size == 0.0 {
            counts.zero += 1;
        } else if size < MICRO_FONT_MAX_SIZE {
            counts.micro += 1;
        }
    }
    counts
}

/// Run every PDF check against an already built corpus.
fn check_corpus(corpus: &[u8], p: &PdfPatterns) -> Vec<Flag> {
    let mut flags = Vec::new();

    let invisible = p.invisible_render.find_iter(corpus).count();
    if invisible > 0 {
        flags.push(Flag::new(
            Technique::InvisibleRenderMode,
            Severity::High,
            format!("Invisible text rendering mode (3 Tr) used {invisible} time(s)"),
            invisible,
        ));
    }

    let sizes = count_font_sizes(corpus, &p.font_size);
    if sizes.zero > 0 {
        flags.push(Flag::new(
            Technique::ZeroFontSize,
            Severity::High,
            format!("Zero font size (0 Tf) used {} time(s)", sizes.zero),
            sizes.zero,
        ));
    }
    if sizes.micro > 0 {
        flags.push(Flag::new(
            Technique::MicroFont,
            Severity::Medium,
            format!(
                "Microscopic font size (below {MICRO_FONT_MAX_SIZE}pt) used {} time(s)",
                sizes.micro
            ),
            sizes.micro,
        ));
    }

    let white_rgb = p.white_rgb.find_iter(corpus).count();
    if white_rgb > 0 {
        flags.push(Flag::new(
            Technique::WhiteText,
            Severity::High,
            format!("White RGB color (1 1 1 rg/RG) set {white_rgb} time(s)"),
            white_rgb,
        ));
    }

    let white_gray = p.white_gray.find_iter(corpus).count();
    if white_gray >= WHITE_ON_WHITE_MIN_OCCURRENCES {
        flags.push(Flag::new(
            Technique::WhiteOnWhite,
            Severity::Medium,
            format!("White grayscale color (1 g/G) set {white_gray} time(s)"),
            white_gray,
        ));
    }

    let offpage = p.offpage_move.find_iter(corpus).count();
    if offpage > 0 {
        flags.push(Flag::new(
            Technique::OffpageText,
            Severity::High,
            format!("Text positioned far off-page (large negative Td/TD) {offpage} time(s)"),
            offpage,
        ));
    }

    trace!(
        invisible,
        zero = sizes.zero,
        micro = sizes.micro,
        white_rgb,
        white_gray,
        offpage,
        "PDF check counts"
    );
    flags
}

/// Scan PDF bytes for hidden-text operators.
pub fn scan_pdf(data: &[u8]) -> Result<ScanResult, ScanError> {
    let p = patterns()?;
    let mut budget = InflateBudget::per_file();
    let corpus = build_corpus(data, &mut budget)?;
    Ok(ScanResult::from_flags(FileType::Pdf, check_corpus(&corpus, p)))
}
