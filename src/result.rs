//! Scan result types: hiding techniques, flags and the per-file verdict.

use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::FileType;

/// A technique used to embed invisible or visually suppressed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Technique {
    /// PDF text rendering mode 3 (glyphs neither filled nor stroked).
    InvisibleRenderMode,
    /// Font size of zero (PDF) or at most 1pt (DOCX).
    ZeroFontSize,
    /// Non-zero but imperceptibly small font size.
    MicroFont,
    /// Text painted in white.
    WhiteText,
    /// Repeated grayscale white painting (PDF `1 g` / `1 G`).
    WhiteOnWhite,
    /// Text positioned far outside any visible page region.
    OffpageText,
    /// DOCX hidden or web-hidden run property.
    HiddenProperty,
}

impl Technique {
    /// Wire name (e.g. `"invisible_render_mode"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Technique::InvisibleRenderMode => "invisible_render_mode",
            Technique::ZeroFontSize => "zero_font_size",
            Technique::MicroFont => "micro_font",
            Technique::WhiteText => "white_text",
            Technique::WhiteOnWhite => "white_on_white",
            Technique::OffpageText => "offpage_text",
            Technique::HiddenProperty => "hidden_property",
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strongly a flag indicates deliberate hiding. Fixed per check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected technique with its aggregated occurrence count.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Flag {
    pub technique: Technique,
    pub severity: Severity,
    /// Human-readable description including the occurrence count.
    pub description: String,
    /// Plain text found near the first match (DOCX high-value checks only).
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub snippet: Option<String>,
    /// Number of occurrences, always at least 1.
    pub count: usize,
}

impl Flag {
    pub fn new(
        technique: Technique,
        severity: Severity,
        description: impl Into<String>,
        count: usize,
    ) -> Self {
        Self {
            technique,
            severity,
            description: description.into(),
            snippet: None,
            count: count.max(1),
        }
    }

    pub fn with_snippet(mut self, snippet: Option<String>) -> Self {
        self.snippet = snippet;
        self
    }
}

/// Verdict for one scanned file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ScanResult {
    /// True iff at least one flag is medium or high severity.
    pub flagged: bool,
    /// Sum of all flag counts.
    pub total_indicators: usize,
    /// Flags in check order.
    pub flags: Vec<Flag>,
    pub file_type: FileType,
}

impl ScanResult {
    /// Build a result from the flags of one scanner, deriving `flagged` and `total_indicators`.
    pub fn from_flags(file_type: FileType, flags: Vec<Flag>) -> Self {
        let flagged = flags.iter().any(|f| f.severity >= Severity::Medium);
        let total_indicators = flags.iter().map(|f| f.count).sum();
        Self {
            flagged,
            total_indicators,
            flags,
            file_type,
        }
    }

    /// The clean/unknown default: unsupported format, unparseable file or internal failure.
    pub fn unknown() -> Self {
        Self::from_flags(FileType::Unknown, Vec::new())
    }

    /// Flags with severity medium or high, in check order.
    pub fn significant_flags(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter().filter(|f| f.severity > Severity::Low)
    }
}

impl Default for ScanResult {
    fn default() -> Self {
        Self::unknown()
    }
}
