//! Conversion results.

use serde::{Deserialize, Serialize};

/// A finished conversion: the Markdown plus everything a caller needs to
/// offer it as a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Final Markdown, ending in exactly one newline.
    pub markdown: String,
    /// Derived document title.
    pub title: String,
    /// `<title>.md`, restricted to Unicode word characters and `-` plus the extension.
    pub filename: String,
    pub stats: ConversionStats,
}

/// What happened during one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Size of the HTML input in bytes.
    pub input_bytes: u64,
    /// No content container was found; the whole `<body>` was converted.
    pub used_fallback: bool,
    /// A trailer element was found and everything from it on was dropped.
    pub trailer_truncated: bool,
    /// Subtrees removed by the sanitizer.
    pub nodes_removed: usize,
    /// Attributes (inline styles) dropped by the sanitizer.
    pub attributes_scrubbed: usize,
    /// Flow-level tables in the output.
    pub tables: usize,
    pub duration_ms: u64,
}
