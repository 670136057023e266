//! Error types for the edgequake-html2md library.
//!
//! Every failure is terminal for the document being converted: the caller
//! receives an [`Html2MdError`] and never a partially converted Markdown
//! string. None of the variants are retryable, they all stem from the input
//! itself (empty, oversized, missing content) or from the environment around
//! the core (unreadable file, failed download, unwritable output).
//!
//! Malformed HTML is *not* an error. The tolerant tree builder absorbs
//! unbalanced tags and unknown elements, and the sanitizer/converter pass
//! unrecognised constructs through.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-html2md library.
#[derive(Debug, Error)]
pub enum Html2MdError {
    // ── Core pipeline errors ──────────────────────────────────────────────
    /// The HTML document is empty or whitespace-only.
    #[error("HTML content is empty")]
    EmptyInput,

    /// The HTML document exceeds the configured size ceiling.
    ///
    /// Raised before any parsing takes place.
    #[error("HTML content is {size} bytes, exceeding the {limit}-byte limit\nRaise it with --max-size.")]
    PayloadTooLarge { size: u64, limit: u64 },

    /// No element matched the content-container pattern and the fallback
    /// policy is [`crate::config::FallbackPolicy::Fail`].
    #[error("No content container matching {pattern} found\nUse --fallback body to convert the whole <body> instead.")]
    NoContentFound { pattern: String },

    /// The fragment converted to Markdown without a single character of text.
    #[error("Document contains no convertible text")]
    UnsupportedStructure,

    // ── Collaborator errors ───────────────────────────────────────────────
    /// The request body could not be interpreted as HTML or a JSON envelope.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Input file was not found at the given path.
    #[error("HTML file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Reading the input failed, or it was not valid UTF-8.
    #[error("Failed to read '{path}': {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    /// The input string is not a usable file path, `-`, or HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path, '-' or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Html2MdError {
    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Html2MdError::EmptyInput => "EmptyInput",
            Html2MdError::PayloadTooLarge { .. } => "PayloadTooLarge",
            Html2MdError::NoContentFound { .. } => "NoContentFound",
            Html2MdError::UnsupportedStructure => "UnsupportedStructure",
            Html2MdError::InvalidRequest(_) => "InvalidRequest",
            Html2MdError::FileNotFound { .. } => "FileNotFound",
            Html2MdError::PermissionDenied { .. } => "PermissionDenied",
            Html2MdError::ReadFailed { .. } => "ReadFailed",
            Html2MdError::InvalidInput { .. } => "InvalidInput",
            Html2MdError::DownloadFailed { .. } => "DownloadFailed",
            Html2MdError::DownloadTimeout { .. } => "DownloadTimeout",
            Html2MdError::OutputWriteFailed { .. } => "OutputWriteFailed",
            Html2MdError::InvalidConfig(_) => "InvalidConfig",
            Html2MdError::Internal(_) => "Internal",
        }
    }

    /// HTTP status code a hosting runtime should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Html2MdError::EmptyInput | Html2MdError::InvalidRequest(_) => 400,
            Html2MdError::PayloadTooLarge { .. } => 413,
            Html2MdError::NoContentFound { .. } | Html2MdError::UnsupportedStructure => 422,
            _ => 500,
        }
    }
}
