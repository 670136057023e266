//! Configuration types for HTML-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The config is plain data: it can be
//! shared across threads, serialised for logging, and diffed between runs.
//!
//! The defaults target Confluence page exports: content lives in
//! `<div id="content">`, and the page trailer (likes, labels, comments) starts
//! at `<div id="likes-and-labels-container">`.

use crate::error::Html2MdError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default size ceiling: 10 MiB of HTML.
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Title (and file stem) used when no title can be derived.
pub const DEFAULT_TITLE: &str = "converted";

/// Configuration for an HTML-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_html2md::{ConversionConfig, FallbackPolicy, NestedTableJoin};
///
/// let config = ConversionConfig::builder()
///     .max_input_bytes(2 * 1024 * 1024)
///     .fallback(FallbackPolicy::Fail)
///     .nested_table_join(NestedTableJoin::LineBreak)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Maximum accepted input size in bytes. Default: 10 MiB.
    ///
    /// Checked before parsing starts, so oversized input never costs a
    /// tree build.
    pub max_input_bytes: u64,

    /// Element holding the main content. Default: id prefix `content`.
    pub content_container: IdPattern,

    /// Element where the main content stops. Default: id prefix
    /// `likes-and-labels-container`. `None` disables truncation.
    pub trailer: Option<IdPattern>,

    /// What to do when no content container exists. Default: [`FallbackPolicy::WholeBody`].
    pub fallback: FallbackPolicy,

    /// How rows of a nested table are joined once flattened into their
    /// parent cell. Default: [`NestedTableJoin::Semicolon`].
    pub nested_table_join: NestedTableJoin,

    /// Title used when neither a declared title, a heading, nor a `<title>`
    /// element is available. Default: `converted`.
    pub default_title: String,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            content_container: IdPattern::Prefix("content".to_string()),
            trailer: Some(IdPattern::Prefix("likes-and-labels-container".to_string())),
            fallback: FallbackPolicy::default(),
            nested_table_join: NestedTableJoin::default(),
            default_title: DEFAULT_TITLE.to_string(),
            download_timeout_secs: 120,
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn max_input_bytes(mut self, bytes: u64) -> Self {
        self.config.max_input_bytes = bytes.max(1);
        self
    }

    pub fn content_container(mut self, pattern: IdPattern) -> Self {
        self.config.content_container = pattern;
        self
    }

    pub fn trailer(mut self, pattern: Option<IdPattern>) -> Self {
        self.config.trailer = pattern;
        self
    }

    pub fn fallback(mut self, policy: FallbackPolicy) -> Self {
        self.config.fallback = policy;
        self
    }

    pub fn nested_table_join(mut self, join: NestedTableJoin) -> Self {
        self.config.nested_table_join = join;
        self
    }

    pub fn default_title(mut self, title: impl Into<String>) -> Self {
        self.config.default_title = title.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Html2MdError> {
        let c = &self.config;
        if c.content_container.value().trim().is_empty() {
            return Err(Html2MdError::InvalidConfig(
                "content container id must not be empty".into(),
            ));
        }
        if let Some(ref t) = c.trailer {
            if t.value().trim().is_empty() {
                return Err(Html2MdError::InvalidConfig(
                    "trailer id must not be empty (disable it instead)".into(),
                ));
            }
        }
        if crate::pipeline::postprocess::sanitize_filename(&c.default_title).is_none() {
            return Err(Html2MdError::InvalidConfig(format!(
                "default title {:?} has no filename-safe characters",
                c.default_title
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Matches an element by its `id` attribute.
///
/// Wiki and CMS exports frequently suffix ids (`content-body`,
/// `drawio-macro-content-3f2a…`), so prefix matching is the usual choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdPattern {
    /// `id` equals the value.
    Exact(String),
    /// `id` starts with the value.
    Prefix(String),
}

impl IdPattern {
    /// Whether an element with this `id` matches.
    pub fn matches(&self, id: &str) -> bool {
        match self {
            IdPattern::Exact(v) => id == v,
            IdPattern::Prefix(v) => id.starts_with(v.as_str()),
        }
    }

    /// The id value (or prefix) being matched.
    pub fn value(&self) -> &str {
        match self {
            IdPattern::Exact(v) | IdPattern::Prefix(v) => v,
        }
    }
}

impl fmt::Display for IdPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdPattern::Exact(v) => write!(f, "[id=\"{v}\"]"),
            IdPattern::Prefix(v) => write!(f, "[id^=\"{v}\"]"),
        }
    }
}

/// Behaviour when the content container is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FallbackPolicy {
    /// Convert the whole `<body>` and log a warning. (default)
    #[default]
    WholeBody,
    /// Fail with [`Html2MdError::NoContentFound`].
    Fail,
}

/// Separator placed between the rows of a nested table once it has been
/// flattened into a single parent cell.
///
/// Cells of one nested row are always joined with `", "`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NestedTableJoin {
    /// `"; "`: plain text, survives any Markdown renderer. (default)
    #[default]
    Semicolon,
    /// `"<br>"`: renders as separate lines on GFM renderers.
    LineBreak,
}

impl NestedTableJoin {
    /// The literal separator inserted between flattened rows.
    pub fn separator(self) -> &'static str {
        match self {
            NestedTableJoin::Semicolon => "; ",
            NestedTableJoin::LineBreak => "<br>",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_confluence_exports() {
        let c = ConversionConfig::default();
        assert!(c.content_container.matches("content"));
        assert!(c.content_container.matches("content-body"));
        assert!(!c.content_container.matches("main-content"));
        assert!(c
            .trailer
            .as_ref()
            .is_some_and(|t| t.matches("likes-and-labels-container")));
        assert_eq!(c.fallback, FallbackPolicy::WholeBody);
        assert_eq!(c.max_input_bytes, DEFAULT_MAX_INPUT_BYTES);
    }

    #[test]
    fn exact_pattern_rejects_suffixes() {
        let p = IdPattern::Exact("main".into());
        assert!(p.matches("main"));
        assert!(!p.matches("main-2"));
    }

    #[test]
    fn builder_clamps_zero_size() {
        let c = ConversionConfig::builder().max_input_bytes(0).build().unwrap();
        assert_eq!(c.max_input_bytes, 1);
    }

    #[test]
    fn builder_rejects_empty_container() {
        let err = ConversionConfig::builder()
            .content_container(IdPattern::Exact("  ".into()))
            .build()
            .unwrap_err();
        assert!(matches!(err, Html2MdError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_unusable_default_title() {
        let err = ConversionConfig::builder()
            .default_title("???")
            .build()
            .unwrap_err();
        assert!(matches!(err, Html2MdError::InvalidConfig(_)));
    }

    #[test]
    fn join_separators() {
        assert_eq!(NestedTableJoin::Semicolon.separator(), "; ");
        assert_eq!(NestedTableJoin::LineBreak.separator(), "<br>");
    }
}
