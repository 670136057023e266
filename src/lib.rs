//! # edgequake-html2md
//!
//! Convert exported HTML pages (Confluence, wikis, CMS exports) to clean
//! Markdown.
//!
//! ## Why this crate?
//!
//! Exported pages are mostly chrome: navigation, inline styles, scripts,
//! diagram widgets, base64 screenshots, and a trailer of likes and comments.
//! Their tables are the worst part, with colspans, multi-paragraph cells, and
//! tables nested inside tables. Generic converters emit that as broken pipe
//! tables. This crate keeps only the content, strips everything that is not
//! text, and guarantees every table comes out rectangular and renderable.
//!
//! ## Pipeline Overview
//!
//! ```text
//! HTML
//!  │
//!  ├─ 0. Guard     reject empty or oversized input, before parsing
//!  ├─ 1. Extract   tolerant html5ever parse, content container, trailer cut
//!  ├─ 2. Sanitize  styles, scripts, diagrams, data: images
//!  ├─ 3. Convert   headings, emphasis, lists, links, code, tables
//!  ├─ 4. Tables    pad, flatten nested tables, escape pipes, re-separate
//!  └─ 5. Finalize  tidy text, derive title and `<title>.md` filename
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use edgequake_html2md::{convert_html, ConversionConfig};
//!
//! let html = r#"<div id="content"><h1>Title</h1>
//!   <table><tr><td>A</td><td>B|C</td></tr></table>
//!   <div id="likes-and-labels-container">ignored</div></div>"#;
//! let output = convert_html(html, None, &ConversionConfig::default()).unwrap();
//! assert!(output.markdown.contains("| A | B\\|C |"));
//! assert!(!output.markdown.contains("ignored"));
//! assert_eq!(output.filename, "Title.md");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `html2md` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-html2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, FallbackPolicy, IdPattern, NestedTableJoin,
};
pub use convert::{convert_file, convert_html, convert_to_file, sanitize_html};
pub use error::Html2MdError;
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::tables::normalize_tables;
