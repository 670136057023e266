//! Pipeline stages for HTML-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step, composed
//! strictly in sequence by [`crate::convert::convert_html`].
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ sanitize ──▶ markdown ──▶ tables ──▶ postprocess
//! (content)   (strip)      (draft)      (repair)   (tidy, title)
//! ```
//!
//! 1. [`extract`]  - parse tolerantly, isolate the content container, cut at
//!    the trailer
//! 2. [`sanitize`] - rule-based removal of styles, scripts, diagrams and
//!    inline images
//! 3. [`markdown`] - map HTML structure to a draft of text and table blocks
//! 4. [`tables`]   - pad, flatten, escape and re-separate every table
//! 5. [`postprocess`] - deterministic text cleanup, title and filename
//!
//! [`input`] reads the HTML from a file, stdin or a URL; [`dom`] holds the
//! tree helpers shared by the stages.

pub mod dom;
pub mod draft;
pub mod extract;
pub mod input;
pub mod markdown;
pub mod postprocess;
pub mod sanitize;
pub mod tables;
