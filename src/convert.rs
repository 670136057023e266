//! Conversion entry points.
//!
//! [`convert_html`] is the core: synchronous, single-threaded, and
//! reentrant. It owns the parsed tree for the duration of the call and drops
//! it on return, so concurrent conversions share nothing.
//!
//! [`convert_file`] and [`convert_to_file`] wrap it with async I/O for file,
//! stdin, and URL inputs.

use crate::config::ConversionConfig;
use crate::error::Html2MdError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::input::{self, InputSource};
use crate::pipeline::markdown::Converter;
use crate::pipeline::sanitize::Sanitizer;
use crate::pipeline::{extract, postprocess, tables};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Convert one HTML document to Markdown.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `html` - the HTML document
/// * `declared_title` - title supplied by the caller; wins over anything
///   derived from the document when non-blank
/// * `config` - conversion configuration
///
/// # Errors
/// - [`Html2MdError::PayloadTooLarge`] / [`Html2MdError::EmptyInput`] before
///   any parsing takes place
/// - [`Html2MdError::NoContentFound`] when the container is missing and the
///   fallback policy is `Fail`
/// - [`Html2MdError::UnsupportedStructure`] when nothing convertible is left
///
/// # Example
/// ```rust
/// use edgequake_html2md::{convert_html, ConversionConfig};
///
/// let html = r#"<div id="content"><h1>Hello</h1><p>World</p></div>"#;
/// let out = convert_html(html, None, &ConversionConfig::default()).unwrap();
/// assert_eq!(out.markdown, "# Hello\n\nWorld\n");
/// assert_eq!(out.filename, "Hello.md");
/// ```
pub fn convert_html(
    html: &str,
    declared_title: Option<&str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Html2MdError> {
    let start = Instant::now();

    // ── Step 1: Guard input ──────────────────────────────────────────────
    check_input(html, config)?;
    info!("Starting conversion: {} bytes of HTML", html.len());

    // ── Step 2: Extract content ──────────────────────────────────────────
    let fragment = extract::extract(html, config)?;

    // ── Step 3: Sanitize ─────────────────────────────────────────────────
    let report = Sanitizer::default().sanitize(&fragment);

    // ── Step 4: Convert to a Markdown draft ──────────────────────────────
    let draft = Converter::new(config.nested_table_join).convert(&fragment)?;

    // ── Step 5: Normalize tables ─────────────────────────────────────────
    let draft = tables::normalize_draft(&draft, config.nested_table_join);

    // ── Step 6: Finalize ─────────────────────────────────────────────────
    let markdown = postprocess::tidy_markdown(&draft.to_markdown());
    if markdown.trim().is_empty() {
        return Err(Html2MdError::UnsupportedStructure);
    }
    let title = postprocess::derive_title(
        declared_title,
        &markdown,
        fragment.document_title.as_deref(),
        &config.default_title,
    );
    let filename = postprocess::filename_for(&title, &config.default_title);
    debug!("Derived title {:?}, filename {:?}", title, filename);

    let stats = ConversionStats {
        input_bytes: html.len() as u64,
        used_fallback: fragment.used_fallback,
        trailer_truncated: fragment.truncated,
        nodes_removed: report.nodes_removed(),
        attributes_scrubbed: report.attributes_scrubbed(),
        tables: draft.table_count(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} bytes of Markdown, {} table(s), {}ms",
        markdown.len(),
        stats.tables,
        stats.duration_ms
    );

    Ok(ConversionOutput {
        markdown,
        title,
        filename,
        stats,
    })
}

/// Reject oversized or empty input without parsing it.
///
/// The size check runs first: a huge whitespace-only body is reported as
/// too large, not as empty.
pub fn check_input(html: &str, config: &ConversionConfig) -> Result<(), Html2MdError> {
    let size = html.len() as u64;
    if size > config.max_input_bytes {
        return Err(Html2MdError::PayloadTooLarge {
            size,
            limit: config.max_input_bytes,
        });
    }
    if html.trim().is_empty() {
        return Err(Html2MdError::EmptyInput);
    }
    Ok(())
}

/// Run only extraction and sanitization and return the resulting HTML.
///
/// Useful to inspect what the converter will see.
pub fn sanitize_html(html: &str, config: &ConversionConfig) -> Result<String, Html2MdError> {
    check_input(html, config)?;
    let fragment = extract::extract(html, config)?;
    Sanitizer::default().sanitize(&fragment);
    Ok(fragment.to_html())
}

/// Read HTML from a file path, `-` (stdin), or an HTTP/HTTPS URL and
/// convert it.
pub async fn convert_file(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Html2MdError> {
    let html = read_html(input_str.as_ref(), config).await?;
    convert_html(&html, None, config)
}

/// Read the HTML of an input without converting it.
pub async fn read_html(input_str: &str, config: &ConversionConfig) -> Result<String, Html2MdError> {
    let source = InputSource::classify(input_str)?;
    input::read_input(&source, config.max_input_bytes, config.download_timeout_secs).await
}

/// Convert an input and write the Markdown to `output_path`.
///
/// When `output_path` is an existing directory the derived filename is used
/// inside it. Uses atomic write (temp file + rename) to prevent partial
/// files. Returns the path written.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<(PathBuf, ConversionStats), Html2MdError> {
    let output = convert_file(input_str, config).await?;
    let path = resolve_output_path(output_path.as_ref(), &output.filename).await;
    write_atomic(&path, &output.markdown).await?;
    info!("Wrote {}", path.display());
    Ok((path, output.stats))
}

/// `output` itself, or `output/<filename>` when `output` is a directory.
pub async fn resolve_output_path(output: &Path, filename: &str) -> PathBuf {
    let is_dir = tokio::fs::metadata(output)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if is_dir {
        output.join(filename)
    } else {
        output.to_path_buf()
    }
}

/// Write `contents` to `path` through a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), Html2MdError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Html2MdError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| Html2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Html2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_check_precedes_empty_check() {
        let config = ConversionConfig::builder().max_input_bytes(4).build().unwrap();
        assert!(matches!(
            check_input("          ", &config),
            Err(Html2MdError::PayloadTooLarge { size: 10, limit: 4 })
        ));
        assert!(matches!(
            check_input("  ", &config),
            Err(Html2MdError::EmptyInput)
        ));
        assert!(check_input("<p>", &config).is_ok());
    }

    #[test]
    fn stats_record_pipeline_activity() {
        let html = r#"<html><head><title>Doc</title></head><body>
            <div id="content" style="x"><p>text</p><script>s()</script>
            <table><tr><td>a</td></tr></table>
            <div id="likes-and-labels-container">likes</div></div></body></html>"#;
        let out = convert_html(html, None, &ConversionConfig::default()).unwrap();
        assert!(out.stats.trailer_truncated);
        assert!(!out.stats.used_fallback);
        assert_eq!(out.stats.nodes_removed, 1);
        assert_eq!(out.stats.attributes_scrubbed, 1);
        assert_eq!(out.stats.tables, 1);
        assert_eq!(out.title, "Doc");
        assert_eq!(out.filename, "Doc.md");
    }

    #[test]
    fn sanitize_html_returns_cleaned_fragment() {
        let html = r#"<div id="content"><p style="c">a</p><svg></svg></div>"#;
        let out = sanitize_html(html, &ConversionConfig::default()).unwrap();
        assert_eq!(out, r#"<div id="content"><p>a</p></div>"#);
    }
}
