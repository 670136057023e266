//! Input resolution: read HTML from a local file, stdin, or a URL.
//!
//! The size ceiling is enforced *before* the body is buffered whenever the
//! source can tell us its size up front (file metadata, `Content-Length`),
//! and by a bounded read otherwise, so an oversized input never costs more
//! than `limit + 1` bytes of memory.

use crate::error::Html2MdError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// Where the HTML comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// `-`: read standard input.
    Stdin,
    /// A local file path.
    Local(PathBuf),
    /// An `http://` or `https://` URL.
    Url(String),
}

impl InputSource {
    /// Classify a user-supplied input string.
    pub fn classify(input: &str) -> Result<Self, Html2MdError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Html2MdError::InvalidInput {
                input: input.to_string(),
            });
        }
        if trimmed == "-" {
            Ok(InputSource::Stdin)
        } else if is_url(trimmed) {
            Ok(InputSource::Url(trimmed.to_string()))
        } else {
            Ok(InputSource::Local(PathBuf::from(trimmed)))
        }
    }

    /// Short label for logs and error messages.
    pub fn label(&self) -> String {
        match self {
            InputSource::Stdin => "<stdin>".to_string(),
            InputSource::Local(p) => p.display().to_string(),
            InputSource::Url(u) => u.clone(),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read the HTML text of `source`, rejecting anything over `limit` bytes.
pub async fn read_input(
    source: &InputSource,
    limit: u64,
    timeout_secs: u64,
) -> Result<String, Html2MdError> {
    let bytes = match source {
        InputSource::Stdin => read_stdin(limit).await?,
        InputSource::Local(path) => read_local(path, limit).await?,
        InputSource::Url(url) => download_url(url, limit, timeout_secs).await?,
    };
    debug!("Read {} bytes from {}", bytes.len(), source.label());
    Ok(decode_html(bytes, &source.label()))
}

/// Read a local file, checking its size from metadata first.
async fn read_local(path: &Path, limit: u64) -> Result<Vec<u8>, Html2MdError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| map_io_error(path, e))?;
    if meta.is_dir() {
        return Err(Html2MdError::ReadFailed {
            path: path.to_path_buf(),
            reason: "is a directory".to_string(),
        });
    }
    if meta.len() > limit {
        return Err(Html2MdError::PayloadTooLarge {
            size: meta.len(),
            limit,
        });
    }
    tokio::fs::read(path)
        .await
        .map_err(|e| map_io_error(path, e))
}

fn map_io_error(path: &Path, e: std::io::Error) -> Html2MdError {
    match e.kind() {
        std::io::ErrorKind::NotFound => Html2MdError::FileNotFound { path: path.to_path_buf() },
        std::io::ErrorKind::PermissionDenied => {
            Html2MdError::PermissionDenied { path: path.to_path_buf() }
        }
        _ => Html2MdError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    }
}

/// Read stdin, stopping one byte past the limit.
async fn read_stdin(limit: u64) -> Result<Vec<u8>, Html2MdError> {
    let mut buf = Vec::new();
    tokio::io::stdin()
        .take(limit.saturating_add(1))
        .read_to_end(&mut buf)
        .await
        .map_err(|e| Html2MdError::ReadFailed {
            path: PathBuf::from("-"),
            reason: e.to_string(),
        })?;
    let size = buf.len() as u64;
    if size > limit {
        return Err(Html2MdError::PayloadTooLarge { size, limit });
    }
    Ok(buf)
}

/// Download a URL, honouring the timeout and the size ceiling.
async fn download_url(url: &str, limit: u64, timeout_secs: u64) -> Result<Vec<u8>, Html2MdError> {
    info!("Downloading HTML from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Html2MdError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            Html2MdError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Html2MdError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(Html2MdError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }
    if let Some(len) = response.content_length() {
        if len > limit {
            return Err(Html2MdError::PayloadTooLarge { size: len, limit });
        }
    }

    let bytes = response.bytes().await.map_err(map_err)?;
    if bytes.len() as u64 > limit {
        return Err(Html2MdError::PayloadTooLarge {
            size: bytes.len() as u64,
            limit,
        });
    }
    Ok(bytes.to_vec())
}

/// Decode bytes as UTF-8, replacing invalid sequences and dropping a BOM.
pub fn decode_html(bytes: Vec<u8>, label: &str) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            warn!("{} is not valid UTF-8; invalid bytes were replaced", label);
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    match text.strip_prefix('\u{FEFF}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/page.html"));
        assert!(is_url("http://example.com/page.html"));
        assert!(!is_url("/tmp/page.html"));
        assert!(!is_url("page.html"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_classify() {
        assert_eq!(InputSource::classify("-").unwrap(), InputSource::Stdin);
        assert_eq!(
            InputSource::classify(" https://x.test/a ").unwrap(),
            InputSource::Url("https://x.test/a".into())
        );
        assert_eq!(
            InputSource::classify("page.html").unwrap(),
            InputSource::Local(PathBuf::from("page.html"))
        );
        assert!(matches!(
            InputSource::classify("  "),
            Err(Html2MdError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_decode_strips_bom_and_replaces_invalid_bytes() {
        let text = decode_html(b"\xEF\xBB\xBF<p>a\xFFb</p>".to_vec(), "t");
        assert_eq!(text, "<p>a\u{FFFD}b</p>");
    }

    #[tokio::test]
    async fn test_local_file_over_limit_is_rejected_before_reading() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[b'x'; 64]).unwrap();
        let source = InputSource::Local(f.path().to_path_buf());
        let err = read_input(&source, 10, 5).await.unwrap_err();
        assert!(matches!(
            err,
            Html2MdError::PayloadTooLarge { size: 64, limit: 10 }
        ));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let source = InputSource::Local(PathBuf::from("/definitely/not/here.html"));
        let err = read_input(&source, 1024, 5).await.unwrap_err();
        assert!(matches!(err, Html2MdError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_reads_local_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"<p>hello</p>").unwrap();
        let source = InputSource::Local(f.path().to_path_buf());
        assert_eq!(read_input(&source, 1024, 5).await.unwrap(), "<p>hello</p>");
    }
}
