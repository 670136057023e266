//! Transport-agnostic request handling for hosting the converter behind an
//! HTTP endpoint.
//!
//! A hosting runtime maps its framework's request onto [`HttpRequest`], calls
//! [`handle`], and copies the returned [`HttpResponse`] back out. No server
//! dependency lives in this crate.
//!
//! Request bodies are dispatched on `Content-Type`:
//!
//! - `text/html`: the body *is* the document;
//! - anything else: a JSON envelope `{"html": "...", "title": "..."}`.

use crate::config::ConversionConfig;
use crate::convert::convert_html;
use crate::error::Html2MdError;
use crate::output::ConversionOutput;
use crate::pipeline::input::decode_html;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// An incoming conversion request.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    /// Raw `Content-Type` header value, if any.
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// The response to send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// JSON request envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    html: Option<String>,
    title: Option<String>,
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
    pub success: bool,
}

/// A parsed request: the HTML plus an optional declared title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub html: String,
    pub title: Option<String>,
}

/// Convert a request into a downloadable Markdown response, or a JSON error.
pub fn handle(request: &HttpRequest, config: &ConversionConfig) -> HttpResponse {
    let result = parse_request(request, config)
        .and_then(|req| convert_html(&req.html, req.title.as_deref(), config));
    match result {
        Ok(output) => attachment_response(&output),
        Err(e) => {
            warn!("Conversion request failed ({}): {}", e.kind(), e);
            error_response(&e)
        }
    }
}

/// Decode the request body.
///
/// The body size is checked against the ceiling before anything is decoded.
pub fn parse_request(
    request: &HttpRequest,
    config: &ConversionConfig,
) -> Result<ConversionRequest, Html2MdError> {
    let size = request.body.len() as u64;
    if size > config.max_input_bytes {
        return Err(Html2MdError::PayloadTooLarge {
            size,
            limit: config.max_input_bytes,
        });
    }

    if is_html(request.content_type.as_deref()) {
        return Ok(ConversionRequest {
            html: decode_html(request.body.clone(), "request body"),
            title: None,
        });
    }

    let envelope: Envelope = serde_json::from_slice(&request.body)
        .map_err(|e| Html2MdError::InvalidRequest(format!("body is not valid JSON: {e}")))?;
    let html = envelope
        .html
        .ok_or_else(|| Html2MdError::InvalidRequest("missing 'html' field".to_string()))?;
    Ok(ConversionRequest {
        html,
        title: envelope.title,
    })
}

fn is_html(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/html"))
}

/// `200 OK` with the Markdown as an attachment named after the output.
pub fn attachment_response(output: &ConversionOutput) -> HttpResponse {
    HttpResponse {
        status: 200,
        headers: vec![
            (
                "Content-Type".to_string(),
                "text/markdown; charset=utf-8".to_string(),
            ),
            (
                "Content-Disposition".to_string(),
                content_disposition(&output.filename),
            ),
            ("Cache-Control".to_string(), "no-cache".to_string()),
        ],
        body: output.markdown.clone().into_bytes(),
    }
}

/// JSON error body with the status the error maps to.
pub fn error_response(error: &Html2MdError) -> HttpResponse {
    let body = ErrorBody {
        error: error.to_string(),
        kind: error.kind().to_string(),
        success: false,
    };
    let body = serde_json::to_vec(&body).unwrap_or_else(|_| b"{\"success\":false}".to_vec());
    HttpResponse {
        status: error.status_code(),
        headers: vec![(
            "Content-Type".to_string(),
            "application/json".to_string(),
        )],
        body,
    }
}

/// `attachment; filename="..."`, with an RFC 5987 `filename*` for names
/// that are not plain ASCII.
fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    if ascii == filename {
        return format!("attachment; filename=\"{filename}\"");
    }
    let encoded: String = filename
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
                (b as char).to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect();
    format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}
