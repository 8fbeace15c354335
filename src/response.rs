use serde::{Deserialize, Serialize};

use crate::types::Headers;

/// Reason phrase written by [`serialize_response`] whatever the status code.
///
/// Callers that want a phrase matching the code supply it through
/// [`serialize_response_with_reason`]; no status → phrase table is applied.
pub const DEFAULT_REASON_PHRASE: &str = "OK";

/// Render an HTTP/1.1 response with the fixed [`DEFAULT_REASON_PHRASE`].
///
/// ```rust
/// use wirefold::{serialize_response, Headers};
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Length".into(), "5".into());
/// let bytes = serialize_response(200, Some(&headers), Some(b"hello"));
/// assert_eq!(bytes, b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");
/// ```
pub fn serialize_response(status_code: u16, headers: Option<&Headers>, body: Option<&[u8]>) -> Vec<u8> {
    serialize_response_with_reason(status_code, DEFAULT_REASON_PHRASE, headers, body)
}

/// Render an HTTP/1.1 response with a caller-supplied reason phrase.
///
/// Output is the status line, one `name: value` line per header in mapping
/// order, a blank line, then the body bytes verbatim.
///
/// Nothing is validated. The reason phrase, header names and header values
/// are copied byte for byte, so a CR or LF in any of them ends the line
/// early. Callers passing untrusted text must reject those bytes first.
pub fn serialize_response_with_reason(
    status_code: u16,
    reason: &str,
    headers: Option<&Headers>,
    body: Option<&[u8]>,
) -> Vec<u8> {
    let status = status_code.to_string();
    let header_len: usize = headers
        .map(|h| h.iter().map(|(k, v)| k.len() + v.len() + 4).sum())
        .unwrap_or(0);
    let body = body.unwrap_or_default();

    let mut out = Vec::with_capacity(
        "HTTP/1.1  \r\n".len() + status.len() + reason.len() + header_len + 2 + body.len(),
    );

    out.extend_from_slice(b"HTTP/1.1 ");
    out.extend_from_slice(status.as_bytes());
    out.push(b' ');
    out.extend_from_slice(reason.as_bytes());
    out.extend_from_slice(b"\r\n");

    for (name, value) in headers.into_iter().flatten() {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

/// A structured response description, e.g. loaded from JSON.
///
/// ```json
/// { "status": 404, "reason": "Not Found",
///   "headers": { "Content-Type": "text/plain" }, "body": "gone" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTemplate {
    /// Numeric status code (default: 200).
    #[serde(default = "default_status")]
    pub status: u16,
    /// Reason phrase; [`DEFAULT_REASON_PHRASE`] when absent.
    #[serde(default)]
    pub reason: Option<String>,
    /// Header fields, written in the given order.
    #[serde(default)]
    pub headers: Headers,
    /// Body text, written verbatim.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_status() -> u16 {
    200
}

impl ResponseTemplate {
    /// Render this response to wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        serialize_response_with_reason(
            self.status,
            self.reason.as_deref().unwrap_or(DEFAULT_REASON_PHRASE),
            Some(&self.headers),
            self.body.as_deref().map(str::as_bytes),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_size_is_exact() {
        let mut headers = Headers::new();
        headers.insert("A".into(), "b".into());
        let out = serialize_response(500, Some(&headers), Some(b"xyz"));
        assert_eq!(out.len(), "HTTP/1.1 500 OK\r\nA: b\r\n\r\nxyz".len());
    }

    #[test]
    fn header_text_is_copied_unchecked() {
        let mut headers = Headers::new();
        headers.insert("X-A".into(), "1\r\nX-B: 2".into());
        let out = serialize_response(200, Some(&headers), None);
        assert_eq!(out, b"HTTP/1.1 200 OK\r\nX-A: 1\r\nX-B: 2\r\n\r\n");
    }

    #[test]
    fn template_defaults_fill_missing_fields() {
        let template: ResponseTemplate = serde_json::from_str("{}").unwrap();
        assert_eq!(template.status, 200);
        assert_eq!(template.to_bytes(), b"HTTP/1.1 200 OK\r\n\r\n");
    }
}
