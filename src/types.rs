use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::{ErrorCode, ParseError};

/// Ordered header mapping: name → value, in the order entries were first
/// written. Writing an existing name replaces its value in place.
pub type Headers = IndexMap<String, String>;

// ---------------------------------------------------------------------------
// ParserMode
// ---------------------------------------------------------------------------

/// Which grammar the tokenizer enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserMode {
    /// Request line: `METHOD target HTTP/x.y`.
    Request,
    /// Status line: `HTTP/x.y code reason`.
    Response,
    /// Decide per message from the first bytes.
    #[default]
    Both,
}

impl ParserMode {
    /// Return the mode name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for ParserMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HttpMethod
// ---------------------------------------------------------------------------

/// Standard HTTP request methods as defined in RFC 9110.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    DELETE,
    GET,
    HEAD,
    POST,
    PUT,
    CONNECT,
    OPTIONS,
    TRACE,
    PATCH,
}

impl HttpMethod {
    /// Parse an HTTP method from a byte slice.
    ///
    /// Returns an error if the bytes do not match a known method.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        match bytes {
            b"DELETE" => Ok(Self::DELETE),
            b"GET" => Ok(Self::GET),
            b"HEAD" => Ok(Self::HEAD),
            b"POST" => Ok(Self::POST),
            b"PUT" => Ok(Self::PUT),
            b"CONNECT" => Ok(Self::CONNECT),
            b"OPTIONS" => Ok(Self::OPTIONS),
            b"TRACE" => Ok(Self::TRACE),
            b"PATCH" => Ok(Self::PATCH),
            _ => Err(ParseError::tokenizer(
                ErrorCode::InvalidMethod,
                format!("unknown method '{}'", String::from_utf8_lossy(bytes)),
            )),
        }
    }

    /// Return the method as a static string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DELETE => "DELETE",
            Self::GET => "GET",
            Self::HEAD => "HEAD",
            Self::POST => "POST",
            Self::PUT => "PUT",
            Self::CONNECT => "CONNECT",
            Self::OPTIONS => "OPTIONS",
            Self::TRACE => "TRACE",
            Self::PATCH => "PATCH",
        }
    }

    /// Numeric method id, using the numbering common to HTTP tokenizers
    /// (`DELETE = 0`, `GET = 1`, ..., `PATCH = 28`).
    pub fn id(&self) -> u8 {
        match self {
            Self::DELETE => 0,
            Self::GET => 1,
            Self::HEAD => 2,
            Self::POST => 3,
            Self::PUT => 4,
            Self::CONNECT => 5,
            Self::OPTIONS => 6,
            Self::TRACE => 7,
            Self::PATCH => 28,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HttpVersion
// ---------------------------------------------------------------------------

/// HTTP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVersion {
    /// HTTP/1.0
    Http10,
    /// HTTP/1.1
    Http11,
}

impl HttpVersion {
    /// Parse an HTTP version from a byte slice (e.g. `b"HTTP/1.1"`).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        match bytes {
            b"HTTP/1.0" => Ok(Self::Http10),
            b"HTTP/1.1" => Ok(Self::Http11),
            _ => Err(ParseError::tokenizer(
                ErrorCode::InvalidVersion,
                format!("unsupported version '{}'", String::from_utf8_lossy(bytes)),
            )),
        }
    }

    /// Return the version as a static string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        }
    }

    pub fn major(&self) -> u8 {
        1
    }

    pub fn minor(&self) -> u8 {
        match self {
            Self::Http10 => 0,
            Self::Http11 => 1,
        }
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One parsed HTTP request or response.
///
/// Request messages carry `method` and `url`; response messages carry
/// `status_text` and `status_code`. The header mapping is settled once the
/// header section has ended, and `body` once `complete` is `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// The request method, as sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// The request target, as sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// The response reason phrase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// The response status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Protocol major version (0 until the header section has ended).
    pub http_major: u8,
    /// Protocol minor version (0 until the header section has ended).
    pub http_minor: u8,
    /// Header fields in completion order.
    pub headers: Headers,
    /// The message body; empty when none was sent.
    #[serde(serialize_with = "serialize_body")]
    pub body: Vec<u8>,
    /// `true` once the message-complete event has been observed.
    pub complete: bool,
}

/// Serialize body bytes as a UTF-8 string (lossy) for JSON output.
fn serialize_body<S: Serializer>(body: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(body))
}

impl Message {
    /// Returns `true` if this message was parsed with the request grammar.
    pub fn is_request(&self) -> bool {
        self.method.is_some()
    }

    /// Returns `true` if this message was parsed with the response grammar.
    pub fn is_response(&self) -> bool {
        self.status_code.is_some() || self.status_text.is_some()
    }

    /// The protocol version, once known.
    pub fn version(&self) -> Option<HttpVersion> {
        match (self.http_major, self.http_minor) {
            (1, 0) => Some(HttpVersion::Http10),
            (1, 1) => Some(HttpVersion::Http11),
            _ => None,
        }
    }

    /// Look up a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Return the body as a UTF-8 `&str` if it is valid UTF-8.
    pub fn body_as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Return the body as a lossy UTF-8 string (always succeeds).
    pub fn body_as_lossy_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the `Content-Length` header, if present and all digits.
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length")
            .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|v| v.parse().ok())
    }

    /// Return `true` if the final `Transfer-Encoding` coding is `chunked`.
    pub fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .and_then(|v| v.rsplit(',').next())
            .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_ids_follow_tokenizer_numbering() {
        assert_eq!(HttpMethod::DELETE.id(), 0);
        assert_eq!(HttpMethod::GET.id(), 1);
        assert_eq!(HttpMethod::POST.id(), 3);
        assert_eq!(HttpMethod::PATCH.id(), 28);
    }

    #[test]
    fn unknown_method_is_rejected_with_code() {
        let err = HttpMethod::from_bytes(b"BREW").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidMethod));
    }

    #[test]
    fn version_components() {
        assert_eq!(HttpVersion::Http10.minor(), 0);
        assert_eq!(HttpVersion::Http11.major(), 1);
        assert!(HttpVersion::from_bytes(b"HTTP/2.0").is_err());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut message = Message::default();
        message
            .headers
            .insert("Content-Type".into(), "text/plain".into());
        assert_eq!(message.header("content-type"), Some("text/plain"));
        assert_eq!(message.header("accept"), None);
    }

    #[test]
    fn framing_helpers_are_strict() {
        let mut message = Message::default();
        message.headers.insert("Content-Length".into(), "+2".into());
        message
            .headers
            .insert("Transfer-Encoding".into(), "gzip, chunked".into());
        assert_eq!(message.content_length(), None);
        assert!(message.is_chunked());

        message.headers.insert("Content-Length".into(), "12".into());
        message
            .headers
            .insert("Transfer-Encoding".into(), "chunked, gzip".into());
        assert_eq!(message.content_length(), Some(12));
        assert!(!message.is_chunked());
    }

    #[test]
    fn lossy_body_replaces_invalid_bytes() {
        let message = Message {
            body: vec![b'o', 0xFF, b'k'],
            ..Message::default()
        };
        assert_eq!(message.body_as_str(), None);
        assert_eq!(message.body_as_lossy_string(), "o\u{FFFD}k");
    }

    #[test]
    fn default_message_is_neither_request_nor_response() {
        let message = Message::default();
        assert!(!message.is_request());
        assert!(!message.is_response());
        assert_eq!(message.version(), None);
        assert!(message.body.is_empty());
    }
}
