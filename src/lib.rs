//! # wirefold
//!
//! An **incremental HTTP/1.x message accumulator** and **response
//! serializer**, usable both as a Rust library and as a CLI tool.
//!
//! A byte-level [`Tokenizer`] walks input of any fragmentation and reports
//! structural events; the [`Parser`] folds those events into one structured
//! [`Message`]. Fields split across any number of `execute` calls are merged,
//! so the result never depends on where chunk boundaries fall.
//!
//! ## One-shot parsing
//!
//! ```rust
//! use wirefold::{parse_message, ParserMode};
//!
//! let raw = b"GET /hello HTTP/1.1\r\nHost: example.com\r\n\r\n";
//! let message = parse_message(ParserMode::Request, raw).expect("valid request");
//! assert_eq!(message.method.as_deref(), Some("GET"));
//! assert_eq!(message.url.as_deref(), Some("/hello"));
//! ```
//!
//! ## Incremental parsing
//!
//! ```rust
//! use wirefold::{Parser, ParserMode, ParserState};
//!
//! let mut parser = Parser::new(ParserMode::Both);
//!
//! parser.execute(b"HTTP/1.1 200 OK\r\nContent-Le").unwrap();
//! assert_eq!(parser.state(), ParserState::Parsing);
//!
//! parser.execute(b"ngth: 2\r\n\r\nhi").unwrap();
//! let message = parser.result();
//! assert!(message.complete);
//! assert_eq!(message.status_code, Some(200));
//! assert_eq!(message.body, b"hi");
//! ```
//!
//! ## Responses
//!
//! ```rust
//! use wirefold::{serialize_response, Headers};
//!
//! let mut headers = Headers::new();
//! headers.insert("Content-Length".into(), "5".into());
//! let wire = serialize_response(200, Some(&headers), Some(b"hello"));
//! assert_eq!(wire, b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");
//! ```

mod accumulator;
mod error;
mod output;
mod parser;
mod response;
mod tokenizer;
mod types;

// Re-export public API.
pub use error::{ErrorCode, ParseError};
pub use output::{format_debug, format_headers_only, format_json};
pub use parser::{Parser, ParserState};
pub use response::{
    serialize_response, serialize_response_with_reason, ResponseTemplate, DEFAULT_REASON_PHRASE,
};
pub use tokenizer::{Callbacks, MessageHead, ParserConfig, Tokenizer};
pub use types::{Headers, HttpMethod, HttpVersion, Message, ParserMode};

/// Parse one **complete** HTTP message from a byte slice in one call.
///
/// This is a convenience wrapper around [`Parser`]. End of input is
/// signalled with `finish`, so a response delimited by connection close is
/// accepted. For incremental / streaming use-cases, create a `Parser`
/// directly.
///
/// # Errors
///
/// Returns [`ParseError`] if the data is malformed or incomplete.
pub fn parse_message(mode: ParserMode, data: &[u8]) -> Result<Message, ParseError> {
    parse_message_with_config(mode, data, ParserConfig::default())
}

/// Parse one **complete** HTTP message using custom [`ParserConfig`] limits.
///
/// # Errors
///
/// Returns [`ParseError`] if the data is malformed, incomplete, or exceeds
/// the configured limits.
pub fn parse_message_with_config(
    mode: ParserMode,
    data: &[u8],
    config: ParserConfig,
) -> Result<Message, ParseError> {
    let mut parser = Parser::with_config(mode, config);
    parser.execute(data)?;
    if !parser.is_complete() {
        parser.finish()?;
    }
    parser.take_message().ok_or_else(|| {
        ParseError::tokenizer(
            ErrorCode::InvalidEofState,
            "input ended before a complete message",
        )
    })
}
