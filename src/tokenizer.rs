use serde::Deserialize;

use crate::error::{ErrorCode, ParseError};
use crate::types::{HttpMethod, HttpVersion, ParserMode};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configurable limits and behaviour for the tokenizer.
///
/// All sizes are in bytes unless stated otherwise. Missing fields take their
/// default when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum length of the request method token (default: 16).
    pub max_method_len: usize,
    /// Maximum length of the request target (default: 8 192).
    pub max_url_len: usize,
    /// Maximum length of a single header field name (default: 256).
    pub max_header_name_len: usize,
    /// Maximum length of a single header field value (default: 8 192).
    pub max_header_value_len: usize,
    /// Maximum number of header fields (default: 128).
    pub max_headers_count: usize,
    /// Maximum body size (default: 10 MiB).
    pub max_body_size: usize,
    /// Stop consuming input once a message is complete (default: `false`).
    ///
    /// When set, `execute` returns the offset just past the finished message
    /// and the caller decides when the next one starts. When clear, every
    /// byte is consumed and each new message replaces the previous one.
    pub pause_on_complete: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_method_len: 16,
            max_url_len: 8_192,
            max_header_name_len: 256,
            max_header_value_len: 8_192,
            max_headers_count: 128,
            max_body_size: 10 * 1024 * 1024,
            pause_on_complete: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Event contract
// ---------------------------------------------------------------------------

/// Protocol facts handed to [`Callbacks::on_headers_complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHead {
    /// Request method (requests only).
    pub method: Option<HttpMethod>,
    /// Status code (responses only).
    pub status_code: Option<u16>,
    /// Protocol version from the start line.
    pub version: HttpVersion,
    /// Whether the connection may carry another message after this one.
    pub keep_alive: bool,
}

/// Receiver of tokenizer events.
///
/// Chunk events deliver a fragment of one logical field; a field may arrive
/// as many chunks spread over many [`Tokenizer::execute`] calls. Returning an
/// error aborts the `execute` call in progress and is surfaced to its caller.
pub trait Callbacks {
    fn on_message_begin(&mut self) -> Result<(), ParseError> {
        Ok(())
    }

    fn on_method(&mut self, _chunk: &[u8]) -> Result<(), ParseError> {
        Ok(())
    }

    fn on_url(&mut self, _chunk: &[u8]) -> Result<(), ParseError> {
        Ok(())
    }

    fn on_status(&mut self, _chunk: &[u8]) -> Result<(), ParseError> {
        Ok(())
    }

    fn on_header_field(&mut self, _chunk: &[u8]) -> Result<(), ParseError> {
        Ok(())
    }

    /// A zero-length chunk is delivered for a header with an empty value.
    fn on_header_value(&mut self, _chunk: &[u8]) -> Result<(), ParseError> {
        Ok(())
    }

    fn on_headers_complete(&mut self, _head: &MessageHead) -> Result<(), ParseError> {
        Ok(())
    }

    fn on_body(&mut self, _chunk: &[u8]) -> Result<(), ParseError> {
        Ok(())
    }

    fn on_message_complete(&mut self) -> Result<(), ParseError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// Regions delivered as chunk events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    Method,
    Url,
    Status,
    HeaderField,
    HeaderValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    // ---- Between messages ----
    MessageStart,
    DetectKind,

    // ---- Request line ----
    Method,
    Url,
    RequestVersion,
    RequestLineLf,

    // ---- Status line ----
    ResponseVersion,
    StatusCode,
    StatusText,
    StatusLineLf,

    // ---- Header section ----
    HeaderStart,
    HeaderName,
    HeaderValueOws,
    HeaderValue,
    HeaderValueLf,
    EndHeadersLf,

    // ---- Fixed-length and read-until-close bodies ----
    Body,
    BodyUntilEof,

    // ---- Chunked transfer encoding ----
    ChunkSize,
    ChunkExt,
    ChunkSizeLf,
    ChunkData,
    ChunkDataCr,
    ChunkDataLf,

    // ---- Chunked trailers ----
    TrailerStart,
    TrailerField,
    TrailerFieldLf,
    TrailerEndLf,

    // ---- Terminal ----
    Complete,
    Closed,
    Failed,
}

const RESPONSE_PREFIX: &[u8] = b"HTTP/";
const MAX_VERSION_LEN: usize = 16;
const MAX_CHUNK_SIZE_DIGITS: usize = 16;

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// An incremental HTTP/1.x tokenizer.
///
/// Walks raw bytes and reports the structure it finds to a [`Callbacks`]
/// implementation, synchronously and in input order.
///
/// ```rust
/// use wirefold::{Callbacks, ParseError, ParserMode, Tokenizer};
///
/// #[derive(Default)]
/// struct UrlOnly(Vec<u8>);
///
/// impl Callbacks for UrlOnly {
///     fn on_url(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
///         self.0.extend_from_slice(chunk);
///         Ok(())
///     }
/// }
///
/// let mut tokenizer = Tokenizer::new(ParserMode::Request);
/// let mut sink = UrlOnly::default();
/// tokenizer.execute(b"GET /ab", &mut sink).unwrap();
/// tokenizer.execute(b"c HTTP/1.1\r\n\r\n", &mut sink).unwrap();
/// assert_eq!(sink.0, b"/abc");
/// assert!(tokenizer.is_message_complete());
/// ```
#[derive(Debug)]
pub struct Tokenizer {
    mode: ParserMode,
    config: ParserConfig,
    state: State,
    open_span: Option<Span>,
    bytes_consumed: usize,

    // Start-line facts
    is_response: bool,
    method: Option<HttpMethod>,
    version: Option<HttpVersion>,
    status_code: Option<u16>,
    status_digits: u8,
    url_len: usize,

    // Accumulation buffers
    lookahead: Vec<u8>,
    method_buf: Vec<u8>,
    version_buf: Vec<u8>,
    header_name_buf: Vec<u8>,
    header_value_buf: Vec<u8>,
    pending_ows: Vec<u8>,
    chunk_size_buf: Vec<u8>,
    value_seen: bool,
    header_count: usize,

    // Framing
    content_length: Option<usize>,
    chunked: bool,
    connection_close: bool,
    connection_keep_alive: bool,
    keep_alive: bool,

    // Body bookkeeping
    body_remaining: usize,
    chunk_remaining: usize,
    body_received: usize,
}

impl Tokenizer {
    /// Create a tokenizer for `mode` with default configuration.
    pub fn new(mode: ParserMode) -> Self {
        Self::with_config(mode, ParserConfig::default())
    }

    /// Create a tokenizer for `mode` with custom limits.
    pub fn with_config(mode: ParserMode, config: ParserConfig) -> Self {
        Self {
            mode,
            config,
            state: State::MessageStart,
            open_span: None,
            bytes_consumed: 0,
            is_response: mode == ParserMode::Response,
            method: None,
            version: None,
            status_code: None,
            status_digits: 0,
            url_len: 0,
            lookahead: Vec::with_capacity(RESPONSE_PREFIX.len()),
            method_buf: Vec::with_capacity(8),
            version_buf: Vec::with_capacity(8),
            header_name_buf: Vec::with_capacity(32),
            header_value_buf: Vec::with_capacity(128),
            pending_ows: Vec::new(),
            chunk_size_buf: Vec::with_capacity(16),
            value_seen: false,
            header_count: 0,
            content_length: None,
            chunked: false,
            connection_close: false,
            connection_keep_alive: false,
            keep_alive: false,
            body_remaining: 0,
            chunk_remaining: 0,
            body_received: 0,
        }
    }

    /// Return to the initial state, keeping mode, configuration, and buffer
    /// capacity.
    pub fn reset(&mut self) {
        self.state = State::MessageStart;
        self.open_span = None;
        self.bytes_consumed = 0;
        self.begin_message();
        self.keep_alive = false;
    }

    /// Clear all per-message facts and buffers.
    fn begin_message(&mut self) {
        self.is_response = self.mode == ParserMode::Response;
        self.method = None;
        self.version = None;
        self.status_code = None;
        self.status_digits = 0;
        self.url_len = 0;
        self.lookahead.clear();
        self.method_buf.clear();
        self.version_buf.clear();
        self.header_name_buf.clear();
        self.header_value_buf.clear();
        self.pending_ows.clear();
        self.chunk_size_buf.clear();
        self.value_seen = false;
        self.header_count = 0;
        self.content_length = None;
        self.chunked = false;
        self.connection_close = false;
        self.connection_keep_alive = false;
        self.body_remaining = 0;
        self.chunk_remaining = 0;
        self.body_received = 0;
    }

    /// Feed a slice of bytes, reporting events to `callbacks`.
    ///
    /// Returns the number of bytes consumed. This is `data.len()` unless a
    /// message completed with [`ParserConfig::pause_on_complete`] set, in
    /// which case the remaining bytes belong to the next message.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] on any protocol violation, limit breach, or
    /// callback failure. The tokenizer then refuses further input until
    /// [`reset`](Self::reset).
    pub fn execute<C: Callbacks>(
        &mut self,
        data: &[u8],
        callbacks: &mut C,
    ) -> Result<usize, ParseError> {
        match self.state {
            State::Failed => {
                return Err(ParseError::LifecycleMisuse(
                    "execute called after a parse error without reset",
                ));
            }
            State::Closed => {
                return Err(ParseError::LifecycleMisuse(
                    "execute called after finish without reset",
                ));
            }
            _ => {}
        }

        let result = self.run(data, callbacks);
        if result.is_err() {
            self.state = State::Failed;
            self.open_span = None;
        }
        result
    }

    /// Signal end of input.
    ///
    /// Completes a response body that is delimited by connection close.
    /// Between messages this is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidEofState`] when input ends in the middle
    /// of a message that has its own framing.
    pub fn finish<C: Callbacks>(&mut self, callbacks: &mut C) -> Result<(), ParseError> {
        match self.state {
            State::Failed => Err(ParseError::LifecycleMisuse(
                "finish called after a parse error without reset",
            )),
            State::Closed => Ok(()),
            State::MessageStart | State::Complete => {
                self.state = State::Closed;
                Ok(())
            }
            State::BodyUntilEof => {
                let result = callbacks.on_message_complete();
                self.state = if result.is_ok() {
                    State::Closed
                } else {
                    State::Failed
                };
                result
            }
            _ => {
                self.state = State::Failed;
                self.open_span = None;
                Err(ParseError::tokenizer(
                    ErrorCode::InvalidEofState,
                    "input ended in the middle of a message",
                ))
            }
        }
    }

    fn run<C: Callbacks>(&mut self, data: &[u8], cb: &mut C) -> Result<usize, ParseError> {
        if self.state == State::Complete && !data.is_empty() {
            self.start_next_message()?;
        }

        // A region left open by the previous call continues at offset 0.
        let mut mark: Option<(Span, usize)> = self.open_span.take().map(|span| (span, 0));
        let mut i = 0;

        while i < data.len() {
            // ----- Message boundary -----
            if self.state == State::Complete {
                if self.config.pause_on_complete {
                    break;
                }
                self.start_next_message()?;
            }

            // ----- Bulk paths for body states -----
            match self.state {
                State::Body => {
                    let n = (data.len() - i).min(self.body_remaining);
                    self.account_body(n)?;
                    cb.on_body(&data[i..i + n])?;
                    self.body_remaining -= n;
                    self.bytes_consumed += n;
                    i += n;
                    if self.body_remaining == 0 {
                        self.complete_message(cb)?;
                    }
                    continue;
                }
                State::ChunkData => {
                    let n = (data.len() - i).min(self.chunk_remaining);
                    self.account_body(n)?;
                    cb.on_body(&data[i..i + n])?;
                    self.chunk_remaining -= n;
                    self.bytes_consumed += n;
                    i += n;
                    if self.chunk_remaining == 0 {
                        self.state = State::ChunkDataCr;
                    }
                    continue;
                }
                State::BodyUntilEof => {
                    let n = data.len() - i;
                    self.account_body(n)?;
                    cb.on_body(&data[i..])?;
                    self.bytes_consumed += n;
                    i += n;
                    continue;
                }
                _ => {}
            }

            // ----- Byte-by-byte path -----
            let pos = i;
            let byte = data[pos];
            let mut reprocess = false;

            match self.state {
                // ===================== MESSAGE START =====================
                State::MessageStart => {
                    // Stray CRLF between keep-alive messages is tolerated.
                    if byte != b'\r' && byte != b'\n' {
                        cb.on_message_begin()?;
                        self.begin_message();
                        tracing::trace!(mode = %self.mode, "message begin");
                        self.state = match self.mode {
                            ParserMode::Request => State::Method,
                            ParserMode::Response => State::ResponseVersion,
                            ParserMode::Both => State::DetectKind,
                        };
                        reprocess = true;
                    }
                }

                State::DetectKind => {
                    if byte == RESPONSE_PREFIX[self.lookahead.len()] {
                        self.lookahead.push(byte);
                        if self.lookahead.len() == RESPONSE_PREFIX.len() {
                            self.is_response = true;
                            self.version_buf.extend_from_slice(&self.lookahead);
                            self.lookahead.clear();
                            self.state = State::ResponseVersion;
                        }
                    } else {
                        // Not a status line: the prefix seen so far is
                        // the start of a request method.
                        self.is_response = false;
                        if !self.lookahead.is_empty() {
                            cb.on_method(&self.lookahead)?;
                            self.method_buf.extend_from_slice(&self.lookahead);
                            self.lookahead.clear();
                        }
                        self.state = State::Method;
                        reprocess = true;
                    }
                }

                // ===================== REQUEST LINE =====================
                State::Method => {
                    if byte == b' ' {
                        if self.method_buf.is_empty() {
                            return Err(ParseError::tokenizer(
                                ErrorCode::InvalidMethod,
                                "empty request method",
                            ));
                        }
                        close_span(&mut mark, data, pos, cb)?;
                        self.method = Some(HttpMethod::from_bytes(&self.method_buf)?);
                        self.state = State::Url;
                    } else if is_tchar(byte) {
                        if self.method_buf.len() >= self.config.max_method_len {
                            return Err(ParseError::tokenizer(
                                ErrorCode::InvalidMethod,
                                "method too long",
                            ));
                        }
                        self.method_buf.push(byte);
                        open_span(&mut mark, Span::Method, pos);
                    } else {
                        return Err(unexpected(ErrorCode::InvalidMethod, "request method", byte));
                    }
                }

                State::Url => {
                    if byte == b' ' {
                        if self.url_len == 0 {
                            return Err(ParseError::tokenizer(
                                ErrorCode::InvalidUrl,
                                "empty request target",
                            ));
                        }
                        close_span(&mut mark, data, pos, cb)?;
                        self.state = State::RequestVersion;
                    } else if byte > b' ' && byte != 0x7F {
                        if self.url_len >= self.config.max_url_len {
                            return Err(ParseError::tokenizer(
                                ErrorCode::InvalidUrl,
                                "request target too long",
                            ));
                        }
                        self.url_len += 1;
                        open_span(&mut mark, Span::Url, pos);
                    } else {
                        return Err(unexpected(ErrorCode::InvalidUrl, "request target", byte));
                    }
                }

                State::RequestVersion => {
                    if byte == b'\r' {
                        self.version = Some(HttpVersion::from_bytes(&self.version_buf)?);
                        self.state = State::RequestLineLf;
                    } else if byte > b' ' && byte != 0x7F {
                        self.push_version_byte(byte)?;
                    } else {
                        return Err(unexpected(ErrorCode::InvalidVersion, "protocol version", byte));
                    }
                }

                State::RequestLineLf => {
                    expect_lf(byte, "request line")?;
                    self.state = State::HeaderStart;
                }

                // ===================== STATUS LINE =====================
                State::ResponseVersion => {
                    if byte == b' ' {
                        self.version = Some(HttpVersion::from_bytes(&self.version_buf)?);
                        self.state = State::StatusCode;
                    } else if byte > b' ' && byte != 0x7F {
                        self.push_version_byte(byte)?;
                    } else {
                        return Err(unexpected(ErrorCode::InvalidVersion, "protocol version", byte));
                    }
                }

                State::StatusCode => {
                    if byte.is_ascii_digit() {
                        if self.status_digits == 3 {
                            return Err(ParseError::tokenizer(
                                ErrorCode::InvalidStatus,
                                "status code longer than three digits",
                            ));
                        }
                        let code = self.status_code.unwrap_or(0);
                        self.status_code = Some(code * 10 + u16::from(byte - b'0'));
                        self.status_digits += 1;
                    } else if byte == b' ' || byte == b'\r' {
                        if self.status_digits != 3 {
                            return Err(ParseError::tokenizer(
                                ErrorCode::InvalidStatus,
                                "status code must be three digits",
                            ));
                        }
                        self.state = if byte == b' ' {
                            State::StatusText
                        } else {
                            State::StatusLineLf
                        };
                    } else {
                        return Err(unexpected(ErrorCode::InvalidStatus, "status code", byte));
                    }
                }

                State::StatusText => {
                    if byte == b'\r' {
                        close_span(&mut mark, data, pos, cb)?;
                        self.state = State::StatusLineLf;
                    } else if is_field_content_byte(byte) {
                        open_span(&mut mark, Span::Status, pos);
                    } else {
                        return Err(unexpected(ErrorCode::InvalidStatus, "reason phrase", byte));
                    }
                }

                State::StatusLineLf => {
                    expect_lf(byte, "status line")?;
                    self.state = State::HeaderStart;
                }

                // ===================== HEADERS =====================
                State::HeaderStart => {
                    if byte == b'\r' {
                        self.state = State::EndHeadersLf;
                    } else if is_tchar(byte) {
                        if self.header_count >= self.config.max_headers_count {
                            return Err(ParseError::tokenizer(
                                ErrorCode::TooManyHeaders,
                                "number of headers exceeds maximum",
                            ));
                        }
                        self.header_count += 1;
                        self.header_name_buf.clear();
                        self.header_value_buf.clear();
                        self.pending_ows.clear();
                        self.value_seen = false;
                        self.header_name_buf.push(byte);
                        open_span(&mut mark, Span::HeaderField, pos);
                        self.state = State::HeaderName;
                    } else {
                        return Err(unexpected(
                            ErrorCode::InvalidHeaderToken,
                            "header name or CR",
                            byte,
                        ));
                    }
                }

                State::HeaderName => {
                    if byte == b':' {
                        close_span(&mut mark, data, pos, cb)?;
                        self.state = State::HeaderValueOws;
                    } else if is_tchar(byte) {
                        if self.header_name_buf.len() >= self.config.max_header_name_len {
                            return Err(ParseError::tokenizer(
                                ErrorCode::HeaderOverflow,
                                "header name exceeds maximum size",
                            ));
                        }
                        self.header_name_buf.push(byte);
                        open_span(&mut mark, Span::HeaderField, pos);
                    } else {
                        return Err(unexpected(
                            ErrorCode::InvalidHeaderToken,
                            "header name or ':'",
                            byte,
                        ));
                    }
                }

                State::HeaderValueOws => {
                    if byte == b' ' || byte == b'\t' {
                        // Leading OWS is not part of the value.
                    } else if byte == b'\r' {
                        self.end_header_value(cb)?;
                        self.state = State::HeaderValueLf;
                    } else if is_field_content_byte(byte) {
                        self.push_value_byte(byte)?;
                        open_span(&mut mark, Span::HeaderValue, pos);
                        self.state = State::HeaderValue;
                    } else {
                        return Err(unexpected(
                            ErrorCode::InvalidHeaderToken,
                            "header value",
                            byte,
                        ));
                    }
                }

                State::HeaderValue => {
                    if byte == b'\r' {
                        close_span(&mut mark, data, pos, cb)?;
                        self.end_header_value(cb)?;
                        self.state = State::HeaderValueLf;
                    } else if byte == b' ' || byte == b'\t' {
                        // Held back until a later byte shows it is interior.
                        close_span(&mut mark, data, pos, cb)?;
                        self.check_value_len()?;
                        self.pending_ows.push(byte);
                    } else if is_field_content_byte(byte) {
                        if !self.pending_ows.is_empty() {
                            cb.on_header_value(&self.pending_ows)?;
                            self.header_value_buf.extend_from_slice(&self.pending_ows);
                            self.pending_ows.clear();
                        }
                        self.push_value_byte(byte)?;
                        open_span(&mut mark, Span::HeaderValue, pos);
                    } else {
                        return Err(unexpected(
                            ErrorCode::InvalidHeaderToken,
                            "header value",
                            byte,
                        ));
                    }
                }

                State::HeaderValueLf => {
                    expect_lf(byte, "header value")?;
                    self.state = State::HeaderStart;
                }

                // ===================== END OF HEADERS =====================
                State::EndHeadersLf => {
                    expect_lf(byte, "header section")?;
                    self.headers_complete(cb)?;
                }

                // ===================== CHUNKED ENCODING =====================
                State::ChunkSize => {
                    if byte == b'\r' {
                        self.apply_chunk_size()?;
                        self.state = State::ChunkSizeLf;
                    } else if byte == b';' {
                        self.apply_chunk_size()?;
                        self.state = State::ChunkExt;
                    } else if byte.is_ascii_hexdigit() {
                        if self.chunk_size_buf.len() >= MAX_CHUNK_SIZE_DIGITS {
                            return Err(ParseError::tokenizer(
                                ErrorCode::InvalidChunkSize,
                                "chunk size too large",
                            ));
                        }
                        self.chunk_size_buf.push(byte);
                    } else {
                        return Err(unexpected(ErrorCode::InvalidChunkSize, "chunk size", byte));
                    }
                }

                State::ChunkExt => {
                    // RFC 9112 §7.1.1: chunk extensions are ignored.
                    if byte == b'\r' {
                        self.state = State::ChunkSizeLf;
                    }
                }

                State::ChunkSizeLf => {
                    expect_lf(byte, "chunk size")?;
                    self.state = if self.chunk_remaining == 0 {
                        State::TrailerStart
                    } else {
                        State::ChunkData
                    };
                }

                State::ChunkDataCr => {
                    if byte != b'\r' {
                        return Err(unexpected(ErrorCode::InvalidConstant, "CR after chunk data", byte));
                    }
                    self.state = State::ChunkDataLf;
                }

                State::ChunkDataLf => {
                    expect_lf(byte, "chunk data")?;
                    self.chunk_size_buf.clear();
                    self.state = State::ChunkSize;
                }

                // ===================== TRAILER SECTION =====================
                State::TrailerStart => {
                    self.state = if byte == b'\r' {
                        State::TrailerEndLf
                    } else {
                        State::TrailerField
                    };
                }

                State::TrailerField => {
                    if byte == b'\r' {
                        self.state = State::TrailerFieldLf;
                    }
                }

                State::TrailerFieldLf => {
                    expect_lf(byte, "trailer field")?;
                    self.state = State::TrailerStart;
                }

                State::TrailerEndLf => {
                    expect_lf(byte, "trailer section")?;
                    self.complete_message(cb)?;
                }

                State::Body
                | State::BodyUntilEof
                | State::ChunkData
                | State::Complete
                | State::Closed
                | State::Failed => {
                    unreachable!("handled by bulk-copy or boundary paths");
                }
            }

            if !reprocess {
                i += 1;
                self.bytes_consumed += 1;
            }
        }

        // Deliver the part of an open region that this buffer holds; the
        // rest arrives with the next call.
        if let Some((span, start)) = mark {
            emit(cb, span, &data[start..i])?;
            self.open_span = Some(span);
        }

        Ok(i)
    }

    // ----- helpers --------------------------------------------------------

    fn start_next_message(&mut self) -> Result<(), ParseError> {
        if !self.keep_alive {
            return Err(ParseError::tokenizer(
                ErrorCode::ClosedConnection,
                "data after the last message on a closing connection",
            ));
        }
        self.state = State::MessageStart;
        Ok(())
    }

    fn push_version_byte(&mut self, byte: u8) -> Result<(), ParseError> {
        if self.version_buf.len() >= MAX_VERSION_LEN {
            return Err(ParseError::tokenizer(
                ErrorCode::InvalidVersion,
                "version string too long",
            ));
        }
        self.version_buf.push(byte);
        Ok(())
    }

    fn check_value_len(&self) -> Result<(), ParseError> {
        if self.header_value_buf.len() + self.pending_ows.len() >= self.config.max_header_value_len {
            return Err(ParseError::tokenizer(
                ErrorCode::HeaderOverflow,
                "header value exceeds maximum size",
            ));
        }
        Ok(())
    }

    fn push_value_byte(&mut self, byte: u8) -> Result<(), ParseError> {
        self.check_value_len()?;
        self.header_value_buf.push(byte);
        self.value_seen = true;
        Ok(())
    }

    /// Finish one header line: guarantee a value event, then record the
    /// headers that decide framing and connection reuse.
    fn end_header_value<C: Callbacks>(&mut self, cb: &mut C) -> Result<(), ParseError> {
        if !self.value_seen {
            cb.on_header_value(b"")?;
        }
        // Trailing OWS is dropped.
        self.pending_ows.clear();

        let name = self.header_name_buf.as_slice();
        let value = self.header_value_buf.as_slice();

        if name.eq_ignore_ascii_case(b"content-length") {
            let length = parse_content_length(value).ok_or_else(|| {
                ParseError::tokenizer(
                    ErrorCode::InvalidContentLength,
                    String::from_utf8_lossy(value).into_owned(),
                )
            })?;
            // RFC 9112 §6.3: multiple differing Content-Length values are an error.
            if self.content_length.is_some_and(|previous| previous != length) {
                return Err(ParseError::tokenizer(
                    ErrorCode::InvalidContentLength,
                    "multiple differing Content-Length values",
                ));
            }
            self.content_length = Some(length);
        } else if name.eq_ignore_ascii_case(b"transfer-encoding") {
            // Only a final `chunked` coding frames the body as chunks.
            self.chunked = value
                .rsplit(|&b| b == b',')
                .next()
                .is_some_and(|coding| coding.trim_ascii().eq_ignore_ascii_case(b"chunked"));
        } else if name.eq_ignore_ascii_case(b"connection") {
            for token in value.split(|&b| b == b',') {
                let token = token.trim_ascii();
                if token.eq_ignore_ascii_case(b"close") {
                    self.connection_close = true;
                } else if token.eq_ignore_ascii_case(b"keep-alive") {
                    self.connection_keep_alive = true;
                }
            }
        }
        Ok(())
    }

    /// Decide how the body is delimited and announce the header section end.
    fn headers_complete<C: Callbacks>(&mut self, cb: &mut C) -> Result<(), ParseError> {
        let version = self.version.ok_or_else(|| {
            ParseError::tokenizer(ErrorCode::InvalidVersion, "missing protocol version")
        })?;

        self.keep_alive = match version {
            HttpVersion::Http11 => !self.connection_close,
            HttpVersion::Http10 => self.connection_keep_alive && !self.connection_close,
        };

        let bodiless_status = self
            .status_code
            .is_some_and(|code| (100..200).contains(&code) || code == 204 || code == 304);

        // Transfer-Encoding takes precedence over Content-Length (RFC 9112 §6.1).
        let next = if self.is_response && bodiless_status {
            State::Complete
        } else if self.chunked {
            self.chunk_size_buf.clear();
            State::ChunkSize
        } else if let Some(length) = self.content_length {
            if length > self.config.max_body_size {
                return Err(ParseError::tokenizer(
                    ErrorCode::BodyTooLarge,
                    "declared Content-Length exceeds maximum body size",
                ));
            }
            self.body_remaining = length;
            if length == 0 { State::Complete } else { State::Body }
        } else if self.is_response {
            // No framing: the body runs until the connection closes.
            self.keep_alive = false;
            State::BodyUntilEof
        } else {
            State::Complete
        };

        tracing::trace!(
            version = %version,
            status = ?self.status_code,
            chunked = self.chunked,
            content_length = ?self.content_length,
            keep_alive = self.keep_alive,
            "headers complete"
        );

        let head = MessageHead {
            method: self.method,
            status_code: self.status_code,
            version,
            keep_alive: self.keep_alive,
        };
        cb.on_headers_complete(&head)?;

        if next == State::Complete {
            self.complete_message(cb)
        } else {
            self.state = next;
            Ok(())
        }
    }

    fn complete_message<C: Callbacks>(&mut self, cb: &mut C) -> Result<(), ParseError> {
        cb.on_message_complete()?;
        self.state = State::Complete;
        tracing::trace!(body_bytes = self.body_received, "message complete");
        Ok(())
    }

    fn account_body(&mut self, n: usize) -> Result<(), ParseError> {
        if self.body_received + n > self.config.max_body_size {
            return Err(ParseError::tokenizer(
                ErrorCode::BodyTooLarge,
                "body exceeds maximum allowed size",
            ));
        }
        self.body_received += n;
        Ok(())
    }

    /// Parse the hex chunk-size that was accumulated in `chunk_size_buf`.
    fn apply_chunk_size(&mut self) -> Result<(), ParseError> {
        if self.chunk_size_buf.is_empty() {
            return Err(ParseError::tokenizer(
                ErrorCode::InvalidChunkSize,
                "empty chunk size",
            ));
        }

        let size_str = String::from_utf8_lossy(&self.chunk_size_buf);
        let size = usize::from_str_radix(&size_str, 16)
            .map_err(|_| ParseError::tokenizer(ErrorCode::InvalidChunkSize, size_str.as_ref()))?;

        if self.body_received.saturating_add(size) > self.config.max_body_size {
            return Err(ParseError::tokenizer(
                ErrorCode::BodyTooLarge,
                "chunk exceeds maximum body size",
            ));
        }

        self.chunk_remaining = size;
        Ok(())
    }

    // ----- public queries -------------------------------------------------

    /// The grammar this tokenizer was created for.
    pub fn mode(&self) -> ParserMode {
        self.mode
    }

    /// Method of the current request, once its request line has been read.
    pub fn method(&self) -> Option<HttpMethod> {
        self.method
    }

    /// Status code of the current response, once read.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Protocol version of the current message, once read.
    pub fn version(&self) -> Option<HttpVersion> {
        self.version
    }

    /// Whether the connection may carry another message after the current
    /// one. Meaningful once the header section has ended.
    pub fn should_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Returns `true` while a message has started but not completed.
    pub fn is_in_message(&self) -> bool {
        !matches!(
            self.state,
            State::MessageStart | State::Complete | State::Closed | State::Failed
        )
    }

    /// Returns `true` when the last message has completed.
    pub fn is_message_complete(&self) -> bool {
        self.state == State::Complete
    }

    /// Returns `true` after a failed `execute` or `finish`.
    pub fn has_failed(&self) -> bool {
        self.state == State::Failed
    }

    /// Total number of bytes consumed since creation or the last reset.
    pub fn bytes_consumed(&self) -> usize {
        self.bytes_consumed
    }
}

// ---------------------------------------------------------------------------
// Span delivery
// ---------------------------------------------------------------------------

fn open_span(mark: &mut Option<(Span, usize)>, span: Span, pos: usize) {
    if mark.is_none() {
        *mark = Some((span, pos));
    }
}

fn close_span<C: Callbacks>(
    mark: &mut Option<(Span, usize)>,
    data: &[u8],
    end: usize,
    cb: &mut C,
) -> Result<(), ParseError> {
    match mark.take() {
        Some((span, start)) => emit(cb, span, &data[start..end]),
        None => Ok(()),
    }
}

fn emit<C: Callbacks>(cb: &mut C, span: Span, chunk: &[u8]) -> Result<(), ParseError> {
    if chunk.is_empty() {
        return Ok(());
    }
    match span {
        Span::Method => cb.on_method(chunk),
        Span::Url => cb.on_url(chunk),
        Span::Status => cb.on_status(chunk),
        Span::HeaderField => cb.on_header_field(chunk),
        Span::HeaderValue => cb.on_header_value(chunk),
    }
}

/// `Content-Length = 1*DIGIT`; no sign, no whitespace, no overflow.
fn parse_content_length(value: &[u8]) -> Option<usize> {
    if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
        return None;
    }
    value.iter().try_fold(0usize, |acc, &d| {
        acc.checked_mul(10)?.checked_add(usize::from(d - b'0'))
    })
}

fn expect_lf(byte: u8, after: &'static str) -> Result<(), ParseError> {
    if byte == b'\n' {
        Ok(())
    } else {
        Err(ParseError::tokenizer(
            ErrorCode::InvalidConstant,
            format!("expected LF after {after}, found 0x{byte:02X}"),
        ))
    }
}

fn unexpected(code: ErrorCode, context: &'static str, byte: u8) -> ParseError {
    ParseError::tokenizer(code, format!("unexpected byte 0x{byte:02X} in {context}"))
}

// ---------------------------------------------------------------------------
// Character classification helpers (RFC 9110 / RFC 9112)
// ---------------------------------------------------------------------------

/// `tchar`: characters allowed in HTTP tokens (method, header names).
///
/// ```text
/// tchar = "!" / "#" / "$" / "%" / "&" / "'" / "*" / "+" / "-" / "." /
///         "^" / "_" / "`" / "|" / "~" / DIGIT / ALPHA
/// ```
#[inline]
fn is_tchar(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'#'
            | b'$'
            | b'%'
            | b'&'
            | b'\''
            | b'*'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~'
            | b'0'..=b'9'
            | b'a'..=b'z'
            | b'A'..=b'Z'
    )
}

/// Bytes permitted inside a header field value or reason phrase:
/// `SP / HTAB / VCHAR / obs-text`.
#[inline]
fn is_field_content_byte(b: u8) -> bool {
    b == b' ' || b == b'\t' || (0x21..=0x7E).contains(&b) || b >= 0x80
}

// ---------------------------------------------------------------------------
// Tests (unit)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Begin,
        Method(Vec<u8>),
        Url(Vec<u8>),
        Status(Vec<u8>),
        Field(Vec<u8>),
        Value(Vec<u8>),
        HeadersComplete(MessageHead),
        Body(Vec<u8>),
        Complete,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
    }

    impl Callbacks for Recorder {
        fn on_message_begin(&mut self) -> Result<(), ParseError> {
            self.events.push(Event::Begin);
            Ok(())
        }
        fn on_method(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
            self.events.push(Event::Method(chunk.to_vec()));
            Ok(())
        }
        fn on_url(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
            self.events.push(Event::Url(chunk.to_vec()));
            Ok(())
        }
        fn on_status(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
            self.events.push(Event::Status(chunk.to_vec()));
            Ok(())
        }
        fn on_header_field(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
            self.events.push(Event::Field(chunk.to_vec()));
            Ok(())
        }
        fn on_header_value(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
            self.events.push(Event::Value(chunk.to_vec()));
            Ok(())
        }
        fn on_headers_complete(&mut self, head: &MessageHead) -> Result<(), ParseError> {
            self.events.push(Event::HeadersComplete(*head));
            Ok(())
        }
        fn on_body(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
            self.events.push(Event::Body(chunk.to_vec()));
            Ok(())
        }
        fn on_message_complete(&mut self) -> Result<(), ParseError> {
            self.events.push(Event::Complete);
            Ok(())
        }
    }

    fn v(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn tchar_accepts_valid_bytes() {
        for &b in b"abcXYZ019!#$%&'*+-.^_`|~" {
            assert!(is_tchar(b), "expected tchar for byte 0x{b:02X}");
        }
    }

    #[test]
    fn tchar_rejects_invalid_bytes() {
        for &b in b" \t\r\n@[]{}" {
            assert!(!is_tchar(b), "expected non-tchar for byte 0x{b:02X}");
        }
    }

    #[test]
    fn field_content_byte_rejects_ctl() {
        assert!(!is_field_content_byte(0x00));
        assert!(!is_field_content_byte(0x1F));
        assert!(!is_field_content_byte(0x7F));
        assert!(is_field_content_byte(0x80));
    }

    #[test]
    fn request_events_in_order() {
        let mut tokenizer = Tokenizer::new(ParserMode::Request);
        let mut rec = Recorder::default();
        let raw = b"POST /a HTTP/1.1\r\nHost: h\r\nContent-Length: 2\r\n\r\nok";
        assert_eq!(tokenizer.execute(raw, &mut rec).unwrap(), raw.len());

        assert_eq!(
            rec.events,
            vec![
                Event::Begin,
                Event::Method(v("POST")),
                Event::Url(v("/a")),
                Event::Field(v("Host")),
                Event::Value(v("h")),
                Event::Field(v("Content-Length")),
                Event::Value(v("2")),
                Event::HeadersComplete(MessageHead {
                    method: Some(HttpMethod::POST),
                    status_code: None,
                    version: HttpVersion::Http11,
                    keep_alive: true,
                }),
                Event::Body(v("ok")),
                Event::Complete,
            ]
        );
    }

    #[test]
    fn split_region_is_delivered_once_per_call() {
        let mut tokenizer = Tokenizer::new(ParserMode::Request);
        let mut rec = Recorder::default();
        tokenizer.execute(b"GET /x HTTP/1.1\r\nHo", &mut rec).unwrap();
        tokenizer.execute(b"st: a\r\n\r\n", &mut rec).unwrap();

        let fields: Vec<_> = rec
            .events
            .iter()
            .filter(|e| matches!(e, Event::Field(_)))
            .cloned()
            .collect();
        assert_eq!(fields, vec![Event::Field(v("Ho")), Event::Field(v("st"))]);
        assert!(tokenizer.is_message_complete());
    }

    #[test]
    fn header_value_ows_is_never_delivered() {
        let mut tokenizer = Tokenizer::new(ParserMode::Request);
        let mut rec = Recorder::default();
        tokenizer
            .execute(b"GET / HTTP/1.1\r\nX-A:  one  two \t\r\n\r\n", &mut rec)
            .unwrap();

        let value: Vec<u8> = rec
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Value(chunk) => Some(chunk.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(value, v("one  two"));
    }

    #[test]
    fn empty_header_value_yields_empty_chunk() {
        let mut tokenizer = Tokenizer::new(ParserMode::Request);
        let mut rec = Recorder::default();
        tokenizer
            .execute(b"GET / HTTP/1.1\r\nX-Empty:\r\nHost: h\r\n\r\n", &mut rec)
            .unwrap();
        assert_eq!(rec.events[3], Event::Field(v("X-Empty")));
        assert_eq!(rec.events[4], Event::Value(Vec::new()));
        assert_eq!(rec.events[5], Event::Field(v("Host")));
    }

    #[test]
    fn both_mode_detects_response() {
        let mut tokenizer = Tokenizer::new(ParserMode::Both);
        let mut rec = Recorder::default();
        tokenizer
            .execute(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n", &mut rec)
            .unwrap();
        assert_eq!(tokenizer.status_code(), Some(404));
        assert!(rec.events.contains(&Event::Status(v("Not Found"))));
        assert!(rec.events.iter().all(|e| !matches!(e, Event::Method(_))));
    }

    #[test]
    fn both_mode_replays_prefix_as_method() {
        let mut tokenizer = Tokenizer::new(ParserMode::Both);
        let mut rec = Recorder::default();
        tokenizer.execute(b"HE", &mut rec).unwrap();
        tokenizer.execute(b"AD / HTTP/1.1\r\n\r\n", &mut rec).unwrap();

        assert_eq!(tokenizer.method(), Some(HttpMethod::HEAD));
        assert_eq!(rec.events[1], Event::Method(v("H")));
        assert_eq!(rec.events[2], Event::Method(v("E")));
        assert_eq!(rec.events[3], Event::Method(v("AD")));
    }

    #[test]
    fn pause_on_complete_leaves_next_message() {
        let raw = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let config = ParserConfig {
            pause_on_complete: true,
            ..ParserConfig::default()
        };
        let mut tokenizer = Tokenizer::with_config(ParserMode::Request, config);
        let mut rec = Recorder::default();

        let consumed = tokenizer.execute(raw, &mut rec).unwrap();
        assert_eq!(&raw[consumed..consumed + 6], b"GET /b");

        let rest = tokenizer.execute(&raw[consumed..], &mut rec).unwrap();
        assert_eq!(consumed + rest, raw.len());
        assert_eq!(rec.events.iter().filter(|e| **e == Event::Begin).count(), 2);
    }

    #[test]
    fn closing_connection_rejects_more_data() {
        let mut tokenizer = Tokenizer::new(ParserMode::Request);
        let mut rec = Recorder::default();
        tokenizer
            .execute(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n", &mut rec)
            .unwrap();
        assert!(!tokenizer.should_keep_alive());

        let err = tokenizer.execute(b"GET", &mut rec).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ClosedConnection));
        assert!(tokenizer.has_failed());
    }

    #[test]
    fn http10_needs_explicit_keep_alive() {
        let mut tokenizer = Tokenizer::new(ParserMode::Request);
        let mut rec = Recorder::default();
        tokenizer.execute(b"GET / HTTP/1.0\r\n\r\n", &mut rec).unwrap();
        assert!(!tokenizer.should_keep_alive());

        tokenizer.reset();
        tokenizer
            .execute(b"GET / HTTP/1.0\r\nConnection: Keep-Alive\r\n\r\n", &mut rec)
            .unwrap();
        assert!(tokenizer.should_keep_alive());
    }

    #[test]
    fn response_without_framing_reads_until_finish() {
        let mut tokenizer = Tokenizer::new(ParserMode::Response);
        let mut rec = Recorder::default();
        tokenizer.execute(b"HTTP/1.1 200 OK\r\n\r\nabc", &mut rec).unwrap();
        tokenizer.execute(b"def", &mut rec).unwrap();
        assert!(!tokenizer.is_message_complete());
        assert!(!tokenizer.should_keep_alive());

        tokenizer.finish(&mut rec).unwrap();
        assert_eq!(rec.events.last(), Some(&Event::Complete));
    }

    #[test]
    fn no_content_response_has_no_body() {
        let mut tokenizer = Tokenizer::new(ParserMode::Response);
        let mut rec = Recorder::default();
        tokenizer
            .execute(b"HTTP/1.1 204 No Content\r\nServer: x\r\n\r\n", &mut rec)
            .unwrap();
        assert!(tokenizer.is_message_complete());
    }

    #[test]
    fn finish_mid_message_is_invalid_eof() {
        let mut tokenizer = Tokenizer::new(ParserMode::Request);
        let mut rec = Recorder::default();
        tokenizer
            .execute(b"POST / HTTP/1.1\r\nContent-Length: 9\r\n\r\nabc", &mut rec)
            .unwrap();
        let err = tokenizer.finish(&mut rec).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidEofState));
    }

    #[test]
    fn callback_error_aborts_execute() {
        struct Refuse;
        impl Callbacks for Refuse {
            fn on_url(&mut self, _chunk: &[u8]) -> Result<(), ParseError> {
                Err(ParseError::tokenizer(ErrorCode::CallbackError, "no urls"))
            }
        }

        let mut tokenizer = Tokenizer::new(ParserMode::Request);
        let err = tokenizer
            .execute(b"GET /x HTTP/1.1\r\n\r\n", &mut Refuse)
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::CallbackError));

        let again = tokenizer.execute(b"x", &mut Refuse).unwrap_err();
        assert!(matches!(again, ParseError::LifecycleMisuse(_)));
    }

    #[test]
    fn default_config_consumes_pipelined_input() {
        let raw = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let mut tokenizer = Tokenizer::new(ParserMode::Request);
        let mut rec = Recorder::default();

        assert_eq!(tokenizer.execute(raw, &mut rec).unwrap(), raw.len());
        assert_eq!(rec.events.iter().filter(|e| **e == Event::Complete).count(), 2);
        assert!(rec.events.contains(&Event::Url(v("/b"))));
    }

    #[test]
    fn handler_error_is_returned_unchanged() {
        #[derive(Default)]
        struct FailOnBody {
            after_body: usize,
            failed: bool,
        }
        impl Callbacks for FailOnBody {
            fn on_body(&mut self, _chunk: &[u8]) -> Result<(), ParseError> {
                self.failed = true;
                Err(ParseError::AllocationFailure { requested: 1 })
            }
            fn on_message_complete(&mut self) -> Result<(), ParseError> {
                if self.failed {
                    self.after_body += 1;
                }
                Ok(())
            }
            fn on_message_begin(&mut self) -> Result<(), ParseError> {
                if self.failed {
                    self.after_body += 1;
                }
                Ok(())
            }
        }

        let mut tokenizer = Tokenizer::new(ParserMode::Request);
        let mut sink = FailOnBody::default();
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 2\r\n\r\nokGET / HTTP/1.1\r\n\r\n";
        let err = tokenizer.execute(raw, &mut sink).unwrap_err();

        assert_eq!(err, ParseError::AllocationFailure { requested: 1 });
        assert_eq!(sink.after_body, 0);
        assert!(tokenizer.has_failed());
        assert_eq!(tokenizer.bytes_consumed(), raw.len() - 20);
    }

    #[test]
    fn content_length_must_be_plain_digits() {
        assert_eq!(parse_content_length(b"42"), Some(42));
        assert_eq!(parse_content_length(b"+2"), None);
        assert_eq!(parse_content_length(b"-1"), None);
        assert_eq!(parse_content_length(b""), None);
        assert_eq!(parse_content_length(b"99999999999999999999999"), None);
    }

    #[test]
    fn only_final_chunked_coding_selects_chunked_framing() {
        let mut rec = Recorder::default();
        let mut tokenizer = Tokenizer::new(ParserMode::Request);
        tokenizer
            .execute(
                b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip, Chunked\r\n\r\n0\r\n\r\n",
                &mut rec,
            )
            .unwrap();
        assert!(tokenizer.is_message_complete());

        tokenizer.reset();
        tokenizer
            .execute(
                b"POST / HTTP/1.1\r\nTransfer-Encoding: notchunkedx\r\nContent-Length: 2\r\n\r\nok",
                &mut rec,
            )
            .unwrap();
        assert!(tokenizer.is_message_complete());
        assert_eq!(rec.events.last(), Some(&Event::Complete));
        assert!(rec.events.contains(&Event::Body(v("ok"))));
    }

    #[test]
    fn status_code_must_have_three_digits() {
        let mut tokenizer = Tokenizer::new(ParserMode::Response);
        let err = tokenizer
            .execute(b"HTTP/1.1 20 OK\r\n\r\n", &mut Recorder::default())
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidStatus));
    }

    #[test]
    fn leading_crlf_is_skipped() {
        let mut tokenizer = Tokenizer::new(ParserMode::Request);
        let mut rec = Recorder::default();
        tokenizer.execute(b"\r\nGET / HTTP/1.1\r\n\r\n", &mut rec).unwrap();
        assert!(tokenizer.is_message_complete());
        assert_eq!(rec.events[0], Event::Begin);
    }
}
