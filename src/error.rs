use std::fmt;

/// Tokenizer error codes.
///
/// Each code has a stable upper-case name (see [`ErrorCode::as_str`]) that is
/// included in the rendered [`ParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The request method is empty, too long, or not a standard method.
    InvalidMethod,
    /// The request target is empty, too long, or contains a forbidden byte.
    InvalidUrl,
    /// The protocol version is not `HTTP/1.0` or `HTTP/1.1`.
    InvalidVersion,
    /// The status code is not three decimal digits.
    InvalidStatus,
    /// A header name contains a non-token byte.
    InvalidHeaderToken,
    /// A fixed part of the grammar (CR, LF, SP) was expected and not found.
    InvalidConstant,
    /// A `Content-Length` value is not a valid integer, or duplicates differ.
    InvalidContentLength,
    /// A chunk size in chunked transfer encoding is not valid hexadecimal.
    InvalidChunkSize,
    /// A header name or value exceeds the configured maximum size.
    HeaderOverflow,
    /// The number of headers exceeds the configured maximum.
    TooManyHeaders,
    /// The body exceeds the configured maximum size.
    BodyTooLarge,
    /// Data arrived after a message on a connection that is not kept alive.
    ClosedConnection,
    /// `finish` was called in the middle of a message.
    InvalidEofState,
    /// An event handler rejected an event.
    CallbackError,
}

impl ErrorCode {
    /// Return the stable name of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidMethod => "INVALID_METHOD",
            Self::InvalidUrl => "INVALID_URL",
            Self::InvalidVersion => "INVALID_VERSION",
            Self::InvalidStatus => "INVALID_STATUS",
            Self::InvalidHeaderToken => "INVALID_HEADER_TOKEN",
            Self::InvalidConstant => "INVALID_CONSTANT",
            Self::InvalidContentLength => "INVALID_CONTENT_LENGTH",
            Self::InvalidChunkSize => "INVALID_CHUNK_SIZE",
            Self::HeaderOverflow => "HEADER_OVERFLOW",
            Self::TooManyHeaders => "TOO_MANY_HEADERS",
            Self::BodyTooLarge => "BODY_TOO_LARGE",
            Self::ClosedConnection => "CLOSED_CONNECTION",
            Self::InvalidEofState => "INVALID_EOF_STATE",
            Self::CallbackError => "CALLBACK_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while parsing an HTTP message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Malformed input for the selected grammar, or a rejected event.
    ///
    /// Fatal to the current message only; the parser can be `reset`.
    #[error("parse error: {code} ({reason})")]
    Tokenizer {
        /// What went wrong.
        code: ErrorCode,
        /// Human-readable detail.
        reason: String,
    },
    /// A working buffer could not grow.
    #[error("allocation failure: could not grow buffer to {requested} bytes")]
    AllocationFailure {
        /// The total buffer size that was requested.
        requested: usize,
    },
    /// `execute` or `finish` was called in a state that does not allow it.
    #[error("lifecycle misuse: {0}")]
    LifecycleMisuse(&'static str),
}

impl ParseError {
    /// Build a tokenizer error.
    pub fn tokenizer(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self::Tokenizer {
            code,
            reason: reason.into(),
        }
    }

    /// Return the tokenizer code carried by this error, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Tokenizer { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_error_renders_code_and_reason() {
        let err = ParseError::tokenizer(ErrorCode::InvalidMethod, "unknown method 'FOO'");
        assert_eq!(
            err.to_string(),
            "parse error: INVALID_METHOD (unknown method 'FOO')"
        );
        assert_eq!(err.code(), Some(ErrorCode::InvalidMethod));
    }

    #[test]
    fn non_tokenizer_errors_carry_no_code() {
        assert_eq!(ParseError::AllocationFailure { requested: 8 }.code(), None);
        assert_eq!(ParseError::LifecycleMisuse("x").code(), None);
    }
}
