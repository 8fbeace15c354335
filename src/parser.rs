use crate::accumulator::Accumulator;
use crate::error::ParseError;
use crate::tokenizer::{ParserConfig, Tokenizer};
use crate::types::{HttpMethod, HttpVersion, Message, ParserMode};

// ---------------------------------------------------------------------------
// Lifecycle state
// ---------------------------------------------------------------------------

/// Where a [`Parser`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// No message has started since creation, the last reset, or the last
    /// completed message was taken.
    Idle,
    /// A message has started and is not complete.
    Parsing,
    /// The current message is complete and its result can be read.
    Complete,
    /// The last `execute` or `finish` failed; only `reset` is accepted.
    Error,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// A reusable, incremental HTTP message parser.
///
/// Owns one [`Tokenizer`] and forwards its events to an accumulator that
/// builds a [`Message`]. Reuse one parser across the messages of a
/// connection with [`reset`](Self::reset) or by simply feeding the next
/// message after a keep-alive one.
///
/// # Usage
///
/// ```rust
/// use wirefold::{Parser, ParserMode};
///
/// let mut parser = Parser::new(ParserMode::Request);
///
/// // Feed data (possibly in multiple calls).
/// parser.execute(b"GET / HTTP/1.1\r\nHo").unwrap();
/// parser.execute(b"st: localhost\r\n\r\n").unwrap();
///
/// let message = parser.result();
/// assert!(message.complete);
/// assert_eq!(message.headers["Host"], "localhost");
/// ```
#[derive(Debug)]
pub struct Parser {
    tokenizer: Tokenizer,
    accumulator: Accumulator,
    state: ParserState,
}

impl Parser {
    /// Create a new parser for `mode` with default configuration.
    pub fn new(mode: ParserMode) -> Self {
        Self::with_config(mode, ParserConfig::default())
    }

    /// Create a new parser for `mode` with custom limits.
    pub fn with_config(mode: ParserMode, config: ParserConfig) -> Self {
        Self {
            tokenizer: Tokenizer::with_config(mode, config),
            accumulator: Accumulator::default(),
            state: ParserState::Idle,
        }
    }

    /// Feed a slice of bytes into the parser.
    ///
    /// Returns how many bytes were consumed: all of `data` by default, where
    /// a later message in the same slice replaces an earlier one. With
    /// [`ParserConfig::pause_on_complete`] set, consumption stops right after
    /// a completed message; feed the rest once the result has been read.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Tokenizer`] for malformed input,
    /// [`ParseError::AllocationFailure`] if a buffer cannot grow, and
    /// [`ParseError::LifecycleMisuse`] if the parser is in the `Error` state
    /// or was finished.
    pub fn execute(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        if self.state == ParserState::Error {
            return Err(ParseError::LifecycleMisuse(
                "execute called after a parse error without reset",
            ));
        }

        match self.tokenizer.execute(data, &mut self.accumulator) {
            Ok(consumed) => {
                self.sync_state();
                Ok(consumed)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Signal end of input.
    ///
    /// Needed for responses whose body runs until the connection closes.
    ///
    /// # Errors
    ///
    /// Returns the tokenizer's [`ErrorCode::InvalidEofState`] error when
    /// input ends inside a message with its own framing, and
    /// [`ParseError::LifecycleMisuse`] in the `Error` state.
    ///
    /// [`ErrorCode::InvalidEofState`]: crate::ErrorCode::InvalidEofState
    pub fn finish(&mut self) -> Result<(), ParseError> {
        if self.state == ParserState::Error {
            return Err(ParseError::LifecycleMisuse(
                "finish called after a parse error without reset",
            ));
        }

        match self.tokenizer.finish(&mut self.accumulator) {
            Ok(()) => {
                self.sync_state();
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Return to `Idle`, discarding all working state and the current
    /// message. Never fails, including from the `Error` state.
    pub fn reset(&mut self) {
        self.tokenizer.reset();
        self.accumulator.reset();
        self.state = ParserState::Idle;
        tracing::debug!(mode = %self.tokenizer.mode(), "parser reset");
    }

    /// A snapshot of the current message.
    ///
    /// Headers are present once the header section has ended and the body
    /// once `complete` is `true`.
    pub fn result(&self) -> Message {
        self.accumulator.snapshot()
    }

    /// Move the completed message out of the parser.
    ///
    /// Returns `None` unless the parser is in the `Complete` state.
    pub fn take_message(&mut self) -> Option<Message> {
        let message = self.accumulator.take()?;
        self.state = ParserState::Idle;
        Some(message)
    }

    fn sync_state(&mut self) {
        self.state = if self.accumulator.is_complete() {
            ParserState::Complete
        } else if self.tokenizer.is_in_message() {
            ParserState::Parsing
        } else {
            ParserState::Idle
        };
    }

    fn fail(&mut self, err: ParseError) -> ParseError {
        tracing::debug!(error = %err, consumed = self.tokenizer.bytes_consumed(), "parse failed");
        self.state = ParserState::Error;
        err
    }

    // ----- public queries -------------------------------------------------

    /// Current lifecycle state.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Returns `true` when a complete message is ready to be read.
    pub fn is_complete(&self) -> bool {
        self.state == ParserState::Complete
    }

    /// The grammar this parser was created for.
    pub fn mode(&self) -> ParserMode {
        self.tokenizer.mode()
    }

    /// Method of the current request, once its request line has been read.
    pub fn method(&self) -> Option<HttpMethod> {
        self.tokenizer.method()
    }

    /// Name of the current request method.
    pub fn method_name(&self) -> Option<&'static str> {
        self.tokenizer.method().map(|m| m.as_str())
    }

    /// Status code of the current response, once read.
    pub fn status_code(&self) -> Option<u16> {
        self.tokenizer.status_code()
    }

    /// Protocol version of the current message, once read.
    pub fn http_version(&self) -> Option<HttpVersion> {
        self.tokenizer.version()
    }

    /// Whether the connection may carry another message after this one.
    pub fn should_keep_alive(&self) -> bool {
        self.tokenizer.should_keep_alive()
    }

    /// Total number of bytes consumed since creation or the last reset.
    pub fn bytes_consumed(&self) -> usize {
        self.tokenizer.bytes_consumed()
    }
}
