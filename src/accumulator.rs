//! Turns tokenizer events into a [`Message`].
//!
//! Fragments of one logical field are concatenated no matter how many
//! `execute` calls they were spread across. Header names and values are
//! paired through [`FieldState`], committed in the order their values
//! complete, and published as a whole when the header section ends. The body
//! is published when the message completes.

use std::mem;

use crate::error::{ErrorCode, ParseError};
use crate::tokenizer::{Callbacks, MessageHead};
use crate::types::{Headers, Message};

/// Smallest capacity the body buffer grows to.
const MIN_BODY_CAPACITY: usize = 1024;

/// Header pairing state.
#[derive(Debug, Default)]
enum FieldState {
    /// No header is being assembled.
    #[default]
    AwaitingField,
    /// Name chunks are arriving.
    BuildingField(Vec<u8>),
    /// The name is done and value chunks are arriving.
    BuildingValue { name: Vec<u8>, value: Vec<u8> },
}

/// Growable body storage with a doubling policy:
/// `new_capacity = max(2 × capacity, needed, 1024)`.
#[derive(Debug, Default)]
pub(crate) struct BodyBuffer {
    bytes: Vec<u8>,
    grow_count: usize,
}

impl BodyBuffer {
    fn push(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        let needed = self
            .bytes
            .len()
            .checked_add(chunk.len())
            .ok_or(ParseError::AllocationFailure { requested: usize::MAX })?;

        if needed > self.bytes.capacity() {
            let target = (self.bytes.capacity().saturating_mul(2))
                .max(needed)
                .max(MIN_BODY_CAPACITY);
            self.bytes
                .try_reserve_exact(target - self.bytes.len())
                .map_err(|_| ParseError::AllocationFailure { requested: target })?;
            self.grow_count += 1;
            tracing::trace!(capacity = self.bytes.capacity(), "body buffer grown");
        }

        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    fn clear(&mut self) {
        self.bytes.clear();
        self.grow_count = 0;
    }

    /// Hand the buffered bytes over, trimmed to their length.
    fn freeze(&mut self) -> Vec<u8> {
        let mut bytes = mem::take(&mut self.bytes);
        bytes.shrink_to_fit();
        bytes
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn grow_count(&self) -> usize {
        self.grow_count
    }
}

/// Working state for one message plus the published [`Message`].
#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    method: Option<Vec<u8>>,
    url: Option<Vec<u8>>,
    status: Option<Vec<u8>>,
    fields: FieldState,
    pending_headers: Headers,
    body: BodyBuffer,
    head_published: bool,
    message: Message,
}

impl Accumulator {
    /// Discard all working state and the published message.
    pub(crate) fn reset(&mut self) {
        self.method = None;
        self.url = None;
        self.status = None;
        self.fields = FieldState::AwaitingField;
        self.pending_headers = Headers::new();
        self.body.clear();
        self.head_published = false;
        self.message = Message::default();
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.message.complete
    }

    /// The caller-visible view of the current message.
    ///
    /// Before the header section ends only the start-line text is visible;
    /// headers appear all at once afterwards, and the body once complete.
    pub(crate) fn snapshot(&self) -> Message {
        if self.head_published {
            return self.message.clone();
        }
        Message {
            method: lossy(self.method.as_deref()),
            url: lossy(self.url.as_deref()),
            status_text: lossy(self.status.as_deref()),
            ..Message::default()
        }
    }

    /// Move a completed message out, leaving the accumulator empty.
    pub(crate) fn take(&mut self) -> Option<Message> {
        if !self.message.complete {
            return None;
        }
        let message = mem::take(&mut self.message);
        self.reset();
        Some(message)
    }

    #[cfg(test)]
    pub(crate) fn body(&self) -> &BodyBuffer {
        &self.body
    }

    fn commit(&mut self, name: Vec<u8>, value: Vec<u8>) {
        let name = String::from_utf8_lossy(&name).into_owned();
        let value = String::from_utf8_lossy(&value).into_owned();
        tracing::trace!(%name, %value, "header committed");
        self.pending_headers.insert(name, value);
    }
}

impl Callbacks for Accumulator {
    fn on_message_begin(&mut self) -> Result<(), ParseError> {
        self.reset();
        Ok(())
    }

    fn on_method(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        append_field(&mut self.method, chunk)
    }

    fn on_url(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        append_field(&mut self.url, chunk)
    }

    fn on_status(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        append_field(&mut self.status, chunk)
    }

    fn on_header_field(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        self.fields = match mem::take(&mut self.fields) {
            FieldState::AwaitingField => FieldState::BuildingField(copy_of(chunk)?),
            FieldState::BuildingField(mut name) => {
                append(&mut name, chunk)?;
                FieldState::BuildingField(name)
            }
            FieldState::BuildingValue { name, value } => {
                self.commit(name, value);
                FieldState::BuildingField(copy_of(chunk)?)
            }
        };
        Ok(())
    }

    fn on_header_value(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        self.fields = match mem::take(&mut self.fields) {
            FieldState::AwaitingField => {
                return Err(ParseError::tokenizer(
                    ErrorCode::CallbackError,
                    "header value without a field name",
                ));
            }
            FieldState::BuildingField(name) => FieldState::BuildingValue {
                name,
                value: copy_of(chunk)?,
            },
            FieldState::BuildingValue { name, mut value } => {
                append(&mut value, chunk)?;
                FieldState::BuildingValue { name, value }
            }
        };
        Ok(())
    }

    fn on_headers_complete(&mut self, head: &MessageHead) -> Result<(), ParseError> {
        match mem::take(&mut self.fields) {
            FieldState::AwaitingField => {}
            FieldState::BuildingField(name) => self.commit(name, Vec::new()),
            FieldState::BuildingValue { name, value } => self.commit(name, value),
        }

        self.message.method = lossy(self.method.as_deref());
        self.message.url = lossy(self.url.as_deref());
        self.message.status_text = lossy(self.status.as_deref());
        self.message.status_code = head.status_code;
        self.message.http_major = head.version.major();
        self.message.http_minor = head.version.minor();
        self.message.headers = mem::take(&mut self.pending_headers);
        self.head_published = true;
        Ok(())
    }

    fn on_body(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        self.body.push(chunk)
    }

    fn on_message_complete(&mut self) -> Result<(), ParseError> {
        tracing::debug!(
            headers = self.message.headers.len(),
            body_bytes = self.body.len(),
            body_grows = self.body.grow_count(),
            "message accumulated"
        );
        self.message.body = self.body.freeze();
        self.message.complete = true;
        self.method = None;
        self.url = None;
        self.status = None;
        Ok(())
    }
}

fn lossy(bytes: Option<&[u8]>) -> Option<String> {
    bytes.map(|b| String::from_utf8_lossy(b).into_owned())
}

fn append(buf: &mut Vec<u8>, chunk: &[u8]) -> Result<(), ParseError> {
    buf.try_reserve(chunk.len())
        .map_err(|_| ParseError::AllocationFailure {
            requested: buf.len().saturating_add(chunk.len()),
        })?;
    buf.extend_from_slice(chunk);
    Ok(())
}

fn copy_of(chunk: &[u8]) -> Result<Vec<u8>, ParseError> {
    let mut buf = Vec::new();
    append(&mut buf, chunk)?;
    Ok(buf)
}

fn append_field(field: &mut Option<Vec<u8>>, chunk: &[u8]) -> Result<(), ParseError> {
    append(field.get_or_insert_with(Vec::new), chunk)
}
