//! The decoded event value.

use bytes_utils::Str;

use super::constants::DEFAULT_EVENT_TYPE;

/// One dispatched record of an event stream.
///
/// Immutable once built. Every field is an owned copy, so holding an
/// `Event` never pins the decoder's buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub(crate) id: Str,
    pub(crate) name: Str,
    pub(crate) data: Str,
}

impl Event {
    /// Build an event, copying `data` into a fresh allocation.
    pub fn new(id: impl Into<Str>, name: impl Into<Str>, data: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data: Str::from(data),
        }
    }

    pub(crate) fn from_parts(id: Str, name: Str, data: Str) -> Self {
        Self { id, name, data }
    }

    /// The last event ID in effect when this event was dispatched.
    ///
    /// Carried over from earlier records when this one had no `id` field.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The raw `event` field; empty when the record had none.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The event type, with an empty name reported as `"message"`.
    pub fn event_type(&self) -> &str {
        if self.name.is_empty() {
            DEFAULT_EVENT_TYPE
        } else {
            &*self.name
        }
    }

    /// Payload bytes: every `data` line of the record joined by `\n`.
    pub fn data(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// Payload as text. Always valid, the decoder rejects malformed UTF-8.
    pub fn text(&self) -> &str {
        &self.data
    }

    /// Split into `(id, name, data)`.
    pub fn into_parts(self) -> (Str, Str, Str) {
        (self.id, self.name, self.data)
    }
}
