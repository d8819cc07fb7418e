//! Event wire types.
//!
//! Producers enqueue events as opaque JSON strings. The worker keeps the
//! exact raw string it claimed from the queue alongside the decoded form:
//! cleanup must remove the identical serialized value from the in-flight
//! list, so the raw string is never re-encoded once claimed.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A webhook event as it travels through the queue.
///
/// Serialized as `{"userId":"...","payload":"..."}`. Encoding then decoding
/// reproduces both fields exactly.
///
/// # Example
///
/// ```
/// use sluice_core::Event;
/// let event = Event::new("u-42", "signup");
/// let raw = event.to_json().unwrap();
/// assert_eq!(Event::from_json(&raw).unwrap(), event);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier of the user the event belongs to.
    #[serde(rename = "userId")]
    pub user_id: String,

    /// Opaque payload forwarded to destinations.
    pub payload: String,
}

impl Event {
    /// Creates an event from its two fields.
    pub fn new(user_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), payload: payload.into() }
    }

    /// Encodes the event into its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Codec` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes an event from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Codec` if the input is not a valid event.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// An event claimed from the pending queue.
///
/// Pairs the exact serialized string that was moved into the in-flight list
/// with its best-effort decoded form. Decoding is best-effort by design:
/// a value that fails to parse is still carried forward and the decode
/// policy decides what happens to it.
#[derive(Debug, Clone)]
pub struct ClaimedEvent {
    /// The exact string that sits in the in-flight list.
    pub raw: String,

    /// Decoded event, when the raw string parsed as one.
    pub event: Option<Event>,
}

impl ClaimedEvent {
    /// Wraps a raw queue value, attempting to decode it.
    pub fn decode(raw: String) -> Self {
        let event = Event::from_json(&raw).ok();
        Self { raw, event }
    }

    /// User id for structured logging, when known.
    pub fn user_id(&self) -> Option<&str> {
        self.event.as_ref().map(|e| e.user_id.as_str())
    }
}
