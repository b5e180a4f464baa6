//! Stream Codec
//!
//! Encoding and decoding for the backend's JSON event stream. Every
//! frame is an envelope `{"event": "...", "data": {...}}`; the codec
//! maps envelopes to domain events on the way in and commands to
//! envelopes on the way out.

use chrono::Utc;

use super::messages::{CommandMessage, Envelope, LtpUpdateMessage, ScannerAlertMessage};
use crate::domain::events::{StreamCommand, StreamEvent};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Envelope named an event this client does not handle.
    #[error("unknown event type: {0}")]
    UnknownEvent(String),

    /// Envelope data did not match the shape its event name implies.
    #[error("invalid {event} payload: {source}")]
    InvalidPayload {
        /// Event name from the envelope.
        event: String,
        /// Underlying decode failure.
        source: serde_json::Error,
    },
}

/// JSON codec for the backend event stream.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into a domain event.
    ///
    /// `ltp_update` payloads without a server timestamp are stamped
    /// with the arrival instant so the per-symbol monotonic ordering
    /// rule still has something to compare.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a valid envelope, names an
    /// unknown event, or carries a payload of the wrong shape. Callers
    /// drop the frame; a bad frame never tears the connection down.
    pub fn decode(&self, text: &str) -> Result<StreamEvent, CodecError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        let received_at = Utc::now();

        match envelope.event.as_str() {
            "ltp_update" => {
                let message: LtpUpdateMessage =
                    serde_json::from_value(envelope.data).map_err(|source| {
                        CodecError::InvalidPayload {
                            event: "ltp_update".to_string(),
                            source,
                        }
                    })?;
                Ok(StreamEvent::LtpUpdate(message.into_event(received_at)))
            }
            "scanner_alert" => {
                let message: ScannerAlertMessage =
                    serde_json::from_value(envelope.data).map_err(|source| {
                        CodecError::InvalidPayload {
                            event: "scanner_alert".to_string(),
                            source,
                        }
                    })?;
                Ok(StreamEvent::ScannerAlert(message.into_event(received_at)))
            }
            other => Err(CodecError::UnknownEvent(other.to_string())),
        }
    }

    /// Encode a subscribe/unsubscribe command into a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode_command(&self, command: &StreamCommand) -> Result<String, CodecError> {
        let (event, payload) = CommandMessage::from_command(command);
        let envelope = Envelope {
            event: event.to_string(),
            data: serde_json::to_value(payload)?,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}
