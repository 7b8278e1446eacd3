//! JSON envelope codec.
//!
//! Every frame on the wire, in both directions, is a JSON object:
//!
//! ```json
//! {"code": 5, "data": "Alice"}
//! ```
//!
//! `code` selects the message kind (see [`MessageCode`]); the shape of `data`
//! depends on the code and on the direction.
//!
//! # Inbound payloads
//!
//! | code | accepted `data`                                   |
//! |------|---------------------------------------------------|
//! | 2    | `0`/`1`/`2` (Start/Pause/Stop) or `{"transition": n}` |
//! | 5    | requested display name as a string                |
//! | 0, 1, 3, 6, 7 | anything; decoded as [`InboundEvent::Ignored`] |
//!
//! Anything else is a [`ProtocolError`] and the frame is dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::connection::Transition;
use crate::domain::events::OutboundPayload;
use crate::protocol::codes::MessageCode;

/// Errors raised while decoding an inbound frame or encoding an outbound one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The text is not a JSON object with an integer `code` field.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The `code` is not one of the assigned message codes.
    #[error("unknown message code: {0}")]
    UnknownCode(i64),

    /// The `data` field does not have the shape the code requires.
    #[error("malformed payload for {code:?}: {reason}")]
    MalformedPayload { code: MessageCode, reason: String },

    /// An outbound payload could not be serialized.
    #[error("failed to encode outbound payload: {0}")]
    Encode(String),
}

/// The raw `{code, data}` wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub data: Value,
}

/// A decoded client event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    NameClaim(String),
    Activity(Transition),
    /// A recognised code the hub does not act on (reserved or outbound-only).
    Ignored(MessageCode),
}

/// Decodes one inbound text frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] for invalid JSON, unknown codes, or a payload
/// of the wrong shape.
///
/// # Example
///
/// ```rust
/// use presence_core::protocol::{decode_inbound, InboundEvent};
///
/// let event = decode_inbound(r#"{"code":5,"data":"Alice"}"#).unwrap();
/// assert_eq!(event, InboundEvent::NameClaim("Alice".to_string()));
/// ```
pub fn decode_inbound(text: &str) -> Result<InboundEvent, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))?;
    let code = MessageCode::try_from(envelope.code).map_err(ProtocolError::UnknownCode)?;

    match code {
        MessageCode::NameClaim => match envelope.data {
            Value::String(name) => Ok(InboundEvent::NameClaim(name)),
            other => Err(ProtocolError::MalformedPayload {
                code,
                reason: format!("expected a string name, got {}", json_type(&other)),
            }),
        },
        MessageCode::Activity => parse_transition(&envelope.data).map(InboundEvent::Activity),
        MessageCode::Admin
        | MessageCode::Message
        | MessageCode::UserList
        | MessageCode::UserLeft
        | MessageCode::SignUp => Ok(InboundEvent::Ignored(code)),
    }
}

/// Encodes an outbound payload into its JSON text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_outbound(payload: &OutboundPayload) -> Result<String, ProtocolError> {
    let code = payload.code().as_i64();
    match payload {
        OutboundPayload::ClaimResult(accepted) => frame(code, accepted),
        OutboundPayload::UserList(users) => frame(code, users),
        OutboundPayload::UserJoined(name) | OutboundPayload::UserLeft(name) => frame(code, name),
        OutboundPayload::ActivityChanged(summary) => frame(code, summary),
    }
}

/// Borrowing twin of [`Envelope`] so typed payloads keep their field order.
#[derive(Serialize)]
struct OutboundFrame<'a, T: Serialize> {
    code: i64,
    data: &'a T,
}

fn frame<T: Serialize>(code: i64, data: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(&OutboundFrame { code, data })
        .map_err(|e| ProtocolError::Encode(e.to_string()))
}

fn parse_transition(data: &Value) -> Result<Transition, ProtocolError> {
    let raw = match data {
        Value::Object(map) => map.get("transition").unwrap_or(&Value::Null),
        other => other,
    };
    raw.as_u64()
        .and_then(Transition::from_code)
        .ok_or_else(|| ProtocolError::MalformedPayload {
            code: MessageCode::Activity,
            reason: format!("expected transition 0, 1 or 2, got {raw}"),
        })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
