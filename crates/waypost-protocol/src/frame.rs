//! The `{type, id?, payload}` frame envelope.
//!
//! Frames are untyped on the outside; the `type` field is validated first
//! and the payload is then deserialized into the matching message struct.
//! Unknown payload fields are ignored; missing required fields fail the
//! payload parse.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::ErrorCode;

/// A single text frame on the control channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Message type, e.g. `connect_to_machine`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Correlation id. Requests that carry one receive exactly one response
    /// (or one `error` frame) echoing it; broadcasts never carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Message payload, shape keyed by `kind`.
    #[serde(default)]
    pub payload: Value,
}

impl Frame {
    /// A server-initiated frame with no correlation id.
    pub fn event(kind: &str, payload: Value) -> Self {
        Self {
            kind: kind.to_string(),
            id: None,
            payload,
        }
    }

    /// A response to a request, echoing its correlation id when present.
    pub fn response(kind: &str, id: Option<String>, payload: Value) -> Self {
        Self {
            kind: kind.to_string(),
            id,
            payload,
        }
    }

    /// A server-initiated frame with a typed payload.
    pub fn event_of<T: Serialize>(kind: &str, payload: &T) -> Self {
        Self::event(kind, serde_json::to_value(payload).unwrap_or_default())
    }

    /// A response with a typed payload.
    pub fn response_of<T: Serialize>(kind: &str, id: Option<String>, payload: &T) -> Self {
        Self::response(kind, id, serde_json::to_value(payload).unwrap_or_default())
    }

    /// An `error` frame.
    pub fn error(id: Option<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: "error".to_string(),
            id,
            payload: json!({
                "code": code.as_str(),
                "message": message.into(),
            }),
        }
    }

    /// Serialize to the text representation sent over the transport.
    pub fn to_text(&self) -> String {
        // A Value payload cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a payload into a typed message, losing the serde detail.
    pub fn parse_payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
