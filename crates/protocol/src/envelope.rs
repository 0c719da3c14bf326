use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::OpCode;

/// Envelope for all gateway socket communication.
///
/// Every frame carries both fields. `payload` stays a raw [`Value`] until the
/// handler for `op` decides which shape it expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub op: OpCode,
    pub payload: Value,
}

/// Reasons an inbound text frame is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("frame is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame has no 'op' field")]
    MissingOp,

    #[error("frame has no 'payload' field")]
    MissingPayload,

    #[error("'op' is not a non-negative integer: {0}")]
    InvalidOp(String),

    #[error("unexpected payload for {op}: {reason}")]
    InvalidPayload { op: OpCode, reason: String },
}

/// A successfully decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Frame with a known discriminator.
    Known(Frame),
    /// Forward compatibility: frames with an op this client does not know.
    Unknown { op: u64, payload: Value },
}

impl Frame {
    /// Creates a new frame with the given op and payload.
    pub fn new<T: Serialize>(op: OpCode, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            op,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Creates a frame whose payload is an empty object.
    pub fn empty(op: OpCode) -> Self {
        Self {
            op,
            payload: Value::Object(serde_json::Map::new()),
        }
    }

    /// Deserializes the payload into the given type.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, FrameError> {
        T::deserialize(&self.payload).map_err(|e| FrameError::InvalidPayload {
            op: self.op,
            reason: e.to_string(),
        })
    }

    /// Serializes the frame to the JSON text sent on the socket.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes one inbound text frame, validating its shape.
    ///
    /// A frame is well formed when it is a JSON object holding both `op` and
    /// `payload`; a `null` payload counts as present.
    pub fn decode(text: &str, max_size: usize) -> Result<Inbound, FrameError> {
        if text.len() > max_size {
            return Err(FrameError::TooLarge {
                size: text.len(),
                limit: max_size,
            });
        }

        let value: Value = serde_json::from_str(text).map_err(|e| FrameError::Json(e.to_string()))?;
        let Value::Object(mut map) = value else {
            return Err(FrameError::NotAnObject);
        };

        let op = map.remove("op").ok_or(FrameError::MissingOp)?;
        let payload = map.remove("payload").ok_or(FrameError::MissingPayload)?;
        let op = op
            .as_u64()
            .ok_or_else(|| FrameError::InvalidOp(op.to_string()))?;

        Ok(match OpCode::from_wire(op) {
            Some(op) => Inbound::Known(Frame { op, payload }),
            None => Inbound::Unknown { op, payload },
        })
    }
}
