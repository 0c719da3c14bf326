use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{OpCode, TOKEN_LENGTH};

/// Payload of the [`OpCode::Credentials`] frame sent right after the socket opens.
///
/// Only the `secret` key is understood; gateways expecting `passwd` are not
/// wire-compatible with this client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsPayload {
    pub id: String,
    pub secret: String,
}

impl fmt::Debug for CredentialsPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsPayload")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Payload of the [`OpCode::TransmitToken`] frame.
///
/// The gateway piggybacks the handshake ack on this frame by setting the
/// nested `op` to [`OpCode::Connected`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmitTokenPayload {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<u64>,
}

impl TransmitTokenPayload {
    /// Returns `true` when the frame also acknowledges the credentials.
    pub fn acknowledges_connection(&self) -> bool {
        self.op == Some(u64::from(OpCode::Connected.as_u8()))
    }

    /// Returns `true` for a token of [`TOKEN_LENGTH`] ASCII alphanumerics.
    pub fn has_well_formed_token(&self) -> bool {
        self.token.len() == TOKEN_LENGTH && self.token.bytes().all(|b| b.is_ascii_alphanumeric())
    }
}

impl fmt::Debug for TransmitTokenPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransmitTokenPayload")
            .field("token", &format_args!("<{} chars>", self.token.len()))
            .field("op", &self.op)
            .finish()
    }
}

/// Payload of a client [`OpCode::Heartbeat`]: milliseconds since the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeartbeatPayload {
    pub since_last_ms: u64,
}
