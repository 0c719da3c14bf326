use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Path of the private admin socket on the bot's API host.
pub const GATEWAY_PATH: &str = "/root/private/socket";

/// How long the gateway waits for the credentials frame after the upgrade.
///
/// Past this window the gateway closes the socket with an "away" code.
pub const CREDENTIALS_WAIT: Duration = Duration::from_secs(30);

/// Time to wait for any incoming message (frame, ping or pong).
///
/// Acts as a read deadline: if nothing arrives within this window the
/// connection is considered dead.
pub const WS_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// How often to send WebSocket-level pings (must be < [`WS_READ_TIMEOUT`]).
pub const WS_PING_PERIOD: Duration = Duration::from_secs(15);

/// Time allowed to open the TCP/WebSocket connection.
pub const WS_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum text frame size in bytes (1 MB). Admin frames are small.
pub const WS_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Largest WebSocket message the transport accepts (16 MB).
///
/// Messages between the frame limit and this ceiling still arrive and are
/// rejected by frame decoding; only larger ones fail the transport.
pub const WS_TRANSPORT_CEILING: usize = 16 * 1024 * 1024;

/// Length of the session token handed out by the gateway.
pub const TOKEN_LENGTH: usize = 64;

/// Frame discriminator carried in the `op` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum OpCode {
    /// Gateway acknowledged the credentials.
    Connected = 0,
    /// Keepalive, either direction.
    Heartbeat = 1,
    /// Client sends its identifier and secret.
    Credentials = 2,
    /// Gateway hands out a session token.
    TransmitToken = 3,
}

/// An `op` value outside the known enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown op code {0}")]
pub struct UnknownOpCode(pub u64);

impl OpCode {
    /// Maps a raw wire value to a known op code.
    pub fn from_wire(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Connected),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Credentials),
            3 => Some(Self::TransmitToken),
            _ => None,
        }
    }

    /// Returns the wire value of this op code.
    pub fn as_u8(self) -> u8 {
        u8::from(self)
    }
}

impl From<OpCode> for u8 {
    fn from(value: OpCode) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for OpCode {
    type Error = UnknownOpCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_wire(u64::from(value)).ok_or(UnknownOpCode(u64::from(value)))
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connected => "CONNECTED",
            Self::Heartbeat => "HEARTBEAT",
            Self::Credentials => "CREDENTIALS",
            Self::TransmitToken => "TRANSMIT_TOKEN",
        };
        write!(f, "{name}({})", self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_code_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&OpCode::Connected).unwrap(), "0");
        assert_eq!(serde_json::to_string(&OpCode::Heartbeat).unwrap(), "1");
        assert_eq!(serde_json::to_string(&OpCode::Credentials).unwrap(), "2");
        assert_eq!(serde_json::to_string(&OpCode::TransmitToken).unwrap(), "3");
    }

    #[test]
    fn op_code_deserialization() {
        let op: OpCode = serde_json::from_str("3").unwrap();
        assert_eq!(op, OpCode::TransmitToken);
    }

    #[test]
    fn unknown_op_code_is_rejected_by_serde() {
        assert!(serde_json::from_str::<OpCode>("9").is_err());
        assert_eq!(OpCode::try_from(9u8), Err(UnknownOpCode(9)));
    }

    #[test]
    fn from_wire_covers_large_values() {
        assert_eq!(OpCode::from_wire(0), Some(OpCode::Connected));
        assert_eq!(OpCode::from_wire(256), None);
        assert_eq!(OpCode::from_wire(u64::MAX), None);
    }

    #[test]
    fn op_code_display() {
        assert_eq!(OpCode::TransmitToken.to_string(), "TRANSMIT_TOKEN(3)");
    }

    #[test]
    fn ping_period_is_below_read_timeout() {
        assert!(WS_PING_PERIOD < WS_READ_TIMEOUT);
    }
}
