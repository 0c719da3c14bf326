//! Public types for the gateway session.

use std::fmt;

use serde_json::Value;

use kady_protocol::CredentialsPayload;

use crate::bus::BusEvent;
use crate::error::SessionError;

/// Bus name of [`SessionEvent::Connected`].
pub const EVENT_CONNECTED: &str = "connected";
/// Bus name of [`SessionEvent::ConnectionRefused`].
pub const EVENT_CONNECTION_REFUSED: &str = "connection_refused";
/// Bus name of [`SessionEvent::TokenReceived`].
pub const EVENT_TOKEN_RECEIVED: &str = "token_received";
/// Bus name of [`SessionEvent::Heartbeat`].
pub const EVENT_HEARTBEAT: &str = "heartbeat";
/// Bus name of [`SessionEvent::MalformedFrame`].
pub const EVENT_MALFORMED_FRAME: &str = "malformed_frame";

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Never connected, or closed by the caller.
    Idle,
    /// Transport open in progress.
    Connecting,
    /// Credentials sent, waiting for the gateway's ack.
    AwaitingHandshakeAck,
    /// Handshake complete.
    Established,
    /// The last attempt failed or the transport dropped.
    Refused,
}

impl SessionState {
    /// Returns `true` while a transport attempt is alive.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::AwaitingHandshakeAck | Self::Established
        )
    }

    /// Returns `true` in the states where inbound frames are dispatched.
    pub fn dispatches_frames(self) -> bool {
        matches!(self, Self::AwaitingHandshakeAck | Self::Established)
    }
}

/// Why a connection attempt or a live connection ended in [`SessionState::Refused`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefusalReason {
    /// Transport-level failure: refused, DNS, TLS, I/O.
    Transport(String),
    /// The transport could not accept the credentials frame.
    NotReady,
    /// A deadline expired (`"transport open"`, `"handshake"`, `"read"`).
    Timeout(&'static str),
    /// The gateway closed the socket.
    Closed { code: Option<u16>, reason: String },
}

impl fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::NotReady => write!(f, "transport not ready for the handshake"),
            Self::Timeout(stage) => write!(f, "{stage} timed out"),
            Self::Closed {
                code: Some(code),
                reason,
            } => write!(f, "closed by gateway ({code}): {reason}"),
            Self::Closed { code: None, reason } => write!(f, "closed: {reason}"),
        }
    }
}

/// Events published on the session bus.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Handshake completed.
    Connected,
    /// One per failed attempt or dropped connection.
    ConnectionRefused(RefusalReason),
    /// The gateway handed out a session token.
    TokenReceived { token: String },
    /// The gateway sent a heartbeat.
    Heartbeat { payload: Value },
    /// An inbound frame was discarded.
    MalformedFrame { reason: String },
}

impl SessionEvent {
    /// Returns `true` for `connected` and `connection_refused`.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Connected | Self::ConnectionRefused(_))
    }
}

impl BusEvent for SessionEvent {
    fn name(&self) -> &str {
        match self {
            Self::Connected => EVENT_CONNECTED,
            Self::ConnectionRefused(_) => EVENT_CONNECTION_REFUSED,
            Self::TokenReceived { .. } => EVENT_TOKEN_RECEIVED,
            Self::Heartbeat { .. } => EVENT_HEARTBEAT,
            Self::MalformedFrame { .. } => EVENT_MALFORMED_FRAME,
        }
    }
}

/// Identifier and secret presented during the handshake.
///
/// Consumed by `connect`; the secret is not kept once the credentials frame
/// is written.
#[derive(Clone)]
pub struct Credentials {
    id: String,
    secret: String,
}

impl Credentials {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Rejects empty identifiers and secrets.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.id.is_empty() {
            return Err(SessionError::InvalidCredentials("identifier is empty"));
        }
        if self.secret.is_empty() {
            return Err(SessionError::InvalidCredentials("secret is empty"));
        }
        Ok(())
    }

    /// Caller-side identifier rule of the panel: ASCII letters only.
    pub fn is_well_formed_identifier(id: &str) -> bool {
        !id.is_empty() && id.chars().all(|c| c.is_ascii_alphabetic())
    }
}

impl From<Credentials> for CredentialsPayload {
    fn from(value: Credentials) -> Self {
        Self {
            id: value.id,
            secret: value.secret,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}
