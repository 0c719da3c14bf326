//! Error types for the gateway session.

use kady_protocol::FrameError;
use tokio_tungstenite::tungstenite;

/// Errors produced by [`ConnectionSession`](crate::ConnectionSession).
///
/// None of them is fatal: after any of these the session accepts a new
/// `connect`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(&'static str),

    #[error("transport not ready")]
    TransportNotReady,

    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),

    #[error("transport refused: {0}")]
    TransportRefused(#[from] tungstenite::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("connection attempt superseded by a newer one")]
    Superseded,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
