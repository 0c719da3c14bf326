//! Session tuning knobs.

use std::time::Duration;

use kady_protocol::constants::{
    CREDENTIALS_WAIT, GATEWAY_PATH, WS_CONNECT_TIMEOUT, WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD,
    WS_READ_TIMEOUT,
};

/// Configuration for a [`ConnectionSession`](crate::ConnectionSession).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Use `wss://` for bare hosts.
    pub tls: bool,
    /// Upper bound for opening the transport. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Upper bound for the handshake ack after the credentials were sent.
    pub handshake_timeout: Option<Duration>,
    /// Read deadline; any inbound message resets it.
    pub read_timeout: Option<Duration>,
    /// Period of WebSocket-level pings keeping the read deadline alive.
    pub ping_interval: Option<Duration>,
    /// Period of protocol `HEARTBEAT` frames once established. Off by default.
    pub heartbeat_interval: Option<Duration>,
    /// Largest inbound text frame accepted.
    pub max_message_size: usize,
    /// Capacity of the outbound frame queue.
    pub write_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tls: false,
            connect_timeout: Some(WS_CONNECT_TIMEOUT),
            handshake_timeout: Some(CREDENTIALS_WAIT),
            read_timeout: Some(WS_READ_TIMEOUT),
            ping_interval: Some(WS_PING_PERIOD),
            heartbeat_interval: None,
            max_message_size: WS_MAX_MESSAGE_SIZE,
            write_buffer: 64,
        }
    }
}

impl SessionConfig {
    /// Builds the gateway socket URL for `host`.
    ///
    /// Bare hosts get `ws://` (or `wss://` with [`tls`](Self::tls)); a host
    /// that already carries a WebSocket scheme keeps it.
    pub fn endpoint(&self, host: &str) -> String {
        let host = host.trim().trim_end_matches('/');
        let base = if host.starts_with("ws://") || host.starts_with("wss://") {
            host.to_string()
        } else {
            let scheme = if self.tls { "wss" } else { "ws" };
            format!("{scheme}://{host}")
        };

        if base.ends_with(GATEWAY_PATH) {
            base
        } else {
            format!("{base}{GATEWAY_PATH}")
        }
    }
}
