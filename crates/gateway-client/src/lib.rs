//! Client side of the Kady admin gateway socket.
//!
//! Provides a named-event bus, the connection/handshake state machine
//! and the dispatcher for frames pushed by the gateway.

pub mod bus;
pub mod config;
mod dispatch;
pub mod error;
mod pumps;
pub mod session;
pub mod transport;
pub mod types;

pub use bus::{BusError, BusEvent, EventBus, Listener, listener};
pub use config::SessionConfig;
pub use error::SessionError;
pub use session::ConnectionSession;
pub use transport::{Connector, WsConnector};
pub use types::{Credentials, RefusalReason, SessionEvent, SessionState};
