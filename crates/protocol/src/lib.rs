pub mod constants;
pub mod envelope;
pub mod messages;

// Re-export primary types for convenience.
pub use constants::OpCode;
pub use envelope::{Frame, FrameError, Inbound};
pub use messages::{CredentialsPayload, HeartbeatPayload, TransmitTokenPayload};
