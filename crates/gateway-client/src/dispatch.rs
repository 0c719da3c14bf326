//! Routes decoded gateway frames to state changes and bus events.

use tracing::{debug, info, trace, warn};

use kady_protocol::constants::TOKEN_LENGTH;
use kady_protocol::{Frame, FrameError, Inbound, OpCode, TransmitTokenPayload};

use crate::error::SessionError;
use crate::session::SessionCore;
use crate::types::SessionEvent;

impl SessionCore {
    /// Decodes and dispatches one text frame of `generation`.
    ///
    /// Frames from a stale generation, or arriving outside the handshake and
    /// established states, are dropped. Malformed frames are reported on the
    /// bus and never change the lifecycle state.
    pub(crate) fn handle_text(&self, generation: u64, text: &str) -> Result<(), SessionError> {
        if !self.is_dispatching(generation) {
            trace!(generation, "dropping frame from inactive transport");
            return Ok(());
        }

        let result = match Frame::decode(text, self.config.max_message_size) {
            Ok(Inbound::Known(frame)) => self.handle_frame(generation, frame),
            Ok(Inbound::Unknown { op, .. }) => {
                debug!(generation, op, "ignoring frame with unknown op");
                Ok(())
            }
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            warn!(generation, "discarding malformed frame: {e}");
            self.bus.emit(SessionEvent::MalformedFrame {
                reason: e.to_string(),
            });
            SessionError::MalformedFrame(e)
        })
    }

    fn handle_frame(&self, generation: u64, frame: Frame) -> Result<(), FrameError> {
        trace!(generation, op = %frame.op, "received frame");

        match frame.op {
            OpCode::Connected => self.complete_handshake(generation),
            OpCode::TransmitToken => {
                let payload: TransmitTokenPayload = frame.parse_payload()?;
                if !payload.has_well_formed_token() {
                    return Err(FrameError::InvalidPayload {
                        op: frame.op,
                        reason: format!("token must be {TOKEN_LENGTH} ASCII alphanumerics"),
                    });
                }
                let acknowledges = payload.acknowledges_connection();
                if self.store_token(generation, payload.token.clone()) {
                    debug!(generation, ?payload, "gateway issued a token");
                    self.bus.emit(SessionEvent::TokenReceived {
                        token: payload.token,
                    });
                }
                if acknowledges {
                    self.complete_handshake(generation);
                }
            }
            OpCode::Heartbeat => self.bus.emit(SessionEvent::Heartbeat {
                payload: frame.payload,
            }),
            OpCode::Credentials => {
                warn!(generation, "gateway sent a credentials frame, ignoring");
            }
        }
        Ok(())
    }

    fn complete_handshake(&self, generation: u64) {
        if self.establish(generation) {
            info!(generation, "gateway handshake complete");
            self.bus.emit(SessionEvent::Connected);
        } else {
            debug!(generation, "handshake ack outside the handshake, ignoring");
        }
    }
}
