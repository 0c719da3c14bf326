//! Read pump: dispatches gateway frames and watches the deadlines.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::session::SessionCore;
use crate::types::RefusalReason;

/// Stand-in deadline for disabled timeouts; the branch is never polled.
const UNARMED: Duration = Duration::from_secs(60 * 60 * 24 * 365);

pub(crate) struct ReadContext {
    pub(crate) core: Arc<SessionCore>,
    pub(crate) generation: u64,
    pub(crate) write_tx: mpsc::Sender<tungstenite::Message>,
    pub(crate) write_failed: oneshot::Receiver<String>,
    pub(crate) cancel: CancellationToken,
}

/// Reads messages from the transport until it ends or is cancelled.
///
/// Any inbound message resets the read deadline. The handshake deadline is
/// only armed while the session waits for the gateway's ack. Every exit
/// other than cancellation ends the attempt through
/// [`SessionCore::refuse`].
pub(crate) async fn read_pump<S>(mut read: S, ctx: ReadContext)
where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let ReadContext {
        core,
        generation,
        write_tx,
        mut write_failed,
        cancel,
    } = ctx;
    let read_timeout = core.config.read_timeout;

    let read_deadline = tokio::time::sleep(read_timeout.unwrap_or(UNARMED));
    tokio::pin!(read_deadline);
    let handshake_deadline = tokio::time::sleep(core.config.handshake_timeout.unwrap_or(UNARMED));
    tokio::pin!(handshake_deadline);

    let mut awaiting_ack =
        core.config.handshake_timeout.is_some() && core.is_awaiting_ack(generation);
    let mut watching_writes = true;

    let outcome = loop {
        tokio::select! {
            _ = cancel.cancelled() => break None,

            failed = &mut write_failed, if watching_writes => {
                watching_writes = false;
                if let Ok(reason) = failed {
                    break Some(RefusalReason::Transport(reason));
                }
            }

            () = &mut handshake_deadline, if awaiting_ack => {
                warn!(generation, "no handshake ack from gateway");
                break Some(RefusalReason::Timeout("handshake"));
            }

            () = &mut read_deadline, if read_timeout.is_some() => {
                warn!(generation, "gateway silent past the read deadline");
                break Some(RefusalReason::Timeout("read"));
            }

            msg = read.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!(generation, "gateway read error: {e}");
                        break Some(RefusalReason::Transport(e.to_string()));
                    }
                    None => {
                        debug!(generation, "gateway stream ended");
                        break Some(RefusalReason::Closed {
                            code: None,
                            reason: "stream ended".into(),
                        });
                    }
                };

                if let Some(limit) = read_timeout {
                    read_deadline.as_mut().reset(Instant::now() + limit);
                }

                match msg {
                    tungstenite::Message::Text(text) => {
                        if let Err(e) = core.handle_text(generation, text.as_str()) {
                            debug!(generation, "frame dropped: {e}");
                        }
                        awaiting_ack = awaiting_ack && core.is_awaiting_ack(generation);
                    }
                    tungstenite::Message::Ping(data) => {
                        trace!("received ping, sending pong");
                        let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                    }
                    tungstenite::Message::Pong(_) => {
                        trace!("received pong");
                    }
                    tungstenite::Message::Close(frame) => {
                        debug!(generation, ?frame, "received close frame");
                        break Some(match frame {
                            Some(f) => RefusalReason::Closed {
                                code: Some(u16::from(f.code)),
                                reason: f.reason.as_str().to_string(),
                            },
                            None => RefusalReason::Closed {
                                code: None,
                                reason: String::new(),
                            },
                        });
                    }
                    _ => trace!("ignoring binary message"),
                }
            }
        }
    };

    if let Some(reason) = outcome {
        core.refuse(generation, reason);
    }
}
