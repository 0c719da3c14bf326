//! Write pump: owns the sink and serialises outbound frames.

use futures_util::SinkExt;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Writes queued messages to the transport until cancelled.
///
/// A failed write is reported once through `failed` so the read pump can
/// tear the session down; the sink is closed on every exit path.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    failed: oneshot::Sender<String>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = write_rx.recv() => {
                let Some(msg) = msg else { break };
                if let Err(e) = write.send(msg).await {
                    error!("gateway write error: {e}");
                    let _ = failed.send(e.to_string());
                    return;
                }
            }
        }
    }

    debug!("write pump closing transport");
    let _ = write.send(tungstenite::Message::Close(None)).await;
    let _ = write.close().await;
}
