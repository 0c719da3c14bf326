//! Keepalive pumps: WebSocket pings and protocol heartbeats.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use kady_protocol::{Frame, HeartbeatPayload, OpCode};

use crate::types::SessionState;

/// Sends periodic pings so the gateway keeps answering within the read deadline.
pub(crate) async fn ping_pump(
    write_tx: mpsc::Sender<tungstenite::Message>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let ping = tungstenite::Message::Ping(Vec::new().into());
                if write_tx.send(ping).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Sends `HEARTBEAT` frames once the session is established.
///
/// Each payload carries the milliseconds elapsed since the previous beat.
pub(crate) async fn heartbeat_pump(
    write_tx: mpsc::Sender<tungstenite::Message>,
    mut state_rx: watch::Receiver<SessionState>,
    period: Duration,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        established = wait_established(&mut state_rx) => {
            if !established {
                return;
            }
        }
    }

    let mut interval = tokio::time::interval(period);
    interval.tick().await;
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            now = interval.tick() => {
                let payload = HeartbeatPayload {
                    since_last_ms: now.duration_since(last).as_millis() as u64,
                };
                last = now;

                let text = match Frame::new(OpCode::Heartbeat, &payload).and_then(|f| f.to_text()) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("failed to encode heartbeat: {e}");
                        break;
                    }
                };
                trace!(since_last_ms = payload.since_last_ms, "sending heartbeat");
                if write_tx.send(tungstenite::Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Waits until the session is established. Returns `false` if the attempt
/// ended first or the session is gone.
async fn wait_established(state_rx: &mut watch::Receiver<SessionState>) -> bool {
    match state_rx
        .wait_for(|s| *s == SessionState::Established || !s.is_live())
        .await
    {
        Ok(state) => *state == SessionState::Established,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kady_protocol::Inbound;

    #[tokio::test]
    async fn ping_pump_stops_on_cancel() {
        let (tx, _rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let c = cancel.clone();
        let handle = tokio::spawn(async move {
            ping_pump(tx, Duration::from_secs(15), c).await;
        });

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");
    }

    #[tokio::test(start_paused = true)]
    async fn ping_pump_sends_pings() {
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(ping_pump(tx, Duration::from_secs(15), cancel.clone()));

        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, tungstenite::Message::Ping(_)));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_waits_for_established() {
        let (tx, mut rx) = mpsc::channel(16);
        let (state_tx, state_rx) = watch::channel(SessionState::AwaitingHandshakeAck);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(heartbeat_pump(
            tx,
            state_rx,
            Duration::from_secs(5),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(rx.try_recv().is_err(), "no beats before the ack");

        state_tx.send_replace(SessionState::Established);
        let msg = rx.recv().await.unwrap();
        let tungstenite::Message::Text(text) = msg else {
            panic!("expected a text frame, got {msg:?}");
        };
        let Inbound::Known(frame) = Frame::decode(text.as_str(), 1024).unwrap() else {
            panic!("unknown op");
        };
        assert_eq!(frame.op, OpCode::Heartbeat);
        let payload: HeartbeatPayload = frame.parse_payload().unwrap();
        assert_eq!(payload.since_last_ms, 5_000);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn heartbeat_gives_up_when_refused() {
        let (tx, mut rx) = mpsc::channel(16);
        let (state_tx, state_rx) = watch::channel(SessionState::AwaitingHandshakeAck);
        let handle = tokio::spawn(heartbeat_pump(
            tx,
            state_rx,
            Duration::from_secs(5),
            CancellationToken::new(),
        ));

        state_tx.send_replace(SessionState::Refused);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");
        assert!(rx.recv().await.is_none());
    }
}
