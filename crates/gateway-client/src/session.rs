//! Connection lifecycle and handshake state machine.
//!
//! A [`ConnectionSession`] owns at most one live transport. Every `connect`
//! starts a new generation; pumps of older generations are cancelled and
//! anything they still report is ignored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::SinkExt;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kady_protocol::{CredentialsPayload, Frame, OpCode};

use crate::bus::EventBus;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::pumps::read::ReadContext;
use crate::transport::{Connector, FrameSink, FrameStream, WsConnector};
use crate::types::{Credentials, RefusalReason, SessionEvent, SessionState};

/// How long a retired transport gets to flush its close frame.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Client session with the admin gateway.
///
/// Lifecycle and protocol events are published on [`bus`](Self::bus);
/// the session never retries on its own.
pub struct ConnectionSession<C: Connector = WsConnector> {
    connector: C,
    core: Arc<SessionCore>,
}

impl ConnectionSession {
    /// Creates a session that opens real WebSocket transports.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_connector(WsConnector, config)
    }
}

impl<C: Connector> ConnectionSession<C> {
    /// Creates a session on top of a custom connector.
    pub fn with_connector(connector: C, config: SessionConfig) -> Self {
        Self {
            connector,
            core: Arc::new(SessionCore::new(config)),
        }
    }

    /// Shared handle to the session's event bus.
    pub fn bus(&self) -> Arc<EventBus<SessionEvent>> {
        self.core.bus.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    /// Receiver following every state change.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.core.subscribe()
    }

    /// Token handed out by the gateway on the current connection, if any.
    pub fn token(&self) -> Option<String> {
        self.core.token()
    }

    /// Opens a transport to `host` and sends the credentials frame.
    ///
    /// Returns once the credentials are on the wire; the handshake ack is
    /// reported asynchronously through the `connected` event. Any previous
    /// transport is closed before the new one is opened.
    pub async fn connect(&self, credentials: Credentials, host: &str) -> Result<(), SessionError> {
        credentials.validate()?;
        let url = self.core.config.endpoint(host);
        let identifier = credentials.id().to_string();
        let hello = Frame::new(OpCode::Credentials, &CredentialsPayload::from(credentials))?
            .to_text()?;

        let (generation, previous) = self.core.begin_attempt();
        if let Some(previous) = previous {
            debug!(
                generation = previous.generation,
                "closing superseded gateway transport"
            );
            previous.shutdown().await;
        }
        info!(generation, url = %url, id = %identifier, "connecting to gateway");

        let (mut sink, stream) = match self.open_transport(&url).await {
            Ok(halves) => halves,
            Err(err) => {
                let reason = match &err {
                    SessionError::Timeout(stage) => RefusalReason::Timeout(*stage),
                    SessionError::TransportRefused(e) => RefusalReason::Transport(e.to_string()),
                    other => RefusalReason::Transport(other.to_string()),
                };
                if !self.core.refuse(generation, reason) {
                    return Err(SessionError::Superseded);
                }
                return Err(err);
            }
        };

        if !self.core.advance(
            generation,
            SessionState::Connecting,
            SessionState::AwaitingHandshakeAck,
        ) {
            let _ = sink.close().await;
            return Err(SessionError::Superseded);
        }

        if let Err(e) = sink.send(tungstenite::Message::Text(hello.into())).await {
            warn!(generation, error = %e, "transport rejected the credentials frame");
            let _ = sink.close().await;
            if !self.core.refuse(generation, RefusalReason::NotReady) {
                return Err(SessionError::Superseded);
            }
            return Err(SessionError::TransportNotReady);
        }
        debug!(generation, "credentials sent, awaiting handshake ack");

        self.spawn_pumps(generation, sink, stream)
    }

    /// Sends a frame on the live transport.
    pub async fn send<T: Serialize>(&self, op: OpCode, payload: &T) -> Result<(), SessionError> {
        let text = Frame::new(op, payload)?.to_text()?;
        let write_tx = self.core.writer().ok_or(SessionError::TransportNotReady)?;
        write_tx
            .send(tungstenite::Message::Text(text.into()))
            .await
            .map_err(|_| SessionError::TransportNotReady)
    }

    /// Closes the live transport, if any, and returns to [`SessionState::Idle`].
    ///
    /// No `connection_refused` is emitted for a caller-initiated close.
    pub async fn close(&self) {
        if let Some(transport) = self.core.reset() {
            transport.shutdown().await;
            info!("gateway session closed");
        }
    }

    async fn open_transport(&self, url: &str) -> Result<(FrameSink, FrameStream), SessionError> {
        let open = self.connector.open(url, &self.core.config);
        match self.core.config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, open)
                .await
                .map_err(|_| SessionError::Timeout("transport open"))?
                .map_err(SessionError::from),
            None => open.await.map_err(SessionError::from),
        }
    }

    fn spawn_pumps(
        &self,
        generation: u64,
        sink: FrameSink,
        stream: FrameStream,
    ) -> Result<(), SessionError> {
        let config = &self.core.config;
        let (write_tx, write_rx) = mpsc::channel(config.write_buffer.max(1));
        let (failed_tx, failed_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let write_handle = tokio::spawn(crate::pumps::write::write_pump(
            sink,
            write_rx,
            failed_tx,
            cancel.clone(),
        ));

        let transport = ActiveTransport {
            generation,
            write_tx: write_tx.clone(),
            cancel: cancel.clone(),
            handles: Vec::new(),
        };
        if let Err(rejected) = self.core.install(transport) {
            rejected.cancel.cancel();
            return Err(SessionError::Superseded);
        }

        let mut handles = vec![write_handle];
        handles.push(tokio::spawn(crate::pumps::read::read_pump(
            stream,
            ReadContext {
                core: self.core.clone(),
                generation,
                write_tx: write_tx.clone(),
                write_failed: failed_rx,
                cancel: cancel.clone(),
            },
        )));
        if let Some(period) = config.ping_interval {
            handles.push(tokio::spawn(crate::pumps::keepalive::ping_pump(
                write_tx.clone(),
                period,
                cancel.clone(),
            )));
        }
        if let Some(period) = config.heartbeat_interval {
            handles.push(tokio::spawn(crate::pumps::keepalive::heartbeat_pump(
                write_tx,
                self.core.subscribe(),
                period,
                cancel,
            )));
        }

        self.core.attach_handles(generation, handles);
        Ok(())
    }
}

impl<C: Connector> Drop for ConnectionSession<C> {
    fn drop(&mut self) {
        if let Some(transport) = self.core.reset() {
            transport.cancel.cancel();
        }
    }
}

/// One open transport and the pumps serving it.
pub(crate) struct ActiveTransport {
    pub(crate) generation: u64,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl ActiveTransport {
    /// Cancels the pumps and waits briefly for the close frame to go out.
    async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!(
                    generation = self.generation,
                    "transport pump did not stop in time"
                );
            }
        }
    }
}

struct Inner {
    generation: u64,
    transport: Option<ActiveTransport>,
    token: Option<String>,
}

/// State shared between the session handle and its pumps.
///
/// `inner` is never held across an `.await` or while listeners run.
pub(crate) struct SessionCore {
    pub(crate) bus: Arc<EventBus<SessionEvent>>,
    pub(crate) config: SessionConfig,
    state_tx: watch::Sender<SessionState>,
    inner: Mutex<Inner>,
}

impl SessionCore {
    pub(crate) fn new(config: SessionConfig) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            bus: Arc::new(EventBus::new()),
            config,
            state_tx,
            inner: Mutex::new(Inner {
                generation: 0,
                transport: None,
                token: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "session state changed");
        }
    }

    /// Starts a new generation in [`SessionState::Connecting`] and hands back
    /// the transport it replaces.
    pub(crate) fn begin_attempt(&self) -> (u64, Option<ActiveTransport>) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.token = None;
        let previous = inner.transport.take();
        self.set_state(SessionState::Connecting);
        (inner.generation, previous)
    }

    /// Starts a new generation in [`SessionState::Idle`] without a transport.
    pub(crate) fn reset(&self) -> Option<ActiveTransport> {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.token = None;
        let previous = inner.transport.take();
        self.set_state(SessionState::Idle);
        previous
    }

    /// Moves `generation` from `from` to `to`. Returns `false` when the
    /// generation is stale or the session is in another state.
    pub(crate) fn advance(&self, generation: u64, from: SessionState, to: SessionState) -> bool {
        let inner = self.lock();
        if inner.generation != generation || self.state() != from {
            return false;
        }
        self.set_state(to);
        true
    }

    /// Stores the transport for its generation, or hands it back when the
    /// attempt was superseded meanwhile.
    fn install(&self, transport: ActiveTransport) -> Result<(), ActiveTransport> {
        let mut inner = self.lock();
        if inner.generation != transport.generation
            || self.state() != SessionState::AwaitingHandshakeAck
            || inner.transport.is_some()
        {
            return Err(transport);
        }
        inner.transport = Some(transport);
        Ok(())
    }

    fn attach_handles(&self, generation: u64, handles: Vec<JoinHandle<()>>) {
        let mut inner = self.lock();
        if let Some(transport) = inner.transport.as_mut()
            && transport.generation == generation
        {
            transport.handles = handles;
        }
    }

    fn writer(&self) -> Option<mpsc::Sender<tungstenite::Message>> {
        self.lock().transport.as_ref().map(|t| t.write_tx.clone())
    }

    /// Ends a live attempt of `generation` in [`SessionState::Refused`] and
    /// emits `connection_refused`.
    ///
    /// Returns `false`, without emitting, when the generation is stale or
    /// already ended, which keeps it to one emission per failed attempt.
    pub(crate) fn refuse(&self, generation: u64, reason: RefusalReason) -> bool {
        let retired = {
            let mut inner = self.lock();
            if inner.generation != generation || !self.state().is_live() {
                return false;
            }
            self.set_state(SessionState::Refused);
            inner.transport.take()
        };
        if let Some(transport) = retired {
            transport.cancel.cancel();
        }

        warn!(generation, reason = %reason, "gateway connection refused");
        self.bus.emit(SessionEvent::ConnectionRefused(reason));
        true
    }

    /// Completes the handshake of `generation`. Returns `false` when it is
    /// not awaiting an ack.
    pub(crate) fn establish(&self, generation: u64) -> bool {
        self.advance(
            generation,
            SessionState::AwaitingHandshakeAck,
            SessionState::Established,
        )
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub(crate) fn store_token(&self, generation: u64, token: String) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.token = Some(token);
        true
    }

    /// Returns `true` when frames of `generation` should be dispatched.
    pub(crate) fn is_dispatching(&self, generation: u64) -> bool {
        let inner = self.lock();
        inner.generation == generation && self.state().dispatches_frames()
    }

    pub(crate) fn is_awaiting_ack(&self, generation: u64) -> bool {
        let inner = self.lock();
        inner.generation == generation && self.state() == SessionState::AwaitingHandshakeAck
    }
}
