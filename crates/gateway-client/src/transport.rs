//! Transport seam between the session and the WebSocket library.

use std::future::Future;
use std::pin::Pin;

use futures_util::{Sink, Stream, StreamExt};
use tokio_tungstenite::tungstenite;
use tracing::debug;

use kady_protocol::constants::WS_TRANSPORT_CEILING;

use crate::config::SessionConfig;

/// Write half of an open transport.
pub type FrameSink = Pin<Box<dyn Sink<tungstenite::Message, Error = tungstenite::Error> + Send>>;

/// Read half of an open transport.
pub type FrameStream =
    Pin<Box<dyn Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Send>>;

/// Opens transports for a session.
pub trait Connector: Send + Sync + 'static {
    /// Opens a WebSocket to `url` and returns its write and read halves.
    fn open(
        &self,
        url: &str,
        config: &SessionConfig,
    ) -> impl Future<Output = Result<(FrameSink, FrameStream), tungstenite::Error>> + Send;
}

/// Production connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(
        &self,
        url: &str,
        config: &SessionConfig,
    ) -> impl Future<Output = Result<(FrameSink, FrameStream), tungstenite::Error>> + Send {
        let url = url.to_string();
        // Oversized frames must reach the decoder to be reported as malformed.
        let ceiling = config.max_message_size.max(WS_TRANSPORT_CEILING);

        async move {
            let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
            ws_config.max_message_size = Some(ceiling);
            ws_config.max_frame_size = Some(ceiling);

            let (ws_stream, response) =
                tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false).await?;
            debug!(status = %response.status(), "gateway upgrade accepted");

            let (write, read) = ws_stream.split();
            let sink: FrameSink = Box::pin(write);
            let stream: FrameStream = Box::pin(read);
            Ok((sink, stream))
        }
    }
}
