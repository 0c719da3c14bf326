//! Connection indicator: the panel's view of the session.
//!
//! Subscribes to the session bus and keeps its own display state; the
//! session never touches it. Listeners are removed again on drop.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use kady_gateway_client::types::{
    EVENT_CONNECTED, EVENT_CONNECTION_REFUSED, EVENT_HEARTBEAT, EVENT_MALFORMED_FRAME,
    EVENT_TOKEN_RECEIVED,
};
use kady_gateway_client::{BusError, EventBus, Listener, SessionEvent, listener};

/// What the indicator shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Offline,
    Online,
    Refused(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => write!(f, "offline"),
            Self::Online => write!(f, "online"),
            Self::Refused(reason) => write!(f, "refused ({reason})"),
        }
    }
}

/// Snapshot of the indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub status: Status,
    pub has_token: bool,
    pub heartbeats: u64,
    pub malformed: u64,
}

impl Default for View {
    fn default() -> Self {
        Self {
            status: Status::Offline,
            has_token: false,
            heartbeats: 0,
            malformed: 0,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gateway: {}", self.status)?;
        if self.has_token {
            write!(f, ", token held")?;
        }
        write!(f, ", {} heartbeat(s)", self.heartbeats)?;
        if self.malformed > 0 {
            write!(f, ", {} malformed frame(s)", self.malformed)?;
        }
        Ok(())
    }
}

pub struct ConnectionIndicator {
    bus: Arc<EventBus<SessionEvent>>,
    display: Arc<Mutex<View>>,
    handle: Listener<SessionEvent>,
}

const WATCHED: [&str; 5] = [
    EVENT_CONNECTED,
    EVENT_CONNECTION_REFUSED,
    EVENT_TOKEN_RECEIVED,
    EVENT_HEARTBEAT,
    EVENT_MALFORMED_FRAME,
];

impl ConnectionIndicator {
    /// Subscribes a new indicator to `bus`.
    pub fn attach(bus: Arc<EventBus<SessionEvent>>) -> Result<Self, BusError> {
        let display = Arc::new(Mutex::new(View::default()));
        let state = display.clone();
        let handle = listener(move |event: &SessionEvent| {
            let mut view = state.lock().unwrap_or_else(PoisonError::into_inner);
            apply(&mut view, event);
            tracing::info!("{}", &*view);
        });

        for name in WATCHED {
            bus.on(name, handle.clone())?;
        }
        Ok(Self {
            bus,
            display,
            handle,
        })
    }

    pub fn snapshot(&self) -> View {
        self.display
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for ConnectionIndicator {
    fn drop(&mut self) {
        for name in WATCHED {
            self.bus.off(name, &self.handle);
        }
    }
}

fn apply(display: &mut View, event: &SessionEvent) {
    match event {
        SessionEvent::Connected => display.status = Status::Online,
        SessionEvent::ConnectionRefused(reason) => {
            display.status = Status::Refused(reason.to_string());
            display.has_token = false;
        }
        SessionEvent::TokenReceived { .. } => display.has_token = true,
        SessionEvent::Heartbeat { .. } => display.heartbeats += 1,
        SessionEvent::MalformedFrame { .. } => display.malformed += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kady_gateway_client::RefusalReason;

    #[test]
    fn follows_lifecycle_events() {
        let bus = Arc::new(EventBus::new());
        let indicator = ConnectionIndicator::attach(bus.clone()).unwrap();
        assert_eq!(indicator.snapshot().status, Status::Offline);

        bus.emit(SessionEvent::TokenReceived { token: "t".into() });
        bus.emit(SessionEvent::Connected);
        bus.emit(SessionEvent::Heartbeat {
            payload: serde_json::Value::Null,
        });
        let display = indicator.snapshot();
        assert_eq!(display.status, Status::Online);
        assert!(display.has_token);
        assert_eq!(display.heartbeats, 1);

        bus.emit(SessionEvent::ConnectionRefused(RefusalReason::Timeout(
            "handshake",
        )));
        let display = indicator.snapshot();
        assert_eq!(
            display.status,
            Status::Refused("handshake timed out".into())
        );
        assert!(!display.has_token);
    }

    #[test]
    fn drop_unsubscribes() {
        let bus = Arc::new(EventBus::new());
        let indicator = ConnectionIndicator::attach(bus.clone()).unwrap();
        assert_eq!(bus.listener_count(EVENT_CONNECTED), 1);

        drop(indicator);
        for name in WATCHED {
            assert_eq!(bus.listener_count(name), 0);
        }
    }

    #[test]
    fn renders_summary() {
        let display = View {
            status: Status::Online,
            has_token: true,
            heartbeats: 3,
            malformed: 1,
        };
        assert_eq!(
            display.to_string(),
            "gateway: online, token held, 3 heartbeat(s), 1 malformed frame(s)"
        );
    }
}
