//! In-memory broker for testing the classification channel.
//!
//! [`MockConnector`] implements [`PubSubConnector`]; its [`MockBroker`]
//! handle publishes payloads to every live session, drops sessions to
//! simulate a lost link, and can make the broker unreachable or slow.

use crate::error::{ChannelError, Result};
use crate::transport::{BrokerAddress, InboundMessage, PubSubConnector, PubSubSession};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug)]
enum SessionEvent {
    Message(InboundMessage),
    Drop,
}

#[derive(Debug, Default)]
struct BrokerState {
    reachable: bool,
    connect_delay: Option<Duration>,
    sessions: Vec<mpsc::UnboundedSender<SessionEvent>>,
    connects: u32,
    attempts: u32,
    subscriptions: Vec<String>,
    last_client_id: Option<String>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<BrokerState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Connector to the in-memory broker.
#[derive(Debug, Clone)]
pub struct MockConnector {
    shared: Arc<Shared>,
}

impl MockConnector {
    /// Create a reachable broker and its control handle.
    pub fn new() -> (Self, MockBroker) {
        let shared = Arc::new(Shared::default());
        shared.lock().reachable = true;

        (
            Self {
                shared: shared.clone(),
            },
            MockBroker { shared },
        )
    }
}

impl PubSubConnector for MockConnector {
    type Session = MockSession;

    fn connect(
        &self,
        _broker: &BrokerAddress,
        client_id: &str,
    ) -> impl Future<Output = Result<MockSession>> + Send {
        let shared = self.shared.clone();
        let client_id = client_id.to_string();

        async move {
            let delay = {
                let mut state = shared.lock();
                state.attempts += 1;
                state.connect_delay
            };

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = shared.lock();
            if !state.reachable {
                return Err(ChannelError::Transport("broker unreachable".to_string()));
            }

            let (event_tx, event_rx) = mpsc::unbounded_channel();
            state.sessions.push(event_tx);
            state.connects += 1;
            state.last_client_id = Some(client_id);
            drop(state);

            Ok(MockSession {
                event_rx,
                shared,
            })
        }
    }
}

/// Session on the in-memory broker.
#[derive(Debug)]
pub struct MockSession {
    event_rx: mpsc::UnboundedReceiver<SessionEvent>,
    shared: Arc<Shared>,
}

impl PubSubSession for MockSession {
    fn subscribe(&mut self, topic: &str) -> impl Future<Output = Result<()>> + Send {
        self.shared.lock().subscriptions.push(topic.to_string());
        std::future::ready(Ok(()))
    }

    fn next_message(&mut self) -> impl Future<Output = Result<InboundMessage>> + Send {
        async move {
            match self.event_rx.recv().await {
                Some(SessionEvent::Message(message)) => Ok(message),
                Some(SessionEvent::Drop) | None => Err(ChannelError::ConnectionLost(
                    "mock broker dropped the session".to_string(),
                )),
            }
        }
    }
}

/// Control handle for the in-memory broker.
#[derive(Debug, Clone)]
pub struct MockBroker {
    shared: Arc<Shared>,
}

impl MockBroker {
    /// Deliver `payload` on `topic` to every live session.
    ///
    /// Returns the number of sessions that received it.
    pub fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> usize {
        let message = InboundMessage::new(topic, payload);
        let mut state = self.shared.lock();

        state
            .sessions
            .retain(|session| session.send(SessionEvent::Message(message.clone())).is_ok());
        state.sessions.len()
    }

    /// Terminate every live session.
    pub fn drop_sessions(&self) {
        let mut state = self.shared.lock();
        for session in state.sessions.drain(..) {
            let _ = session.send(SessionEvent::Drop);
        }
    }

    /// Make future connects fail (or succeed again).
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.lock().reachable = reachable;
    }

    /// Delay every future connect by `delay`.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.shared.lock().connect_delay = delay;
    }

    /// Successful connects so far.
    pub fn connects(&self) -> u32 {
        self.shared.lock().connects
    }

    /// Connect attempts so far, successful or not.
    pub fn attempts(&self) -> u32 {
        self.shared.lock().attempts
    }

    /// Number of sessions still attached.
    pub fn live_sessions(&self) -> usize {
        let mut state = self.shared.lock();
        state.sessions.retain(|session| !session.is_closed());
        state.sessions.len()
    }

    /// Topics subscribed so far, in order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.shared.lock().subscriptions.clone()
    }

    /// Client id used by the most recent successful connect.
    pub fn last_client_id(&self) -> Option<String> {
        self.shared.lock().last_client_id.clone()
    }
}
