//! Publish-subscribe transport boundary.
//!
//! The classification channel only needs three operations from a broker
//! client: connect, subscribe to one topic, and wait for the next message.
//! [`PubSubConnector`] and [`PubSubSession`] capture exactly that, so the
//! channel can run over MQTT in production and over an in-memory broker in
//! tests.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so the
//! futures can be driven from a spawned task.

use crate::error::Result;
use std::fmt;
use std::future::Future;

/// Broker host and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Opens sessions against a broker.
pub trait PubSubConnector: Send + Sync + 'static {
    /// Session type produced by a successful connect.
    type Session: PubSubSession;

    /// Open a session to `broker` as `client_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker is unreachable or refuses the client.
    fn connect(
        &self,
        broker: &BrokerAddress,
        client_id: &str,
    ) -> impl Future<Output = Result<Self::Session>> + Send;
}

/// An established broker session.
pub trait PubSubSession: Send + 'static {
    /// Subscribe to `topic`.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription is rejected or the link drops.
    fn subscribe(&mut self, topic: &str) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next message on any subscribed topic.
    ///
    /// # Errors
    ///
    /// Returns an error once the link is lost; the session is unusable
    /// afterwards.
    fn next_message(&mut self) -> impl Future<Output = Result<InboundMessage>> + Send;
}
