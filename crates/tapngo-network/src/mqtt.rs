//! MQTT transport built on `rumqttc`.
//!
//! `rumqttc` splits a connection into an [`AsyncClient`] for requests and an
//! [`EventLoop`] that must be polled for anything to happen on the wire. A
//! [`MqttSession`] owns both and polls the event loop from
//! [`PubSubSession::next_message`], so the session lives entirely inside the
//! channel's background task.

use crate::error::{ChannelError, Result};
use crate::transport::{BrokerAddress, InboundMessage, PubSubConnector, PubSubSession};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace};

/// Lowest keep-alive accepted by `rumqttc`.
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Capacity of the request queue between client and event loop.
const REQUEST_CAPACITY: usize = 10;

/// Connects to an MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttConnector {
    keep_alive: Duration,
}

impl MqttConnector {
    pub fn new(keep_alive: Duration) -> Self {
        Self {
            keep_alive: keep_alive.max(MIN_KEEP_ALIVE),
        }
    }
}

impl Default for MqttConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(tapngo_core::constants::DEFAULT_KEEP_ALIVE_SECS))
    }
}

impl PubSubConnector for MqttConnector {
    type Session = MqttSession;

    fn connect(
        &self,
        broker: &BrokerAddress,
        client_id: &str,
    ) -> impl Future<Output = Result<MqttSession>> + Send {
        let mut options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);

        let broker = broker.clone();

        async move {
            debug!(%broker, "opening MQTT session");

            let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
            let mut session = MqttSession {
                client,
                eventloop,
                pending: VecDeque::new(),
            };

            session.await_connack().await?;
            Ok(session)
        }
    }
}

/// An open MQTT connection.
pub struct MqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
    pending: VecDeque<InboundMessage>,
}

impl MqttSession {
    async fn await_connack(&mut self) -> Result<()> {
        loop {
            match self.eventloop.poll().await? {
                Event::Incoming(Packet::ConnAck(ack)) => {
                    return match ack.code {
                        ConnectReturnCode::Success => Ok(()),
                        code => Err(ChannelError::ConnectionRefused(format!("{code:?}"))),
                    };
                }
                event => trace!(?event, "waiting for CONNACK"),
            }
        }
    }
}

impl PubSubSession for MqttSession {
    fn subscribe(&mut self, topic: &str) -> impl Future<Output = Result<()>> + Send {
        let topic = topic.to_string();

        async move {
            self.client.subscribe(topic.as_str(), QoS::AtMostOnce).await?;

            loop {
                match self.eventloop.poll().await? {
                    Event::Incoming(Packet::SubAck(ack)) => {
                        let rejected = ack
                            .return_codes
                            .iter()
                            .any(|code| matches!(code, rumqttc::SubscribeReasonCode::Failure));

                        if rejected {
                            return Err(ChannelError::Subscribe {
                                topic,
                                reason: "rejected by broker".to_string(),
                            });
                        }

                        debug!(%topic, "subscribed");
                        return Ok(());
                    }
                    Event::Incoming(Packet::Publish(publish)) => {
                        self.pending.push_back(InboundMessage::new(
                            publish.topic,
                            publish.payload.to_vec(),
                        ));
                    }
                    event => trace!(?event, "waiting for SUBACK"),
                }
            }
        }
    }

    fn next_message(&mut self) -> impl Future<Output = Result<InboundMessage>> + Send {
        async move {
            if let Some(message) = self.pending.pop_front() {
                return Ok(message);
            }

            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        return Ok(InboundMessage::new(publish.topic, publish.payload.to_vec()));
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        return Err(ChannelError::ConnectionLost(
                            "broker sent DISCONNECT".to_string(),
                        ));
                    }
                    Ok(event) => trace!(?event, "MQTT event"),
                    Err(error) => return Err(ChannelError::ConnectionLost(error.to_string())),
                }
            }
        }
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        if self.client.try_disconnect().is_err() {
            debug!("MQTT session dropped without clean disconnect");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_alive_is_clamped() {
        let connector = MqttConnector::new(Duration::from_secs(1));
        assert_eq!(connector.keep_alive, MIN_KEEP_ALIVE);

        let connector = MqttConnector::new(Duration::from_secs(60));
        assert_eq!(connector.keep_alive, Duration::from_secs(60));
    }

    #[test]
    fn test_default_keep_alive() {
        assert_eq!(MqttConnector::default().keep_alive, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_broker_fails() {
        // RFC 5737 TEST-NET-1 is never routed; bound the attempt ourselves.
        let connector = MqttConnector::default();
        let broker = BrokerAddress::new("192.0.2.1", 1883);

        let result = tokio::time::timeout(
            Duration::from_millis(200),
            connector.connect(&broker, "tapngo-test"),
        )
        .await;

        assert!(!matches!(result, Ok(Ok(_))));
    }
}
