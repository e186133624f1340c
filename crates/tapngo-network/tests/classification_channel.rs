//! Integration tests for the classification channel over the in-memory broker.
//!
//! All tests run on paused time, so backoff and timeout windows are exact.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tapngo_core::{ClassificationUpdate, LabelSet, Timestamp};
use tapngo_network::mock::{MockBroker, MockConnector, MockSession};
use tapngo_network::{
    BrokerAddress, ChannelSettings, ClassificationChannel, ConnectionState, PubSubConnector,
    Result,
};

const TOPIC: &str = "/predict/classes";

fn channel() -> (ClassificationChannel<MockConnector>, MockBroker) {
    let (connector, broker) = MockConnector::new();
    let settings = ChannelSettings {
        client_id: "tapngo-kiosk-test".to_string(),
        ..ChannelSettings::default()
    };
    (ClassificationChannel::new(connector, settings), broker)
}

/// Panics inside `connect` for the next `crashes` attempts, then delegates.
#[derive(Debug, Clone)]
struct CrashingConnector {
    inner: MockConnector,
    crashes: Arc<AtomicU32>,
}

impl PubSubConnector for CrashingConnector {
    type Session = MockSession;

    fn connect(
        &self,
        broker: &BrokerAddress,
        client_id: &str,
    ) -> impl Future<Output = Result<MockSession>> + Send {
        let crash = self
            .crashes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let session = self.inner.connect(broker, client_id);

        async move {
            if crash {
                panic!("connector crashed");
            }
            session.await
        }
    }
}

async fn wait_for_state<C: PubSubConnector>(
    channel: &ClassificationChannel<C>,
    state: ConnectionState,
) {
    let mut rx = channel.subscribe_state();
    tokio::time::timeout(Duration::from_secs(30), rx.wait_for(|s| *s == state))
        .await
        .expect("state not reached in time")
        .expect("state sender dropped");
}

async fn wait_for_accepted(channel: &ClassificationChannel<MockConnector>, count: u64) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while channel.stats().accepted + channel.stats().rejected < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("payloads not processed in time");
}

async fn wait_until_idle<C: PubSubConnector>(channel: &ClassificationChannel<C>) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while channel.is_running() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("attempt did not finish");
}

#[tokio::test(start_paused = true)]
async fn test_connects_and_subscribes() {
    let (mut channel, broker) = channel();

    assert_eq!(channel.state(), ConnectionState::Disconnected);
    channel.maintain(Timestamp::ZERO);
    wait_for_state(&channel, ConnectionState::Connected).await;

    assert_eq!(broker.subscriptions(), vec![TOPIC]);
    assert_eq!(broker.last_client_id().as_deref(), Some("tapngo-kiosk-test"));
    assert_eq!(channel.stats().connects, 1);
}

#[tokio::test(start_paused = true)]
async fn test_label_reaches_mailbox() {
    let (mut channel, broker) = channel();
    channel.maintain(Timestamp::ZERO);
    wait_for_state(&channel, ConnectionState::Connected).await;

    broker.publish(TOPIC, "rice-bowl");
    wait_for_accepted(&channel, 1).await;

    let update: ClassificationUpdate = channel.try_take().unwrap();
    assert_eq!(update.label.as_str(), "rice-bowl");
    assert!(channel.try_take().is_none());
    assert!(channel.stats().last_label_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_last_write_wins() {
    let (mut channel, broker) = channel();
    channel.maintain(Timestamp::ZERO);
    wait_for_state(&channel, ConnectionState::Connected).await;

    broker.publish(TOPIC, "bento");
    wait_for_accepted(&channel, 1).await;
    tokio::time::advance(Duration::from_millis(10)).await;
    broker.publish(TOPIC, "rice-bowl");
    wait_for_accepted(&channel, 2).await;

    let update = channel.try_take().unwrap();
    assert_eq!(update.label.as_str(), "rice-bowl");
    assert!(channel.try_take().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_payloads_are_dropped() {
    let (mut channel, broker) = channel();
    channel.maintain(Timestamp::ZERO);
    wait_for_state(&channel, ConnectionState::Connected).await;

    broker.publish(TOPIC, "sushi");
    broker.publish(TOPIC, vec![0xFF, 0xFE]);
    broker.publish(TOPIC, " BENTO\n");
    wait_for_accepted(&channel, 3).await;

    let stats = channel.stats();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.rejected, 2);
    assert_eq!(channel.try_take().unwrap().label.as_str(), "bento");
}

#[tokio::test(start_paused = true)]
async fn test_custom_label_set() {
    let (connector, broker) = MockConnector::new();
    let settings = ChannelSettings {
        labels: LabelSet::new(["onigiri"]).unwrap(),
        ..ChannelSettings::default()
    };
    let mut channel = ClassificationChannel::new(connector, settings);
    channel.maintain(Timestamp::ZERO);
    wait_for_state(&channel, ConnectionState::Connected).await;

    broker.publish(TOPIC, "bento");
    broker.publish(TOPIC, "onigiri");
    wait_for_accepted(&channel, 2).await;

    assert_eq!(channel.try_take().unwrap().label.as_str(), "onigiri");
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_waits_for_backoff() {
    let (mut channel, broker) = channel();
    broker.set_reachable(false);

    channel.maintain(Timestamp::ZERO);
    wait_until_idle(&channel).await;
    assert_eq!(channel.state(), ConnectionState::Disconnected);
    assert_eq!(broker.attempts(), 1);
    assert!(channel.stats().last_error.is_some());

    // Failure observed at t=100; backoff is 2000 ms.
    channel.maintain(Timestamp::from_millis(100));
    channel.maintain(Timestamp::from_millis(1000));
    channel.maintain(Timestamp::from_millis(2099));
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(broker.attempts(), 1);
    assert_eq!(channel.stats().attempts, 1);

    broker.set_reachable(true);
    channel.maintain(Timestamp::from_millis(2100));
    wait_for_state(&channel, ConnectionState::Connected).await;
    assert_eq!(broker.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout() {
    let (mut channel, broker) = channel();
    broker.set_connect_delay(Some(Duration::from_secs(60)));

    channel.maintain(Timestamp::ZERO);
    assert_eq!(channel.state(), ConnectionState::Connecting);

    wait_until_idle(&channel).await;
    assert_eq!(channel.state(), ConnectionState::Disconnected);

    let error = channel.stats().last_error.unwrap();
    assert!(error.contains("timeout"), "unexpected error: {error}");
    assert_eq!(broker.connects(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_in_flight() {
    let (mut channel, broker) = channel();
    broker.set_connect_delay(Some(Duration::from_secs(1)));

    for t in 0..10 {
        channel.maintain(Timestamp::from_millis(t * 100));
    }

    wait_for_state(&channel, ConnectionState::Connected).await;
    assert_eq!(channel.stats().attempts, 1);
    assert_eq!(broker.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_mid_stream_then_resume() {
    let (mut channel, broker) = channel();
    channel.maintain(Timestamp::ZERO);
    wait_for_state(&channel, ConnectionState::Connected).await;

    broker.drop_sessions();
    wait_for_state(&channel, ConnectionState::Disconnected).await;
    wait_until_idle(&channel).await;

    // Labels published while offline are lost.
    broker.publish(TOPIC, "bento");

    channel.maintain(Timestamp::from_millis(500));
    channel.maintain(Timestamp::from_millis(1500));
    assert_eq!(channel.state(), ConnectionState::Disconnected);

    channel.maintain(Timestamp::from_millis(2500));
    wait_for_state(&channel, ConnectionState::Connected).await;
    assert!(channel.try_take().is_none());

    broker.publish(TOPIC, "rice-bowl");
    wait_for_accepted(&channel, 1).await;
    assert_eq!(channel.try_take().unwrap().label.as_str(), "rice-bowl");
    assert_eq!(broker.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_session() {
    let (mut channel, broker) = channel();
    channel.maintain(Timestamp::ZERO);
    wait_for_state(&channel, ConnectionState::Connected).await;
    assert_eq!(broker.live_sessions(), 1);

    channel.shutdown();
    assert_eq!(channel.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!channel.is_running());
    assert_eq!(broker.live_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_panicked_attempt_is_retried_after_backoff() {
    let (inner, broker) = MockConnector::new();
    let connector = CrashingConnector {
        inner,
        crashes: Arc::new(AtomicU32::new(1)),
    };
    let mut channel = ClassificationChannel::new(connector, ChannelSettings::default());

    channel.maintain(Timestamp::ZERO);
    wait_until_idle(&channel).await;

    channel.maintain(Timestamp::from_millis(100));
    assert_eq!(channel.state(), ConnectionState::Disconnected);
    let error = channel.stats().last_error.unwrap();
    assert!(error.contains("panicked"), "unexpected error: {error}");

    channel.maintain(Timestamp::from_millis(2099));
    assert_eq!(channel.stats().attempts, 1);

    channel.maintain(Timestamp::from_millis(2100));
    assert_eq!(channel.stats().attempts, 2);
    wait_for_state(&channel, ConnectionState::Connected).await;
    assert_eq!(broker.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_connecting_stays_disconnected() {
    let (mut channel, broker) = channel();
    broker.set_connect_delay(Some(Duration::from_millis(50)));

    channel.maintain(Timestamp::ZERO);
    assert_eq!(channel.state(), ConnectionState::Connecting);
    channel.shutdown();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(channel.state(), ConnectionState::Disconnected);
    assert_eq!(broker.connects(), 0);
}
