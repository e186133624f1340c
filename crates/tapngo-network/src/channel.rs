//! Classification channel.
//!
//! The channel keeps a subscription to the classifier's label topic alive and
//! drops every accepted label into a [`LabelMailbox`]. It runs beside the tick
//! loop, never inside it:
//!
//! ```text
//!               maintain(now)                     try_take()
//! tick loop ──────────────┐                ┌──────────────── tick loop
//!                         ▼                │
//!              ┌────────────────────┐   ┌──┴───────────┐
//!              │ background attempt │──►│ LabelMailbox │
//!              │ connect+subscribe  │   └──────────────┘
//!              │ receive loop       │
//!              └────────────────────┘
//! ```
//!
//! # Connection lifecycle
//!
//! `Disconnected -> Connecting -> Connected -> Disconnected` on any error.
//! [`ClassificationChannel::maintain`] is the only place a new attempt is
//! started: at most one attempt runs at a time, and after a failure the next
//! one waits for the fixed reconnect backoff. Connect and subscribe together
//! are bounded by the connect timeout; the receive loop is unbounded and ends
//! only when the link fails or the channel shuts down.
//!
//! # Examples
//!
//! ```
//! use tapngo_core::Timestamp;
//! use tapngo_network::{ChannelSettings, ClassificationChannel, ConnectionState};
//! use tapngo_network::mock::MockConnector;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (connector, broker) = MockConnector::new();
//! let mut channel = ClassificationChannel::new(connector, ChannelSettings::default());
//!
//! assert_eq!(channel.state(), ConnectionState::Disconnected);
//! channel.maintain(Timestamp::ZERO);
//!
//! let mut state = channel.subscribe_state();
//! state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();
//!
//! broker.publish("/predict/classes", "bento");
//! # tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//! # channel.shutdown();
//! # }
//! ```

use crate::clock::MonotonicClock;
use crate::error::{ChannelError, Result};
use crate::mailbox::LabelMailbox;
use crate::transport::{BrokerAddress, PubSubConnector, PubSubSession};
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Duration;
use tapngo_core::config::ChannelConfig;
use tapngo_core::constants::{
    CLIENT_ID_PREFIX, DEFAULT_BROKER_HOST, DEFAULT_BROKER_PORT, DEFAULT_CONNECT_TIMEOUT_MS,
    DEFAULT_LABEL_TOPIC, DEFAULT_RECONNECT_BACKOFF_MS,
};
use tapngo_core::{ClassificationUpdate, LabelSet, Timestamp};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Link state of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Resolved channel settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSettings {
    pub broker: BrokerAddress,
    pub client_id: String,
    pub topic: String,
    pub labels: LabelSet,
    pub connect_timeout: Duration,
    pub reconnect_backoff: Duration,
}

impl ChannelSettings {
    /// Build settings from the `[channel]` config section.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured label set is invalid.
    pub fn from_config(config: &ChannelConfig, device_id: &str) -> Result<Self> {
        Ok(Self {
            broker: BrokerAddress::new(config.host.clone(), config.port),
            client_id: config.client_id_or(device_id),
            topic: config.topic.clone(),
            labels: config.label_set()?,
            connect_timeout: config.connect_timeout(),
            reconnect_backoff: config.reconnect_backoff(),
        })
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            broker: BrokerAddress::new(DEFAULT_BROKER_HOST, DEFAULT_BROKER_PORT),
            client_id: format!("{CLIENT_ID_PREFIX}-local"),
            topic: DEFAULT_LABEL_TOPIC.to_string(),
            labels: LabelSet::default(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            reconnect_backoff: Duration::from_millis(DEFAULT_RECONNECT_BACKOFF_MS),
        }
    }
}

/// Diagnostics counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Attempts started by `maintain`.
    pub attempts: u64,

    /// Attempts that reached `Connected`.
    pub connects: u64,

    /// Payloads accepted into the mailbox.
    pub accepted: u64,

    /// Payloads that did not match the label set.
    pub rejected: u64,

    /// Wall-clock time of the last accepted label.
    pub last_label_at: Option<DateTime<Utc>>,

    /// Error that ended the most recent attempt.
    pub last_error: Option<String>,
}

/// State shared with the background task.
#[derive(Debug)]
struct Shared {
    settings: ChannelSettings,
    mailbox: Arc<LabelMailbox>,
    state_tx: watch::Sender<ConnectionState>,
    stats: Mutex<ChannelStats>,
    clock: MonotonicClock,
    /// Bumped on shutdown; attempts from an older generation may no longer
    /// publish state.
    generation: AtomicU64,
}

impl Shared {
    fn stats(&self) -> MutexGuard<'_, ChannelStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!(from = %previous, to = %state, "classification channel state changed");
        }
    }

    /// Publish `state` from an attempt started in `generation`.
    fn set_attempt_state(&self, generation: u64, state: ConnectionState) {
        let mut previous = state;
        let changed = self.state_tx.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation || *current == state {
                return false;
            }
            previous = std::mem::replace(current, state);
            true
        });
        if changed {
            info!(from = %previous, to = %state, "classification channel state changed");
        }
    }

    fn accept(&self, payload: &[u8]) {
        match self.settings.labels.match_payload(payload) {
            Some(label) => {
                debug!(%label, "classification label received");
                let update = ClassificationUpdate::new(label, self.clock.now());
                if let Some(replaced) = self.mailbox.post(update) {
                    debug!(label = %replaced.label, "unread label overwritten");
                }

                let mut stats = self.stats();
                stats.accepted += 1;
                stats.last_label_at = Some(Utc::now());
            }
            None => {
                debug!(
                    payload = %String::from_utf8_lossy(payload),
                    "payload does not match a known label, dropped"
                );
                self.stats().rejected += 1;
            }
        }
    }
}

/// Subscribe/reconnect wrapper delivering labels into a mailbox.
pub struct ClassificationChannel<C: PubSubConnector> {
    connector: Arc<C>,
    shared: Arc<Shared>,
    state_rx: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<()>>,
    last_failure: Option<Timestamp>,
}

impl<C: PubSubConnector> ClassificationChannel<C> {
    /// Create a disconnected channel with its own mailbox and clock.
    pub fn new(connector: C, settings: ChannelSettings) -> Self {
        Self::with_parts(
            connector,
            settings,
            Arc::new(LabelMailbox::new()),
            MonotonicClock::start(),
        )
    }

    /// Create a channel writing into `mailbox` and stamping updates with
    /// `clock`.
    pub fn with_parts(
        connector: C,
        settings: ChannelSettings,
        mailbox: Arc<LabelMailbox>,
        clock: MonotonicClock,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        Self {
            connector: Arc::new(connector),
            shared: Arc::new(Shared {
                settings,
                mailbox,
                state_tx,
                stats: Mutex::new(ChannelStats::default()),
                clock,
                generation: AtomicU64::new(0),
            }),
            state_rx,
            task: None,
            last_failure: None,
        }
    }

    /// Take the pending update, if any. Never blocks.
    pub fn try_take(&self) -> Option<ClassificationUpdate> {
        self.shared.mailbox.try_take()
    }

    /// The mailbox this channel writes into.
    pub fn mailbox(&self) -> Arc<LabelMailbox> {
        self.shared.mailbox.clone()
    }

    /// Current link state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch link state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Snapshot of the diagnostics counters.
    pub fn stats(&self) -> ChannelStats {
        self.shared.stats().clone()
    }

    /// Settings the channel was built with.
    pub fn settings(&self) -> &ChannelSettings {
        &self.shared.settings
    }

    /// Returns `true` while a background attempt is alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// One non-blocking maintenance step, called once per driver cycle.
    ///
    /// Reaps a finished attempt, and starts a new one if the channel is
    /// disconnected, nothing is in flight, and the backoff since the last
    /// failure has elapsed. Must be called from within a Tokio runtime.
    pub fn maintain(&mut self, now: Timestamp) {
        if let Some(task) = self.task.take_if(|task| task.is_finished()) {
            self.reap(task);
            self.last_failure = Some(now);
            debug!(at = %now, "classification attempt ended");
        }

        if self.task.is_some() || self.state() != ConnectionState::Disconnected {
            return;
        }

        if let Some(failed_at) = self.last_failure {
            let backoff = u64::try_from(self.shared.settings.reconnect_backoff.as_millis())
                .unwrap_or(u64::MAX);
            if now.millis_since(failed_at) < backoff {
                return;
            }
        }

        self.spawn_attempt();
    }

    /// Abort the background attempt and mark the channel disconnected.
    pub fn shutdown(&mut self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
            info!("classification channel shut down");
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }

    /// Collect a finished attempt. An attempt that panicked never published
    /// `Disconnected` itself.
    fn reap(&self, mut task: JoinHandle<()>) {
        let mut cx = Context::from_waker(Waker::noop());
        if let Poll::Ready(Err(error)) = Pin::new(&mut task).poll(&mut cx)
            && error.is_panic()
        {
            warn!(%error, "classification channel attempt panicked");
            self.shared.stats().last_error = Some(format!("attempt panicked: {error}"));
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }

    fn spawn_attempt(&mut self) {
        self.shared.stats().attempts += 1;
        self.shared.set_state(ConnectionState::Connecting);

        let connector = self.connector.clone();
        let shared = self.shared.clone();
        let generation = shared.generation.load(Ordering::SeqCst);

        self.task = Some(tokio::spawn(async move {
            let result = run_attempt(connector.as_ref(), &shared, generation).await;

            if let Err(error) = &result {
                warn!(%error, "classification channel attempt failed");
                shared.stats().last_error = Some(error.to_string());
            }

            shared.set_attempt_state(generation, ConnectionState::Disconnected);
        }));
    }
}

impl<C: PubSubConnector> Drop for ClassificationChannel<C> {
    fn drop(&mut self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<C: PubSubConnector> fmt::Debug for ClassificationChannel<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationChannel")
            .field("broker", &self.shared.settings.broker)
            .field("topic", &self.shared.settings.topic)
            .field("state", &self.state())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Connect, subscribe, then pump messages until the link fails.
async fn run_attempt<C: PubSubConnector>(
    connector: &C,
    shared: &Shared,
    generation: u64,
) -> Result<()> {
    let settings = &shared.settings;
    info!(broker = %settings.broker, client_id = %settings.client_id, "connecting classification channel");

    let handshake = async {
        let mut session = connector
            .connect(&settings.broker, &settings.client_id)
            .await?;
        session.subscribe(&settings.topic).await?;
        Ok::<_, ChannelError>(session)
    };

    let mut session = match tokio::time::timeout(settings.connect_timeout, handshake).await {
        Ok(result) => result?,
        Err(_) => {
            let millis = u64::try_from(settings.connect_timeout.as_millis()).unwrap_or(u64::MAX);
            return Err(ChannelError::ConnectTimeout(millis));
        }
    };

    shared.stats().connects += 1;
    shared.set_attempt_state(generation, ConnectionState::Connected);
    info!(topic = %settings.topic, "classification channel subscribed");

    loop {
        let message = session.next_message().await?;
        shared.accept(&message.payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = ChannelConfig {
            host: "10.0.0.2".to_string(),
            port: 1884,
            ..ChannelConfig::default()
        };

        let settings = ChannelSettings::from_config(&config, "kiosk01").unwrap();
        assert_eq!(settings.broker.to_string(), "10.0.0.2:1884");
        assert_eq!(settings.client_id, "tapngo-kiosk-kiosk01");
        assert_eq!(settings.topic, "/predict/classes");
        assert_eq!(settings.labels.len(), 2);
        assert_eq!(settings.reconnect_backoff, Duration::from_secs(2));
    }

    #[test]
    fn test_settings_reject_bad_labels() {
        let config = ChannelConfig {
            labels: vec!["rice bowl".to_string()],
            ..ChannelConfig::default()
        };

        assert!(matches!(
            ChannelSettings::from_config(&config, "kiosk01"),
            Err(ChannelError::Config(_))
        ));
    }

    #[test]
    fn test_stale_attempt_cannot_publish_state() {
        let (connector, _broker) = crate::mock::MockConnector::new();
        let mut channel = ClassificationChannel::new(connector, ChannelSettings::default());
        let generation = channel.shared.generation.load(Ordering::SeqCst);

        channel.shutdown();
        channel
            .shared
            .set_attempt_state(generation, ConnectionState::Connected);
        assert_eq!(channel.state(), ConnectionState::Disconnected);

        let current = channel.shared.generation.load(Ordering::SeqCst);
        channel
            .shared
            .set_attempt_state(current, ConnectionState::Connected);
        assert_eq!(channel.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }
}
