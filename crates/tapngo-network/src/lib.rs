//! Network layer for the Tap N Go kiosk.
//!
//! # Components
//!
//! - **ClassificationChannel**: keeps an MQTT subscription to the label topic
//!   alive and hands labels to the tick loop through a [`LabelMailbox`].
//! - **Transports**: [`MqttConnector`] for production, [`mock::MockConnector`]
//!   for tests.
//! - **HttpCameraTrigger**: starts and stops the camera stream over HTTP.
//! - **NetworkLink**: bounded connectivity bring-up at startup.
//!
//! # Example
//!
//! ```no_run
//! use tapngo_core::KioskConfig;
//! use tapngo_network::{ChannelSettings, ClassificationChannel, MqttConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = KioskConfig::default();
//! let settings = ChannelSettings::from_config(&config.channel, "kiosk01")?;
//! let connector = MqttConnector::new(config.channel.keep_alive());
//!
//! let mut channel = ClassificationChannel::new(connector, settings);
//! channel.maintain(tapngo_core::Timestamp::ZERO);
//! # Ok(())
//! # }
//! ```

pub mod camera;
pub mod channel;
pub mod clock;
pub mod error;
pub mod link;
pub mod mailbox;
pub mod mock;
pub mod mqtt;
pub mod transport;

pub use camera::HttpCameraTrigger;
pub use channel::{ChannelSettings, ChannelStats, ClassificationChannel, ConnectionState};
pub use clock::MonotonicClock;
pub use error::{ChannelError, Result};
pub use link::{HostNetwork, NetworkLink, bring_up_with_timeout};
pub use mailbox::LabelMailbox;
pub use mqtt::{MqttConnector, MqttSession};
pub use transport::{BrokerAddress, InboundMessage, PubSubConnector, PubSubSession};
