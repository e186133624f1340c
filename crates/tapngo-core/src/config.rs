//! Kiosk configuration loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! kiosk that talks to the public broker with the stock price list.
//!
//! ```toml
//! [timing]
//! tick_interval_ms = 100
//!
//! [channel]
//! host = "broker.emqx.io"
//! topic = "/predict/classes"
//! labels = ["bento", "rice-bowl"]
//!
//! [camera]
//! base_url = "http://192.168.1.50"
//!
//! [prices]
//! currency = "Rp"
//! items = { bento = 10000, rice-bowl = 15000 }
//! ```

use crate::{
    Result,
    constants::{
        BENTO_PRICE, CLIENT_ID_PREFIX, DEFAULT_BRING_UP_TIMEOUT_MS, DEFAULT_BROKER_HOST,
        DEFAULT_BROKER_PORT, DEFAULT_CAMERA_TIMEOUT_MS, DEFAULT_CONNECT_TIMEOUT_MS,
        DEFAULT_CURRENCY, DEFAULT_KEEP_ALIVE_SECS, DEFAULT_LABEL_TOPIC,
        DEFAULT_RECONNECT_BACKOFF_MS, DEFAULT_TICK_INTERVAL_MS, DISPLAY_COLUMNS, DISPLAY_ROWS,
        KNOWN_LABELS, PROCESSING_GRACE_MS, RESULT_SCREEN_MS, RICE_BOWL_PRICE,
    },
    error::Error,
    types::{ItemLabel, LabelSet, Price, PriceTable},
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub timing: TimingConfig,
    pub channel: ChannelConfig,
    pub camera: CameraConfig,
    pub display: DisplayConfig,
    pub prices: PricingConfig,
}

/// `[timing]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimingConfig {
    /// Main loop period.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Minimum time spent in `Processing` before a label is accepted.
    #[serde(default = "default_processing_grace_ms")]
    pub processing_grace_ms: u64,

    /// Time the success and cancelled screens stay up.
    #[serde(default = "default_result_screen_ms")]
    pub result_screen_ms: u64,
}

/// `[channel]` section: publish-subscribe link for classification labels.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    #[serde(default = "default_label_topic")]
    pub topic: String,

    /// Client identifier. Derived from the device id as
    /// `tapngo-kiosk-<device_id>` when absent.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Labels accepted from the classifier.
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default = "default_bring_up_timeout_ms")]
    pub bring_up_timeout_ms: u64,
}

/// `[camera]` section. The camera is disabled when `base_url` is absent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_camera_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// `[display]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_rows")]
    pub rows: usize,

    #[serde(default = "default_columns")]
    pub columns: usize,
}

/// `[prices]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Price per label, in minor currency units.
    #[serde(default = "default_items")]
    pub items: BTreeMap<String, u64>,
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_processing_grace_ms() -> u64 {
    PROCESSING_GRACE_MS
}

fn default_result_screen_ms() -> u64 {
    RESULT_SCREEN_MS
}

fn default_broker_host() -> String {
    DEFAULT_BROKER_HOST.to_string()
}

fn default_broker_port() -> u16 {
    DEFAULT_BROKER_PORT
}

fn default_label_topic() -> String {
    DEFAULT_LABEL_TOPIC.to_string()
}

fn default_labels() -> Vec<String> {
    KNOWN_LABELS.iter().map(|label| label.to_string()).collect()
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_reconnect_backoff_ms() -> u64 {
    DEFAULT_RECONNECT_BACKOFF_MS
}

fn default_keep_alive_secs() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}

fn default_bring_up_timeout_ms() -> u64 {
    DEFAULT_BRING_UP_TIMEOUT_MS
}

fn default_camera_timeout_ms() -> u64 {
    DEFAULT_CAMERA_TIMEOUT_MS
}

fn default_rows() -> usize {
    DISPLAY_ROWS
}

fn default_columns() -> usize {
    DISPLAY_COLUMNS
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_items() -> BTreeMap<String, u64> {
    BTreeMap::from([
        ("bento".to_string(), BENTO_PRICE),
        ("rice-bowl".to_string(), RICE_BOWL_PRICE),
    ])
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            processing_grace_ms: default_processing_grace_ms(),
            result_screen_ms: default_result_screen_ms(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            topic: default_label_topic(),
            client_id: None,
            labels: default_labels(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            keep_alive_secs: default_keep_alive_secs(),
            bring_up_timeout_ms: default_bring_up_timeout_ms(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_ms: default_camera_timeout_ms(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            columns: default_columns(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            items: default_items(),
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl ChannelConfig {
    /// Broker address as `host:port`.
    #[must_use]
    pub fn broker_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configured client id, or one derived from `device_id`.
    #[must_use]
    pub fn client_id_or(&self, device_id: &str) -> String {
        match &self.client_id {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => format!("{CLIENT_ID_PREFIX}-{device_id}"),
        }
    }

    /// Parse the accepted labels.
    ///
    /// # Errors
    /// Returns an error if any label is invalid or the list is empty.
    pub fn label_set(&self) -> Result<LabelSet> {
        LabelSet::new(&self.labels)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    #[must_use]
    pub fn bring_up_timeout(&self) -> Duration {
        Duration::from_millis(self.bring_up_timeout_ms)
    }
}

impl CameraConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl PricingConfig {
    /// Build the price table.
    ///
    /// # Errors
    /// Returns `Error::InvalidLabel` for entries whose key is not a valid label.
    pub fn to_price_table(&self) -> Result<PriceTable> {
        self.items
            .iter()
            .try_fold(PriceTable::new(&self.currency), |table, (label, amount)| {
                Ok(table.with_price(ItemLabel::new(label)?, Price::from_minor(*amount)))
            })
    }
}

impl KioskConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Load from `path` if it exists, defaults otherwise.
    ///
    /// # Errors
    /// Same as [`KioskConfig::from_file`] when the file exists.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a TOML document.
    ///
    /// # Errors
    /// Returns an error if the document is not valid TOML or fails validation.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: KioskConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.timing.tick_interval_ms == 0 {
            return Err(Error::Config("timing.tick_interval_ms must be > 0".into()));
        }

        if self.channel.connect_timeout_ms == 0 {
            return Err(Error::Config("channel.connect_timeout_ms must be > 0".into()));
        }

        if self.channel.reconnect_backoff_ms == 0 {
            return Err(Error::Config("channel.reconnect_backoff_ms must be > 0".into()));
        }

        if self.channel.topic.trim().is_empty() {
            return Err(Error::Config("channel.topic must not be empty".into()));
        }

        if self.channel.host.trim().is_empty() {
            return Err(Error::Config("channel.host must not be empty".into()));
        }

        if self.channel.labels.is_empty() {
            return Err(Error::Config("channel.labels must not be empty".into()));
        }

        self.channel.label_set()?;

        if self.display.rows == 0 || self.display.columns == 0 {
            return Err(Error::Config(format!(
                "display must be at least 1x1, got {}x{}",
                self.display.columns, self.display.rows
            )));
        }

        self.prices.to_price_table()?;

        Ok(())
    }
}
