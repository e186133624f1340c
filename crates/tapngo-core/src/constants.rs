//! Core constants for the Tap N Go kiosk controller.
//!
//! This module centralizes the timing windows, network endpoints, display
//! geometry and catalogue defaults used across the workspace. Every value here
//! can be overridden through [`KioskConfig`](crate::config::KioskConfig); the
//! constants are the defaults a freshly flashed kiosk boots with.
//!
//! # Timing
//!
//! ```text
//! MainMenu ──start──► Processing ──(label && dt > 2000ms)──► PaymentConfirmation
//!                                                            │
//! PaymentSuccess / PaymentCancelled ──(dt >= 3000ms)──► Welcome
//! ```
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//! use tapngo_core::constants::*;
//!
//! let tick = Duration::from_millis(DEFAULT_TICK_INTERVAL_MS);
//! assert_eq!(tick.as_millis(), 100);
//! assert!(PROCESSING_GRACE_MS < RESULT_SCREEN_MS);
//! ```

// ============================================================================
// Timing
// ============================================================================

/// Period of the main control loop in milliseconds.
///
/// Every peripheral poll, mailbox read and transition evaluation happens once
/// per tick.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Delay after entering `Processing` before a classification label may
/// trigger the move to `PaymentConfirmation`.
///
/// Labels arriving inside this window are buffered; the newest one is used
/// once the window closes.
pub const PROCESSING_GRACE_MS: u64 = 2000;

/// How long the success and cancelled screens stay up before the kiosk
/// returns to `Welcome`.
pub const RESULT_SCREEN_MS: u64 = 3000;

// ============================================================================
// Classification
// ============================================================================

/// Label held by the state context before any classification is committed.
///
/// It is never a valid classification result: an update carrying this label
/// does not satisfy the `Processing` transition predicate.
pub const DEFAULT_LABEL: &str = "unknown-item";

/// Labels the classifier is known to publish.
pub const KNOWN_LABELS: [&str; 2] = ["bento", "rice-bowl"];

/// Maximum accepted length of a label payload, in bytes.
pub const MAX_LABEL_LENGTH: usize = 32;

// ============================================================================
// Channel
// ============================================================================

/// Default publish-subscribe broker host.
pub const DEFAULT_BROKER_HOST: &str = "broker.emqx.io";

/// Default MQTT port (plain TCP).
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Topic the classifier publishes labels on.
pub const DEFAULT_LABEL_TOPIC: &str = "/predict/classes";

/// Prefix of the generated client identifier.
pub const CLIENT_ID_PREFIX: &str = "tapngo-kiosk";

/// Upper bound for one connect + subscribe attempt.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Fixed wait between a failed attempt and the next one.
pub const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 2000;

/// MQTT keep-alive interval in seconds.
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;

/// Upper bound for the network bring-up step at startup.
pub const DEFAULT_BRING_UP_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Camera
// ============================================================================

/// Timeout applied to each fire-and-forget camera request.
pub const DEFAULT_CAMERA_TIMEOUT_MS: u64 = 1500;

// ============================================================================
// Display
// ============================================================================

/// Number of rows on the kiosk character LCD.
pub const DISPLAY_ROWS: usize = 4;

/// Number of columns on the kiosk character LCD.
pub const DISPLAY_COLUMNS: usize = 20;

// ============================================================================
// Pricing
// ============================================================================

/// Currency prefix printed in front of prices.
pub const DEFAULT_CURRENCY: &str = "Rp";

/// Default price of a bento box, in minor currency units.
pub const BENTO_PRICE: u64 = 10_000;

/// Default price of a rice bowl, in minor currency units.
pub const RICE_BOWL_PRICE: u64 = 15_000;
