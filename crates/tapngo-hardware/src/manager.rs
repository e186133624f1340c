//! Peripheral manager.
//!
//! The [`PeripheralManager`] owns the card reader, the button panel and the
//! display, and is the only place where their errors are handled. The tick
//! loop asks it for one [`PeripheralSnapshot`] per cycle and hands it display
//! frames; neither call can fail.
//!
//! ```text
//! ┌──────────────┐
//! │ CardReader   │──poll──┐
//! └──────────────┘        │      ┌────────────────────┐
//!                         ├─────►│ PeripheralSnapshot │──► state machine
//! ┌──────────────┐        │      └────────────────────┘
//! │ ButtonPanel  │──poll──┘
//! └──────────────┘
//!
//! side effects ──frame──► CharacterDisplay
//! ```
//!
//! A failed read counts as "no card" / "no button" for that tick. It is
//! recorded in [`PeripheralStats`] and logged at debug level, since a flaky
//! reader can fail on most polls.
//!
//! # Examples
//!
//! ```
//! use tapngo_hardware::manager::PeripheralManager;
//! use tapngo_hardware::mock::{MockButtons, MockCardReader, MockDisplay};
//! use tapngo_hardware::types::Button;
//!
//! let (reader, card) = MockCardReader::new();
//! let (buttons, panel) = MockButtons::new();
//! let (display, _screen) = MockDisplay::new();
//!
//! let mut manager = PeripheralManager::new(
//!     Box::new(reader),
//!     Box::new(buttons),
//!     Box::new(display),
//! );
//!
//! card.fail("anticollision error");
//! panel.press(Button::Confirm);
//!
//! let snapshot = manager.poll();
//! assert!(!snapshot.card_present);
//! assert!(snapshot.buttons.confirm);
//! assert_eq!(manager.stats().card_errors, 1);
//! ```

use crate::traits::{ButtonPanel, CardReader, CharacterDisplay};
use crate::types::{ButtonState, PeripheralSnapshot};
use crate::HardwareError;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, info, warn};

/// Kind of peripheral, used in statistics and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Contactless card reader.
    CardReader,

    /// Front panel buttons.
    Buttons,

    /// Character display.
    Display,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CardReader => write!(f, "card reader"),
            Self::Buttons => write!(f, "buttons"),
            Self::Display => write!(f, "display"),
        }
    }
}

/// Most recent peripheral failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralFault {
    pub device: DeviceType,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Counters kept by the manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeripheralStats {
    /// Completed poll cycles.
    pub polls: u64,

    /// Failed card reader polls.
    pub card_errors: u64,

    /// Failed button panel polls.
    pub button_errors: u64,

    /// Failed display writes.
    pub display_errors: u64,

    /// Successful display writes.
    pub frames_written: u64,

    /// Most recent failure, if any.
    pub last_fault: Option<PeripheralFault>,
}

impl PeripheralStats {
    /// Total number of failures across all devices.
    #[must_use]
    pub fn total_errors(&self) -> u64 {
        self.card_errors + self.button_errors + self.display_errors
    }
}

/// Owns the kiosk peripherals and absorbs their errors.
pub struct PeripheralManager {
    reader: Box<dyn CardReader>,
    buttons: Box<dyn ButtonPanel>,
    display: Box<dyn CharacterDisplay>,
    stats: PeripheralStats,
}

impl PeripheralManager {
    /// Create a manager over the three polled peripherals.
    pub fn new(
        reader: Box<dyn CardReader>,
        buttons: Box<dyn ButtonPanel>,
        display: Box<dyn CharacterDisplay>,
    ) -> Self {
        let display_info = display.info();
        info!(
            reader = %reader.info(),
            buttons = %buttons.info(),
            display = %display_info,
            "peripherals registered"
        );

        Self {
            reader,
            buttons,
            display,
            stats: PeripheralStats::default(),
        }
    }

    /// Sample the card reader and the buttons.
    ///
    /// Never fails: a device error yields "not present" / "not pressed" for
    /// that device.
    pub fn poll(&mut self) -> PeripheralSnapshot {
        self.stats.polls += 1;

        let card_present = match self.reader.poll() {
            Ok(present) => present,
            Err(error) => {
                self.record(DeviceType::CardReader, &error);
                false
            }
        };

        let buttons = match self.buttons.poll() {
            Ok(state) => state,
            Err(error) => {
                self.record(DeviceType::Buttons, &error);
                ButtonState::released()
            }
        };

        PeripheralSnapshot {
            card_present,
            buttons,
        }
    }

    /// Write a full frame to the display.
    ///
    /// Returns `false` if the write failed; the failure is logged and counted,
    /// and the next frame redraws the whole screen.
    pub fn show(&mut self, lines: &[String]) -> bool {
        match self.display.write_lines(lines) {
            Ok(()) => {
                self.stats.frames_written += 1;
                true
            }
            Err(error) => {
                warn!(%error, "display write failed");
                self.record(DeviceType::Display, &error);
                false
            }
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> &PeripheralStats {
        &self.stats
    }

    fn record(&mut self, device: DeviceType, error: &HardwareError) {
        debug!(%device, %error, "peripheral error treated as no signal");

        match device {
            DeviceType::CardReader => self.stats.card_errors += 1,
            DeviceType::Buttons => self.stats.button_errors += 1,
            DeviceType::Display => self.stats.display_errors += 1,
        }

        self.stats.last_fault = Some(PeripheralFault {
            device,
            message: error.to_string(),
            at: Utc::now(),
        });
    }
}

impl fmt::Debug for PeripheralManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeripheralManager")
            .field("reader", &self.reader.info())
            .field("buttons", &self.buttons.info())
            .field("display", &self.display.info())
            .field("stats", &self.stats)
            .finish()
    }
}
