//! Value types exchanged between the peripherals and the kiosk core.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic device information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "MFRC522", "MockButtons").
    pub name: String,

    /// Device model identifier.
    pub model: String,

    /// Optional firmware version string.
    pub firmware_version: Option<String>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            firmware_version: None,
        }
    }

    /// Set the firmware version.
    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.model)
    }
}

/// Physical push buttons on the kiosk front panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    /// Green button: OK / confirm.
    Confirm,

    /// Yellow button: start scanning the tray.
    Start,

    /// Red button: cancel.
    Cancel,
}

impl Button {
    /// All buttons, in panel order.
    pub const ALL: [Button; 3] = [Button::Confirm, Button::Start, Button::Cancel];

    /// Cap colour of the physical button.
    pub fn color(self) -> &'static str {
        match self {
            Self::Confirm => "green",
            Self::Start => "yellow",
            Self::Cancel => "red",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirm => write!(f, "confirm"),
            Self::Start => write!(f, "start"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

/// Pressed/released state of every button for one tick.
///
/// # Examples
///
/// ```
/// use tapngo_hardware::types::{Button, ButtonState};
///
/// let state = ButtonState::released().with(Button::Confirm);
/// assert!(state.is_pressed(Button::Confirm));
/// assert!(!state.is_pressed(Button::Cancel));
/// assert!(state.any());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ButtonState {
    pub confirm: bool,
    pub start: bool,
    pub cancel: bool,
}

impl ButtonState {
    /// No button pressed.
    #[must_use]
    pub const fn released() -> Self {
        Self {
            confirm: false,
            start: false,
            cancel: false,
        }
    }

    /// Same state with `button` also pressed.
    #[must_use]
    pub fn with(mut self, button: Button) -> Self {
        self.set(button, true);
        self
    }

    /// Set the pressed flag of one button.
    pub fn set(&mut self, button: Button, pressed: bool) {
        match button {
            Button::Confirm => self.confirm = pressed,
            Button::Start => self.start = pressed,
            Button::Cancel => self.cancel = pressed,
        }
    }

    #[must_use]
    pub fn is_pressed(&self, button: Button) -> bool {
        match button {
            Button::Confirm => self.confirm,
            Button::Start => self.start,
            Button::Cancel => self.cancel,
        }
    }

    /// Returns `true` if at least one button is pressed.
    #[must_use]
    pub fn any(&self) -> bool {
        self.confirm || self.start || self.cancel
    }

    /// Merge two states; a button is pressed if pressed in either.
    #[must_use]
    pub fn union(self, other: ButtonState) -> Self {
        Self {
            confirm: self.confirm || other.confirm,
            start: self.start || other.start,
            cancel: self.cancel || other.cancel,
        }
    }
}

/// Everything the state machine learns from the peripherals in one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeripheralSnapshot {
    /// A card is in range of the reader.
    pub card_present: bool,

    /// Button state sampled this tick.
    pub buttons: ButtonState,
}

impl PeripheralSnapshot {
    /// Snapshot with nothing happening.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            card_present: false,
            buttons: ButtonState::released(),
        }
    }

    /// Snapshot with a card in range.
    #[must_use]
    pub fn with_card(mut self) -> Self {
        self.card_present = true;
        self
    }

    /// Snapshot with `button` pressed.
    #[must_use]
    pub fn with_button(mut self, button: Button) -> Self {
        self.buttons = self.buttons.with(button);
        self
    }

    #[must_use]
    pub fn pressed(&self, button: Button) -> bool {
        self.buttons.is_pressed(button)
    }
}

/// Command sent to the remote camera streaming server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraCommand {
    /// Turn the stream on.
    Start,

    /// Turn the stream off.
    Stop,
}

impl CameraCommand {
    /// Value of the `stream` query parameter understood by the server.
    pub fn stream_param(self) -> &'static str {
        match self {
            Self::Start => "on",
            Self::Stop => "off",
        }
    }
}

impl fmt::Display for CameraCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
        }
    }
}
