//! Mock button panel.

use crate::{
    HardwareError, Result,
    traits::ButtonPanel,
    types::{Button, ButtonState, DeviceInfo},
};
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Mock front panel.
///
/// [`MockButtonsHandle::press`] produces a click seen by exactly one poll;
/// [`MockButtonsHandle::hold`] keeps a button down until it is released.
///
/// # Examples
///
/// ```
/// use tapngo_hardware::mock::MockButtons;
/// use tapngo_hardware::traits::ButtonPanel;
/// use tapngo_hardware::types::Button;
///
/// let (mut panel, handle) = MockButtons::new();
///
/// handle.press(Button::Confirm);
/// assert!(panel.poll().unwrap().confirm);
/// assert!(!panel.poll().unwrap().confirm);
/// ```
#[derive(Debug)]
pub struct MockButtons {
    event_rx: mpsc::UnboundedReceiver<ButtonEvent>,
    held: ButtonState,
}

impl MockButtons {
    /// Create a new mock panel and its control handle.
    pub fn new() -> (Self, MockButtonsHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let panel = Self {
            event_rx,
            held: ButtonState::released(),
        };

        (panel, MockButtonsHandle { event_tx })
    }
}

impl ButtonPanel for MockButtons {
    fn poll(&mut self) -> Result<ButtonState> {
        let mut clicked = ButtonState::released();

        loop {
            match self.event_rx.try_recv() {
                Ok(ButtonEvent::Press(button)) => clicked.set(button, true),
                Ok(ButtonEvent::Hold(button)) => self.held.set(button, true),
                Ok(ButtonEvent::Release(button)) => self.held.set(button, false),
                Ok(ButtonEvent::Fault(message)) => {
                    return Err(HardwareError::communication(message));
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(HardwareError::disconnected("mock buttons"));
                }
            }
        }

        Ok(self.held.union(clicked))
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new("Mock Buttons", "Mock GPIO Panel")
    }
}

#[derive(Debug, Clone)]
enum ButtonEvent {
    Press(Button),
    Hold(Button),
    Release(Button),
    Fault(String),
}

/// Handle for controlling [`MockButtons`].
#[derive(Debug, Clone)]
pub struct MockButtonsHandle {
    event_tx: mpsc::UnboundedSender<ButtonEvent>,
}

impl MockButtonsHandle {
    /// Click `button`: pressed for the next poll only.
    pub fn press(&self, button: Button) {
        self.send(ButtonEvent::Press(button));
    }

    /// Hold `button` down.
    pub fn hold(&self, button: Button) {
        self.send(ButtonEvent::Hold(button));
    }

    /// Release a held button.
    pub fn release(&self, button: Button) {
        self.send(ButtonEvent::Release(button));
    }

    /// Make the next poll fail.
    pub fn fail(&self, message: impl Into<String>) {
        self.send(ButtonEvent::Fault(message.into()));
    }

    fn send(&self, event: ButtonEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::debug!("mock buttons dropped, event ignored");
        }
    }
}
