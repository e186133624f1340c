//! Mock card reader for testing and the console simulator.

use crate::{HardwareError, Result, traits::CardReader, types::DeviceInfo};
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Mock contactless card reader.
///
/// A card can be tapped (present for exactly one poll) or placed (present on
/// every poll until removed). Read failures can be injected through the
/// handle.
///
/// # Examples
///
/// ```
/// use tapngo_hardware::mock::MockCardReader;
/// use tapngo_hardware::traits::CardReader;
///
/// let (mut reader, handle) = MockCardReader::new();
///
/// handle.place();
/// assert!(reader.poll().unwrap());
/// assert!(reader.poll().unwrap());
///
/// handle.remove();
/// assert!(!reader.poll().unwrap());
/// ```
#[derive(Debug)]
pub struct MockCardReader {
    event_rx: mpsc::UnboundedReceiver<CardEvent>,
    name: String,
    held: bool,
}

impl MockCardReader {
    /// Create a new mock reader with the default name.
    pub fn new() -> (Self, MockCardHandle) {
        Self::with_name("Mock Card Reader")
    }

    /// Create a new mock reader with a custom name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockCardHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let reader = Self {
            event_rx,
            name: name.into(),
            held: false,
        };

        (reader, MockCardHandle { event_tx })
    }
}

impl CardReader for MockCardReader {
    fn poll(&mut self) -> Result<bool> {
        let mut tapped = false;

        loop {
            match self.event_rx.try_recv() {
                Ok(CardEvent::Tap) => tapped = true,
                Ok(CardEvent::Place) => self.held = true,
                Ok(CardEvent::Remove) => self.held = false,
                Ok(CardEvent::Fault(message)) => return Err(HardwareError::card_read(message)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(HardwareError::disconnected(self.name.clone()));
                }
            }
        }

        Ok(tapped || self.held)
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.name.clone(), "Mock MFRC522").with_firmware_version("1.0.0")
    }
}

#[derive(Debug, Clone)]
enum CardEvent {
    Tap,
    Place,
    Remove,
    Fault(String),
}

/// Handle for controlling a [`MockCardReader`].
#[derive(Debug, Clone)]
pub struct MockCardHandle {
    event_tx: mpsc::UnboundedSender<CardEvent>,
}

impl MockCardHandle {
    /// Present a card for the next poll only.
    pub fn tap(&self) {
        self.send(CardEvent::Tap);
    }

    /// Present a card until [`MockCardHandle::remove`] is called.
    pub fn place(&self) {
        self.send(CardEvent::Place);
    }

    /// Take a placed card away.
    pub fn remove(&self) {
        self.send(CardEvent::Remove);
    }

    /// Make the next poll fail with a card read error.
    pub fn fail(&self, message: impl Into<String>) {
        self.send(CardEvent::Fault(message.into()));
    }

    fn send(&self, event: CardEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::debug!("mock card reader dropped, event ignored");
        }
    }
}
