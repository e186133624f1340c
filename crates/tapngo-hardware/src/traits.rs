//! Peripheral trait definitions.
//!
//! These traits are the contract between the kiosk core and its peripherals.
//! Every method is a non-blocking poll or a short write: the tick loop calls
//! them on every cycle and must never wait on a device. Drivers for slow
//! hardware are expected to keep their own background state and answer from
//! it.
//!
//! The traits are object safe, so the manager holds them as
//! `Box<dyn Trait + Send>` and real drivers, mocks and console adapters can be
//! swapped at startup.

use crate::error::Result;
use crate::types::{ButtonState, CameraCommand, DeviceInfo};

/// Contactless card reader.
///
/// # Examples
///
/// ```
/// use tapngo_hardware::traits::CardReader;
/// use tapngo_hardware::mock::MockCardReader;
///
/// let (mut reader, handle) = MockCardReader::new();
/// assert!(!reader.poll().unwrap());
///
/// handle.tap();
/// assert!(reader.poll().unwrap());
/// ```
pub trait CardReader: Send {
    /// Returns `true` if a card answered the request this cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader could not be queried.
    fn poll(&mut self) -> Result<bool>;

    /// Device information for diagnostics.
    fn info(&self) -> DeviceInfo;
}

/// Front panel push buttons.
pub trait ButtonPanel: Send {
    /// Sample the pressed state of every button.
    ///
    /// # Errors
    ///
    /// Returns an error if the panel could not be read.
    fn poll(&mut self) -> Result<ButtonState>;

    /// Device information for diagnostics.
    fn info(&self) -> DeviceInfo;
}

/// Character display (20x4 LCD on the reference kiosk).
pub trait CharacterDisplay: Send {
    /// Replace the whole screen with `lines`.
    ///
    /// Implementations clear stale content before writing, so a shorter frame
    /// never leaves characters of the previous one behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the write failed.
    fn write_lines(&mut self, lines: &[String]) -> Result<()>;

    /// Device information for diagnostics.
    fn info(&self) -> DeviceInfo;
}

/// Remote camera streaming session.
///
/// Both operations are fire-and-forget: implementations return immediately
/// and handle failures on their own.
pub trait CameraTrigger: Send {
    /// Ask the camera to start streaming.
    fn start(&mut self);

    /// Ask the camera to stop streaming.
    fn stop(&mut self);

    /// Dispatch a [`CameraCommand`].
    fn send(&mut self, command: CameraCommand) {
        match command {
            CameraCommand::Start => self.start(),
            CameraCommand::Stop => self.stop(),
        }
    }
}

/// Camera trigger used when no streaming server is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCamera;

impl CameraTrigger for DisabledCamera {
    fn start(&mut self) {
        tracing::debug!("camera disabled, ignoring start");
    }

    fn stop(&mut self) {
        tracing::debug!("camera disabled, ignoring stop");
    }
}
