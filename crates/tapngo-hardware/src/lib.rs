//! Peripheral abstraction layer for the Tap N Go kiosk.
//!
//! The kiosk talks to four peripherals: a contactless card reader, three
//! front-panel buttons, a character LCD and a remote camera. This crate
//! defines a small synchronous trait for each of them, the value types the
//! core consumes, a [`PeripheralManager`] that absorbs device errors, and mock
//! implementations for tests and the console simulator.
//!
//! # Design
//!
//! - **Non-blocking**: every trait method is a poll or a short write. The
//!   tick loop calls them on every cycle and never awaits a device.
//! - **Object safe**: peripherals are held as `Box<dyn Trait>` and chosen at
//!   startup.
//! - **Errors stay local**: [`HardwareError`] values are converted into "no
//!   signal" by the manager and never reach the state machine.
//!
//! ```
//! use tapngo_hardware::{CardReader, mock::MockCardReader};
//!
//! let (mut reader, handle) = MockCardReader::new();
//! handle.tap();
//! assert!(reader.poll().unwrap());
//! ```

pub mod error;
pub mod manager;
pub mod mock;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use manager::{DeviceType, PeripheralFault, PeripheralManager, PeripheralStats};
pub use traits::{ButtonPanel, CameraTrigger, CardReader, CharacterDisplay, DisabledCamera};
pub use types::{Button, ButtonState, CameraCommand, DeviceInfo, PeripheralSnapshot};
