//! Mock peripherals for testing and the console simulator.
//!
//! Every mock is created together with a handle. Handles are synchronous and
//! `Clone` where it makes sense, so they can be driven from tests, other
//! tasks, or a stdin thread.

pub mod buttons;
pub mod camera;
pub mod card;
pub mod display;

pub use buttons::{MockButtons, MockButtonsHandle};
pub use camera::{MockCamera, MockCameraHandle};
pub use card::{MockCardHandle, MockCardReader};
pub use display::{MockDisplay, MockDisplayHandle, Screen};
