//! Tap N Go kiosk controller.
//!
//! - [`KioskMachine`]: the purchase flow, one deterministic tick at a time
//! - [`display`]: the fixed LCD screen for each state
//! - [`KioskDriver`]: the fixed-cadence loop tying peripherals, the
//!   classification channel and the machine together

pub mod display;
pub mod driver;
pub mod state_machine;

pub use display::{Alignment, DisplayFrame, ScreenLayout};
pub use driver::{DriverStats, KioskDriver};
pub use state_machine::{
    KioskFault, KioskMachine, KioskMachineBuilder, KioskState, KioskTimings, SideEffects,
    StateContext, StateTransition, Trigger,
};
