//! Error types for peripheral operations.
//!
//! Peripheral errors never leave the tick loop: the [`PeripheralManager`]
//! turns them into "no signal" for the current tick and counts them. They
//! still carry enough context to be useful in logs.
//!
//! [`PeripheralManager`]: crate::manager::PeripheralManager

/// Result type alias for peripheral operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while talking to a peripheral.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Bus-level communication failure (SPI, I2C, GPIO).
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Card reader request failed.
    #[error("Card read error: {message}")]
    CardReadError { message: String },

    /// Display rejected a write.
    #[error("Display write error: {message}")]
    DisplayError { message: String },
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new card read error.
    pub fn card_read(message: impl Into<String>) -> Self {
        Self::CardReadError {
            message: message.into(),
        }
    }

    /// Create a new display error.
    pub fn display(message: impl Into<String>) -> Self {
        Self::DisplayError {
            message: message.into(),
        }
    }
}
