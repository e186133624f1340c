//! Mock camera trigger that records every command it receives.

use crate::{traits::CameraTrigger, types::CameraCommand};
use tokio::sync::mpsc;

/// Mock camera trigger.
///
/// # Examples
///
/// ```
/// use tapngo_hardware::mock::MockCamera;
/// use tapngo_hardware::traits::CameraTrigger;
/// use tapngo_hardware::types::CameraCommand;
///
/// let (mut camera, mut handle) = MockCamera::new();
/// camera.start();
/// assert_eq!(handle.drain(), vec![CameraCommand::Start]);
/// assert!(handle.drain().is_empty());
/// ```
#[derive(Debug)]
pub struct MockCamera {
    command_tx: mpsc::UnboundedSender<CameraCommand>,
}

impl MockCamera {
    /// Create a new mock camera and its observation handle.
    pub fn new() -> (Self, MockCameraHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        (Self { command_tx }, MockCameraHandle { command_rx })
    }

    fn record(&self, command: CameraCommand) {
        if self.command_tx.send(command).is_err() {
            tracing::debug!(%command, "mock camera handle dropped");
        }
    }
}

impl CameraTrigger for MockCamera {
    fn start(&mut self) {
        self.record(CameraCommand::Start);
    }

    fn stop(&mut self) {
        self.record(CameraCommand::Stop);
    }
}

/// Handle for inspecting commands sent to a [`MockCamera`].
#[derive(Debug)]
pub struct MockCameraHandle {
    command_rx: mpsc::UnboundedReceiver<CameraCommand>,
}

impl MockCameraHandle {
    /// Take every command recorded since the last call.
    pub fn drain(&mut self) -> Vec<CameraCommand> {
        let mut commands = Vec::new();
        while let Ok(command) = self.command_rx.try_recv() {
            commands.push(command);
        }
        commands
    }
}
