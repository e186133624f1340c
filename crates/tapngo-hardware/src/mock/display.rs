//! Mock character display.
//!
//! The display publishes its contents through a `watch` channel, so tests and
//! the console simulator can read the current screen or wait for the next
//! frame.

use crate::{
    HardwareError, Result,
    traits::CharacterDisplay,
    types::DeviceInfo,
};
use tokio::sync::{mpsc, watch};

/// Current contents of a [`MockDisplay`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screen {
    /// Lines as last written; padded rows are not stored.
    pub lines: Vec<String>,

    /// Number of successful writes so far.
    pub writes: u64,
}

impl Screen {
    /// Screen contents joined with newlines.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Returns `true` if any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }
}

/// Mock character LCD with fixed geometry.
///
/// Writes with more rows than the display has, or lines wider than a row, are
/// rejected the way a real driver would reject an out-of-range cursor.
///
/// # Examples
///
/// ```
/// use tapngo_hardware::mock::MockDisplay;
/// use tapngo_hardware::traits::CharacterDisplay;
///
/// let (mut display, handle) = MockDisplay::new();
/// display.write_lines(&["TAP N GO".to_string()]).unwrap();
///
/// assert_eq!(handle.screen().lines, vec!["TAP N GO"]);
/// assert!(display.write_lines(&["x".repeat(21)]).is_err());
/// ```
#[derive(Debug)]
pub struct MockDisplay {
    screen_tx: watch::Sender<Screen>,
    fault_rx: mpsc::UnboundedReceiver<String>,
    columns: usize,
    rows: usize,
}

impl MockDisplay {
    /// Create a 20x4 mock display.
    pub fn new() -> (Self, MockDisplayHandle) {
        Self::with_geometry(20, 4)
    }

    /// Create a mock display with custom geometry.
    pub fn with_geometry(columns: usize, rows: usize) -> (Self, MockDisplayHandle) {
        let (screen_tx, screen_rx) = watch::channel(Screen::default());
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();

        let display = Self {
            screen_tx,
            fault_rx,
            columns,
            rows,
        };

        let handle = MockDisplayHandle {
            screen_rx,
            fault_tx,
        };

        (display, handle)
    }
}

impl CharacterDisplay for MockDisplay {
    fn write_lines(&mut self, lines: &[String]) -> Result<()> {
        if let Ok(message) = self.fault_rx.try_recv() {
            return Err(HardwareError::display(message));
        }

        if lines.len() > self.rows {
            return Err(HardwareError::display(format!(
                "{} lines exceed {} rows",
                lines.len(),
                self.rows
            )));
        }

        if let Some(line) = lines.iter().find(|line| line.chars().count() > self.columns) {
            return Err(HardwareError::display(format!(
                "line '{line}' exceeds {} columns",
                self.columns
            )));
        }

        self.screen_tx.send_modify(|screen| {
            screen.lines = lines.to_vec();
            screen.writes += 1;
        });

        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(
            "Mock Display",
            format!("Mock LCD {}x{}", self.columns, self.rows),
        )
    }
}

/// Handle for observing and controlling a [`MockDisplay`].
#[derive(Debug, Clone)]
pub struct MockDisplayHandle {
    screen_rx: watch::Receiver<Screen>,
    fault_tx: mpsc::UnboundedSender<String>,
}

impl MockDisplayHandle {
    /// Snapshot of the current screen.
    pub fn screen(&self) -> Screen {
        self.screen_rx.borrow().clone()
    }

    /// Subscribe to screen updates.
    pub fn subscribe(&self) -> watch::Receiver<Screen> {
        self.screen_rx.clone()
    }

    /// Make the next write fail.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        if self.fault_tx.send(message.into()).is_err() {
            tracing::debug!("mock display dropped, fault ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_write_replaces_previous_frame() {
        let (mut display, handle) = MockDisplay::new();

        display
            .write_lines(&lines(&["ONE", "TWO", "THREE", "FOUR"]))
            .unwrap();
        display.write_lines(&lines(&["ONLY"])).unwrap();

        let screen = handle.screen();
        assert_eq!(screen.lines, vec!["ONLY"]);
        assert_eq!(screen.writes, 2);
        assert!(screen.contains("ONL"));
        assert!(!screen.contains("TWO"));
    }

    #[test]
    fn test_geometry_is_enforced() {
        let (mut display, handle) = MockDisplay::with_geometry(8, 2);

        assert!(display.write_lines(&lines(&["a", "b", "c"])).is_err());
        assert!(display.write_lines(&lines(&["123456789"])).is_err());
        assert!(display.write_lines(&lines(&["12345678", "b"])).is_ok());
        assert_eq!(handle.screen().writes, 1);
    }

    #[test]
    fn test_injected_fault_affects_one_write() {
        let (mut display, handle) = MockDisplay::new();

        handle.fail_next_write("I2C NACK");
        assert!(matches!(
            display.write_lines(&lines(&["A"])),
            Err(HardwareError::DisplayError { .. })
        ));
        assert!(display.write_lines(&lines(&["A"])).is_ok());
        assert_eq!(handle.screen().text(), "A");
    }

    #[tokio::test]
    async fn test_subscribe_sees_updates() {
        let (mut display, handle) = MockDisplay::new();
        let mut rx = handle.subscribe();

        display.write_lines(&lines(&["HELLO"])).unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().lines, vec!["HELLO"]);
    }
}
