//! Screen frames for the kiosk character LCD.
//!
//! Every state has one fixed screen. A [`DisplayFrame`] always holds exactly
//! `rows` lines of exactly `columns` characters, so writing a frame replaces
//! everything on the glass.
//!
//! # Character encoding
//!
//! The LCD controller only knows printable ASCII (0x20-0x7E). Text is
//! sanitized before layout: control characters are removed and anything
//! outside that range becomes `?`.
//!
//! # Examples
//!
//! ```
//! use tapngo_kiosk::StateContext;
//! use tapngo_kiosk::display::ScreenLayout;
//!
//! let layout = ScreenLayout::default();
//! let frame = layout.render(&StateContext::new(tapngo_core::Timestamp::ZERO));
//!
//! assert_eq!(frame.rows(), 4);
//! assert_eq!(frame.line(0).unwrap().trim(), "SELAMAT DATANG DI");
//! assert_eq!(frame.line(1).unwrap().trim(), "TAP N GO");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tapngo_core::constants::{DEFAULT_CURRENCY, DISPLAY_COLUMNS, DISPLAY_ROWS};
use tapngo_core::{Error, Result};

use crate::state_machine::{KioskState, StateContext};

/// Text alignment within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Text starts at column 0.
    Left,
    /// Equal padding on both sides, extra space on the right.
    Center,
}

/// A full screen of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFrame {
    lines: Vec<String>,
}

impl DisplayFrame {
    /// All lines, top to bottom.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// One line by index.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLine` if `index` is past the last row.
    pub fn line(&self, index: usize) -> Result<&str> {
        self.lines
            .get(index)
            .map(String::as_str)
            .ok_or(Error::InvalidLine {
                line: index,
                max: self.lines.len().saturating_sub(1),
            })
    }

    pub fn rows(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` if any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }
}

impl fmt::Display for DisplayFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Display geometry plus the currency prefix used on the confirmation
/// screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenLayout {
    rows: usize,
    columns: usize,
    currency: String,
}

impl Default for ScreenLayout {
    fn default() -> Self {
        Self::new(DISPLAY_ROWS, DISPLAY_COLUMNS, DEFAULT_CURRENCY)
    }
}

impl ScreenLayout {
    /// Create a layout. Zero dimensions are raised to one.
    pub fn new(rows: usize, columns: usize, currency: impl Into<String>) -> Self {
        Self {
            rows: rows.max(1),
            columns: columns.max(1),
            currency: currency.into(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Frame for the state held in `context`.
    pub fn render(&self, context: &StateContext) -> DisplayFrame {
        let content = self.content(context);

        let lines = (0..self.rows)
            .map(|row| match content.get(row) {
                Some((text, alignment)) => {
                    align_text(&sanitize_text(text), self.columns, *alignment)
                }
                None => " ".repeat(self.columns),
            })
            .collect();

        DisplayFrame { lines }
    }

    fn content(&self, context: &StateContext) -> Vec<(String, Alignment)> {
        use Alignment::{Center, Left};

        let centered = |rows: [&str; 4]| {
            rows.into_iter()
                .map(|text| (text.to_string(), Center))
                .collect::<Vec<_>>()
        };

        match context.state() {
            KioskState::Welcome => centered(["SELAMAT DATANG DI", "TAP N GO", "", "Klik OK"]),
            KioskState::AwaitingCard => centered(["", "SILAHKAN TEMPEL", "KARTU ANDA", ""]),
            KioskState::MainMenu => centered([
                "SILAHKAN TARUH",
                "MAKANAN/MINUMAN",
                "ANDA LALU",
                "TEKAN CONFIRM",
            ]),
            KioskState::Processing => centered(["", "SEDANG", "MEMPROSES...", ""]),
            KioskState::PaymentConfirmation => {
                let item = format!("ITEM: {}", context.label().display_name());
                match context.price() {
                    Some(price) => vec![
                        (item, Left),
                        ("QTY: 1x".to_string(), Left),
                        (format!("Harga: {}", price.format_with(&self.currency)), Left),
                        ("[OK]   [Cancel]".to_string(), Center),
                    ],
                    None => vec![
                        (item, Left),
                        ("QTY: 1x".to_string(), Left),
                        ("HARGA TIDAK TERSEDIA".to_string(), Left),
                    ],
                }
            }
            KioskState::PaymentProcessing => {
                centered(["", "TEMPELKAN KARTU", "UNTUK PEMBAYARAN", ""])
            }
            KioskState::PaymentSuccess => centered(["", "PEMBAYARAN", "SUKSES!", "TERIMA KASIH"]),
            KioskState::PaymentCancelled => {
                centered(["", "PEMBELIAN", "DIBATALKAN", "TERIMA KASIH"])
            }
        }
    }
}

/// Truncate text to a maximum number of characters.
///
/// ```
/// use tapngo_kiosk::display::truncate_text;
///
/// assert_eq!(truncate_text("RICE-BOWL", 4), "RICE");
/// assert_eq!(truncate_text("BENTO", 10), "BENTO");
/// ```
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Align text within a fixed width, padding with spaces.
///
/// ```
/// use tapngo_kiosk::display::{align_text, Alignment};
///
/// assert_eq!(align_text("SUKSES!", 11, Alignment::Center), "  SUKSES!  ");
/// assert_eq!(align_text("QTY: 1x", 9, Alignment::Left), "QTY: 1x  ");
/// ```
pub fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let char_count = text.chars().count();

    if char_count >= width {
        return truncate_text(text, width);
    }

    let padding = width - char_count;

    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Center => {
            let left_pad = padding / 2;
            let right_pad = padding - left_pad;
            format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
        }
    }
}

/// Drop control characters, replace non-ASCII with `?`, trim.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control())
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect::<String>()
        .trim()
        .to_string()
}
