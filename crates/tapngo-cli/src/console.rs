//! Console simulator: keyboard commands in, LCD out.
//!
//! Commands are read line by line from stdin on a plain thread and forwarded
//! to the mock peripheral handles. The LCD is printed to stdout every time a
//! frame is written.

use std::fmt::Write as _;
use std::io::BufRead;
use std::str::FromStr;
use std::sync::Arc;

use tapngo_hardware::Button;
use tapngo_hardware::mock::{MockButtonsHandle, MockCardHandle, MockDisplayHandle, Screen};
use tokio::sync::Notify;
use tracing::debug;

pub const HELP: &str = "\
commands:
  ok | confirm   press the green confirm button
  start          press the yellow start button
  cancel         press the red cancel button
  tap            tap a card on the reader
  place | remove hold a card on the reader / take it away
  show           print the LCD again
  help           this text
  quit           stop the kiosk";

/// One console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Press(Button),
    Tap,
    Place,
    Remove,
    Show,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" | "confirm" | "c" => Ok(Self::Press(Button::Confirm)),
            "start" | "s" => Ok(Self::Press(Button::Start)),
            "cancel" | "x" => Ok(Self::Press(Button::Cancel)),
            "tap" | "t" => Ok(Self::Tap),
            "place" => Ok(Self::Place),
            "remove" => Ok(Self::Remove),
            "show" | "lcd" => Ok(Self::Show),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(format!("unknown command '{other}', type 'help'")),
        }
    }
}

/// Control handles driven by the console.
#[derive(Debug, Clone)]
pub struct Console {
    card: MockCardHandle,
    buttons: MockButtonsHandle,
    display: MockDisplayHandle,
    columns: usize,
}

impl Console {
    pub fn new(
        card: MockCardHandle,
        buttons: MockButtonsHandle,
        display: MockDisplayHandle,
        columns: usize,
    ) -> Self {
        Self {
            card,
            buttons,
            display,
            columns,
        }
    }

    /// Apply `command`. Returns `false` once the user asked to quit.
    pub fn apply(&self, command: ConsoleCommand) -> bool {
        match command {
            ConsoleCommand::Press(button) => self.buttons.press(button),
            ConsoleCommand::Tap => self.card.tap(),
            ConsoleCommand::Place => self.card.place(),
            ConsoleCommand::Remove => self.card.remove(),
            ConsoleCommand::Show => {
                println!("{}", render_screen(&self.display.screen(), self.columns));
            }
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => return false,
        }
        true
    }

    /// Read commands from stdin on a dedicated thread.
    ///
    /// `quit` is notified on the `quit` command. End of input only stops
    /// reading.
    pub fn spawn_reader(self, quit: Arc<Notify>) -> std::io::Result<std::thread::JoinHandle<()>> {
        std::thread::Builder::new()
            .name("tapngo-console".to_string())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if line.trim().is_empty() {
                        continue;
                    }

                    match line.parse::<ConsoleCommand>() {
                        Ok(command) => {
                            debug!(?command, "console command");
                            if !self.apply(command) {
                                quit.notify_one();
                                break;
                            }
                        }
                        Err(message) => eprintln!("{message}"),
                    }
                }
            })
    }
}

/// Print every new frame written to the display.
pub fn spawn_screen_printer(
    display: &MockDisplayHandle,
    columns: usize,
) -> tokio::task::JoinHandle<()> {
    let mut screens = display.subscribe();

    tokio::spawn(async move {
        while screens.changed().await.is_ok() {
            let screen = screens.borrow_and_update().clone();
            println!("{}", render_screen(&screen, columns));
        }
    })
}

/// Draw a screen inside a box border.
pub fn render_screen(screen: &Screen, columns: usize) -> String {
    let border = format!("+{}+", "-".repeat(columns));
    let mut out = String::new();

    let _ = writeln!(out, "{border}");
    for line in &screen.lines {
        let _ = writeln!(out, "|{line:<columns$}|");
    }
    out.push_str(&border);
    out
}
