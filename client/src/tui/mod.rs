//! Terminal user interface for a running Pomodoro.
//!
//! - [`terminal`]: raw mode setup and teardown with panic handling
//! - [`input`]: key presses to runner commands
//! - [`ui`]: the cup gauge, clock and notice line
//!
//! [`TuiFrontend`] plugs the screen into the [`crate::runner::Runner`].

pub mod input;
pub mod terminal;
pub mod ui;

pub use input::{command_for_key, InputHandler};
pub use terminal::{install_panic_hook, Tui};

use crate::error::{Result, TuiError};
use crate::runner::{Frontend, View};

/// Runner front end drawing to the terminal.
///
/// The terminal is restored when the front end is dropped.
pub struct TuiFrontend {
    tui: Tui,
}

impl TuiFrontend {
    /// Takes over the terminal.
    ///
    /// # Errors
    ///
    /// Returns [`TuiError::TerminalInit`] if the terminal cannot be set up.
    pub fn new() -> Result<Self> {
        let tui = Tui::new().map_err(TuiError::TerminalInit)?;
        Ok(Self { tui })
    }
}

impl Frontend for TuiFrontend {
    fn render(&mut self, view: &View<'_>) -> Result<()> {
        self.tui
            .draw(|frame| ui::render(frame, view))
            .map_err(TuiError::Render)?;
        Ok(())
    }
}
