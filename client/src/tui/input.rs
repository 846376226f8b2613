//! Keyboard input for the TUI.
//!
//! [`InputHandler`] polls crossterm on the blocking pool and turns key
//! presses into runner [`Command`]s:
//!
//! | Key | Command |
//! |-----|---------|
//! | `p` | pause |
//! | `r` | resume |
//! | `c` | complete the session |
//! | `f` | retry recording a finished focus |
//! | `q`, `Esc`, `Ctrl+C` | quit |
//!
//! Terminal resizes produce [`Command::Redraw`].

use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

use crate::runner::Command;

/// How long one blocking poll waits for terminal input.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Maps a key press to a command. Other keys are ignored.
#[must_use]
pub fn command_for_key(key: KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return (key.code == KeyCode::Char('c')).then_some(Command::Quit);
    }

    match key.code {
        KeyCode::Char('p' | 'P') => Some(Command::Pause),
        KeyCode::Char('r' | 'R') => Some(Command::Resume),
        KeyCode::Char('c' | 'C') => Some(Command::Complete),
        KeyCode::Char('f' | 'F') => Some(Command::RetryFinish),
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

/// Forwards terminal input to the runner until shut down.
#[derive(Debug)]
pub struct InputHandler {
    commands: UnboundedSender<Command>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl InputHandler {
    #[must_use]
    pub fn new(commands: UnboundedSender<Command>, shutdown_rx: oneshot::Receiver<()>) -> Self {
        Self {
            commands,
            shutdown_rx,
        }
    }

    /// Runs until `shutdown_rx` fires or the runner drops its receiver.
    ///
    /// # Errors
    ///
    /// Returns an error if the blocking poll task panics.
    pub async fn run(mut self) -> std::io::Result<()> {
        loop {
            tokio::select! {
                biased;

                _ = &mut self.shutdown_rx => {
                    debug!("Input handler received shutdown signal");
                    break;
                }

                result = tokio::task::spawn_blocking(|| poll_terminal(POLL_TIMEOUT)) => {
                    match result {
                        Ok(Some(command)) => {
                            if self.commands.send(command).is_err() {
                                debug!("Command receiver dropped, stopping input handler");
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(join_error) => {
                            error!("Terminal polling task panicked: {join_error}");
                            return Err(std::io::Error::other("terminal polling task panicked"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Waits up to `timeout` for one terminal event.
///
/// Poll failures (no terminal, e.g. in CI) count as no event.
fn poll_terminal(timeout: Duration) -> Option<Command> {
    match event::poll(timeout) {
        Ok(true) => match event::read() {
            Ok(CrosstermEvent::Key(key)) => command_for_key(key),
            Ok(CrosstermEvent::Resize(..)) => Some(Command::Redraw),
            Ok(_) => None,
            Err(e) => {
                trace!("Failed to read terminal event: {e}");
                None
            }
        },
        Ok(false) => None,
        Err(e) => {
            trace!("Failed to poll terminal: {e}");
            None
        }
    }
}
