//! Error types for the Brewdoro client.
//!
//! This module defines the error types used throughout the client crate,
//! providing structured error handling with clear, human-readable messages.
//! Remote failures live in [`ApiError`], configuration failures in
//! [`ConfigError`]; everything converts into [`ClientError`].

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;

/// Errors that can occur during client operations.
///
/// None of these are fatal: every failure belongs to a single user action and
/// can be recovered by retrying that action.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote API call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The requested action is not valid in the current session state.
    ///
    /// Raised before any network call is made.
    #[error("invalid state: {0}")]
    InvalidState(#[from] StateError),

    /// TUI-related error.
    #[error("TUI error: {0}")]
    Tui(#[from] TuiError),
}

/// Reasons an action was refused by the controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Pause, resume or complete was requested with no current session.
    #[error("no active session")]
    NoActiveSession,

    /// A new session was requested while another one is still running.
    #[error("session {session_id} is still active")]
    SessionActive { session_id: String },

    /// A create or finish call for this task has not answered yet.
    #[error("a session request for task {task_id} is already in flight")]
    RequestInFlight { task_id: String },

    /// The timer is not waiting for a focus finish to be recorded.
    #[error("focus phase has not finished")]
    FocusNotFinished,

    /// Pause was requested while no countdown is running.
    #[error("timer is not running")]
    NotRunning,

    /// Resume was requested while the timer is not paused.
    #[error("timer is not paused")]
    NotPaused,
}

/// Errors that can occur during TUI operation.
#[derive(Error, Debug)]
pub enum TuiError {
    /// Terminal initialization failed.
    #[error("failed to initialize terminal: {0}")]
    TerminalInit(#[source] std::io::Error),

    /// Terminal rendering failed.
    #[error("render error: {0}")]
    Render(#[source] std::io::Error),

    /// Event handling error.
    #[error("event error: {0}")]
    Event(String),
}

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
