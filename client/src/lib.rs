//! Brewdoro - Pomodoro session client.
//!
//! This crate runs Pomodoro focus/break sessions against a remote task and
//! session API, showing the countdown as a draining and refilling coffee cup.
//!
//! # Overview
//!
//! A session starts for a task, runs a focus countdown, records the finished
//! focus remotely, runs the break the server chose, and then chains the next
//! Pomodoro until the server reports the end of a cycle.
//!
//! ```text
//! Controller --start--> SessionTimer --focus-finished--> Controller
//!     ^                                                       |
//!     |                                               finish_session
//!     +--break-finished-- SessionTimer <--start-break---------+
//! ```
//!
//! The timer and the controller only talk through [`signal::Signal`]s.
//!
//! # Modules
//!
//! - [`types`]: wire types of the task/session API
//! - [`api`]: HTTP client for the API
//! - [`signal`]: signals and the synchronous signal bus
//! - [`timer`]: the focus/break state machine
//! - [`controller`]: session context, user intents and remote results
//! - [`runner`]: single-threaded event loop driving the controller
//! - [`tui`]: terminal front end
//! - [`config`]: configuration from environment variables
//! - [`logging`]: tracing subscriber setup
//! - [`error`]: error types

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod runner;
pub mod signal;
pub mod timer;
pub mod tui;
pub mod types;

pub use api::{ApiClient, ApiError, SessionApi};
pub use config::{Config, ConfigError};
pub use controller::{Controller, Outcome, RemoteCall, Request, Settings, TaskRef, Ticket};
pub use error::{ClientError, Result, StateError, TuiError};
pub use runner::{Command, Frontend, Headless, Runner, View};
pub use signal::{SessionRef, Signal, SignalBus};
pub use timer::{format_clock, Phase, SessionTimer};
pub use types::{CycleInfo, FinishOutcome, NewSession, NewTask, Session, Task, TaskStatus, TaskUpdate};
