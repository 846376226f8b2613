//! Cooperative event loop driving a [`Controller`].
//!
//! [`Runner::run`] multiplexes four sources on the current thread:
//!
//! - a fixed one-second tick advancing the timer
//! - remote calls in flight, collected in a [`FuturesUnordered`] set so the
//!   countdown keeps moving while they are pending
//! - user [`Command`]s from the front end
//! - a shutdown future (Ctrl+C)
//!
//! Each event is handled to completion before the next one is polled, then
//! the [`Frontend`] is redrawn. Failed calls and refused commands become a
//! notice line; they never stop the loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{FutureExt, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::{ApiError, SessionApi};
use crate::controller::{perform, Controller, Outcome, Request, SessionContext, Ticket};
use crate::error::{ClientError, Result};
use crate::signal::Signal;
use crate::timer::{format_clock, Phase, SessionTimer};

/// Interval between timer ticks.
pub const TICK_RATE: Duration = Duration::from_secs(1);

/// Automatic finish retries when no front end can send [`Command::RetryFinish`].
pub const MAX_FINISH_RETRIES: u32 = 3;

/// User intents delivered to the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    Complete,
    /// Record an expired focus phase again after a failed finish call.
    RetryFinish,
    /// Redraw without changing state, e.g. after a terminal resize.
    Redraw,
    Quit,
}

/// Read-only state handed to a [`Frontend`] on every redraw.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    pub timer: &'a SessionTimer,
    pub context: &'a SessionContext,
    pub notice: Option<&'a str>,
    pub pending: usize,
}

/// Something that can display the session.
pub trait Frontend {
    /// Redraws the session state.
    ///
    /// # Errors
    ///
    /// A render failure ends the run.
    fn render(&mut self, view: &View<'_>) -> Result<()>;
}

/// Frontend for `--headless`: logs phase changes and notices.
#[derive(Debug, Default)]
pub struct Headless {
    last_phase: Option<Phase>,
    last_notice: Option<String>,
}

impl Headless {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Frontend for Headless {
    fn render(&mut self, view: &View<'_>) -> Result<()> {
        let phase = view.timer.phase();
        if self.last_phase != Some(phase) {
            info!(
                phase = %phase,
                remaining = %format_clock(view.timer.remaining_seconds()),
                task = view.timer.task_title(),
                "Timer phase changed"
            );
            self.last_phase = Some(phase);
        }

        if view.notice != self.last_notice.as_deref() {
            if let Some(notice) = view.notice {
                info!(notice, "Session notice");
            }
            self.last_notice = view.notice.map(str::to_string);
        }
        Ok(())
    }
}

type PendingCall = LocalBoxFuture<'static, (Ticket, std::result::Result<Outcome, ApiError>)>;

/// Event loop owning a controller, the API client and a front end.
pub struct Runner<A, F> {
    controller: Controller,
    api: Arc<A>,
    frontend: F,
    pending: FuturesUnordered<PendingCall>,
    signals: UnboundedReceiver<Signal>,
    tick_rate: Duration,
    exit_when_idle: bool,
    notice: Option<String>,
    last_error: Option<ClientError>,
    finish_retries: u32,
}

impl<A, F> Runner<A, F>
where
    A: SessionApi + 'static,
    F: Frontend,
{
    /// Creates a runner ticking once per [`TICK_RATE`].
    pub fn new(mut controller: Controller, api: Arc<A>, frontend: F) -> Self {
        let (_, signals) = controller.bus_mut().forward();
        Self {
            controller,
            api,
            frontend,
            pending: FuturesUnordered::new(),
            signals,
            tick_rate: TICK_RATE,
            exit_when_idle: false,
            notice: None,
            last_error: None,
            finish_retries: 0,
        }
    }

    /// Overrides the tick interval.
    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: Duration) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    /// Ends the run once the timer is idle with nothing in flight.
    #[must_use]
    pub fn exit_when_idle(mut self, exit: bool) -> Self {
        self.exit_when_idle = exit;
        self
    }

    /// Queues a remote call issued before the loop started.
    pub fn submit(&mut self, request: Request) {
        let api = Arc::clone(&self.api);
        debug!(call = ?request.call, "Submitting remote call");
        self.pending.push(
            async move {
                let result = perform(api.as_ref(), &request.call).await;
                (request.ticket, result)
            }
            .boxed_local(),
        );
    }

    /// Runs until [`Command::Quit`], `shutdown` resolves, or the session goes
    /// idle when [`Runner::exit_when_idle`] is set.
    ///
    /// Returns the controller so callers can inspect the final state.
    ///
    /// # Errors
    ///
    /// Returns a front end failure, or, when exiting on idle, the last remote
    /// error if no call succeeded after it. Without a command source, a failed
    /// finish is retried [`MAX_FINISH_RETRIES`] times before its error ends
    /// the run.
    pub async fn run<S>(
        mut self,
        mut commands: UnboundedReceiver<Command>,
        shutdown: S,
    ) -> Result<Controller>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.tick_rate);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        let mut commands_open = true;
        self.redraw()?;

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }

                command = commands.recv(), if commands_open => {
                    match command {
                        Some(Command::Quit) => {
                            debug!("Quit requested");
                            break;
                        }
                        Some(command) => self.handle_command(command),
                        None => commands_open = false,
                    }
                }

                Some((ticket, result)) = self.pending.next(), if !self.pending.is_empty() => {
                    self.handle_response(ticket, result);
                }

                _ = ticker.tick() => {
                    if let Some(request) = self.controller.tick() {
                        self.submit(request);
                    } else if self.exit_when_idle && !commands_open {
                        self.retry_finish();
                    }
                }
            }

            self.drain_signals();
            self.redraw()?;

            if self.exit_when_idle
                && !commands_open
                && self.finish_retries >= MAX_FINISH_RETRIES
                && self.finish_stranded()
            {
                if let Some(e) = self.last_error.take() {
                    warn!(
                        attempts = self.finish_retries,
                        error = %e,
                        "Giving up on finishing the focus phase"
                    );
                    return Err(e);
                }
            }

            if self.exit_when_idle && self.is_idle() {
                info!("Session idle, stopping");
                return match self.last_error.take() {
                    Some(e) => Err(e),
                    None => Ok(self.controller),
                };
            }
        }

        Ok(self.controller)
    }

    fn handle_command(&mut self, command: Command) {
        let result = match command {
            Command::Pause => self.controller.pause(),
            Command::Resume => self.controller.resume(),
            Command::Complete => self.controller.complete(),
            Command::RetryFinish => self.controller.finish_focus(),
            Command::Redraw | Command::Quit => Ok(None),
        };

        match result {
            Ok(Some(request)) => self.submit(request),
            Ok(None) => {}
            Err(e) => {
                debug!(?command, error = %e, "Command refused");
                self.notice = Some(e.to_string());
            }
        }
    }

    fn handle_response(&mut self, ticket: Ticket, result: std::result::Result<Outcome, ApiError>) {
        match self.controller.on_response(ticket, result) {
            Ok(follow_up) => {
                self.last_error = None;
                self.finish_retries = 0;
                if let Some(request) = follow_up {
                    self.submit(request);
                }
            }
            Err(e) => {
                let hint = if self.controller.timer().awaiting_break() {
                    " (press f to retry)"
                } else {
                    ""
                };
                warn!(error = %e, "Remote call failed");
                self.notice = Some(format!("{e}{hint}"));
                self.last_error = Some(e);
            }
        }
    }

    /// Resubmits the finish of an expired focus phase whose last attempt failed.
    fn retry_finish(&mut self) {
        if !self.finish_stranded() || self.finish_retries >= MAX_FINISH_RETRIES {
            return;
        }
        self.finish_retries += 1;
        info!(attempt = self.finish_retries, "Retrying focus finish");
        match self.controller.finish_focus() {
            Ok(Some(request)) => self.submit(request),
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Finish retry refused"),
        }
    }

    fn drain_signals(&mut self) {
        while let Ok(signal) = self.signals.try_recv() {
            if let Some(notice) = describe(&signal) {
                self.notice = Some(notice);
            }
        }
    }

    fn redraw(&mut self) -> Result<()> {
        let view = View {
            timer: self.controller.timer(),
            context: self.controller.context(),
            notice: self.notice.as_deref(),
            pending: self.pending.len(),
        };
        self.frontend.render(&view)
    }

    /// An expired focus phase whose finish failed and nothing is retrying it.
    fn finish_stranded(&self) -> bool {
        self.last_error.is_some()
            && self.pending.is_empty()
            && self.controller.in_flight() == 0
            && self.controller.timer().awaiting_break()
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty()
            && self.controller.in_flight() == 0
            && self.controller.timer().phase() == Phase::Idle
            && self.controller.context().session.is_none()
    }
}

/// Notice line text for a signal, if it deserves one.
fn describe(signal: &Signal) -> Option<String> {
    match signal {
        Signal::Start { task_title, .. } if task_title.is_empty() => {
            Some("Focus started".to_string())
        }
        Signal::Start { task_title, .. } => Some(format!("Focusing on {task_title}")),
        Signal::StartBreak { minutes } => Some(format!("Break for {minutes} min")),
        Signal::FocusFinished { .. } => Some("Focus finished".to_string()),
        Signal::BreakFinished { .. } => Some("Break over".to_string()),
        Signal::Completed { .. } => Some("Session completed".to_string()),
        Signal::Pause { .. } | Signal::Resume { .. } => None,
    }
}

/// Creates the command channel a front end feeds.
#[must_use]
pub fn command_channel() -> (UnboundedSender<Command>, UnboundedReceiver<Command>) {
    tokio::sync::mpsc::unbounded_channel()
}
