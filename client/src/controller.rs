//! Session controller.
//!
//! The [`Controller`] owns the single session context of the client: the
//! [`SessionTimer`], the [`SignalBus`], the current task and remote session,
//! and the set of remote calls that have not answered yet.
//!
//! Remote calls are not performed here. User intents and ticks return a
//! [`Request`] describing the call; the caller performs it (see [`perform`])
//! and hands the result back to [`Controller::on_response`]. This keeps the
//! controller synchronous, lets ticks continue while a call is pending, and
//! lets results arrive in any order:
//!
//! ```text
//! start_task ──► Request(create) ──► perform ──► on_response ──► signal start
//! tick ──► focus-finished ──► Request(finish) ──► on_response ──► signal start-break
//! tick ──► break-finished ──► Request(create)   (auto-chain)
//! ```
//!
//! A failed call leaves the timer untouched, emits no signal and returns the
//! error. A result for a timer phase that has since been replaced is ignored.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::api::{ApiError, SessionApi};
use crate::config::Config;
use crate::error::{Result, StateError};
use crate::signal::{SessionRef, Signal, SignalBus};
use crate::timer::{Phase, SessionTimer};
use crate::types::{CycleInfo, FinishOutcome, NewSession, Session, Task};

/// Per-user session defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub user_id: String,
    pub focus_minutes: u32,
    pub break_minutes: u32,
    /// Start the next Pomodoro when a break ends, unless the cycle ended.
    pub auto_chain: bool,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            user_id: config.user_id.clone(),
            focus_minutes: config.focus_minutes,
            break_minutes: config.break_minutes,
            auto_chain: config.auto_chain,
        }
    }
}

/// The task a session is run for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef {
    pub id: String,
    pub title: String,
}

impl TaskRef {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

impl From<&Task> for TaskRef {
    fn from(task: &Task) -> Self {
        Self::new(task.id.clone(), task.title.clone())
    }
}

/// Current task, remote session and cycle bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub task: Option<TaskRef>,
    pub session: Option<Session>,
    /// The remote session has been finished; only its break is left.
    pub session_finished: bool,
    pub last_cycle: Option<CycleInfo>,
}

impl SessionContext {
    /// Identifier of a session that has not been finished remotely.
    #[must_use]
    pub fn open_session_id(&self) -> Option<&str> {
        if self.session_finished {
            return None;
        }
        self.session.as_ref().map(|s| s.id.as_str())
    }

    /// Session/task pair carried by signals.
    #[must_use]
    pub fn target(&self) -> SessionRef {
        SessionRef {
            session_id: self.session.as_ref().map(|s| s.id.clone()),
            task_id: self.task.as_ref().map(|t| t.id.clone()),
        }
    }

    fn clear_session(&mut self) {
        self.session = None;
        self.session_finished = false;
    }
}

/// Correlates a [`Request`] with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// A remote call the controller needs performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    CreateSession(NewSession),
    PauseSession { session_id: String },
    ResumeSession { session_id: String },
    FinishSession { session_id: String },
    CompleteTask { task_id: String },
}

/// A remote call plus the ticket its result must be delivered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub ticket: Ticket,
    pub call: RemoteCall,
}

/// Successful result of a [`RemoteCall`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Session(Session),
    Finished(FinishOutcome),
    Task(Task),
}

/// Performs a remote call against `api`.
///
/// # Errors
///
/// Returns the [`ApiError`] of the underlying call.
pub async fn perform<A>(api: &A, call: &RemoteCall) -> std::result::Result<Outcome, ApiError>
where
    A: SessionApi + ?Sized,
{
    match call {
        RemoteCall::CreateSession(body) => api.create_session(body).await.map(Outcome::Session),
        RemoteCall::PauseSession { session_id } => {
            api.pause_session(session_id).await.map(Outcome::Session)
        }
        RemoteCall::ResumeSession { session_id } => {
            api.resume_session(session_id).await.map(Outcome::Session)
        }
        RemoteCall::FinishSession { session_id } => {
            api.finish_session(session_id).await.map(Outcome::Finished)
        }
        RemoteCall::CompleteTask { task_id } => api.complete_task(task_id).await.map(Outcome::Task),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    Start,
    Pause,
    Resume,
    FinishFocus,
    FinishEarly,
    CompleteTask,
}

#[derive(Debug, Clone)]
struct InFlight {
    purpose: Purpose,
    task: Option<TaskRef>,
    /// Timer generation the call was issued in.
    generation: u64,
}

/// Owner of the session context.
#[derive(Debug)]
pub struct Controller {
    settings: Settings,
    timer: SessionTimer,
    bus: SignalBus,
    context: SessionContext,
    in_flight: HashMap<Ticket, InFlight>,
    next_ticket: u64,
    /// Bumped whenever the timer starts a phase or completes.
    generation: u64,
}

impl Controller {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            timer: SessionTimer::new(),
            bus: SignalBus::new(),
            context: SessionContext::default(),
            in_flight: HashMap::new(),
            next_ticket: 0,
            generation: 0,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Bus carrying every signal the controller applies.
    pub fn bus_mut(&mut self) -> &mut SignalBus {
        &mut self.bus
    }

    /// Number of remote calls that have not answered yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Requests a new remote session for `task`.
    ///
    /// # Errors
    ///
    /// [`StateError::RequestInFlight`] while a session is being created, or a
    /// finish for the same task has not answered; [`StateError::SessionActive`]
    /// while the timer or a session is still active.
    pub fn start_task(&mut self, task: TaskRef) -> Result<Request> {
        if let Some(pending) = self.in_flight.values().find(|f| {
            f.purpose == Purpose::Start
                || (matches!(f.purpose, Purpose::FinishFocus | Purpose::FinishEarly)
                    && f.task.as_ref().is_some_and(|t| t.id == task.id))
        }) {
            let task_id = pending
                .task
                .as_ref()
                .map_or_else(|| task.id.clone(), |t| t.id.clone());
            debug!(task_id = %task_id, "Ignoring start while a session request is in flight");
            return Err(StateError::RequestInFlight { task_id }.into());
        }
        if let Some(session) = &self.context.session {
            return Err(StateError::SessionActive {
                session_id: session.id.clone(),
            }
            .into());
        }
        if self.timer.phase() != Phase::Idle {
            return Err(StateError::SessionActive {
                session_id: "local".to_string(),
            }
            .into());
        }

        Ok(self.create_session_request(task))
    }

    /// Starts a local focus phase with no remote session.
    ///
    /// # Errors
    ///
    /// [`StateError::SessionActive`] unless the timer is idle.
    pub fn start_local(&mut self, title: &str) -> Result<()> {
        if self.timer.phase() != Phase::Idle || self.context.session.is_some() {
            return Err(StateError::SessionActive {
                session_id: self
                    .context
                    .session
                    .as_ref()
                    .map_or_else(|| "local".to_string(), |s| s.id.clone()),
            }
            .into());
        }

        self.context.task = None;
        self.dispatch(Signal::Start {
            minutes: self.settings.focus_minutes,
            task_title: title.to_string(),
            target: SessionRef::default(),
        });
        Ok(())
    }

    /// Pauses the running countdown.
    ///
    /// A focus phase backed by an open remote session is paused remotely
    /// first; anything else pauses locally at once and returns `None`.
    ///
    /// # Errors
    ///
    /// [`StateError::NoActiveSession`] when idle, [`StateError::NotRunning`]
    /// when the countdown is already stopped.
    pub fn pause(&mut self) -> Result<Option<Request>> {
        if self.timer.phase() == Phase::Idle {
            return Err(StateError::NoActiveSession.into());
        }
        if !self.timer.is_running() {
            return Err(StateError::NotRunning.into());
        }

        if self.timer.phase() == Phase::Focus {
            if let Some(session_id) = self.context.open_session_id() {
                let call = RemoteCall::PauseSession {
                    session_id: session_id.to_string(),
                };
                return Ok(Some(self.issue(Purpose::Pause, call)));
            }
        }

        self.dispatch(Signal::Pause {
            target: self.context.target(),
        });
        Ok(None)
    }

    /// Resumes a paused countdown, remotely for an open focus session.
    ///
    /// # Errors
    ///
    /// [`StateError::NoActiveSession`] when idle, [`StateError::NotPaused`]
    /// when the timer is not paused.
    pub fn resume(&mut self) -> Result<Option<Request>> {
        if self.timer.phase() == Phase::Idle {
            return Err(StateError::NoActiveSession.into());
        }
        if self.timer.phase() != Phase::Paused {
            return Err(StateError::NotPaused.into());
        }

        if self.timer.resumes_into() == Some(Phase::Focus) {
            if let Some(session_id) = self.context.open_session_id() {
                let call = RemoteCall::ResumeSession {
                    session_id: session_id.to_string(),
                };
                return Ok(Some(self.issue(Purpose::Resume, call)));
            }
        }

        self.dispatch(Signal::Resume {
            target: self.context.target(),
        });
        Ok(None)
    }

    /// Ends the current session early.
    ///
    /// An open remote session is finished remotely and the timer completes
    /// when that call succeeds. Otherwise the timer completes at once.
    ///
    /// # Errors
    ///
    /// [`StateError::NoActiveSession`] with nothing to complete,
    /// [`StateError::RequestInFlight`] while a finish is pending.
    pub fn complete(&mut self) -> Result<Option<Request>> {
        if self.timer.phase() == Phase::Idle && self.context.session.is_none() {
            return Err(StateError::NoActiveSession.into());
        }

        if let Some(session_id) = self.context.open_session_id() {
            if self.finish_in_flight() {
                return Err(StateError::RequestInFlight {
                    task_id: self.current_task_id(),
                }
                .into());
            }
            let call = RemoteCall::FinishSession {
                session_id: session_id.to_string(),
            };
            return Ok(Some(self.issue(Purpose::FinishEarly, call)));
        }

        let target = self.context.target();
        self.dispatch(Signal::Completed { target });
        self.context.clear_session();
        Ok(None)
    }

    /// Records the end of an expired focus phase again after a failed finish.
    ///
    /// # Errors
    ///
    /// [`StateError::FocusNotFinished`] unless the focus countdown expired and
    /// no break has started; [`StateError::RequestInFlight`] while a finish is
    /// pending.
    pub fn finish_focus(&mut self) -> Result<Option<Request>> {
        if !self.timer.awaiting_break() {
            return Err(StateError::FocusNotFinished.into());
        }
        if self.finish_in_flight() {
            return Err(StateError::RequestInFlight {
                task_id: self.current_task_id(),
            }
            .into());
        }
        Ok(self.after_focus())
    }

    /// Requests that a task be marked completed.
    pub fn complete_task(&mut self, task_id: &str) -> Request {
        self.issue(
            Purpose::CompleteTask,
            RemoteCall::CompleteTask {
                task_id: task_id.to_string(),
            },
        )
    }

    /// Advances the timer by one second.
    ///
    /// Returns the remote call a finished phase requires, if any.
    pub fn tick(&mut self) -> Option<Request> {
        let signal = self.timer.tick()?;
        info!(
            signal = signal.name(),
            session_id = ?self.context.open_session_id(),
            "Phase finished"
        );
        self.bus.emit(&signal);

        match signal {
            Signal::FocusFinished { .. } => {
                if self.finish_in_flight() {
                    None
                } else {
                    self.after_focus()
                }
            }
            Signal::BreakFinished { .. } => self.after_break(),
            _ => None,
        }
    }

    /// Applies the result of a request issued by this controller.
    ///
    /// Returns the follow-up call, if the result requires one.
    ///
    /// # Errors
    ///
    /// Returns the remote error for a failed call that is still current. The
    /// timer and session context are left unchanged and no signal is emitted.
    pub fn on_response(
        &mut self,
        ticket: Ticket,
        result: std::result::Result<Outcome, ApiError>,
    ) -> Result<Option<Request>> {
        let Some(flight) = self.in_flight.remove(&ticket) else {
            warn!(ticket = ticket.0, "Response for unknown request ignored");
            return Ok(None);
        };

        if flight.purpose != Purpose::CompleteTask && flight.generation != self.generation {
            debug!(
                purpose = ?flight.purpose,
                ok = result.is_ok(),
                "Ignoring response for a superseded phase"
            );
            return Ok(None);
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(purpose = ?flight.purpose, error = %e, "Remote call failed");
                return Err(e.into());
            }
        };

        match (flight.purpose, outcome) {
            (Purpose::Start, Outcome::Session(session)) => {
                let task = flight
                    .task
                    .unwrap_or_else(|| TaskRef::new(session.task_id.clone().unwrap_or_default(), ""));
                info!(session_id = %session.id, task_id = %task.id, "Session started");
                let minutes = session.focus_minutes;
                let title = task.title.clone();
                self.context.task = Some(task);
                self.context.session = Some(session);
                self.context.session_finished = false;
                self.dispatch(Signal::Start {
                    minutes,
                    task_title: title,
                    target: self.context.target(),
                });
            }
            (Purpose::Pause, Outcome::Session(session)) => {
                if !(self.timer.phase() == Phase::Focus && self.timer.is_running()) {
                    debug!(
                        session_id = %session.id,
                        phase = %self.timer.phase(),
                        "Ignoring pause reply, focus no longer running"
                    );
                    return Ok(None);
                }
                self.context.session = Some(session);
                self.dispatch(Signal::Pause {
                    target: self.context.target(),
                });
            }
            (Purpose::Resume, Outcome::Session(session)) => {
                if !(self.timer.phase() == Phase::Paused
                    && self.timer.resumes_into() == Some(Phase::Focus))
                {
                    debug!(
                        session_id = %session.id,
                        phase = %self.timer.phase(),
                        "Ignoring resume reply, focus no longer paused"
                    );
                    return Ok(None);
                }
                self.context.session = Some(session);
                self.dispatch(Signal::Resume {
                    target: self.context.target(),
                });
            }
            (Purpose::FinishFocus, Outcome::Finished(outcome)) => {
                let minutes = if outcome.cycle.next_break_minutes == 0 {
                    self.settings.break_minutes
                } else {
                    outcome.cycle.next_break_minutes
                };
                info!(
                    session_id = %outcome.session.id,
                    total_pomodoros = outcome.cycle.total_pomodoros,
                    index_in_cycle = outcome.cycle.index_in_cycle,
                    is_cycle_end = outcome.cycle.is_cycle_end,
                    "Session finished"
                );
                self.context.session = Some(outcome.session);
                self.context.session_finished = true;
                self.context.last_cycle = Some(outcome.cycle);
                self.dispatch(Signal::StartBreak { minutes });
            }
            (Purpose::FinishEarly, Outcome::Finished(outcome)) => {
                info!(session_id = %outcome.session.id, "Session completed early");
                self.context.last_cycle = Some(outcome.cycle);
                let target = self.context.target();
                self.dispatch(Signal::Completed { target });
                self.context.clear_session();
            }
            (Purpose::CompleteTask, Outcome::Task(task)) => {
                info!(task_id = %task.id, status = %task.status, "Task completed");
            }
            (purpose, outcome) => {
                warn!(?purpose, ?outcome, "Unexpected outcome for request");
            }
        }
        Ok(None)
    }

    /// Performs `request` and every follow-up call it leads to, in order.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by [`Controller::on_response`].
    pub async fn drive<A>(&mut self, api: &A, request: Request) -> Result<()>
    where
        A: SessionApi + ?Sized,
    {
        let mut next = Some(request);
        while let Some(request) = next {
            let result = perform(api, &request.call).await;
            next = self.on_response(request.ticket, result)?;
        }
        Ok(())
    }

    /// Applies a signal to the timer, then delivers it to bus listeners.
    fn dispatch(&mut self, signal: Signal) {
        if matches!(
            signal,
            Signal::Start { .. } | Signal::StartBreak { .. } | Signal::Completed { .. }
        ) {
            self.generation += 1;
        }
        let changed = self.timer.apply(&signal);
        let payload = serde_json::to_string(&signal).unwrap_or_default();
        debug!(signal = %payload, changed, phase = %self.timer.phase(), "Signal applied");
        self.bus.emit(&signal);
    }

    fn issue(&mut self, purpose: Purpose, call: RemoteCall) -> Request {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.in_flight.insert(
            ticket,
            InFlight {
                purpose,
                task: self.context.task.clone(),
                generation: self.generation,
            },
        );
        debug!(ticket = ticket.0, ?purpose, "Remote call issued");
        Request { ticket, call }
    }

    fn create_session_request(&mut self, task: TaskRef) -> Request {
        let call = RemoteCall::CreateSession(NewSession {
            user_id: self.settings.user_id.clone(),
            task_id: task.id.clone(),
            focus_minutes: self.settings.focus_minutes,
            break_minutes: self.settings.break_minutes,
        });
        let request = self.issue(Purpose::Start, call);
        if let Some(flight) = self.in_flight.get_mut(&request.ticket) {
            flight.task = Some(task);
        }
        request
    }

    /// Next step once a focus phase has expired.
    fn after_focus(&mut self) -> Option<Request> {
        match self.context.open_session_id() {
            Some(session_id) => {
                let call = RemoteCall::FinishSession {
                    session_id: session_id.to_string(),
                };
                Some(self.issue(Purpose::FinishFocus, call))
            }
            None => {
                self.dispatch(Signal::StartBreak {
                    minutes: self.settings.break_minutes,
                });
                None
            }
        }
    }

    /// Next step once a break has expired.
    fn after_break(&mut self) -> Option<Request> {
        let cycle_ended = self.context.last_cycle.is_some_and(|c| c.is_cycle_end);
        let chain = self.settings.auto_chain && !cycle_ended;
        let was_remote = self.context.session.is_some();
        self.context.clear_session();

        if !chain {
            info!(cycle_ended, "Pomodoro chain stopped");
            self.context = SessionContext::default();
            return None;
        }

        match (was_remote, self.context.task.clone()) {
            (true, Some(task)) => {
                info!(task_id = %task.id, "Chaining next Pomodoro");
                let task_id = task.id.clone();
                match self.start_task(task) {
                    Ok(request) => Some(request),
                    Err(e) => {
                        warn!(task_id = %task_id, error = %e, "Chained start refused");
                        None
                    }
                }
            }
            _ => {
                let title = self.timer.task_title().to_string();
                self.dispatch(Signal::Start {
                    minutes: self.settings.focus_minutes,
                    task_title: title,
                    target: SessionRef::default(),
                });
                None
            }
        }
    }

    fn finish_in_flight(&self) -> bool {
        self.in_flight
            .values()
            .any(|f| matches!(f.purpose, Purpose::FinishFocus | Purpose::FinishEarly))
    }

    fn current_task_id(&self) -> String {
        self.context
            .task
            .as_ref()
            .map(|t| t.id.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::types::{SessionStatus, TaskStatus};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn settings() -> Settings {
        Settings {
            user_id: "123".to_string(),
            focus_minutes: 1,
            break_minutes: 1,
            auto_chain: true,
        }
    }

    fn session(id: &str, task_id: &str, status: SessionStatus) -> Session {
        Session {
            id: id.to_string(),
            user_id: Some("123".to_string()),
            task_id: Some(task_id.to_string()),
            focus_minutes: 1,
            break_minutes: 1,
            status,
            started_at: None,
            ended_at: None,
        }
    }

    fn finished(id: &str, next_break_minutes: u32, is_cycle_end: bool) -> Outcome {
        Outcome::Finished(FinishOutcome {
            session: session(id, "t1", SessionStatus::Finished),
            cycle: CycleInfo {
                total_pomodoros: 1,
                index_in_cycle: 1,
                cycles_done: 0,
                next_break_minutes,
                is_cycle_end,
            },
        })
    }

    fn recorded(controller: &mut Controller) -> Rc<RefCell<Vec<&'static str>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        controller
            .bus_mut()
            .subscribe(move |signal| sink.borrow_mut().push(signal.name()));
        log
    }

    fn tick_until_request(controller: &mut Controller, max: u32) -> Option<Request> {
        (0..max).find_map(|_| controller.tick())
    }

    /// Controller with a confirmed remote session for task t1.
    fn started() -> Controller {
        let mut controller = Controller::new(settings());
        let request = controller.start_task(TaskRef::new("t1", "Write docs")).unwrap();
        controller
            .on_response(
                request.ticket,
                Ok(Outcome::Session(session("s1", "t1", SessionStatus::Running))),
            )
            .unwrap();
        controller
    }

    fn http_error(status: u16) -> ApiError {
        ApiError::Http {
            status,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn start_task_issues_create_with_settings() {
        let mut controller = Controller::new(settings());
        let request = controller.start_task(TaskRef::new("t1", "Write docs")).unwrap();

        assert_eq!(
            request.call,
            RemoteCall::CreateSession(NewSession {
                user_id: "123".to_string(),
                task_id: "t1".to_string(),
                focus_minutes: 1,
                break_minutes: 1,
            })
        );
        assert_eq!(controller.timer().phase(), Phase::Idle);
        assert_eq!(controller.in_flight(), 1);
    }

    #[test]
    fn session_created_starts_focus_with_server_minutes() {
        let mut controller = Controller::new(settings());
        let log = recorded(&mut controller);
        let request = controller.start_task(TaskRef::new("t1", "Write docs")).unwrap();

        let mut created = session("s1", "t1", SessionStatus::Running);
        created.focus_minutes = 25;
        controller
            .on_response(request.ticket, Ok(Outcome::Session(created)))
            .unwrap();

        assert_eq!(controller.timer().phase(), Phase::Focus);
        assert_eq!(controller.timer().total_seconds(), 1500);
        assert_eq!(controller.timer().task_title(), "Write docs");
        assert_eq!(
            controller.timer().target(),
            &SessionRef::new("s1", "t1")
        );
        assert_eq!(*log.borrow(), vec!["start"]);
        assert_eq!(controller.in_flight(), 0);
    }

    #[test]
    fn second_start_is_rejected_while_create_in_flight() {
        let mut controller = Controller::new(settings());
        controller.start_task(TaskRef::new("t1", "A")).unwrap();

        let err = controller.start_task(TaskRef::new("t1", "A")).unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidState(StateError::RequestInFlight { .. })
        ));
        assert_eq!(controller.in_flight(), 1);
    }

    #[test]
    fn start_is_rejected_while_session_active() {
        let mut controller = started();
        let err = controller.start_task(TaskRef::new("t2", "B")).unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidState(StateError::SessionActive { ref session_id }) if session_id == "s1"
        ));
    }

    #[test]
    fn failed_create_leaves_timer_idle() {
        let mut controller = Controller::new(settings());
        let log = recorded(&mut controller);
        let request = controller.start_task(TaskRef::new("t1", "A")).unwrap();

        let err = controller
            .on_response(request.ticket, Err(http_error(500)))
            .unwrap_err();

        assert!(matches!(err, ClientError::Api(ApiError::Http { status: 500, .. })));
        assert_eq!(controller.timer().phase(), Phase::Idle);
        assert!(log.borrow().is_empty());
        assert!(controller.start_task(TaskRef::new("t1", "A")).is_ok());
    }

    #[test]
    fn pause_and_resume_wait_for_the_server() {
        let mut controller = started();

        let pause = controller.pause().unwrap().unwrap();
        assert_eq!(
            pause.call,
            RemoteCall::PauseSession {
                session_id: "s1".to_string()
            }
        );
        assert_eq!(controller.timer().phase(), Phase::Focus);

        controller
            .on_response(
                pause.ticket,
                Ok(Outcome::Session(session("s1", "t1", SessionStatus::Paused))),
            )
            .unwrap();
        assert_eq!(controller.timer().phase(), Phase::Paused);

        let resume = controller.resume().unwrap().unwrap();
        controller
            .on_response(
                resume.ticket,
                Ok(Outcome::Session(session("s1", "t1", SessionStatus::Running))),
            )
            .unwrap();
        assert_eq!(controller.timer().phase(), Phase::Focus);
        assert!(controller.timer().is_running());
    }

    #[test]
    fn failed_pause_keeps_countdown_running() {
        let mut controller = started();
        let pause = controller.pause().unwrap().unwrap();

        assert!(controller.on_response(pause.ticket, Err(http_error(409))).is_err());
        assert_eq!(controller.timer().phase(), Phase::Focus);
        assert!(controller.timer().is_running());
    }

    #[test]
    fn pause_and_resume_refused_in_wrong_state() {
        let mut controller = Controller::new(settings());
        assert!(matches!(
            controller.pause().unwrap_err(),
            ClientError::InvalidState(StateError::NoActiveSession)
        ));

        let mut controller = started();
        assert!(matches!(
            controller.resume().unwrap_err(),
            ClientError::InvalidState(StateError::NotPaused)
        ));
    }

    #[test]
    fn pause_reply_after_focus_expiry_is_dropped() {
        let mut controller = started();
        let log = recorded(&mut controller);
        let pause = controller.pause().unwrap().unwrap();

        // The countdown runs out before the server answers the pause.
        let finish = tick_until_request(&mut controller, 60).unwrap();
        assert!(matches!(finish.call, RemoteCall::FinishSession { .. }));

        let follow_up = controller
            .on_response(
                pause.ticket,
                Ok(Outcome::Session(session("s1", "t1", SessionStatus::Paused))),
            )
            .unwrap();

        assert!(follow_up.is_none());
        assert_eq!(*log.borrow(), vec!["focus-finished"]);
        assert!(controller.timer().awaiting_break());
        assert_eq!(
            controller.context().session.as_ref().map(|s| s.status),
            Some(SessionStatus::Running)
        );
    }

    #[test]
    fn resume_reply_after_local_complete_is_dropped() {
        let mut controller = started();
        let pause = controller.pause().unwrap().unwrap();
        controller
            .on_response(
                pause.ticket,
                Ok(Outcome::Session(session("s1", "t1", SessionStatus::Paused))),
            )
            .unwrap();
        let resume = controller.resume().unwrap().unwrap();

        // Local completion while the resume is pending leaves the timer idle.
        controller.timer.complete();
        let log = recorded(&mut controller);

        assert!(controller
            .on_response(
                resume.ticket,
                Ok(Outcome::Session(session("s1", "t1", SessionStatus::Running))),
            )
            .unwrap()
            .is_none());
        assert!(log.borrow().is_empty());
        assert_eq!(controller.timer().phase(), Phase::Idle);
    }

    #[test]
    fn focus_expiry_requests_finish_then_starts_break() {
        let mut controller = started();
        let log = recorded(&mut controller);

        let finish = tick_until_request(&mut controller, 60).unwrap();
        assert_eq!(
            finish.call,
            RemoteCall::FinishSession {
                session_id: "s1".to_string()
            }
        );
        assert!(controller.timer().awaiting_break());

        controller
            .on_response(finish.ticket, Ok(finished("s1", 15, false)))
            .unwrap();

        assert_eq!(controller.timer().phase(), Phase::Break);
        assert_eq!(controller.timer().total_seconds(), 900);
        assert!(controller.context().session_finished);
        assert_eq!(*log.borrow(), vec!["focus-finished", "start-break"]);
    }

    #[test]
    fn failed_finish_leaves_timer_expired_without_break() {
        let mut controller = started();
        let log = recorded(&mut controller);

        let finish = tick_until_request(&mut controller, 60).unwrap();
        let before = controller.timer().clone();

        let err = controller
            .on_response(finish.ticket, Err(http_error(500)))
            .unwrap_err();

        assert!(matches!(err, ClientError::Api(_)));
        assert_eq!(controller.timer(), &before);
        assert!(controller.timer().awaiting_break());
        assert_eq!(*log.borrow(), vec!["focus-finished"]);

        let retry = controller.finish_focus().unwrap().unwrap();
        controller
            .on_response(retry.ticket, Ok(finished("s1", 5, false)))
            .unwrap();
        assert_eq!(controller.timer().phase(), Phase::Break);
    }

    #[test]
    fn finish_retry_refused_while_pending_or_not_expired() {
        let mut controller = started();
        assert!(matches!(
            controller.finish_focus().unwrap_err(),
            ClientError::InvalidState(StateError::FocusNotFinished)
        ));

        tick_until_request(&mut controller, 60).unwrap();
        assert!(matches!(
            controller.finish_focus().unwrap_err(),
            ClientError::InvalidState(StateError::RequestInFlight { .. })
        ));
    }

    #[test]
    fn zero_next_break_falls_back_to_settings() {
        let mut controller = started();
        let finish = tick_until_request(&mut controller, 60).unwrap();
        controller
            .on_response(finish.ticket, Ok(finished("s1", 0, false)))
            .unwrap();
        assert_eq!(controller.timer().total_seconds(), 60);
    }

    #[test]
    fn break_end_chains_next_session_for_same_task() {
        let mut controller = started();
        let finish = tick_until_request(&mut controller, 60).unwrap();
        controller
            .on_response(finish.ticket, Ok(finished("s1", 1, false)))
            .unwrap();

        let next = tick_until_request(&mut controller, 60).unwrap();
        assert!(matches!(
            next.call,
            RemoteCall::CreateSession(NewSession { ref task_id, .. }) if task_id == "t1"
        ));
        assert_eq!(controller.timer().phase(), Phase::Idle);
        assert!(controller.context().session.is_none());
    }

    #[test]
    fn chained_start_refused_while_create_pending() {
        let mut controller = started();
        let finish = tick_until_request(&mut controller, 60).unwrap();
        controller
            .on_response(finish.ticket, Ok(finished("s1", 1, false)))
            .unwrap();

        let pending = controller.create_session_request(TaskRef::new("t2", "Other"));
        assert!(tick_until_request(&mut controller, 60).is_none());

        assert_eq!(controller.timer().phase(), Phase::Idle);
        assert_eq!(controller.in_flight(), 1);
        assert!(controller.in_flight.contains_key(&pending.ticket));
    }

    #[test]
    fn break_end_stops_at_cycle_end() {
        let mut controller = started();
        let finish = tick_until_request(&mut controller, 60).unwrap();
        controller
            .on_response(finish.ticket, Ok(finished("s1", 1, true)))
            .unwrap();

        assert!(tick_until_request(&mut controller, 120).is_none());
        assert_eq!(controller.timer().phase(), Phase::Idle);
        assert!(controller.context().task.is_none());
    }

    #[test]
    fn complete_finishes_open_session_remotely() {
        let mut controller = started();
        let log = recorded(&mut controller);

        let request = controller.complete().unwrap().unwrap();
        assert_eq!(controller.timer().phase(), Phase::Focus);

        controller
            .on_response(request.ticket, Ok(finished("s1", 5, false)))
            .unwrap();
        assert_eq!(controller.timer().phase(), Phase::Idle);
        assert!(controller.context().session.is_none());
        assert_eq!(*log.borrow(), vec!["completed"]);
    }

    #[test]
    fn complete_during_break_is_local() {
        let mut controller = started();
        let finish = tick_until_request(&mut controller, 60).unwrap();
        controller
            .on_response(finish.ticket, Ok(finished("s1", 5, false)))
            .unwrap();

        assert!(controller.complete().unwrap().is_none());
        assert_eq!(controller.timer().phase(), Phase::Idle);
        assert!(controller.start_task(TaskRef::new("t1", "A")).is_ok());
    }

    #[test]
    fn stale_result_is_ignored_after_complete() {
        let mut controller = started();
        let finish = tick_until_request(&mut controller, 60).unwrap();

        // The user gives up on the pending finish and starts over locally.
        controller.context.clear_session();
        controller.dispatch(Signal::Completed {
            target: SessionRef::default(),
        });

        assert!(controller
            .on_response(finish.ticket, Err(http_error(500)))
            .unwrap()
            .is_none());
        assert_eq!(controller.timer().phase(), Phase::Idle);
    }

    #[test]
    fn unknown_ticket_is_ignored() {
        let mut controller = Controller::new(settings());
        let result = controller.on_response(Ticket(99), Ok(finished("s1", 5, false)));
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn local_focus_runs_break_without_remote_calls() {
        let mut controller = Controller::new(settings());
        controller.start_local("Offline").unwrap();

        assert!(tick_until_request(&mut controller, 60).is_none());
        assert_eq!(controller.timer().phase(), Phase::Break);

        assert!(tick_until_request(&mut controller, 60).is_none());
        assert_eq!(controller.timer().phase(), Phase::Focus);
        assert_eq!(controller.timer().task_title(), "Offline");

        assert!(controller.pause().unwrap().is_none());
        assert_eq!(controller.timer().phase(), Phase::Paused);
        assert!(controller.resume().unwrap().is_none());
        assert!(controller.complete().unwrap().is_none());
        assert_eq!(controller.timer().phase(), Phase::Idle);
    }

    #[test]
    fn complete_task_result_is_not_stale_checked() {
        let mut controller = started();
        let request = controller.complete_task("t1");
        controller.dispatch(Signal::Completed {
            target: SessionRef::default(),
        });

        let task = Task {
            id: "t1".to_string(),
            user_id: None,
            project_id: None,
            title: "A".to_string(),
            description: None,
            status: TaskStatus::Completed,
            pomodoros_completed: 1,
            total_focus_minutes: 25,
        };
        assert!(controller
            .on_response(request.ticket, Err(http_error(404)))
            .is_err());

        let request = controller.complete_task("t1");
        assert!(controller
            .on_response(request.ticket, Ok(Outcome::Task(task)))
            .is_ok());
    }
}
