//! Signal bus connecting the session timer to the task/session controller.
//!
//! The timer and the controller never call each other directly. Instead they
//! exchange [`Signal`]s: the controller announces `start`, `start-break`,
//! `pause`, `resume` and `completed`; the timer answers with
//! `focus-finished` and `break-finished`.
//!
//! # Delivery
//!
//! [`SignalBus::emit`] is synchronous and run-to-completion: every listener
//! registered at the time of the call is invoked, in subscription order,
//! before `emit` returns. Listeners receive a shared reference, so a handler
//! cannot change what a later handler observes.
//!
//! # Example
//!
//! ```rust
//! use brewdoro_client::signal::{Signal, SignalBus};
//!
//! let mut bus = SignalBus::new();
//! let (_id, mut rx) = bus.forward();
//!
//! bus.emit(&Signal::StartBreak { minutes: 5 });
//!
//! assert_eq!(rx.try_recv().unwrap(), Signal::StartBreak { minutes: 5 });
//! ```

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::trace;

/// Session and task a signal refers to.
///
/// Either identifier may be missing, e.g. for a purely local timer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionRef {
    pub session_id: Option<String>,
    pub task_id: Option<String>,
}

impl SessionRef {
    /// Creates a reference to a remote session of a task.
    #[must_use]
    pub fn new(session_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            task_id: Some(task_id.into()),
        }
    }
}

/// Signals exchanged over the bus.
///
/// Serializes to JSON with a kebab-case `signal` tag, e.g.
/// `{"signal":"start-break","minutes":5}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "kebab-case")]
pub enum Signal {
    /// Begin a FOCUS phase of `minutes`.
    Start {
        minutes: u32,
        task_title: String,
        #[serde(flatten)]
        target: SessionRef,
    },

    /// Begin a BREAK phase of `minutes`.
    StartBreak { minutes: u32 },

    /// The remote session acknowledged a pause.
    Pause {
        #[serde(flatten)]
        target: SessionRef,
    },

    /// The remote session acknowledged a resume.
    Resume {
        #[serde(flatten)]
        target: SessionRef,
    },

    /// The session was completed early by the user.
    Completed {
        #[serde(flatten)]
        target: SessionRef,
    },

    /// The FOCUS countdown reached zero.
    FocusFinished {
        #[serde(flatten)]
        target: SessionRef,
    },

    /// The BREAK countdown reached zero.
    BreakFinished {
        #[serde(flatten)]
        target: SessionRef,
    },
}

impl Signal {
    /// Returns the wire name of the signal.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::StartBreak { .. } => "start-break",
            Self::Pause { .. } => "pause",
            Self::Resume { .. } => "resume",
            Self::Completed { .. } => "completed",
            Self::FocusFinished { .. } => "focus-finished",
            Self::BreakFinished { .. } => "break-finished",
        }
    }

    /// Returns the session/task the signal refers to, if it carries one.
    #[must_use]
    pub fn target(&self) -> Option<&SessionRef> {
        match self {
            Self::StartBreak { .. } => None,
            Self::Start { target, .. }
            | Self::Pause { target }
            | Self::Resume { target }
            | Self::Completed { target }
            | Self::FocusFinished { target }
            | Self::BreakFinished { target } => Some(target),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&Signal)>;

/// Synchronous publish/subscribe channel for [`Signal`]s.
#[derive(Default)]
pub struct SignalBus {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl SignalBus {
    /// Creates a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener invoked for every subsequent signal.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&Signal) + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        trace!(listener_count = self.listeners.len(), "Signal listener added");
        id
    }

    /// Registers a listener that forwards a clone of every signal into an
    /// unbounded channel, for consumers living in another task.
    ///
    /// The listener stays registered after the receiver is dropped; sends to a
    /// closed channel are discarded.
    pub fn forward(&mut self) -> (ListenerId, UnboundedReceiver<Signal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |signal| {
            let _ = tx.send(signal.clone());
        });
        (id, rx)
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        before != self.listeners.len()
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Delivers `signal` to every listener in subscription order.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&mut self, signal: &Signal) -> usize {
        trace!(signal = signal.name(), listeners = self.listeners.len(), "Emitting signal");
        for (_, listener) in &mut self.listeners {
            listener(signal);
        }
        self.listeners.len()
    }
}

impl fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
