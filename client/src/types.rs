//! Wire types for the Brewdoro task/session API.
//!
//! This module defines the JSON schema exchanged with the remote API. All
//! types serialize to snake_case JSON. Identifiers are kept as strings; the
//! API is free to send them as JSON numbers or strings.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle status of a remote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    #[serde(alias = "CREATED")]
    Created,
    #[serde(alias = "RUNNING")]
    Running,
    #[serde(alias = "PAUSED")]
    Paused,
    #[serde(alias = "FINISHED")]
    Finished,
    /// Any status this client does not know about.
    #[serde(other)]
    Unknown,
}

/// A backend-tracked focus/break pairing tied to a task and user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,

    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub user_id: Option<String>,

    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub task_id: Option<String>,

    /// Focus length in minutes.
    #[serde(alias = "focus_duration")]
    pub focus_minutes: u32,

    /// Break length in minutes.
    #[serde(alias = "break_duration")]
    pub break_minutes: u32,

    #[serde(default)]
    pub status: SessionStatus,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

/// Body of `POST /sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSession {
    pub user_id: String,
    pub task_id: String,
    pub focus_minutes: u32,
    pub break_minutes: u32,
}

/// Cycle bookkeeping returned when a session finishes.
///
/// A cycle is a run of consecutive Pomodoros (four by default on the server)
/// after which a longer break is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CycleInfo {
    pub total_pomodoros: u32,
    pub index_in_cycle: u32,
    pub cycles_done: u32,
    pub next_break_minutes: u32,
    pub is_cycle_end: bool,
}

/// Response of `PATCH /sessions/{id}/finish`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishOutcome {
    pub session: Session,

    #[serde(flatten)]
    pub cycle: CycleInfo,
}

/// Status of a task.
///
/// Unknown statuses are preserved verbatim so they round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Paused,
    Completed,
    Other(String),
}

impl TaskStatus {
    /// Human readable label used in task listings.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In progress",
            Self::Paused => "Paused",
            Self::Completed => "Completed",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PENDING" | "" => Self::Pending,
            "IN_PROGRESS" => Self::InProgress,
            "PAUSED" => Self::Paused,
            "COMPLETED" => Self::Completed,
            _ => Self::Other(raw),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => "PENDING".to_string(),
            TaskStatus::InProgress => "IN_PROGRESS".to_string(),
            TaskStatus::Paused => "PAUSED".to_string(),
            TaskStatus::Completed => "COMPLETED".to_string(),
            TaskStatus::Other(raw) => raw,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A task owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,

    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub user_id: Option<String>,

    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub project_id: Option<String>,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub pomodoros_completed: u32,

    #[serde(default)]
    pub total_focus_minutes: u32,
}

/// Body of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub user_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Body of `PUT /tasks/{id}`. Only the fields that are set are sent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl TaskUpdate {
    /// Returns true if no field would be sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => text,
            RawId::Number(n) => n.to_string(),
        }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}
