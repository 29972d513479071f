//! Planner tasks

use std::fmt::{Display, Formatter};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The calendar day a bucket of tasks belongs to (`YYYY-MM-DD` once serialized)
pub type DateKey = NaiveDate;

/// Parse a `YYYY-MM-DD` string into a [`DateKey`]
pub fn parse_date_key(s: &str) -> Result<DateKey, chrono::ParseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
}


/// An opaque task identifier.
///
/// Identifiers are assigned by the server, except for tasks that have just been created locally:
/// these carry a temporary identifier until the server confirms the creation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId {
    content: String,
}

impl TaskId {
    /// Generate a random temporary identifier
    pub fn temporary() -> Self {
        let prefix = crate::config::temporary_id_prefix();
        let random = Uuid::new_v4().to_hyphenated().to_string();
        Self { content: format!("{}{}", prefix, random) }
    }

    /// Whether this identifier has been generated locally and is still unknown to the server
    pub fn is_temporary(&self) -> bool {
        self.content.starts_with(&crate::config::temporary_id_prefix())
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }
}

impl From<String> for TaskId {
    fn from(content: String) -> Self {
        Self { content }
    }
}
impl From<&str> for TaskId {
    fn from(content: &str) -> Self {
        Self { content: content.to_string() }
    }
}
impl From<u64> for TaskId {
    fn from(server_id: u64) -> Self {
        Self { content: server_id.to_string() }
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.content)
    }
}


/// A planner task.
///
/// A task does not know its date: the date is given by the [`TaskIndex`](crate::index::TaskIndex) bucket that owns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    content: String,
    #[serde(rename = "isUrgent")]
    is_urgent: bool,
}

impl Task {
    /// Create a task from its parts, e.g. from a server record
    pub fn new(id: TaskId, content: String, is_urgent: bool) -> Self {
        Self { id, content, is_urgent }
    }

    /// Create a brand new task that is not on the server yet.
    /// This will pick a new temporary ID.
    pub fn new_local(content: String, is_urgent: bool) -> Self {
        Self::new(TaskId::temporary(), content, is_urgent)
    }

    pub fn id(&self) -> &TaskId      { &self.id        }
    pub fn content(&self) -> &str    { &self.content   }
    pub fn is_urgent(&self) -> bool  { self.is_urgent  }

    pub fn set_urgent(&mut self, is_urgent: bool) {
        self.is_urgent = is_urgent;
    }

    /// Flip the urgency flag, and return its new value
    pub fn toggle_urgent(&mut self) -> bool {
        self.is_urgent = !self.is_urgent;
        self.is_urgent
    }
}
