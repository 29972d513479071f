//! Feedback sent to the presentation layer while operations are applied and resolved

use std::fmt::{Display, Error, Formatter};

use super::pending::OperationKind;
use crate::task::TaskId;

/// Something that happened to an operation
#[derive(Clone, Debug, PartialEq)]
pub enum PlannerEvent {
    /// Nothing happened yet
    Idle,
    /// The change is visible locally, the server has not answered yet
    Applied { kind: OperationKind, task: TaskId },
    /// The server accepted the change
    Committed { kind: OperationKind, task: TaskId },
    /// The server refused the change, it has been reverted locally
    RolledBack { kind: OperationKind, task: TaskId, reason: String },
    /// The gesture has not been applied at all, because the task is busy
    Rejected { kind: OperationKind, task: TaskId },
}

impl Display for PlannerEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            PlannerEvent::Idle => write!(f, "Idle"),
            PlannerEvent::Applied{kind, task} => write!(f, "Saving {} of task {}...", kind, task),
            PlannerEvent::Committed{kind, task} => write!(f, "Saved {} of task {}", kind, task),
            PlannerEvent::RolledBack{kind, task, reason} => write!(f, "Unable to save {} of task {} ({}), it has been undone", kind, task, reason),
            PlannerEvent::Rejected{kind, task} => write!(f, "Task {} is busy, {} not applied. Try again shortly", task, kind),
        }
    }
}

impl Default for PlannerEvent {
    fn default() -> Self {
        Self::Idle
    }
}


/// See [`feedback_channel`]
pub type FeedbackSender = tokio::sync::watch::Sender<PlannerEvent>;
/// See [`feedback_channel`]
pub type FeedbackReceiver = tokio::sync::watch::Receiver<PlannerEvent>;

/// Create a feedback channel, that can be used to follow the latest operation of a [`SyncController`](super::SyncController)
pub fn feedback_channel() -> (FeedbackSender, FeedbackReceiver) {
    tokio::sync::watch::channel(PlannerEvent::default())
}
