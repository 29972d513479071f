//! Error types of this crate

use thiserror::Error;

use crate::controller::pending::OperationKind;
use crate::task::{DateKey, TaskId};

/// Whatever the remote collaborator may fail with (network error, HTTP error status, timeout...)
pub type RemoteError = Box<dyn std::error::Error + Send + Sync>;

/// Invariant violations detected by the [`TaskIndex`](crate::index::TaskIndex).
///
/// The index is left untouched whenever one of these is returned.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("task {0} is already in the index")]
    DuplicateTask(TaskId),
    #[error("task {0} is not in the index")]
    UnknownTask(TaskId),
}

/// The failure half of the outcome of a [`SyncController`](crate::controller::SyncController) operation
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Another gesture on the same task is still waiting for the server. Try again shortly.
    #[error("a {kind} is already in progress for task {id}")]
    OperationInProgress { id: TaskId, kind: OperationKind },

    /// The server refused (or never answered) the request. The local change has been rolled back.
    #[error("remote {kind} of task {id} failed, local change reverted: {source}")]
    RemoteFailure {
        id: TaskId,
        kind: OperationKind,
        #[source]
        source: RemoteError,
    },

    /// The tasks of a day could not be fetched. The local index is unchanged.
    #[error("unable to fetch the tasks of {date}: {source}")]
    RefreshFailure {
        date: DateKey,
        #[source]
        source: RemoteError,
    },

    #[error("task content must not be empty")]
    EmptyContent,

    #[error("no task is selected")]
    NothingSelected,
}

impl SyncError {
    /// Whether the optimistic edit of this operation has been reverted
    pub fn was_rolled_back(&self) -> bool {
        matches!(self, SyncError::RemoteFailure{ .. })
    }
}
