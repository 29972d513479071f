//! Bookkeeping of the operations that wait for the server

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::task::TaskId;
use super::undo::UndoRecord;

/// The kind of gesture a pending operation comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Add,
    Delete,
    ToggleUrgent,
    Move,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "creation"),
            Self::Delete => write!(f, "deletion"),
            Self::ToggleUrgent => write!(f, "urgency toggle"),
            Self::Move => write!(f, "move"),
        }
    }
}


/// An optimistic edit that has been applied locally, and whose remote counterpart is in flight
#[derive(Clone, Debug)]
pub struct PendingOperation {
    pub task_id: TaskId,
    pub kind: OperationKind,
    /// What to replay in case the server refuses the change
    pub undo: UndoRecord,
    /// Identifies this very operation, so that a late completion cannot resolve a newer operation on the same task
    pub token: u64,
    pub started_at: DateTime<Utc>,
}


/// The set of tasks that have an operation in flight. There is at most one such operation per task.
///
/// It also remembers which tasks have been resolved while a refresh is waiting for the server,
/// since the listing such a refresh receives may predate these resolutions.
#[derive(Debug, Default)]
pub struct PendingOperations {
    ops: HashMap<TaskId, PendingOperation>,
    next_token: u64,
    /// Bumped every time an operation is resolved
    generation: u64,
    /// Generation at which each task was last resolved. Only filled while a refresh is in flight
    settled: HashMap<TaskId, u64>,
    /// Generations at which the refreshes in flight have started
    refreshes: Vec<u64>,
}

impl PendingOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with [`SyncError::OperationInProgress`] in case `id` already has a pending operation
    pub fn ensure_idle(&self, id: &TaskId) -> Result<(), SyncError> {
        match self.ops.get(id) {
            None => Ok(()),
            Some(op) => Err(SyncError::OperationInProgress { id: id.clone(), kind: op.kind }),
        }
    }

    /// Register a new pending operation on the task `undo` reverts, and return its correlation token
    pub fn begin(&mut self, kind: OperationKind, undo: UndoRecord) -> Result<u64, SyncError> {
        let task_id = undo.task_id().clone();
        self.ensure_idle(&task_id)?;
        self.next_token += 1;
        let token = self.next_token;
        self.ops.insert(task_id.clone(), PendingOperation {
            task_id, kind, undo, token,
            started_at: Utc::now(),
        });
        Ok(token)
    }

    /// Unregister the operation identified by `token`, and return it.
    ///
    /// Returns `None` in case `id` has no pending operation, or a different one.
    pub fn finish(&mut self, id: &TaskId, token: u64) -> Option<PendingOperation> {
        match self.ops.get(id) {
            Some(op) if op.token == token => {
                self.settle(id);
                self.ops.remove(id)
            },
            _ => None,
        }
    }

    /// Record that the server state of `id` has just changed
    pub fn settle(&mut self, id: &TaskId) {
        self.generation += 1;
        if self.refreshes.is_empty() == false {
            self.settled.insert(id.clone(), self.generation);
        }
    }

    /// Register a refresh that is about to request a listing, and return the generation it starts from
    pub fn start_refresh(&mut self) -> u64 {
        self.refreshes.push(self.generation);
        self.generation
    }

    /// Unregister a refresh started at `start`
    pub fn end_refresh(&mut self, start: u64) {
        if let Some(i) = self.refreshes.iter().position(|s| *s == start) {
            self.refreshes.swap_remove(i);
        }
        match self.refreshes.iter().min() {
            None => self.settled.clear(),
            Some(&oldest) => self.settled.retain(|_, generation| *generation > oldest),
        }
    }

    /// Whether a listing requested at generation `start` may be outdated for `id`,
    /// either because `id` is still waiting for the server or because it has been resolved since then
    pub fn has_changed_since(&self, id: &TaskId, start: u64) -> bool {
        self.contains(id) || self.settled.get(id).map_or(false, |generation| *generation > start)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.ops.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn undo(id: &TaskId) -> UndoRecord {
        UndoRecord::RestoreUrgency { id: id.clone(), was_urgent: false }
    }

    #[test]
    fn one_operation_per_task() {
        let mut pending = PendingOperations::new();
        let t1 = TaskId::from("1");
        let t2 = TaskId::from("2");

        let token = pending.begin(OperationKind::Delete, undo(&t1)).unwrap();
        assert!(pending.begin(OperationKind::Move, undo(&t2)).is_ok());

        match pending.begin(OperationKind::ToggleUrgent, undo(&t1)) {
            Err(SyncError::OperationInProgress{ id, kind }) => {
                assert_eq!(id, t1);
                assert_eq!(kind, OperationKind::Delete);
            },
            other => panic!("Unexpected result {:?}", other),
        }

        let op = pending.finish(&t1, token).unwrap();
        assert_eq!(op.kind, OperationKind::Delete);
        assert!(pending.ensure_idle(&t1).is_ok());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn stale_tokens_do_not_resolve_newer_operations() {
        let mut pending = PendingOperations::new();
        let t1 = TaskId::from("1");

        let old = pending.begin(OperationKind::Move, undo(&t1)).unwrap();
        assert!(pending.finish(&t1, old).is_some());
        let new = pending.begin(OperationKind::Move, undo(&t1)).unwrap();
        assert_ne!(old, new);

        assert!(pending.finish(&t1, old).is_none());
        assert!(pending.contains(&t1));
        assert!(pending.finish(&t1, new).is_some());
        assert!(pending.is_empty());
    }

    #[test]
    fn resolutions_are_tracked_while_a_refresh_is_in_flight() {
        let mut pending = PendingOperations::new();
        let t1 = TaskId::from("1");
        let t2 = TaskId::from("2");

        // Nobody is refreshing: nothing to remember
        let token = pending.begin(OperationKind::Delete, undo(&t1)).unwrap();
        pending.finish(&t1, token).unwrap();
        assert!(pending.settled.is_empty());

        let start = pending.start_refresh();
        assert!(pending.has_changed_since(&t1, start) == false);

        let token = pending.begin(OperationKind::Move, undo(&t2)).unwrap();
        assert!(pending.has_changed_since(&t2, start));
        pending.finish(&t2, token).unwrap();
        assert!(pending.has_changed_since(&t2, start));

        // A later refresh does not care about earlier resolutions
        let later = pending.start_refresh();
        assert!(pending.has_changed_since(&t2, later) == false);

        pending.end_refresh(start);
        assert!(pending.settled.is_empty());
        pending.end_refresh(later);
        assert!(pending.refreshes.is_empty());
    }
}
