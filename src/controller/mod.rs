//! This module applies planner gestures optimistically, and reconciles them with the server
//!
//! Every gesture is first applied to the local [`TaskIndex`], so that it is immediately visible.
//! The matching request is then sent to the remote [`PlannerApi`]. Once it resolves, the local change is either
//! committed (possibly patched with the record the server returned), or rolled back.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::error::{IndexError, RemoteError, SyncError};
use crate::index::{Placement, RemovedTask, TaskIndex};
use crate::task::{DateKey, Task, TaskId};
use crate::traits::PlannerApi;

pub mod feedback;
pub mod pending;
pub mod undo;

use feedback::{FeedbackSender, PlannerEvent};
use pending::{OperationKind, PendingOperations};
use undo::UndoRecord;

/// Success or failure of a planner operation
pub type SyncResult<T> = Result<T, SyncError>;


/// Keeps a local [`TaskIndex`] in sync with a remote [`PlannerApi`].
///
/// Each task may have at most one operation in flight: a gesture on a task that is still waiting for the server
/// is rejected with [`SyncError::OperationInProgress`]. Operations on different tasks run independently.
///
/// The index and the pending operations are guarded by mutexes that are never held across a request to the server,
/// so that readers never observe a half-applied edit.
#[derive(Debug)]
pub struct SyncController<R>
where
    R: PlannerApi,
{
    /// The remote source of truth (usually a server)
    remote: R,
    /// The local copy of task placement
    index: Mutex<TaskIndex>,
    /// Lock order: `pending` is always locked before `index`
    pending: Mutex<PendingOperations>,
    /// The task picked by a "select, then paste" gesture
    selection: Mutex<Option<TaskId>>,

    feedback_channel: Option<FeedbackSender>,
}

impl<R> SyncController<R>
where
    R: PlannerApi,
{
    /// Create a controller with an empty local index
    pub fn new(remote: R) -> Self {
        Self::new_with_index(remote, TaskIndex::new())
    }

    /// Create a controller that starts from an existing index (e.g. read from a [`Cache`](crate::cache::Cache))
    pub fn new_with_index(remote: R, index: TaskIndex) -> Self {
        Self {
            remote,
            index: Mutex::new(index),
            pending: Mutex::new(PendingOperations::new()),
            selection: Mutex::new(None),
            feedback_channel: None,
        }
    }

    /// Same as [`Self::new_with_index`], but every operation is also reported to `feedback_sender`
    pub fn new_with_feedback(remote: R, index: TaskIndex, feedback_sender: FeedbackSender) -> Self {
        let mut controller = Self::new_with_index(remote, index);
        controller.feedback_channel = Some(feedback_sender);
        controller
    }

    /// Returns the data source described as `remote`.
    ///
    /// Apart from tests, there are very few reasons to access `remote` directly.
    pub fn remote(&self) -> &R { &self.remote }

    /// The ordered tasks of a day
    pub fn tasks_on(&self, date: &DateKey) -> Vec<Task> {
        self.index().tasks_on(date).to_vec()
    }

    pub fn has_any(&self, date: &DateKey) -> bool {
        self.index().has_any(date)
    }

    pub fn has_urgent(&self, date: &DateKey) -> bool {
        self.index().has_urgent(date)
    }

    /// The day a task currently belongs to
    pub fn date_of(&self, id: &TaskId) -> Option<DateKey> {
        self.index().date_of(id)
    }

    /// A copy of the current local index, e.g. to store it into a cache
    pub fn index_snapshot(&self) -> TaskIndex {
        self.index().clone()
    }

    /// Whether a task has an operation waiting for the server
    pub fn is_pending(&self, id: &TaskId) -> bool {
        self.pending().contains(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }


    /// Create a task at the end of the bucket of `date`.
    ///
    /// The task is shown at once under a temporary identifier; this identifier is swapped for the server one
    /// when the creation is confirmed. Returns the task as stored by the server.
    pub async fn add_task(&self, date: DateKey, content: &str, is_urgent: bool) -> SyncResult<Task> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SyncError::EmptyContent);
        }

        let local_task = Task::new_local(content.to_string(), is_urgent);
        let temp_id = local_task.id().clone();
        let token = self.begin(&temp_id, OperationKind::Add, |index| {
            index.add(date, local_task)?;
            Ok(UndoRecord::RemoveAdded{ id: temp_id.clone() })
        })?;
        log::debug!("Optimistically added task {} to {}", temp_id, date);

        match self.remote.create_task(date, content, is_urgent).await {
            Err(err) => Err(self.rollback(&temp_id, token, OperationKind::Add, err)),
            Ok(server_task) => {
                self.commit_creation(&temp_id, token, server_task.clone())?;
                self.committed(OperationKind::Add, server_task.id());
                Ok(server_task)
            },
        }
    }

    /// Delete a task. In case the server refuses, the task is put back at its original position.
    pub async fn delete_task(&self, id: &TaskId) -> SyncResult<()> {
        let token = self.begin(id, OperationKind::Delete, |index| {
            Ok(UndoRecord::Reinsert(index.remove(id)?))
        })?;
        log::debug!("Optimistically deleted task {}", id);

        match self.remote.delete_task(id).await {
            Err(err) => Err(self.rollback(id, token, OperationKind::Delete, err)),
            Ok(()) => {
                self.commit(id, token, |_| Ok(()))?;
                self.forget_selection(id);
                self.committed(OperationKind::Delete, id);
                Ok(())
            },
        }
    }

    /// Flip the urgency flag of a task, and return the record the server stored
    pub async fn toggle_urgent(&self, id: &TaskId) -> SyncResult<Task> {
        let token = self.begin(id, OperationKind::ToggleUrgent, |index| {
            let is_urgent = index.toggle_urgent(id)?;
            Ok(UndoRecord::RestoreUrgency{ id: id.clone(), was_urgent: !is_urgent })
        })?;
        log::debug!("Optimistically toggled the urgency of task {}", id);

        match self.remote.toggle_urgent(id).await {
            Err(err) => Err(self.rollback(id, token, OperationKind::ToggleUrgent, err)),
            Ok(server_task) => {
                // The server may have changed more than the flag
                let stored = server_task.clone();
                self.commit(id, token, |index| index.replace(id, stored))?;
                self.committed(OperationKind::ToggleUrgent, id);
                Ok(server_task)
            },
        }
    }

    /// Move a task to the end of the bucket of `target`. Moving a task to its own day does nothing.
    pub async fn move_task(&self, id: &TaskId, target: DateKey) -> SyncResult<()> {
        self.move_task_to(id, target, None).await
    }

    /// Move a task to the bucket of `target`, at `position` if any (see [`TaskIndex::move_task`] for how positions are counted).
    ///
    /// The server only knows which day a task belongs to: a reorder within a day is only applied locally.
    pub async fn move_task_to(&self, id: &TaskId, target: DateKey, position: Option<usize>) -> SyncResult<()> {
        let token = {
            let mut pending = self.pending();
            self.ensure_idle(&pending, id, OperationKind::Move)?;
            let mut index = self.index();

            let source = index.date_of(id).ok_or_else(|| IndexError::UnknownTask(id.clone()))?;
            let previous = index.move_task(id, target, position)?;
            match previous {
                Some(from) if source != target => {
                    pending.begin(OperationKind::Move, UndoRecord::MoveBack{ id: id.clone(), to: from })?
                },
                _ => {
                    log::debug!("Task {} stays on {}, nothing to send", id, source);
                    return Ok(());
                },
            }
        };
        self.feedback(PlannerEvent::Applied{ kind: OperationKind::Move, task: id.clone() });
        log::debug!("Optimistically moved task {} to {}", id, target);

        match self.remote.move_task(id, target).await {
            Err(err) => Err(self.rollback(id, token, OperationKind::Move, err)),
            Ok(()) => {
                self.commit(id, token, |_| Ok(()))?;
                self.committed(OperationKind::Move, id);
                Ok(())
            },
        }
    }

    /// Delete every task of a day, and return how many have been deleted.
    ///
    /// Tasks are deleted one request after the other. Those the server refuses to delete are put back
    /// in their original order, and the first of these failures is returned.
    pub async fn clear_day(&self, date: DateKey) -> SyncResult<usize> {
        let operations = {
            let mut pending = self.pending();
            let mut index = self.index();
            for task in index.tasks_on(&date) {
                self.ensure_idle(&pending, task.id(), OperationKind::Delete)?;
            }

            let removed: Vec<RemovedTask> = index.take_bucket(&date)
                .into_iter()
                .enumerate()
                .map(|(position, task)| RemovedTask { placement: Placement { date, position }, task })
                .collect();

            let mut operations = Vec::with_capacity(removed.len());
            for removed_task in removed {
                let id = removed_task.task.id().clone();
                let token = pending.begin(OperationKind::Delete, UndoRecord::Reinsert(removed_task))?;
                operations.push((id, token));
            }
            operations
        };
        log::debug!("Optimistically cleared {} ({} tasks)", date, operations.len());
        for (id, _) in &operations {
            self.feedback(PlannerEvent::Applied{ kind: OperationKind::Delete, task: id.clone() });
        }

        let mut n_deleted = 0;
        let mut first_failure = None;
        for (id, token) in operations {
            match self.remote.delete_task(&id).await {
                Err(err) => {
                    let failure = self.rollback(&id, token, OperationKind::Delete, err);
                    first_failure.get_or_insert(failure);
                },
                Ok(()) => {
                    self.commit(&id, token, |_| Ok(()))?;
                    self.forget_selection(&id);
                    self.committed(OperationKind::Delete, &id);
                    n_deleted += 1;
                },
            }
        }

        match first_failure {
            None => Ok(n_deleted),
            Some(failure) => Err(failure),
        }
    }

    /// Pick a task for a later [`Self::paste_selected`]
    pub fn select_task(&self, id: &TaskId) -> SyncResult<()> {
        if self.index().contains(id) == false {
            return Err(IndexError::UnknownTask(id.clone()).into());
        }
        *self.selection() = Some(id.clone());
        Ok(())
    }

    pub fn selected_task(&self) -> Option<TaskId> {
        self.selection().clone()
    }

    pub fn clear_selection(&self) {
        *self.selection() = None;
    }

    /// Move the selected task to `target`. The selection is cleared, whatever the outcome.
    pub async fn paste_selected(&self, target: DateKey) -> SyncResult<()> {
        let id = self.selection().take().ok_or(SyncError::NothingSelected)?;
        self.move_task(&id, target).await
    }

    /// Fetch the tasks of a day from the server, and make them the local bucket of that day.
    ///
    /// The listing says nothing reliable about tasks that have an operation in flight, or that have been resolved
    /// while the listing was on its way: these keep their local state and position.
    pub async fn refresh_date(&self, date: DateKey) -> SyncResult<()> {
        let watch = RefreshWatch::new(&self.pending);
        let server_tasks = self.remote.list_tasks(date).await
            .map_err(|source| SyncError::RefreshFailure{ date, source })?;

        let pending = self.pending();
        let mut index = self.index();
        let outdated = |id: &TaskId| pending.has_changed_since(id, watch.start);

        let mut bucket: Vec<Task> = server_tasks.into_iter()
            .filter(|task| outdated(task.id()) == false)
            .collect();
        for (position, local_task) in index.tasks_on(&date).iter().enumerate() {
            if outdated(local_task.id()) {
                bucket.insert(position.min(bucket.len()), local_task.clone());
            }
        }

        log::info!("Refreshed {}: {} tasks", date, bucket.len());
        index.replace_bucket(date, bucket)?;
        Ok(())
    }


    /// Apply an optimistic edit, and register what would undo it, in a single critical section
    fn begin<F>(&self, id: &TaskId, kind: OperationKind, edit: F) -> SyncResult<u64>
    where
        F: FnOnce(&mut TaskIndex) -> Result<UndoRecord, IndexError>,
    {
        let token = {
            let mut pending = self.pending();
            self.ensure_idle(&pending, id, kind)?;
            let mut index = self.index();
            let undo = edit(&mut index)?;
            pending.begin(kind, undo)?
        };
        self.feedback(PlannerEvent::Applied{ kind, task: id.clone() });
        Ok(token)
    }

    fn ensure_idle(&self, pending: &PendingOperations, id: &TaskId, kind: OperationKind) -> SyncResult<()> {
        if let Err(err) = pending.ensure_idle(id) {
            log::info!("Rejecting a {} of task {}: {}", kind, id, err);
            self.feedback(PlannerEvent::Rejected{ kind, task: id.clone() });
            return Err(err);
        }
        Ok(())
    }

    /// The server accepted the operation: drop its undo record, and patch the index with what the server returned
    fn commit<F>(&self, id: &TaskId, token: u64, reconcile: F) -> SyncResult<()>
    where
        F: FnOnce(&mut TaskIndex) -> Result<(), IndexError>,
    {
        let mut pending = self.pending();
        if pending.finish(id, token).is_none() {
            log::error!("Inconsistent state: no pending operation #{} for task {}", token, id);
        }
        let mut index = self.index();
        reconcile(&mut index)?;
        Ok(())
    }

    /// Swap the temporary task for the one the server created
    fn commit_creation(&self, temp_id: &TaskId, token: u64, server_task: Task) -> SyncResult<()> {
        let mut pending = self.pending();
        if pending.finish(temp_id, token).is_none() {
            log::error!("Inconsistent state: no pending operation #{} for task {}", token, temp_id);
        }
        // A refresh in flight may have listed the day before this task existed
        pending.settle(server_task.id());

        let mut index = self.index();
        match index.replace(temp_id, server_task) {
            // A refresh has already brought the server copy in
            Err(IndexError::DuplicateTask(_)) => index.remove(temp_id).map(|_| ())?,
            other => other?,
        }
        Ok(())
    }

    fn committed(&self, kind: OperationKind, id: &TaskId) {
        log::info!("Committed {} of task {}", kind, id);
        self.feedback(PlannerEvent::Committed{ kind, task: id.clone() });
    }

    /// The server refused the operation: replay its undo record
    fn rollback(&self, id: &TaskId, token: u64, kind: OperationKind, err: RemoteError) -> SyncError {
        {
            let mut pending = self.pending();
            match pending.finish(id, token) {
                None => log::error!("Remote {} of task {} failed ({}), but there is no pending operation #{} to revert", kind, id, err, token),
                Some(op) => {
                    let age = Utc::now() - op.started_at;
                    log::warn!("Remote {} of task {} failed after {} ms: {}. Reverting the local change", kind, id, age.num_milliseconds(), err);
                    let mut index = self.index();
                    if let Err(undo_err) = op.undo.rollback(&mut index) {
                        log::error!("Unable to revert the {} of task {}: {}", kind, id, undo_err);
                    }
                },
            }
        }
        self.feedback(PlannerEvent::RolledBack{ kind, task: id.clone(), reason: err.to_string() });
        SyncError::RemoteFailure{ id: id.clone(), kind, source: err }
    }

    fn forget_selection(&self, id: &TaskId) {
        let mut selection = self.selection();
        if selection.as_ref() == Some(id) {
            *selection = None;
        }
    }

    /// Send an event as a feedback to the listener (if any).
    fn feedback(&self, event: PlannerEvent) {
        if let Some(sender) = &self.feedback_channel {
            // Nobody listening is fine
            let _ = sender.send(event);
        }
    }

    fn index(&self) -> MutexGuard<'_, TaskIndex> {
        lock(&self.index)
    }

    fn pending(&self) -> MutexGuard<'_, PendingOperations> {
        lock(&self.pending)
    }

    fn selection(&self) -> MutexGuard<'_, Option<TaskId>> {
        lock(&self.selection)
    }
}


/// Keeps a refresh registered in the pending operations for as long as it lives, even if the refresh is cancelled
struct RefreshWatch<'a> {
    pending: &'a Mutex<PendingOperations>,
    start: u64,
}

impl<'a> RefreshWatch<'a> {
    fn new(pending: &'a Mutex<PendingOperations>) -> Self {
        let start = lock(pending).start_refresh();
        Self { pending, start }
    }
}

impl Drop for RefreshWatch<'_> {
    fn drop(&mut self) {
        lock(self.pending).end_refresh(self.start);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
