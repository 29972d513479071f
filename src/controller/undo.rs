//! Minimal records that revert an optimistic edit

use crate::error::IndexError;
use crate::index::{Placement, RemovedTask, TaskIndex};
use crate::task::TaskId;

/// How to bring the index back to the state it had before an optimistic edit
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UndoRecord {
    /// The task has been optimistically added: remove it
    RemoveAdded { id: TaskId },
    /// The task has been optimistically removed: put it back where it was
    Reinsert(RemovedTask),
    /// The urgency of the task has been optimistically changed
    RestoreUrgency { id: TaskId, was_urgent: bool },
    /// The task has been optimistically moved away from `to`
    MoveBack { id: TaskId, to: Placement },
}

impl UndoRecord {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::RemoveAdded{ id } => id,
            Self::Reinsert(removed) => removed.task.id(),
            Self::RestoreUrgency{ id, .. } => id,
            Self::MoveBack{ id, .. } => id,
        }
    }

    /// Replay this record over `index`
    pub fn rollback(self, index: &mut TaskIndex) -> Result<(), IndexError> {
        match self {
            Self::RemoveAdded{ id } => index.remove(&id).map(|_| ()),
            Self::Reinsert(removed) => {
                index.insert_at(removed.placement.date, removed.placement.position, removed.task).map(|_| ())
            },
            Self::RestoreUrgency{ id, was_urgent } => index.set_urgent(&id, was_urgent),
            Self::MoveBack{ id, to } => index.move_task(&id, to.date, Some(to.position)).map(|_| ()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{parse_date_key, DateKey, Task};

    fn day(s: &str) -> DateKey {
        parse_date_key(s).unwrap()
    }

    fn populated() -> TaskIndex {
        let mut index = TaskIndex::new();
        for id in ["a", "b", "c"] {
            index.add(day("2024-05-01"), Task::new(TaskId::from(id), id.to_string(), false)).unwrap();
        }
        index.add(day("2024-05-02"), Task::new(TaskId::from("d"), "d".to_string(), true)).unwrap();
        index
    }

    #[test]
    fn every_record_restores_the_previous_state() {
        let original = populated();

        let mut index = original.clone();
        let id = TaskId::from("new");
        index.add(day("2024-05-03"), Task::new(id.clone(), "new".to_string(), false)).unwrap();
        UndoRecord::RemoveAdded{ id }.rollback(&mut index).unwrap();
        assert_eq!(index, original);

        let mut index = original.clone();
        let removed = index.remove(&TaskId::from("b")).unwrap();
        UndoRecord::Reinsert(removed).rollback(&mut index).unwrap();
        assert_eq!(index, original);

        let mut index = original.clone();
        let id = TaskId::from("d");
        index.toggle_urgent(&id).unwrap();
        UndoRecord::RestoreUrgency{ id, was_urgent: true }.rollback(&mut index).unwrap();
        assert_eq!(index, original);

        let mut index = original.clone();
        let id = TaskId::from("b");
        let from = index.move_task(&id, day("2024-05-02"), Some(0)).unwrap().unwrap();
        UndoRecord::MoveBack{ id, to: from }.rollback(&mut index).unwrap();
        assert_eq!(index, original);
    }

    #[test]
    fn move_back_within_the_same_day() {
        let original = populated();
        let mut index = original.clone();
        let id = TaskId::from("a");
        let from = index.move_task(&id, day("2024-05-01"), Some(5)).unwrap().unwrap();
        assert_eq!(from.position, 0);
        UndoRecord::MoveBack{ id, to: from }.rollback(&mut index).unwrap();
        assert_eq!(index, original);
    }
}
