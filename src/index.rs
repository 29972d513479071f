//! The in-memory, date-bucketed store of tasks
//!
//! Every task lives in exactly one bucket (the ordered list of tasks of a given day).
//! Empty buckets are never kept, so that "does this day have tasks" is answered by key presence.

use std::collections::{BTreeMap, HashSet};

use crate::error::IndexError;
use crate::task::{DateKey, Task, TaskId};


/// Where a task currently sits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub date: DateKey,
    pub position: usize,
}

/// A task that has been taken out of the index, along with where it used to be
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovedTask {
    pub placement: Placement,
    pub task: Task,
}


/// A mapping from calendar days to the ordered list of tasks of that day.
///
/// All operations are synchronous and total: they either succeed, or return an [`IndexError`] and leave the index unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskIndex {
    buckets: BTreeMap<DateKey, Vec<Task>>,
}

impl TaskIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from existing buckets (e.g. read from a cache).
    ///
    /// Empty buckets are dropped. Fails in case a task identifier appears more than once.
    pub fn from_buckets(buckets: BTreeMap<DateKey, Vec<Task>>) -> Result<Self, IndexError> {
        let mut seen = HashSet::new();
        for task in buckets.values().flatten() {
            if seen.insert(task.id().clone()) == false {
                return Err(IndexError::DuplicateTask(task.id().clone()));
            }
        }

        Ok(Self {
            buckets: buckets.into_iter()
                .filter(|(_, tasks)| tasks.is_empty() == false)
                .collect(),
        })
    }

    /// The non-empty buckets, ordered by date
    pub fn buckets(&self) -> &BTreeMap<DateKey, Vec<Task>> {
        &self.buckets
    }

    /// Append a task at the end of the bucket of `date`
    pub fn add(&mut self, date: DateKey, task: Task) -> Result<(), IndexError> {
        if self.contains(task.id()) {
            return Err(IndexError::DuplicateTask(task.id().clone()));
        }
        log::trace!("Adding task {} to {}", task.id(), date);
        self.buckets.entry(date).or_default().push(task);
        Ok(())
    }

    /// Insert a task in the bucket of `date`, at `position` (clamped to the bucket length).
    ///
    /// Returns the position the task has actually been inserted at.
    pub fn insert_at(&mut self, date: DateKey, position: usize, task: Task) -> Result<usize, IndexError> {
        if self.contains(task.id()) {
            return Err(IndexError::DuplicateTask(task.id().clone()));
        }
        let bucket = self.buckets.entry(date).or_default();
        let position = position.min(bucket.len());
        bucket.insert(position, task);
        Ok(position)
    }

    /// Remove a task from wherever it is. Its bucket is pruned in case it is now empty.
    pub fn remove(&mut self, id: &TaskId) -> Result<RemovedTask, IndexError> {
        let placement = self.locate(id).ok_or_else(|| IndexError::UnknownTask(id.clone()))?;
        let task = self.take_at(placement).ok_or_else(|| IndexError::UnknownTask(id.clone()))?;
        log::trace!("Removed task {} from {} (position {})", id, placement.date, placement.position);
        Ok(RemovedTask { placement, task })
    }

    /// Flip the urgency flag of a task in place, and return its new value
    pub fn toggle_urgent(&mut self, id: &TaskId) -> Result<bool, IndexError> {
        match self.task_mut(id) {
            None => Err(IndexError::UnknownTask(id.clone())),
            Some(task) => Ok(task.toggle_urgent()),
        }
    }

    pub fn set_urgent(&mut self, id: &TaskId, is_urgent: bool) -> Result<(), IndexError> {
        match self.task_mut(id) {
            None => Err(IndexError::UnknownTask(id.clone())),
            Some(task) => {
                task.set_urgent(is_urgent);
                Ok(())
            },
        }
    }

    /// Overwrite the task `id` with `task`, keeping its bucket and position.
    ///
    /// `task` may carry a different identifier (e.g. when a temporary identifier is swapped for the server one),
    /// as long as this new identifier is not used elsewhere in the index.
    pub fn replace(&mut self, id: &TaskId, task: Task) -> Result<(), IndexError> {
        if task.id() != id && self.contains(task.id()) {
            return Err(IndexError::DuplicateTask(task.id().clone()));
        }
        match self.task_mut(id) {
            None => Err(IndexError::UnknownTask(id.clone())),
            Some(slot) => {
                *slot = task;
                Ok(())
            },
        }
    }

    /// Move a task to the bucket of `target`.
    ///
    /// Without a `position`, the task is appended to the target bucket, and moving a task to the day it already belongs to does nothing.
    ///
    /// With a `position`, the position refers to the target bucket *after* the task has been taken out of its source bucket
    /// (this only makes a difference when source and target are the same day). It is clamped to the bucket length,
    /// so that the task ends up at `min(position, len)`.
    ///
    /// Returns where the task was before the move, or `None` if it has not moved at all.
    pub fn move_task(&mut self, id: &TaskId, target: DateKey, position: Option<usize>) -> Result<Option<Placement>, IndexError> {
        let from = self.locate(id).ok_or_else(|| IndexError::UnknownTask(id.clone()))?;
        if from.date == target && position.is_none() {
            return Ok(None);
        }

        let task = self.take_at(from).ok_or_else(|| IndexError::UnknownTask(id.clone()))?;
        let bucket = self.buckets.entry(target).or_default();
        let to = position.map_or(bucket.len(), |p| p.min(bucket.len()));
        bucket.insert(to, task);
        log::trace!("Moved task {} from {} ({}) to {} ({})", id, from.date, from.position, target, to);

        if from.date == target && from.position == to {
            return Ok(None);
        }
        Ok(Some(from))
    }

    /// Remove and return the whole bucket of `date`
    pub fn take_bucket(&mut self, date: &DateKey) -> Vec<Task> {
        self.buckets.remove(date).unwrap_or_default()
    }

    /// Make `tasks` the bucket of `date`.
    ///
    /// Tasks of this list that were in other buckets are removed from them, so that each task still has a single owner.
    pub fn replace_bucket(&mut self, date: DateKey, tasks: Vec<Task>) -> Result<(), IndexError> {
        let mut incoming = HashSet::new();
        for task in &tasks {
            if incoming.insert(task.id().clone()) == false {
                return Err(IndexError::DuplicateTask(task.id().clone()));
            }
        }

        for bucket in self.buckets.values_mut() {
            bucket.retain(|task| incoming.contains(task.id()) == false);
        }
        self.buckets.retain(|_, bucket| bucket.is_empty() == false);

        if tasks.is_empty() {
            self.buckets.remove(&date);
        } else {
            self.buckets.insert(date, tasks);
        }
        Ok(())
    }

    /// Find the bucket and position of a task.
    ///
    /// This scans every bucket, which is fine for a single user planner.
    pub fn locate(&self, id: &TaskId) -> Option<Placement> {
        self.buckets.iter()
            .find_map(|(date, tasks)| {
                tasks.iter()
                    .position(|task| task.id() == id)
                    .map(|position| Placement { date: *date, position })
            })
    }

    /// The day a task currently belongs to
    pub fn date_of(&self, id: &TaskId) -> Option<DateKey> {
        self.locate(id).map(|placement| placement.date)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.buckets.values().flatten().find(|task| task.id() == id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.get(id).is_some()
    }

    /// The ordered tasks of a day (an empty slice if there are none)
    pub fn tasks_on(&self, date: &DateKey) -> &[Task] {
        self.buckets.get(date).map(|tasks| tasks.as_slice()).unwrap_or(&[])
    }

    pub fn has_any(&self, date: &DateKey) -> bool {
        self.buckets.contains_key(date)
    }

    pub fn has_urgent(&self, date: &DateKey) -> bool {
        self.tasks_on(date).iter().any(|task| task.is_urgent())
    }

    /// The days that have at least one task
    pub fn dates(&self) -> impl Iterator<Item = &DateKey> {
        self.buckets.keys()
    }

    /// Total count of tasks
    pub fn len(&self) -> usize {
        self.buckets.values().map(|tasks| tasks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.buckets.values_mut().flatten().find(|task| task.id() == id)
    }

    fn take_at(&mut self, placement: Placement) -> Option<Task> {
        let bucket = self.buckets.get_mut(&placement.date)?;
        if placement.position >= bucket.len() {
            return None;
        }
        let task = bucket.remove(placement.position);
        if bucket.is_empty() {
            self.buckets.remove(&placement.date);
        }
        Some(task)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::parse_date_key;

    fn day(s: &str) -> DateKey {
        parse_date_key(s).unwrap()
    }

    fn task(id: &str) -> Task {
        Task::new(TaskId::from(id), format!("Task {}", id), false)
    }

    fn ids(index: &TaskIndex, date: &str) -> Vec<String> {
        index.tasks_on(&day(date)).iter().map(|t| t.id().to_string()).collect()
    }

    /// Three tasks on May 1st, two on May 2nd
    fn populated() -> TaskIndex {
        let mut index = TaskIndex::new();
        for id in ["a", "b", "c"] {
            index.add(day("2024-05-01"), task(id)).unwrap();
        }
        for id in ["d", "e"] {
            index.add(day("2024-05-02"), task(id)).unwrap();
        }
        index
    }

    #[test]
    fn add_appends_and_creates_buckets() {
        let index = populated();
        assert_eq!(ids(&index, "2024-05-01"), vec!["a", "b", "c"]);
        assert_eq!(ids(&index, "2024-05-02"), vec!["d", "e"]);
        assert_eq!(index.len(), 5);
        assert_eq!(index.date_of(&TaskId::from("e")), Some(day("2024-05-02")));
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut index = populated();
        let before = index.clone();
        assert_eq!(index.add(day("2024-06-01"), task("b")), Err(IndexError::DuplicateTask(TaskId::from("b"))));
        assert_eq!(index.insert_at(day("2024-05-02"), 0, task("a")), Err(IndexError::DuplicateTask(TaskId::from("a"))));
        assert_eq!(index, before);
    }

    #[test]
    fn unknown_tasks_leave_the_index_untouched() {
        let mut index = populated();
        let before = index.clone();
        let unknown = TaskId::from("nope");
        assert_eq!(index.remove(&unknown), Err(IndexError::UnknownTask(unknown.clone())));
        assert_eq!(index.toggle_urgent(&unknown), Err(IndexError::UnknownTask(unknown.clone())));
        assert_eq!(index.move_task(&unknown, day("2024-05-01"), None), Err(IndexError::UnknownTask(unknown.clone())));
        assert_eq!(index.replace(&unknown, task("z")), Err(IndexError::UnknownTask(unknown.clone())));
        assert_eq!(index, before);
    }

    #[test]
    fn removing_the_last_task_prunes_the_bucket() {
        let mut index = TaskIndex::new();
        index.add(day("2024-05-01"), task("a")).unwrap();
        let removed = index.remove(&TaskId::from("a")).unwrap();
        assert_eq!(removed.placement, Placement { date: day("2024-05-01"), position: 0 });
        assert!(index.has_any(&day("2024-05-01")) == false);
        assert!(index.is_empty());
        assert_eq!(index.dates().count(), 0);
    }

    #[test]
    fn remove_reports_the_original_position() {
        let mut index = populated();
        let removed = index.remove(&TaskId::from("b")).unwrap();
        assert_eq!(removed.placement.position, 1);
        assert_eq!(ids(&index, "2024-05-01"), vec!["a", "c"]);

        index.insert_at(removed.placement.date, removed.placement.position, removed.task).unwrap();
        assert_eq!(index, populated());
    }

    #[test]
    fn toggle_keeps_order_and_bucket() {
        let mut index = populated();
        assert_eq!(index.toggle_urgent(&TaskId::from("b")), Ok(true));
        assert_eq!(ids(&index, "2024-05-01"), vec!["a", "b", "c"]);
        assert!(index.has_urgent(&day("2024-05-01")));
        assert!(index.has_urgent(&day("2024-05-02")) == false);
        assert_eq!(index.toggle_urgent(&TaskId::from("b")), Ok(false));
        assert!(index.has_urgent(&day("2024-05-01")) == false);
    }

    #[test]
    fn move_to_another_day_at_a_position() {
        let mut index = TaskIndex::new();
        index.add(day("2024-05-01"), task("t1")).unwrap();
        index.add(day("2024-05-01"), task("t2")).unwrap();

        let from = index.move_task(&TaskId::from("t1"), day("2024-05-02"), Some(0)).unwrap();
        assert_eq!(from, Some(Placement { date: day("2024-05-01"), position: 0 }));
        assert_eq!(ids(&index, "2024-05-01"), vec!["t2"]);
        assert_eq!(ids(&index, "2024-05-02"), vec!["t1"]);
    }

    #[test]
    fn move_position_is_clamped() {
        let mut index = populated();
        index.move_task(&TaskId::from("a"), day("2024-05-02"), Some(99)).unwrap();
        assert_eq!(ids(&index, "2024-05-02"), vec!["d", "e", "a"]);
        index.move_task(&TaskId::from("b"), day("2024-05-02"), None).unwrap();
        assert_eq!(ids(&index, "2024-05-02"), vec!["d", "e", "a", "b"]);
        assert_eq!(ids(&index, "2024-05-01"), vec!["c"]);
    }

    #[test]
    fn moving_the_last_task_away_prunes_the_source() {
        let mut index = populated();
        index.move_task(&TaskId::from("d"), day("2024-05-01"), None).unwrap();
        index.move_task(&TaskId::from("e"), day("2024-05-01"), None).unwrap();
        assert!(index.has_any(&day("2024-05-02")) == false);
        assert_eq!(ids(&index, "2024-05-01"), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn same_day_drop_without_position_is_a_noop() {
        let mut index = populated();
        assert_eq!(index.move_task(&TaskId::from("a"), day("2024-05-01"), None), Ok(None));
        assert_eq!(index, populated());
    }

    #[test]
    fn same_day_positions_are_counted_after_removal() {
        // Front of the bucket
        let mut index = populated();
        let from = index.move_task(&TaskId::from("c"), day("2024-05-01"), Some(0)).unwrap();
        assert_eq!(from, Some(Placement { date: day("2024-05-01"), position: 2 }));
        assert_eq!(ids(&index, "2024-05-01"), vec!["c", "a", "b"]);

        // End of the bucket: once "a" is removed, the list is [b, c], so position 2 is the end
        let mut index = populated();
        index.move_task(&TaskId::from("a"), day("2024-05-01"), Some(2)).unwrap();
        assert_eq!(ids(&index, "2024-05-01"), vec!["b", "c", "a"]);

        // Same place
        let mut index = populated();
        assert_eq!(index.move_task(&TaskId::from("b"), day("2024-05-01"), Some(1)), Ok(None));
        assert_eq!(index, populated());
    }

    #[test]
    fn replace_swaps_identifiers_in_place() {
        let mut index = populated();
        let server_task = Task::new(TaskId::from("42"), "Task b".to_string(), true);
        index.replace(&TaskId::from("b"), server_task.clone()).unwrap();
        assert_eq!(ids(&index, "2024-05-01"), vec!["a", "42", "c"]);
        assert_eq!(index.get(&TaskId::from("42")), Some(&server_task));
        assert!(index.contains(&TaskId::from("b")) == false);

        assert_eq!(index.replace(&TaskId::from("a"), task("d")), Err(IndexError::DuplicateTask(TaskId::from("d"))));
    }

    #[test]
    fn tasks_on_an_empty_day_does_not_create_a_bucket() {
        let index = populated();
        assert!(index.tasks_on(&day("2030-01-01")).is_empty());
        assert!(index.has_any(&day("2030-01-01")) == false);
        assert_eq!(index.dates().count(), 2);
    }

    #[test]
    fn replace_bucket_keeps_a_single_owner() {
        let mut index = populated();
        index.replace_bucket(day("2024-05-02"), vec![task("a"), task("x")]).unwrap();
        assert_eq!(ids(&index, "2024-05-01"), vec!["b", "c"]);
        assert_eq!(ids(&index, "2024-05-02"), vec!["a", "x"]);

        index.replace_bucket(day("2024-05-02"), Vec::new()).unwrap();
        assert!(index.has_any(&day("2024-05-02")) == false);

        let before = index.clone();
        assert!(index.replace_bucket(day("2024-05-03"), vec![task("q"), task("q")]).is_err());
        assert_eq!(index, before);
    }

    #[test]
    fn from_buckets_validates() {
        let mut buckets = BTreeMap::new();
        buckets.insert(day("2024-05-01"), vec![task("a")]);
        buckets.insert(day("2024-05-02"), Vec::new());
        let index = TaskIndex::from_buckets(buckets.clone()).unwrap();
        assert_eq!(index.dates().count(), 1);

        buckets.insert(day("2024-05-03"), vec![task("a")]);
        assert_eq!(TaskIndex::from_buckets(buckets), Err(IndexError::DuplicateTask(TaskId::from("a"))));
    }
}
