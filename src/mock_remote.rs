//! An in-memory planner server, to be used in tests
#![cfg(any(test, feature = "mock_remote"))]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::RemoteError;
use crate::index::TaskIndex;
use crate::mock_behaviour::MockBehaviour;
use crate::task::{DateKey, Task, TaskId};
use crate::traits::PlannerApi;


#[derive(Debug, Default)]
struct ServerState {
    tasks: TaskIndex,
    next_id: u64,
    behaviour: MockBehaviour,
    n_requests: usize,
}

/// A [`PlannerApi`] that stores its tasks in memory.
///
/// Its failures can be scripted with a [`MockBehaviour`], and its answers can be held back
/// (see [`MockPlanner::hold`] and [`MockPlanner::hold_listings`]) so that tests can act while requests are in flight.
#[derive(Debug, Default)]
pub struct MockPlanner {
    state: Mutex<ServerState>,
    /// Held back before changing anything
    latch: Mutex<Option<Arc<Semaphore>>>,
    /// Held back after the listing has been computed
    list_latch: Mutex<Option<Arc<Semaphore>>>,
    waiting: AtomicUsize,
}

impl MockPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behaviour(behaviour: MockBehaviour) -> Self {
        let planner = Self::new();
        planner.set_behaviour(behaviour);
        planner
    }

    pub fn set_behaviour(&self, behaviour: MockBehaviour) {
        self.state().behaviour = behaviour;
    }

    /// Store a task on the server, without going through the counters of the mock behaviour
    pub fn seed(&self, date: DateKey, content: &str, is_urgent: bool) -> Task {
        let mut state = self.state();
        state.next_id += 1;
        let task = Task::new(TaskId::from(state.next_id), content.to_string(), is_urgent);
        // Ids are fresh, this cannot be a duplicate
        let _ = state.tasks.add(date, task.clone());
        task
    }

    /// A copy of what the server currently stores
    pub fn server_tasks(&self) -> TaskIndex {
        self.state().tasks.clone()
    }

    /// How many requests have been answered so far (successfully or not)
    pub fn request_count(&self) -> usize {
        self.state().n_requests
    }

    /// From now on, requests that change the server wait for [`MockPlanner::release`] before being answered
    pub fn hold(&self) {
        *lock(&self.latch) = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `n` held requests be answered
    pub fn release(&self, n: usize) {
        if let Some(latch) = lock(&self.latch).clone() {
            latch.add_permits(n);
        }
    }

    /// Stop holding requests, and answer the ones that are waiting
    pub fn resume(&self) {
        close(&self.latch);
    }

    /// From now on, listings are computed at once, but only sent back after [`MockPlanner::resume_listings`].
    ///
    /// This is what a slow network looks like: the server state may change before the listing arrives.
    pub fn hold_listings(&self) {
        *lock(&self.list_latch) = Some(Arc::new(Semaphore::new(0)));
    }

    /// Stop holding listings, and send the ones that are waiting
    pub fn resume_listings(&self) {
        close(&self.list_latch);
    }

    /// How many requests (or listings) are currently held
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Yield until at least `n` requests are held
    pub async fn wait_for_held_requests(&self, n: usize) {
        while self.waiting() < n {
            tokio::task::yield_now().await;
        }
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        lock(&self.state)
    }

    async fn wait_for_release(&self, latch: &Mutex<Option<Arc<Semaphore>>>) {
        let latch = match lock(latch).clone() {
            None => return,
            Some(latch) => latch,
        };
        self.waiting.fetch_add(1, Ordering::SeqCst);
        // A closed semaphore means the mock has been resumed
        if let Ok(permit) = latch.acquire().await {
            permit.forget();
        }
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }

    fn answer_create(&self, date: DateKey, content: &str, is_urgent: bool) -> Result<Task, RemoteError> {
        let mut state = self.state();
        state.n_requests += 1;
        state.behaviour.can_create_task()?;
        state.next_id += 1;
        let task = Task::new(TaskId::from(state.next_id), content.to_string(), is_urgent);
        state.tasks.add(date, task.clone())?;
        Ok(task)
    }

    fn answer_delete(&self, id: &TaskId) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.n_requests += 1;
        state.behaviour.can_delete_task()?;
        state.tasks.remove(id)?;
        Ok(())
    }

    fn answer_toggle(&self, id: &TaskId) -> Result<Task, RemoteError> {
        let mut state = self.state();
        state.n_requests += 1;
        state.behaviour.can_toggle_urgent()?;
        state.tasks.toggle_urgent(id)?;
        match state.tasks.get(id) {
            None => Err(format!("Task {} vanished", id).into()),
            Some(task) => Ok(task.clone()),
        }
    }

    fn answer_move(&self, id: &TaskId, target: DateKey) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.n_requests += 1;
        state.behaviour.can_move_task()?;
        state.tasks.move_task(id, target, None)?;
        Ok(())
    }

    fn answer_list(&self, date: DateKey) -> Result<Vec<Task>, RemoteError> {
        let mut state = self.state();
        state.n_requests += 1;
        state.behaviour.can_list_tasks()?;
        Ok(state.tasks.tasks_on(&date).to_vec())
    }
}

#[async_trait]
impl PlannerApi for MockPlanner {
    async fn create_task(&self, date: DateKey, content: &str, is_urgent: bool) -> Result<Task, RemoteError> {
        self.wait_for_release(&self.latch).await;
        self.answer_create(date, content, is_urgent)
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteError> {
        self.wait_for_release(&self.latch).await;
        self.answer_delete(id)
    }

    async fn toggle_urgent(&self, id: &TaskId) -> Result<Task, RemoteError> {
        self.wait_for_release(&self.latch).await;
        self.answer_toggle(id)
    }

    async fn move_task(&self, id: &TaskId, target: DateKey) -> Result<(), RemoteError> {
        self.wait_for_release(&self.latch).await;
        self.answer_move(id, target)
    }

    async fn list_tasks(&self, date: DateKey) -> Result<Vec<Task>, RemoteError> {
        let listing = self.answer_list(date);
        self.wait_for_release(&self.list_latch).await;
        listing
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Remove a latch, and let everything it holds through
fn close(latch: &Mutex<Option<Arc<Semaphore>>>) {
    if let Some(latch) = lock(latch).take() {
        latch.close();
    }
}
