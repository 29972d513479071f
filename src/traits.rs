use async_trait::async_trait;

use crate::error::RemoteError;
use crate::task::{DateKey, Task, TaskId};

/// The remote source of truth for tasks (usually the planner server, see [`Client`](crate::client::Client))
///
/// Implementors are free to apply their own timeout policy; a timeout should simply be reported as an error.
#[async_trait]
pub trait PlannerApi {
    /// Create a task. The server assigns its identifier, and returns the record it has stored.
    async fn create_task(&self, date: DateKey, content: &str, is_urgent: bool) -> Result<Task, RemoteError>;

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteError>;

    /// Flip the urgency flag of a task, and return the full updated record
    async fn toggle_urgent(&self, id: &TaskId) -> Result<Task, RemoteError>;

    async fn move_task(&self, id: &TaskId, target: DateKey) -> Result<(), RemoteError>;

    /// Returns the tasks the server knows for the given day
    async fn list_tasks(&self, date: DateKey) -> Result<Vec<Task>, RemoteError>;
}
