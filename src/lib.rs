//! This crate keeps a personal planner (tasks organized by calendar day) in sync with a remote server.
//!
//! The local state is a [`TaskIndex`]: an in-memory mapping from days to the ordered tasks of that day.
//!
//! Gestures (add, delete, flag as urgent, move to another day) go through a [`SyncController`]. \
//! It applies them to the index at once, so that the UI stays responsive, then sends them to a remote [`PlannerApi`](traits::PlannerApi)
//! (usually a [`Client`](client::Client) connected to the planner server). \
//! Changes the server refuses are rolled back.
//!
//! The last known state can be kept between runs in a local [`Cache`](cache::Cache).

pub mod traits;
pub mod error;
pub use error::{IndexError, SyncError, RemoteError};

mod task;
pub use task::{DateKey, Task, TaskId, parse_date_key};
pub mod index;
pub use index::TaskIndex;
pub mod controller;
pub use controller::{SyncController, SyncResult};

pub mod client;
pub mod resource;
pub mod cache;

pub mod config;

pub mod mock_behaviour;
pub mod mock_remote;

/// A controller that talks to the planner server
pub type PlannerController = SyncController<client::Client>;
