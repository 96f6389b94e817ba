//! Background task execution.
//!
//! A caller builds [`TaskParameters`], asks the [`TaskManager`] to start a
//! task, and keeps the returned [`TaskHandle`]. The manager registers the
//! task, submits it to its bounded [`WorkerPool`] (or parks it until
//! [`TaskManager::start_queued_tasks`]), and the task reports status lines and
//! one terminal event through the handle. Cancellation is cooperative: tasks
//! poll their token at fixed checkpoints.

pub mod events;
pub mod manager;
pub mod pool;
pub mod search;
pub mod task;
pub mod update_check;

pub use events::{TaskError, TaskEvent, TaskHandle, TaskId, TaskKind, TaskOutcome};
pub use manager::TaskManager;
pub use pool::{Priority, WorkerPool};
pub use search::SearchParameters;
pub use task::{Task, TaskContext, TaskParameters};
pub use update_check::{UpdateCheckParameters, UpdateCheckReport, UpdateFailure, UpdateOutcome};
