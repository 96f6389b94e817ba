//! Task manager: the shared coordination context every task is started
//! through.
//!
//! The registry holds, per live task, its cancellation token and (for tasks
//! started in queued mode) the job waiting to be released. It never owns the
//! task's result; a finished job removes its own entry.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::events::{TaskError, TaskHandle, TaskId, TaskKind};
use super::pool::{Job, Priority, WorkerPool};
use super::task::{Task, TaskContext, TaskParameters};
use crate::config::Settings;

struct Entry {
    kind: TaskKind,
    priority: Priority,
    cancel: CancellationToken,
    /// Job of a queued task, until `start_queued_tasks` releases it.
    pending: Option<Job>,
}

#[derive(Default)]
struct Registry {
    tasks: BTreeMap<TaskId, Entry>,
    all_canceled: bool,
}

type SharedRegistry = Arc<Mutex<Registry>>;

/// Removes a task's registry entry when its job is done or discarded.
struct Deregister {
    registry: Weak<Mutex<Registry>>,
    id: TaskId,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().tasks.remove(&self.id);
        }
    }
}

pub struct TaskManager {
    context: TaskContext,
    pool: WorkerPool,
    registry: SharedRegistry,
}

impl TaskManager {
    pub fn new(settings: &Settings) -> Self {
        Self::with_context(settings.worker_threads, TaskContext::from_settings(settings))
    }

    pub fn with_context(worker_threads: usize, context: TaskContext) -> Self {
        Self {
            context,
            pool: WorkerPool::new(worker_threads),
            registry: SharedRegistry::default(),
        }
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Create a task for `params` and start it; the returned handle carries
    /// its events and cancellation.
    pub fn start_task(
        &self,
        params: impl Into<TaskParameters>,
        queued: bool,
    ) -> Result<TaskHandle, TaskError> {
        let (task, handle) = Task::new(params);
        task.start(self, queued)?;
        Ok(handle)
    }

    /// Register `task`, then either submit it or park it until
    /// [`start_queued_tasks`](Self::start_queued_tasks).
    pub(crate) fn submit(&self, task: Task, queued: bool) -> Result<(), TaskError> {
        let id = task.id();
        let kind = task.kind();
        let priority = task.priority();
        let cancel = task.cancellation_token().clone();
        let job = self.job_for(task);

        let mut registry = self.registry.lock();
        if registry.all_canceled {
            drop(registry);
            drop(job);
            tracing::debug!(%id, %kind, "task refused during shutdown");
            return Err(TaskError::Rejected);
        }

        if queued {
            registry.tasks.insert(
                id,
                Entry {
                    kind,
                    priority,
                    cancel,
                    pending: Some(job),
                },
            );
            tracing::debug!(%id, %kind, "task queued");
        } else {
            registry.tasks.insert(
                id,
                Entry {
                    kind,
                    priority,
                    cancel,
                    pending: None,
                },
            );
            // submitted under the registry lock so a concurrent finish()
            // either sees the job in the pool or refuses the task
            self.pool.submit(job, priority);
            tracing::debug!(%id, %kind, ?priority, "task submitted");
        }
        Ok(())
    }

    fn job_for(&self, task: Task) -> Job {
        let context = self.context.clone();
        let guard = Deregister {
            registry: Arc::downgrade(&self.registry),
            id: task.id(),
        };
        Box::new(move || {
            let _guard = guard;
            task.run(&context);
        })
    }

    /// Release every task started in queued mode, in registration order.
    pub fn start_queued_tasks(&self) -> usize {
        let mut registry = self.registry.lock();
        let mut released = 0;
        for (id, entry) in registry.tasks.iter_mut() {
            if let Some(job) = entry.pending.take() {
                self.pool.submit(job, entry.priority);
                tracing::debug!(%id, kind = %entry.kind, "queued task released");
                released += 1;
            }
        }
        released
    }

    /// Refuse new tasks, cancel every live one, and block until the pool has
    /// neither running nor queued work. Parked tasks are released so they can
    /// report their cancellation.
    pub fn finish(&self) {
        {
            let mut registry = self.registry.lock();
            registry.all_canceled = true;
            tracing::info!(live = registry.tasks.len(), "canceling all tasks");
            for entry in registry.tasks.values_mut() {
                entry.cancel.cancel();
                if let Some(job) = entry.pending.take() {
                    self.pool.submit(job, entry.priority);
                }
            }
        }
        self.pool.wait_for_done();
        tracing::debug!("all tasks drained");
    }

    /// Accept new tasks again after [`finish`](Self::finish).
    pub fn switch_to_start_state(&self) {
        self.registry.lock().all_canceled = false;
    }

    pub fn is_all_task_canceled(&self) -> bool {
        self.registry.lock().all_canceled
    }

    /// Tasks registered and not yet finished.
    pub fn live_tasks(&self) -> usize {
        self.registry.lock().tasks.len()
    }

    /// Tasks waiting for [`start_queued_tasks`](Self::start_queued_tasks).
    pub fn queued_tasks(&self) -> usize {
        self.registry
            .lock()
            .tasks
            .values()
            .filter(|entry| entry.pending.is_some())
            .count()
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.finish();
    }
}
