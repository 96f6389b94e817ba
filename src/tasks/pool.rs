//! Bounded worker pool with a two-level queue.
//!
//! At most `size` jobs run at once. Jobs submitted beyond that wait in one of
//! two FIFO queues; `Prepend` jobs are always taken before `Normal` ones.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Normal,
    /// Run ahead of every queued `Normal` job.
    Prepend,
}

#[derive(Default)]
struct PoolState {
    prepended: VecDeque<Job>,
    normal: VecDeque<Job>,
    active: usize,
    shutdown: bool,
}

impl PoolState {
    fn queued(&self) -> usize {
        self.prepended.len() + self.normal.len()
    }

    fn pop(&mut self) -> Option<Job> {
        self.prepended.pop_front().or_else(|| self.normal.pop_front())
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<PoolState>,
    work_ready: Condvar,
    drained: Condvar,
}

pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` worker threads (at least one).
    pub fn new(size: usize) -> Self {
        let shared = Arc::new(Shared::default());
        let workers = (0..size.max(1))
            .filter_map(|worker_id| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("divan-worker-{worker_id}"))
                    .spawn(move || worker_loop(&shared, worker_id))
                    .map_err(|err| tracing::error!(worker_id, error = %err, "failed to spawn worker"))
                    .ok()
            })
            .collect::<Vec<_>>();

        tracing::debug!(workers = workers.len(), "worker pool started");
        Self { shared, workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub(crate) fn submit(&self, job: Job, priority: Priority) {
        let mut state = self.shared.state.lock();
        match priority {
            Priority::Prepend => state.prepended.push_back(job),
            Priority::Normal => state.normal.push_back(job),
        }
        drop(state);
        self.shared.work_ready.notify_one();
    }

    /// Block until no job is running or queued.
    pub fn wait_for_done(&self) {
        let mut state = self.shared.state.lock();
        while state.active > 0 || state.queued() > 0 {
            self.shared.drained.wait(&mut state);
        }
    }

    pub fn active_count(&self) -> usize {
        self.shared.state.lock().active
    }

    pub fn queued_count(&self) -> usize {
        self.shared.state.lock().queued()
    }
}

impl Drop for WorkerPool {
    /// Finish queued work, then join the workers.
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.work_ready.notify_all();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("worker thread panicked outside a job");
            }
        }
    }
}

fn worker_loop(shared: &Shared, worker_id: usize) {
    tracing::trace!(worker_id, "worker started");
    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if let Some(job) = state.pop() {
                    state.active += 1;
                    break job;
                }
                if state.shutdown {
                    tracing::trace!(worker_id, "worker stopped");
                    return;
                }
                shared.work_ready.wait(&mut state);
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!(worker_id, "task panicked");
        }

        let mut state = shared.state.lock();
        state.active -= 1;
        if state.active == 0 && state.queued() == 0 {
            shared.drained.notify_all();
        }
    }
}
