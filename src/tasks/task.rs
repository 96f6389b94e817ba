use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::events::{self, EventSink, TaskError, TaskHandle, TaskId, TaskKind, TaskOutcome};
use super::manager::TaskManager;
use super::pool::Priority;
use super::search::{self, SearchParameters, SearchRun};
use super::update_check::{self, UpdateCheckParameters};
use crate::config::{Settings, DEFAULT_NETWORK_TIMEOUT, DEFAULT_PROGRESS_BATCH};

/// Tagged parameter record, one variant per task kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskParameters {
    Search(SearchParameters),
    UpdateCheck(UpdateCheckParameters),
}

impl TaskParameters {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskParameters::Search(_) => TaskKind::Search,
            TaskParameters::UpdateCheck(_) => TaskKind::UpdateCheck,
        }
    }

    /// User-initiated update checks run ahead of queued peers.
    pub fn priority(&self) -> Priority {
        match self {
            TaskParameters::UpdateCheck(params) if params.checked_by_user => Priority::Prepend,
            _ => Priority::Normal,
        }
    }
}

impl From<SearchParameters> for TaskParameters {
    fn from(params: SearchParameters) -> Self {
        TaskParameters::Search(params)
    }
}

impl From<UpdateCheckParameters> for TaskParameters {
    fn from(params: UpdateCheckParameters) -> Self {
        TaskParameters::UpdateCheck(params)
    }
}

/// Caller-context settings every task run sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    /// Matches per progress event; `None` turns progress reporting off.
    pub progress_batch: Option<usize>,
    pub network_timeout: Duration,
    /// Route update checks through proxies named in the environment.
    pub use_system_proxy: bool,
}

impl TaskContext {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            progress_batch: settings
                .display_full_notification
                .then_some(settings.progress_batch.max(1)),
            network_timeout: settings.network_timeout,
            use_system_proxy: settings.use_system_proxy,
        }
    }

    pub fn quiet() -> Self {
        Self {
            progress_batch: None,
            ..Self::default()
        }
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self {
            progress_batch: Some(DEFAULT_PROGRESS_BATCH),
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
            use_system_proxy: true,
        }
    }
}

/// One unit of background work. Created together with its [`TaskHandle`],
/// run at most once, then gone.
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    params: TaskParameters,
    cancel: CancellationToken,
    sink: EventSink,
}

impl Task {
    pub fn new(params: impl Into<TaskParameters>) -> (Task, TaskHandle) {
        let params = params.into();
        let id = TaskId::next();
        let cancel = CancellationToken::new();
        let (sink, handle) = events::channel(id, params.kind(), cancel.clone());
        let task = Task {
            id,
            params,
            cancel,
            sink,
        };
        (task, handle)
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.params.kind()
    }

    pub fn priority(&self) -> Priority {
        self.params.priority()
    }

    pub(crate) fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Register with `manager` and, unless `queued`, hand the task to its
    /// worker pool. Refused while the manager is canceling everything.
    pub fn start(self, manager: &TaskManager, queued: bool) -> Result<(), TaskError> {
        manager.submit(self, queued)
    }

    /// Execute on the current thread and report the result on the handle.
    pub fn run(mut self, context: &TaskContext) {
        let started = Instant::now();
        let span = tracing::debug_span!("task", id = %self.id, kind = %self.kind());
        let _entered = span.enter();

        match &self.params {
            TaskParameters::Search(params) => {
                match search::run(params, &self.cancel, &self.sink, context.progress_batch) {
                    SearchRun::Finished(results) => {
                        self.sink.completed(TaskOutcome::Search(results));
                    }
                    SearchRun::Canceled => self.sink.canceled(),
                }
            }
            TaskParameters::UpdateCheck(params) => {
                let report = update_check::run(params, &self.cancel, &self.sink, context);
                self.sink.completed(TaskOutcome::UpdateCheck(report));
            }
        }

        tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "task done");
    }
}
