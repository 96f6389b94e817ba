//! Event handoff between a running task and whoever started it.
//!
//! Each task owns the sending half of an unbounded channel; the caller keeps
//! a [`TaskHandle`] with the receiving half plus the task's cancellation
//! token. Status events may arrive any number of times, followed by exactly
//! one terminal event (`Completed` or `Canceled`).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::update_check::UpdateCheckReport;
use crate::models::SearchResults;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Stable handle naming one task. Ids are never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Search,
    UpdateCheck,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Search => write!(f, "SEARCH"),
            TaskKind::UpdateCheck => write!(f, "UPDATE"),
        }
    }
}

/// Typed result payload of a finished task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Search(SearchResults),
    UpdateCheck(UpdateCheckReport),
}

impl TaskOutcome {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskOutcome::Search(_) => TaskKind::Search,
            TaskOutcome::UpdateCheck(_) => TaskKind::UpdateCheck,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    StatusChanged { id: TaskId, kind: TaskKind, text: String },
    Completed { id: TaskId, outcome: TaskOutcome },
    Canceled { id: TaskId, kind: TaskKind },
}

impl TaskEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskEvent::StatusChanged { .. })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task was canceled")]
    Canceled,
    #[error("task manager is shutting down; new tasks are refused")]
    Rejected,
    #[error("task finished without reporting a result")]
    Disconnected,
}

/// Sending half owned by the task. Terminal events are sent at most once.
#[derive(Debug)]
pub(crate) struct EventSink {
    id: TaskId,
    kind: TaskKind,
    sender: Sender<TaskEvent>,
    finished: bool,
}

impl EventSink {
    pub(crate) fn status(&self, text: impl Into<String>) {
        if self.finished {
            return;
        }
        self.send(TaskEvent::StatusChanged {
            id: self.id,
            kind: self.kind,
            text: text.into(),
        });
    }

    pub(crate) fn completed(&mut self, outcome: TaskOutcome) {
        if !self.finished {
            self.finished = true;
            self.send(TaskEvent::Completed {
                id: self.id,
                outcome,
            });
        }
    }

    pub(crate) fn canceled(&mut self) {
        if !self.finished {
            self.finished = true;
            self.send(TaskEvent::Canceled {
                id: self.id,
                kind: self.kind,
            });
        }
    }

    fn send(&self, event: TaskEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!(id = %self.id, "task handle dropped; event discarded");
        }
    }
}

/// Caller side of a task: its event stream and its cancellation token.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    kind: TaskKind,
    cancel: CancellationToken,
    events: Receiver<TaskEvent>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Ask the task to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Raw event stream, for callers that render progress themselves.
    pub fn events(&self) -> &Receiver<TaskEvent> {
        &self.events
    }

    /// Block until the task reports its terminal event.
    pub fn wait(self) -> Result<TaskOutcome, TaskError> {
        self.wait_with_status(|_| {})
    }

    /// Block until the task finishes, handing every status line to `on_status`.
    pub fn wait_with_status(self, mut on_status: impl FnMut(&str)) -> Result<TaskOutcome, TaskError> {
        for event in self.events.iter() {
            match event {
                TaskEvent::StatusChanged { text, .. } => on_status(&text),
                TaskEvent::Completed { outcome, .. } => return Ok(outcome),
                TaskEvent::Canceled { .. } => return Err(TaskError::Canceled),
            }
        }
        Err(TaskError::Disconnected)
    }
}

/// Create the connected sink/handle pair for a new task.
pub(crate) fn channel(
    id: TaskId,
    kind: TaskKind,
    cancel: CancellationToken,
) -> (EventSink, TaskHandle) {
    let (sender, events) = crossbeam_channel::unbounded();
    let sink = EventSink {
        id,
        kind,
        sender,
        finished: false,
    };
    let handle = TaskHandle {
        id,
        kind,
        cancel,
        events,
    };
    (sink, handle)
}
