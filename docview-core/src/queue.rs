use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use crate::descriptor::ExternalRef;
use crate::permission::RequestCode;
use crate::surface::{SearchEpoch, SurfaceEvent};
use crate::viewer::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    Picked(ExternalRef),
    Cancelled,
}

/// Work scheduled by the viewer itself, run after the task that scheduled it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    JumpTo { page: usize, epoch: SearchEpoch },
}

/// Everything that may touch viewer state. Tasks are handled strictly one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Surface(SurfaceEvent),
    PermissionResult {
        code: RequestCode,
        granted: bool,
    },
    ActivityResult {
        code: RequestCode,
        outcome: ActivityOutcome,
    },
    Deferred(Deferred),
    User(Command),
    Shutdown,
}

pub fn task_queue() -> (QueueHandle, TaskQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueHandle { tx }, TaskQueue { rx })
}

/// Cloneable producer side. Safe to use from any thread.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: UnboundedSender<Task>,
}

impl QueueHandle {
    /// Returns `false` once the consumer is gone.
    pub fn post(&self, task: Task) -> bool {
        match self.tx.send(task) {
            Ok(()) => true,
            Err(err) => {
                trace!(task = ?err.0, "task queue closed, dropping task");
                false
            }
        }
    }

    pub fn post_surface(&self, event: SurfaceEvent) -> bool {
        self.post(Task::Surface(event))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct TaskQueue {
    rx: UnboundedReceiver<Task>,
}

impl TaskQueue {
    pub async fn next(&mut self) -> Option<Task> {
        self.rx.recv().await
    }

    /// Non-blocking variant; `None` when nothing is queued right now.
    pub fn try_next(&mut self) -> Option<Task> {
        match self.rx.try_recv() {
            Ok(task) => Some(task),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}
