use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use tokio::sync::Notify;

use crate::error::WorkerError;

/// FIFO of task ids shared by all workers.
///
/// The channel holds the ids; `Notify` wakes one idle worker per push so
/// dequeueing never blocks a runtime thread.
pub struct TaskQueue {
    sender: Sender<String>,
    receiver: Receiver<String>,
    available: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            available: Notify::new(),
        }
    }

    pub fn push(&self, task_id: String) -> Result<(), WorkerError> {
        self.sender
            .send(task_id)
            .map_err(|_| WorkerError::QueueClosed)?;
        self.available.notify_one();
        Ok(())
    }

    /// Waits up to `timeout` for a task id. `None` on timeout, so callers can
    /// re-check for shutdown.
    pub async fn pop(&self, timeout: Duration) -> Option<String> {
        match self.try_pop() {
            Ok(id) => return Some(id),
            Err(TryRecvError::Disconnected) => return None,
            Err(TryRecvError::Empty) => {}
        }

        let _ = tokio::time::timeout(timeout, self.available.notified()).await;
        self.try_pop().ok()
    }

    /// Takes an id and passes the wake-up on while work remains, since
    /// `Notify` keeps at most one permit.
    fn try_pop(&self) -> Result<String, TryRecvError> {
        let id = self.receiver.try_recv()?;
        if !self.receiver.is_empty() {
            self.available.notify_one();
        }
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
