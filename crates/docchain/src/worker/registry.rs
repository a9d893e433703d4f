//! Task bookkeeping: the active set (pending and processing) and a bounded
//! set of terminal tasks kept for status queries.

use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};

use super::task::{ProcessingTask, TaskStatus};

#[derive(Default)]
struct CompletedTasks {
    tasks: HashMap<String, ProcessingTask>,
    /// Insertion order, oldest first, for eviction.
    order: VecDeque<String>,
}

pub(crate) struct TaskRegistry {
    active: RwLock<HashMap<String, ProcessingTask>>,
    completed: RwLock<CompletedTasks>,
    retention: usize,
}

impl TaskRegistry {
    pub fn new(retention: usize) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            completed: RwLock::new(CompletedTasks::default()),
            retention,
        }
    }

    pub fn insert(&self, task: ProcessingTask) {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        active.insert(task.id.clone(), task);
    }

    pub fn remove_active(&self, task_id: &str) -> Option<ProcessingTask> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        active.remove(task_id)
    }

    pub fn get(&self, task_id: &str) -> Option<ProcessingTask> {
        {
            let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(task) = active.get(task_id) {
                return Some(task.clone());
            }
        }
        let completed = self.completed.read().unwrap_or_else(PoisonError::into_inner);
        completed.tasks.get(task_id).cloned()
    }

    /// Claims a pending task for processing. `None` if the task is unknown
    /// or already claimed.
    pub fn begin(&self, task_id: &str) -> Option<ProcessingTask> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        let task = active.get_mut(task_id)?;
        if task.status != TaskStatus::Pending {
            return None;
        }
        task.mark_processing();
        Some(task.clone())
    }

    /// Applies the terminal transition and moves the task to the completed
    /// set. The task is visible in one of the two sets throughout.
    pub fn finish<F>(&self, task_id: &str, transition: F) -> Option<ProcessingTask>
    where
        F: FnOnce(&mut ProcessingTask),
    {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        let mut task = active.get(task_id)?.clone();
        transition(&mut task);

        {
            let mut completed = self.completed.write().unwrap_or_else(PoisonError::into_inner);
            completed.order.push_back(task.id.clone());
            completed.tasks.insert(task.id.clone(), task.clone());
            while completed.order.len() > self.retention {
                if let Some(oldest) = completed.order.pop_front() {
                    completed.tasks.remove(&oldest);
                }
            }
        }

        active.remove(task_id);
        Some(task)
    }

    /// Ids of tasks currently being processed.
    pub fn in_flight(&self) -> Vec<String> {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        active
            .values()
            .filter(|t| t.status == TaskStatus::Processing)
            .map(|t| t.id.clone())
            .collect()
    }

    /// All active tasks of a submitter plus their `recent` most recently
    /// finished ones, newest first.
    pub fn for_submitter(&self, submitter_id: &str, recent: usize) -> Vec<ProcessingTask> {
        let mut tasks: Vec<ProcessingTask> = {
            let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
            active
                .values()
                .filter(|t| t.submitter_id == submitter_id)
                .cloned()
                .collect()
        };
        tasks.sort_by_key(|t| t.created_at);

        let mut finished: Vec<ProcessingTask> = {
            let completed = self.completed.read().unwrap_or_else(PoisonError::into_inner);
            completed
                .tasks
                .values()
                .filter(|t| t.submitter_id == submitter_id)
                .cloned()
                .collect()
        };
        finished.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        finished.truncate(recent);

        tasks.extend(finished);
        tasks
    }

    pub fn active_len(&self) -> usize {
        self.active.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn completed_len(&self) -> usize {
        self.completed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tasks
            .len()
    }
}
