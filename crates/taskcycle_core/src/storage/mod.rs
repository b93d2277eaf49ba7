//! The task store boundary and its implementations.
//!
//! The lifecycle manager only talks to [`TaskStore`]. Each method is one
//! atomic read-modify-write against the backing store; [`TaskStore::commit_completion`]
//! is the single place where two writes must land together.

pub mod json_store;
pub mod memory_store;

pub use json_store::JsonStore;
pub use memory_store::MemoryStore;

use crate::error::AppError;
use crate::model::{CompletionRecord, NewCompletion, NewTask, Task, TaskPatch};
use time::OffsetDateTime;
use uuid::Uuid;

pub trait TaskStore {
    fn find(&self, task_id: &str) -> Result<Option<Task>, AppError>;

    /// Active tasks come back newest first by `created_at`, completed ones
    /// newest first by `last_completed_at`.
    fn list_by_user(&self, user_id: &str, is_completed: bool) -> Result<Vec<Task>, AppError>;

    fn insert(&self, draft: NewTask) -> Result<Task, AppError>;

    fn update(&self, task_id: &str, patch: TaskPatch) -> Result<Task, AppError>;

    fn remove(&self, task_id: &str) -> Result<(), AppError>;

    fn append_completion_record(&self, draft: NewCompletion) -> Result<CompletionRecord, AppError>;

    /// Records for one task, newest first.
    fn completion_records(&self, task_id: &str) -> Result<Vec<CompletionRecord>, AppError>;

    /// Applies `patch` to the task and appends the record as one unit: either
    /// both are persisted or neither is.
    fn commit_completion(
        &self,
        task_id: &str,
        patch: TaskPatch,
        draft: NewCompletion,
    ) -> Result<(Task, CompletionRecord), AppError>;
}

/// Tasks and completion records held in memory. Both stores run their
/// operations against this table; they differ only in where it lives.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct TaskTable {
    pub tasks: Vec<Task>,
    pub completions: Vec<CompletionRecord>,
}

impl TaskTable {
    pub fn find(&self, task_id: &str) -> Option<Task> {
        self.tasks.iter().find(|task| task.id == task_id).cloned()
    }

    pub fn list_by_user(&self, user_id: &str, is_completed: bool) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| task.user_id == user_id && task.is_completed == is_completed)
            .cloned()
            .collect();

        if is_completed {
            tasks.sort_by(|a, b| b.last_completed_at.cmp(&a.last_completed_at));
        } else {
            tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        tasks
    }

    pub fn insert(&mut self, draft: NewTask, now: OffsetDateTime) -> Task {
        let task = Task {
            id: format!("task-{}", Uuid::new_v4()),
            user_id: draft.user_id,
            title: draft.title,
            description: draft.description,
            is_completed: false,
            recurring_schedule: draft.recurring_schedule,
            last_completed_at: None,
            next_due_at: None,
            created_at: now,
            updated_at: now,
        };
        self.tasks.push(task.clone());
        task
    }

    pub fn update(
        &mut self,
        task_id: &str,
        patch: TaskPatch,
        now: OffsetDateTime,
    ) -> Result<Task, AppError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| task_not_found(task_id))?;
        patch.apply(task, now);
        Ok(task.clone())
    }

    pub fn remove(&mut self, task_id: &str) -> Result<Task, AppError> {
        let index = self
            .tasks
            .iter()
            .position(|task| task.id == task_id)
            .ok_or_else(|| task_not_found(task_id))?;
        Ok(self.tasks.remove(index))
    }

    pub fn append_completion_record(&mut self, draft: NewCompletion) -> CompletionRecord {
        let record = CompletionRecord {
            id: format!("completion-{}", Uuid::new_v4()),
            task_id: draft.task_id,
            completed_at: draft.completed_at,
        };
        self.completions.push(record.clone());
        record
    }

    pub fn completion_records(&self, task_id: &str) -> Vec<CompletionRecord> {
        let mut records: Vec<CompletionRecord> = self
            .completions
            .iter()
            .filter(|record| record.task_id == task_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        records
    }

    pub fn commit_completion(
        &mut self,
        task_id: &str,
        patch: TaskPatch,
        draft: NewCompletion,
        now: OffsetDateTime,
    ) -> Result<(Task, CompletionRecord), AppError> {
        // The update is the only fallible step, so run it before appending.
        let task = self.update(task_id, patch, now)?;
        let record = self.append_completion_record(draft);
        Ok((task, record))
    }
}

pub(crate) fn task_not_found(task_id: &str) -> AppError {
    AppError::not_found(format!("task {task_id} not found"))
}
