use crate::clock::Clock;
use crate::error::AppError;
use crate::model::{CompletionRecord, NewCompletion, NewTask, Task, TaskPatch};
use crate::storage::{TaskStore, TaskTable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// In-process store. `set_available(false)` simulates an outage: every call
/// fails with `StoreUnavailable` and nothing is read or written.
pub struct MemoryStore {
    table: Mutex<TaskTable>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Mutex::new(TaskTable::default()),
            clock,
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn completion_count(&self) -> Result<usize, AppError> {
        Ok(self.table()?.completions.len())
    }

    pub fn task_count(&self) -> Result<usize, AppError> {
        Ok(self.table()?.tasks.len())
    }

    fn table(&self) -> Result<MutexGuard<'_, TaskTable>, AppError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(AppError::store_unavailable("memory store is offline"));
        }
        self.table
            .lock()
            .map_err(|_| AppError::store_unavailable("memory store lock poisoned"))
    }
}

impl TaskStore for MemoryStore {
    fn find(&self, task_id: &str) -> Result<Option<Task>, AppError> {
        Ok(self.table()?.find(task_id))
    }

    fn list_by_user(&self, user_id: &str, is_completed: bool) -> Result<Vec<Task>, AppError> {
        Ok(self.table()?.list_by_user(user_id, is_completed))
    }

    fn insert(&self, draft: NewTask) -> Result<Task, AppError> {
        let now = self.clock.now();
        Ok(self.table()?.insert(draft, now))
    }

    fn update(&self, task_id: &str, patch: TaskPatch) -> Result<Task, AppError> {
        let now = self.clock.now();
        self.table()?.update(task_id, patch, now)
    }

    fn remove(&self, task_id: &str) -> Result<(), AppError> {
        self.table()?.remove(task_id).map(|_| ())
    }

    fn append_completion_record(&self, draft: NewCompletion) -> Result<CompletionRecord, AppError> {
        Ok(self.table()?.append_completion_record(draft))
    }

    fn completion_records(&self, task_id: &str) -> Result<Vec<CompletionRecord>, AppError> {
        Ok(self.table()?.completion_records(task_id))
    }

    fn commit_completion(
        &self,
        task_id: &str,
        patch: TaskPatch,
        draft: NewCompletion,
    ) -> Result<(Task, CompletionRecord), AppError> {
        let now = self.clock.now();
        self.table()?.commit_completion(task_id, patch, draft, now)
    }
}
