use crate::clock::Clock;
use crate::error::AppError;
use crate::model::{CompletionRecord, NewCompletion, NewTask, Task, TaskPatch};
use crate::storage::{TaskStore, TaskTable};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const SCHEMA_VERSION: u32 = 1;
const STORE_FILE_NAME: &str = "tasks.json";
const STORE_ENV_VAR: &str = "TASKCYCLE_STORE_PATH";

#[derive(Debug, Serialize, Deserialize)]
struct StoredTasks {
    schema_version: u32,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    completions: Vec<CompletionRecord>,
}

pub fn store_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("taskcycle").join(STORE_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("taskcycle")
            .join(STORE_FILE_NAME))
    }
}

/// File-backed store. Every operation loads the whole file, applies one
/// change and writes it back through a temporary file, so a failed write
/// leaves the previous contents in place.
pub struct JsonStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<TaskTable, AppError> {
        load_table(&self.path)
    }

    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut TaskTable) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut table = self.load()?;
        let result = change(&mut table)?;
        save_table(&self.path, &table)?;
        Ok(result)
    }
}

impl TaskStore for JsonStore {
    fn find(&self, task_id: &str) -> Result<Option<Task>, AppError> {
        Ok(self.load()?.find(task_id))
    }

    fn list_by_user(&self, user_id: &str, is_completed: bool) -> Result<Vec<Task>, AppError> {
        Ok(self.load()?.list_by_user(user_id, is_completed))
    }

    fn insert(&self, draft: NewTask) -> Result<Task, AppError> {
        let now = self.clock.now();
        self.mutate(|table| Ok(table.insert(draft, now)))
    }

    fn update(&self, task_id: &str, patch: TaskPatch) -> Result<Task, AppError> {
        let now = self.clock.now();
        self.mutate(|table| table.update(task_id, patch, now))
    }

    fn remove(&self, task_id: &str) -> Result<(), AppError> {
        self.mutate(|table| table.remove(task_id).map(|_| ()))
    }

    fn append_completion_record(&self, draft: NewCompletion) -> Result<CompletionRecord, AppError> {
        self.mutate(|table| Ok(table.append_completion_record(draft)))
    }

    fn completion_records(&self, task_id: &str) -> Result<Vec<CompletionRecord>, AppError> {
        Ok(self.load()?.completion_records(task_id))
    }

    fn commit_completion(
        &self,
        task_id: &str,
        patch: TaskPatch,
        draft: NewCompletion,
    ) -> Result<(Task, CompletionRecord), AppError> {
        let now = self.clock.now();
        self.mutate(|table| table.commit_completion(task_id, patch, draft, now))
    }
}

fn load_table(path: &Path) -> Result<TaskTable, AppError> {
    match path.try_exists() {
        Ok(false) => return Ok(TaskTable::default()),
        Ok(true) => {}
        Err(err) => {
            return Err(AppError::store_unavailable(format!(
                "{}: {}",
                path.display(),
                err
            )));
        }
    }

    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::store_unavailable(format!("{}: {}", path.display(), err)))?;
    let stored: StoredTasks =
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))?;

    if stored.schema_version != SCHEMA_VERSION {
        return Err(AppError::invalid_data("schema_version mismatch"));
    }

    Ok(TaskTable {
        tasks: stored.tasks,
        completions: stored.completions,
    })
}

fn save_table(path: &Path, table: &TaskTable) -> Result<(), AppError> {
    let io_error =
        |err: std::io::Error| AppError::store_unavailable(format!("{}: {}", path.display(), err));

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(io_error)?;

    let stored = StoredTasks {
        schema_version: SCHEMA_VERSION,
        tasks: table.tasks.clone(),
        completions: table.completions.clone(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;

    // Each writer stages into its own file; the rename is the commit point.
    let mut staging = NamedTempFile::new_in(parent).map_err(io_error)?;
    staging.write_all(content.as_bytes()).map_err(io_error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(staging.path(), permissions).map_err(io_error)?;
    }

    staging.persist(path).map_err(|err| io_error(err.error))?;
    tracing::debug!(path = %path.display(), tasks = table.tasks.len(), "task store saved");

    Ok(())
}
