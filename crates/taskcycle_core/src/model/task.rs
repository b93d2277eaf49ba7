use crate::model::RecurringSchedule;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(
        default,
        deserialize_with = "RecurringSchedule::deserialize_nullable"
    )]
    pub recurring_schedule: RecurringSchedule,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_completed_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub next_due_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Where a task sits in its completion cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Active,
    /// Completed recurring task waiting for `next_due_at`.
    Dormant,
    Completed,
}

impl Task {
    pub fn state(&self) -> TaskState {
        match (self.is_completed, self.next_due_at) {
            (false, _) => TaskState::Active,
            (true, Some(_)) => TaskState::Dormant,
            (true, None) => TaskState::Completed,
        }
    }

    pub fn is_due(&self, now: OffsetDateTime) -> bool {
        self.state() == TaskState::Dormant && self.next_due_at.is_some_and(|due| due <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub id: String,
    pub task_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub recurring_schedule: RecurringSchedule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCompletion {
    pub task_id: String,
    pub completed_at: OffsetDateTime,
}

/// Caller-facing partial edit. `description: Some(None)` clears it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub recurring_schedule: Option<RecurringSchedule>,
}

impl TaskEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.recurring_schedule.is_none()
    }
}

/// Store-facing partial update. Outer `None` leaves a field untouched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub recurring_schedule: Option<RecurringSchedule>,
    pub is_completed: Option<bool>,
    pub last_completed_at: Option<Option<OffsetDateTime>>,
    pub next_due_at: Option<Option<OffsetDateTime>>,
}

impl TaskPatch {
    pub fn completed(at: OffsetDateTime, next_due_at: Option<OffsetDateTime>) -> Self {
        Self {
            is_completed: Some(true),
            last_completed_at: Some(Some(at)),
            next_due_at: Some(next_due_at),
            ..Self::default()
        }
    }

    pub fn reactivated() -> Self {
        Self {
            is_completed: Some(false),
            last_completed_at: Some(None),
            next_due_at: Some(None),
            ..Self::default()
        }
    }

    pub fn apply(self, task: &mut Task, updated_at: OffsetDateTime) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(schedule) = self.recurring_schedule {
            task.recurring_schedule = schedule;
        }
        if let Some(is_completed) = self.is_completed {
            task.is_completed = is_completed;
        }
        if let Some(last_completed_at) = self.last_completed_at {
            task.last_completed_at = last_completed_at;
        }
        if let Some(next_due_at) = self.next_due_at {
            task.next_due_at = next_due_at;
        }
        task.updated_at = updated_at;
    }
}

impl From<TaskEdit> for TaskPatch {
    fn from(edit: TaskEdit) -> Self {
        Self {
            title: edit.title,
            description: edit.description,
            recurring_schedule: edit.recurring_schedule,
            ..Self::default()
        }
    }
}
