//! Task lifecycle: create, edit, delete, complete, and the sweep that brings
//! dormant recurring tasks back.
//!
//! ```text
//! Active  --complete, none-->       Completed (terminal)
//! Active  --complete, recurring-->  Dormant (next_due_at set)
//! Dormant --next_due_at reached-->  Active
//! ```
//!
//! Every call names the requesting user. A task that belongs to somebody
//! else is reported exactly like a missing one.

use crate::clock::Clock;
use crate::error::AppError;
use crate::model::{
    CompletionRecord, NewCompletion, NewTask, RecurringSchedule, Task, TaskEdit, TaskPatch,
    TaskState,
};
use crate::schedule;
use crate::storage::{TaskStore, task_not_found};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub task: Task,
    pub record: CompletionRecord,
}

pub struct TaskManager<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: TaskStore> TaskManager<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Active tasks for the user, newest first. Does not sweep.
    pub fn list_active(&self, user_id: &str) -> Result<Vec<Task>, AppError> {
        let user_id = require_id(user_id, "user id")?;
        self.store.list_by_user(user_id, false)
    }

    /// Runs the reactivation sweep, then lists active tasks.
    pub fn refresh_active(&self, user_id: &str) -> Result<Vec<Task>, AppError> {
        self.reactivate_due(user_id)?;
        self.list_active(user_id)
    }

    /// Completed and dormant tasks, most recently completed first.
    pub fn list_completed(&self, user_id: &str) -> Result<Vec<Task>, AppError> {
        let user_id = require_id(user_id, "user id")?;
        self.store.list_by_user(user_id, true)
    }

    pub fn get(&self, user_id: &str, task_id: &str) -> Result<Task, AppError> {
        self.owned_task(user_id, task_id)
    }

    pub fn create(
        &self,
        user_id: &str,
        title: &str,
        description: Option<&str>,
        recurring_schedule: RecurringSchedule,
    ) -> Result<Task, AppError> {
        let user_id = require_id(user_id, "user id")?;
        let title = require_title(title)?;

        let task = self.store.insert(NewTask {
            user_id: user_id.to_string(),
            title,
            description: normalize_description(description),
            recurring_schedule,
        })?;

        info!(task_id = %task.id, user_id, schedule = %task.recurring_schedule, "task created");
        Ok(task)
    }

    pub fn edit(&self, user_id: &str, task_id: &str, edit: TaskEdit) -> Result<Task, AppError> {
        if edit.is_empty() {
            return Err(AppError::validation("nothing to update"));
        }
        let task = self.owned_task(user_id, task_id)?;

        let edit = TaskEdit {
            title: edit.title.as_deref().map(require_title).transpose()?,
            description: edit
                .description
                .map(|description| normalize_description(description.as_deref())),
            recurring_schedule: edit.recurring_schedule,
        };

        let updated = self.store.update(&task.id, TaskPatch::from(edit))?;
        info!(task_id = %updated.id, "task edited");
        Ok(updated)
    }

    pub fn delete(&self, user_id: &str, task_id: &str) -> Result<Task, AppError> {
        let task = self.owned_task(user_id, task_id)?;
        self.store.remove(&task.id)?;
        info!(task_id = %task.id, "task deleted");
        Ok(task)
    }

    /// Completes an active task and records the completion.
    ///
    /// Recurring tasks go dormant until `advance(completed_at, schedule)`;
    /// everything else is completed for good. The task update and the
    /// completion record are committed together.
    pub fn complete(&self, user_id: &str, task_id: &str) -> Result<Completion, AppError> {
        let task = self.owned_task(user_id, task_id)?;
        if task.state() != TaskState::Active {
            return Err(AppError::validation("task already completed"));
        }

        let completed_at = self.clock.now();
        let next_due_at = if task.recurring_schedule.is_recurring() {
            Some(schedule::advance(completed_at, task.recurring_schedule)?)
        } else {
            None
        };

        let (task, record) = self.store.commit_completion(
            &task.id,
            TaskPatch::completed(completed_at, next_due_at),
            NewCompletion {
                task_id: task.id.clone(),
                completed_at,
            },
        )?;

        match task.next_due_at {
            Some(next_due_at) => {
                info!(task_id = %task.id, %completed_at, %next_due_at, "recurring task completed")
            }
            None => info!(task_id = %task.id, %completed_at, "task completed"),
        }
        Ok(Completion { task, record })
    }

    /// Reactivates every dormant task of the user whose `next_due_at` has
    /// passed. Safe to call repeatedly; a call with nothing due is a no-op.
    pub fn reactivate_due(&self, user_id: &str) -> Result<Vec<Task>, AppError> {
        let user_id = require_id(user_id, "user id")?;
        let now = self.clock.now();

        let due: Vec<Task> = self
            .store
            .list_by_user(user_id, true)?
            .into_iter()
            .filter(|task| task.is_due(now))
            .collect();
        debug!(user_id, due = due.len(), %now, "reactivation sweep");

        let mut reactivated = Vec::with_capacity(due.len());
        for task in due {
            let task = self.store.update(&task.id, TaskPatch::reactivated())?;
            info!(task_id = %task.id, "recurring task reactivated");
            reactivated.push(task);
        }
        Ok(reactivated)
    }

    /// Completion records of one task, newest first.
    pub fn completion_history(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> Result<Vec<CompletionRecord>, AppError> {
        let task = self.owned_task(user_id, task_id)?;
        self.store.completion_records(&task.id)
    }

    fn owned_task(&self, user_id: &str, task_id: &str) -> Result<Task, AppError> {
        let user_id = require_id(user_id, "user id")?;
        let task_id = require_id(task_id, "id")?;

        match self.store.find(task_id)? {
            Some(task) if task.user_id == user_id => Ok(task),
            _ => Err(task_not_found(task_id)),
        }
    }
}

fn require_id<'a>(value: &'a str, label: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{label} is required")));
    }
    Ok(trimmed)
}

fn require_title(title: &str) -> Result<String, AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("title is required"));
    }
    Ok(trimmed.to_string())
}

fn normalize_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::TaskManager;
    use crate::clock::ManualClock;
    use crate::model::{RecurringSchedule, TaskEdit, TaskState};
    use crate::storage::{MemoryStore, TaskStore};
    use std::sync::Arc;
    use time::Duration;
    use time::macros::datetime;

    const USER: &str = "user-1";

    fn manager() -> (Arc<ManualClock>, TaskManager<MemoryStore>) {
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 00:00 UTC)));
        let store = MemoryStore::new(clock.clone());
        (clock.clone(), TaskManager::new(store, clock))
    }

    fn active_ids(manager: &TaskManager<MemoryStore>) -> Vec<String> {
        manager
            .list_active(USER)
            .unwrap()
            .into_iter()
            .map(|task| task.id)
            .collect()
    }

    #[test]
    fn create_returns_active_task_without_completion_fields() {
        let (_, manager) = manager();

        let task = manager
            .create(USER, "  Water plants ", Some(" balcony "), RecurringSchedule::Weekly)
            .unwrap();

        assert_eq!(task.title, "Water plants");
        assert_eq!(task.description.as_deref(), Some("balcony"));
        assert_eq!(task.user_id, USER);
        assert_eq!(task.state(), TaskState::Active);
        assert_eq!(task.last_completed_at, None);
        assert_eq!(task.next_due_at, None);
        assert_eq!(task.created_at, datetime!(2024-01-01 00:00 UTC));
    }

    #[test]
    fn create_rejects_blank_title_without_writing() {
        let (_, manager) = manager();

        let err = manager
            .create(USER, "   ", None, RecurringSchedule::Never)
            .unwrap_err();

        assert_eq!(err.code(), "validation_error");
        assert_eq!(manager.store().task_count().unwrap(), 0);
    }

    #[test]
    fn create_stores_blank_description_as_absent() {
        let (_, manager) = manager();

        let task = manager
            .create(USER, "demo", Some("  "), RecurringSchedule::Never)
            .unwrap();

        assert_eq!(task.description, None);
    }

    #[test]
    fn list_active_is_newest_first_and_scoped_to_user() {
        let (clock, manager) = manager();
        let first = manager.create(USER, "first", None, RecurringSchedule::Never).unwrap();
        clock.advance(Duration::minutes(1));
        let second = manager.create(USER, "second", None, RecurringSchedule::Never).unwrap();
        manager
            .create("user-2", "someone else", None, RecurringSchedule::Never)
            .unwrap();

        assert_eq!(active_ids(&manager), vec![second.id, first.id]);
    }

    #[test]
    fn edit_updates_fields_and_updated_at() {
        let (clock, manager) = manager();
        let task = manager
            .create(USER, "demo", Some("old"), RecurringSchedule::Never)
            .unwrap();
        clock.advance(Duration::hours(1));

        let edited = manager
            .edit(
                USER,
                &task.id,
                TaskEdit {
                    title: Some("renamed".to_string()),
                    description: Some(None),
                    recurring_schedule: Some(RecurringSchedule::Daily),
                },
            )
            .unwrap();

        assert_eq!(edited.id, task.id);
        assert_eq!(edited.title, "renamed");
        assert_eq!(edited.description, None);
        assert_eq!(edited.recurring_schedule, RecurringSchedule::Daily);
        assert_eq!(edited.created_at, task.created_at);
        assert_eq!(edited.updated_at, datetime!(2024-01-01 01:00 UTC));
    }

    #[test]
    fn edit_rejects_blank_title() {
        let (_, manager) = manager();
        let task = manager.create(USER, "demo", None, RecurringSchedule::Never).unwrap();

        let err = manager
            .edit(
                USER,
                &task.id,
                TaskEdit {
                    title: Some(" ".to_string()),
                    ..TaskEdit::default()
                },
            )
            .unwrap_err();

        assert_eq!(err.code(), "validation_error");
        assert_eq!(manager.get(USER, &task.id).unwrap().title, "demo");
    }

    #[test]
    fn edit_rejects_empty_edit() {
        let (_, manager) = manager();
        let task = manager.create(USER, "demo", None, RecurringSchedule::Never).unwrap();

        let err = manager.edit(USER, &task.id, TaskEdit::default()).unwrap_err();

        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn edit_of_foreign_or_missing_task_is_not_found() {
        let (_, manager) = manager();
        let task = manager.create(USER, "demo", None, RecurringSchedule::Never).unwrap();
        let edit = TaskEdit {
            title: Some("hijacked".to_string()),
            ..TaskEdit::default()
        };

        let err = manager.edit("user-2", &task.id, edit.clone()).unwrap_err();
        assert_eq!(err.code(), "not_found");
        let err = manager.edit(USER, "task-missing", edit).unwrap_err();
        assert_eq!(err.code(), "not_found");

        assert_eq!(manager.get(USER, &task.id).unwrap().title, "demo");
    }

    #[test]
    fn delete_twice_fails_the_second_time() {
        let (_, manager) = manager();
        let task = manager.create(USER, "demo", None, RecurringSchedule::Never).unwrap();

        let deleted = manager.delete(USER, &task.id).unwrap();
        assert_eq!(deleted.id, task.id);
        assert!(manager.list_active(USER).unwrap().is_empty());

        let err = manager.delete(USER, &task.id).unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn delete_of_foreign_task_leaves_it_in_place() {
        let (_, manager) = manager();
        let task = manager.create(USER, "demo", None, RecurringSchedule::Never).unwrap();

        let err = manager.delete("user-2", &task.id).unwrap_err();

        assert_eq!(err.code(), "not_found");
        assert_eq!(manager.store().task_count().unwrap(), 1);
    }

    #[test]
    fn blank_task_id_is_a_validation_error() {
        let (_, manager) = manager();

        let err = manager.complete(USER, "  ").unwrap_err();

        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn completing_non_recurring_task_is_terminal() {
        let (clock, manager) = manager();
        let task = manager.create(USER, "Pay rent", None, RecurringSchedule::Never).unwrap();
        clock.set(datetime!(2024-01-05 10:00 UTC));

        let completion = manager.complete(USER, &task.id).unwrap();

        assert!(completion.task.is_completed);
        assert_eq!(completion.task.state(), TaskState::Completed);
        assert_eq!(
            completion.task.last_completed_at,
            Some(datetime!(2024-01-05 10:00 UTC))
        );
        assert_eq!(completion.task.next_due_at, None);
        assert_eq!(completion.record.task_id, task.id);
        assert_eq!(completion.record.completed_at, datetime!(2024-01-05 10:00 UTC));
        assert!(active_ids(&manager).is_empty());

        clock.set(datetime!(2030-01-01 00:00 UTC));
        assert!(manager.refresh_active(USER).unwrap().is_empty());

        let err = manager.complete(USER, &task.id).unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert_eq!(manager.store().completion_count().unwrap(), 1);
    }

    #[test]
    fn weekly_task_goes_dormant_and_reappears_after_a_week() {
        let (clock, manager) = manager();
        let task = manager
            .create(USER, "Water plants", None, RecurringSchedule::Weekly)
            .unwrap();
        clock.set(datetime!(2024-01-01 00:00 UTC));

        let completion = manager.complete(USER, &task.id).unwrap();

        assert!(completion.task.is_completed);
        assert_eq!(completion.task.state(), TaskState::Dormant);
        assert_eq!(
            completion.task.last_completed_at,
            Some(datetime!(2024-01-01 00:00 UTC))
        );
        assert_eq!(
            completion.task.next_due_at,
            Some(datetime!(2024-01-08 00:00 UTC))
        );
        assert!(active_ids(&manager).is_empty());

        clock.set(datetime!(2024-01-07 23:59:59 UTC));
        assert!(manager.reactivate_due(USER).unwrap().is_empty());
        assert_eq!(
            manager.get(USER, &task.id).unwrap().state(),
            TaskState::Dormant
        );

        clock.set(datetime!(2024-01-08 00:00:01 UTC));
        let reactivated = manager.reactivate_due(USER).unwrap();

        assert_eq!(reactivated.len(), 1);
        assert_eq!(reactivated[0].id, task.id);
        assert!(!reactivated[0].is_completed);
        assert_eq!(reactivated[0].last_completed_at, None);
        assert_eq!(reactivated[0].next_due_at, None);
        assert_eq!(active_ids(&manager), vec![task.id]);
    }

    #[test]
    fn monthly_task_completed_on_january_31_is_due_march_2() {
        let (clock, manager) = manager();
        let task = manager
            .create(USER, "Pay invoice", None, RecurringSchedule::Monthly)
            .unwrap();
        clock.set(datetime!(2024-01-31 00:00 UTC));

        let completion = manager.complete(USER, &task.id).unwrap();

        assert_eq!(
            completion.task.next_due_at,
            Some(datetime!(2024-03-02 00:00 UTC))
        );
    }

    #[test]
    fn next_due_at_is_after_last_completed_at() {
        for schedule in [
            RecurringSchedule::Daily,
            RecurringSchedule::Weekly,
            RecurringSchedule::Monthly,
        ] {
            let (clock, manager) = manager();
            let task = manager.create(USER, "repeat", None, schedule).unwrap();
            clock.set(datetime!(2024-02-29 23:30 UTC));

            let completed = manager.complete(USER, &task.id).unwrap().task;

            assert!(completed.next_due_at > completed.last_completed_at);
        }
    }

    #[test]
    fn due_task_reactivates_exactly_at_next_due_at() {
        let (clock, manager) = manager();
        let task = manager.create(USER, "Stretch", None, RecurringSchedule::Daily).unwrap();
        manager.complete(USER, &task.id).unwrap();

        clock.set(datetime!(2024-01-02 00:00 UTC));

        assert_eq!(manager.reactivate_due(USER).unwrap().len(), 1);
    }

    #[test]
    fn reactivation_sweep_is_idempotent() {
        let (clock, manager) = manager();
        let task = manager.create(USER, "Stretch", None, RecurringSchedule::Daily).unwrap();
        manager.complete(USER, &task.id).unwrap();
        clock.set(datetime!(2024-01-03 00:00 UTC));

        let first = manager.reactivate_due(USER).unwrap();
        let second = manager.reactivate_due(USER).unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(active_ids(&manager), vec![task.id]);
    }

    #[test]
    fn sweep_only_touches_the_requesting_user() {
        let (clock, manager) = manager();
        let mine = manager.create(USER, "mine", None, RecurringSchedule::Daily).unwrap();
        let theirs = manager
            .create("user-2", "theirs", None, RecurringSchedule::Daily)
            .unwrap();
        manager.complete(USER, &mine.id).unwrap();
        manager.complete("user-2", &theirs.id).unwrap();
        clock.set(datetime!(2024-01-05 00:00 UTC));

        manager.reactivate_due(USER).unwrap();

        assert!(manager.get("user-2", &theirs.id).unwrap().is_completed);
        assert!(!manager.get(USER, &mine.id).unwrap().is_completed);
    }

    #[test]
    fn each_completion_appends_one_record_and_keeps_task_id() {
        let (clock, manager) = manager();
        let task = manager.create(USER, "Stretch", None, RecurringSchedule::Daily).unwrap();

        for day in 0..3 {
            let before = manager.store().completion_count().unwrap();
            let completion = manager.complete(USER, &task.id).unwrap();
            assert_eq!(completion.task.id, task.id);
            assert_eq!(manager.store().completion_count().unwrap(), before + 1);

            clock.advance(Duration::days(1));
            let reactivated = manager.refresh_active(USER).unwrap();
            assert_eq!(reactivated.len(), 1, "cycle {day}");
            assert_eq!(reactivated[0].id, task.id);
        }

        let history = manager.completion_history(USER, &task.id).unwrap();
        let times: Vec<_> = history.iter().map(|record| record.completed_at).collect();
        assert_eq!(
            times,
            vec![
                datetime!(2024-01-03 00:00 UTC),
                datetime!(2024-01-02 00:00 UTC),
                datetime!(2024-01-01 00:00 UTC),
            ]
        );
    }

    #[test]
    fn completing_dormant_task_is_rejected() {
        let (_, manager) = manager();
        let task = manager.create(USER, "Stretch", None, RecurringSchedule::Daily).unwrap();
        manager.complete(USER, &task.id).unwrap();

        let err = manager.complete(USER, &task.id).unwrap_err();

        assert_eq!(err.code(), "validation_error");
        assert_eq!(manager.store().completion_count().unwrap(), 1);
    }

    #[test]
    fn completion_reads_schedule_at_completion_time() {
        let (_, manager) = manager();
        let task = manager.create(USER, "demo", None, RecurringSchedule::Never).unwrap();
        manager
            .edit(
                USER,
                &task.id,
                TaskEdit {
                    recurring_schedule: Some(RecurringSchedule::Weekly),
                    ..TaskEdit::default()
                },
            )
            .unwrap();

        let completion = manager.complete(USER, &task.id).unwrap();

        assert_eq!(
            completion.task.next_due_at,
            Some(datetime!(2024-01-08 00:00 UTC))
        );
    }

    #[test]
    fn complete_missing_task_records_nothing() {
        let (_, manager) = manager();

        let err = manager.complete(USER, "task-missing").unwrap_err();

        assert_eq!(err.code(), "not_found");
        assert_eq!(manager.store().completion_count().unwrap(), 0);
    }

    #[test]
    fn store_outage_surfaces_as_retryable_error() {
        let (_, manager) = manager();
        let task = manager.create(USER, "demo", None, RecurringSchedule::Weekly).unwrap();
        manager.store().set_available(false);

        let err = manager.complete(USER, &task.id).unwrap_err();
        assert_eq!(err.code(), "store_unavailable");
        assert!(err.is_retryable());

        manager.store().set_available(true);
        assert_eq!(manager.store().completion_count().unwrap(), 0);
        assert_eq!(active_ids(&manager), vec![task.id]);
    }

    #[test]
    fn list_completed_includes_dormant_and_terminal_tasks() {
        let (clock, manager) = manager();
        let once = manager.create(USER, "once", None, RecurringSchedule::Never).unwrap();
        let weekly = manager.create(USER, "weekly", None, RecurringSchedule::Weekly).unwrap();
        manager.complete(USER, &once.id).unwrap();
        clock.advance(Duration::hours(1));
        manager.complete(USER, &weekly.id).unwrap();

        let completed = manager.list_completed(USER).unwrap();

        let ids: Vec<&str> = completed.iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids, vec![weekly.id.as_str(), once.id.as_str()]);
        assert_eq!(completed[0].state(), TaskState::Dormant);
        assert_eq!(completed[1].state(), TaskState::Completed);
    }

    #[test]
    fn completion_history_of_foreign_task_is_not_found() {
        let (_, manager) = manager();
        let task = manager.create(USER, "demo", None, RecurringSchedule::Never).unwrap();
        manager.complete(USER, &task.id).unwrap();

        let err = manager.completion_history("user-2", &task.id).unwrap_err();

        assert_eq!(err.code(), "not_found");
        assert_eq!(manager.store().completion_records(&task.id).unwrap().len(), 1);
    }
}
