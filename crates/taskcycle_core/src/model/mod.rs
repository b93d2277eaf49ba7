mod recurrence;
mod task;

pub use recurrence::RecurringSchedule;
pub use task::{CompletionRecord, NewCompletion, NewTask, Task, TaskEdit, TaskPatch, TaskState};
