//! Recurrence arithmetic.
//!
//! Monthly steps keep the day of month and let any excess over the target
//! month's length spill forward, so Jan 31 advances to Mar 2 in a leap year
//! and Mar 3 otherwise.

use crate::error::AppError;
use crate::model::RecurringSchedule;
use time::{Date, Duration, Month, OffsetDateTime};

/// Returns the instant a task completed at `from` becomes due again.
pub fn advance(from: OffsetDateTime, schedule: RecurringSchedule) -> Result<OffsetDateTime, AppError> {
    match schedule {
        RecurringSchedule::Daily => add_days(from, 1),
        RecurringSchedule::Weekly => add_days(from, 7),
        RecurringSchedule::Monthly => add_month(from),
        RecurringSchedule::Never => {
            tracing::error!(%from, "advance called for a non-recurring schedule");
            Err(AppError::invalid_schedule(
                "schedule 'none' has no next occurrence",
            ))
        }
    }
}

fn add_days(from: OffsetDateTime, days: i64) -> Result<OffsetDateTime, AppError> {
    from.checked_add(Duration::days(days))
        .ok_or_else(|| AppError::invalid_data("next due date is out of range"))
}

fn add_month(from: OffsetDateTime) -> Result<OffsetDateTime, AppError> {
    let date = from.date();
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        other => (date.year(), other.next()),
    };

    let first_of_month = Date::from_calendar_date(year, month, 1)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    let target = first_of_month
        .checked_add(Duration::days(i64::from(date.day()) - 1))
        .ok_or_else(|| AppError::invalid_data("next due date is out of range"))?;

    Ok(from.replace_date(target))
}
