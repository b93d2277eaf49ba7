mod cli;

use clap::Parser;
use clap::error::ErrorKind;
use cli::{Cli, Command, ConfigOverrideTarget, ListCommand, parse_config_override};
use std::sync::Arc;
use tabled::{Table, Tabled};
use taskcycle_core::config::{self, Config, ConfigOverrides};
use taskcycle_core::error::AppError;
use taskcycle_core::model::{CompletionRecord, Task, TaskEdit, TaskState};
use taskcycle_core::storage::{JsonStore, json_store};
use taskcycle_core::{SystemClock, TaskManager};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

const USER_ENV_VAR: &str = "TASKCYCLE_USER";

#[derive(Tabled)]
struct TaskRow {
    id: String,
    title: String,
    repeat: String,
    status: &'static str,
    #[tabled(rename = "next due")]
    next_due: String,
    created: String,
}

#[derive(Tabled)]
struct CompletionRow {
    id: String,
    #[tabled(rename = "completed at")]
    completed_at: String,
}

fn state_label(state: TaskState) -> &'static str {
    match state {
        TaskState::Active => "active",
        TaskState::Dormant => "dormant",
        TaskState::Completed => "completed",
    }
}

fn format_time(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| value.to_string())
}

fn format_optional_time(value: Option<OffsetDateTime>) -> String {
    value.map(format_time).unwrap_or_else(|| "-".to_string())
}

fn task_row(task: &Task) -> TaskRow {
    TaskRow {
        id: task.id.clone(),
        title: task.title.clone(),
        repeat: task.recurring_schedule.to_string(),
        status: state_label(task.state()),
        next_due: format_optional_time(task.next_due_at),
        created: format_time(task.created_at),
    }
}

fn print_tasks_plain(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    let rows: Vec<TaskRow> = tasks.iter().map(task_row).collect();
    println!("{}", Table::new(rows));
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered =
        serde_json::to_string(value).map_err(|err| AppError::invalid_data(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}

fn print_task_details(task: &Task) {
    println!("{} ({})", task.title, task.id);
    if let Some(description) = task.description.as_deref() {
        println!("  {description}");
    }
    println!("  status: {}", state_label(task.state()));
    println!("  repeat: {}", task.recurring_schedule);
    println!(
        "  last completed: {}",
        format_optional_time(task.last_completed_at)
    );
    println!("  next due: {}", format_optional_time(task.next_due_at));
    println!("  created: {}", format_time(task.created_at));
    println!("  updated: {}", format_time(task.updated_at));
}

fn print_history_plain(records: &[CompletionRecord]) {
    if records.is_empty() {
        println!("No completions.");
        return;
    }
    let rows: Vec<CompletionRow> = records
        .iter()
        .map(|record| CompletionRow {
            id: record.id.clone(),
            completed_at: format_time(record.completed_at),
        })
        .collect();
    println!("{}", Table::new(rows));
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::validation(message)
}

fn config_overrides(raw: &[String]) -> Result<ConfigOverrides, AppError> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry).map_err(AppError::validation)?;
        match parsed.target {
            ConfigOverrideTarget::User => overrides.user = Some(parsed.value),
            ConfigOverrideTarget::LogFilter => overrides.log_filter = Some(parsed.value),
            ConfigOverrideTarget::SweepOnList => {
                overrides.sweep_on_list = Some(parsed.value == "true");
            }
        }
    }
    Ok(overrides)
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_filter()))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn current_user(cli: &Cli, config: &Config) -> Result<String, AppError> {
    let from_env = std::env::var(USER_ENV_VAR).ok();
    [cli.user.as_deref(), from_env.as_deref(), config.user.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|user| !user.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::validation(format!(
                "no current user; pass --user or set {USER_ENV_VAR}"
            ))
        })
}

fn run_command(cli: Cli, config: &Config) -> Result<(), AppError> {
    let user = current_user(&cli, config)?;
    let clock = Arc::new(SystemClock);
    let store = JsonStore::new(json_store::store_path()?, clock.clone());
    let manager = TaskManager::new(store, clock);

    match cli.command {
        Command::Add {
            title,
            description,
            repeat,
        } => {
            let title = match title {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::validation("title is required")),
            };

            let task = manager.create(
                &user,
                &title,
                description.as_deref(),
                repeat.unwrap_or_default(),
            )?;
            if cli.json {
                print_json(&task)?;
            } else {
                println!("Added task: {} ({})", task.title, task.id);
            }
        }
        Command::Edit {
            id,
            title,
            description,
            clear_description,
            repeat,
        } => {
            let description = if clear_description {
                Some(None)
            } else {
                description.map(Some)
            };
            let edit = TaskEdit {
                title,
                description,
                recurring_schedule: repeat,
            };

            let task = manager.edit(&user, &id, edit)?;
            if cli.json {
                print_json(&task)?;
            } else {
                println!("Updated task: {} ({})", task.title, task.id);
            }
        }
        Command::Delete { id } => {
            let task = manager.delete(&user, &id)?;
            if cli.json {
                print_json(&task)?;
            } else {
                println!("Deleted task: {} ({})", task.title, task.id);
            }
        }
        Command::Show { id } => {
            let task = manager.get(&user, &id)?;
            if cli.json {
                print_json(&task)?;
            } else {
                print_task_details(&task);
            }
        }
        Command::Done { id } => {
            let completion = manager.complete(&user, &id)?;
            if cli.json {
                print_json(&serde_json::json!({
                    "task": completion.task,
                    "record": completion.record,
                }))?;
            } else {
                let task = &completion.task;
                match task.next_due_at {
                    Some(next_due_at) => println!(
                        "Completed task: {} ({}), next due {}",
                        task.title,
                        task.id,
                        format_time(next_due_at)
                    ),
                    None => println!("Completed task: {} ({})", task.title, task.id),
                }
            }
        }
        Command::History { id } => {
            let records = manager.completion_history(&user, &id)?;
            if cli.json {
                print_json(&records)?;
            } else {
                print_history_plain(&records);
            }
        }
        Command::Sweep => {
            let tasks = manager.reactivate_due(&user)?;
            if cli.json {
                print_json(&tasks)?;
            } else {
                println!("Reactivated {} task(s)", tasks.len());
                if !tasks.is_empty() {
                    print_tasks_plain(&tasks);
                }
            }
        }
        Command::List { list } => {
            let tasks = match list {
                ListCommand::Active if config.sweep_on_list() => manager.refresh_active(&user)?,
                ListCommand::Active => manager.list_active(&user)?,
                ListCommand::Completed => manager.list_completed(&user)?,
            };
            if cli.json {
                print_json(&tasks)?;
            } else {
                print_tasks_plain(&tasks);
            }
        }
    }

    Ok(())
}

fn run(cli: Cli) -> Result<(), AppError> {
    let overrides = config_overrides(&cli.config_override)?;
    let loaded = config::load_config_with_fallback();
    let config = config::merge_overrides(&loaded.config, &overrides);

    init_logging(&config);
    if let Some(err) = loaded.error {
        tracing::warn!(error = %err, "using default configuration");
    }

    run_command(cli, &config)
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
