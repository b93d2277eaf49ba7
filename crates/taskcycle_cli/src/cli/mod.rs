use clap::{Parser, Subcommand};
use taskcycle_core::model::RecurringSchedule;

#[derive(Parser, Debug)]
#[command(name = "taskcycle", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Act as this user instead of the configured one
    #[arg(long, global = true, value_name = "USER")]
    pub user: Option<String>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    ///
    /// Example: taskcycle add "Water plants" --repeat weekly
    Add {
        title: Option<String>,
        #[arg(short = 'd', long)]
        description: Option<String>,
        /// daily, weekly, monthly or none
        #[arg(short = 'r', long = "repeat", value_name = "SCHEDULE", value_parser = parse_schedule)]
        repeat: Option<RecurringSchedule>,
    },
    /// Edit a task's title, description or schedule
    ///
    /// Example: taskcycle edit task-1 --title "Water all plants" --repeat daily
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short = 'd', long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(short = 'r', long = "repeat", value_name = "SCHEDULE", value_parser = parse_schedule)]
        repeat: Option<RecurringSchedule>,
    },
    /// Delete a task
    ///
    /// Example: taskcycle delete task-1
    Delete { id: String },
    /// Show details of a task
    ///
    /// Example: taskcycle show task-1
    Show { id: String },
    /// Mark a task as completed
    ///
    /// Example: taskcycle done task-1
    Done { id: String },
    /// Show the completion history of a task
    ///
    /// Example: taskcycle history task-1
    History { id: String },
    /// Bring back recurring tasks whose next due time has passed
    ///
    /// Example: taskcycle sweep
    Sweep,
    /// List tasks
    ///
    /// Example: taskcycle list active
    /// Example: taskcycle list completed
    List {
        #[command(subcommand)]
        list: ListCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// List tasks that are not completed
    Active,
    /// List completed and dormant tasks
    Completed,
}

fn parse_schedule(raw: &str) -> Result<RecurringSchedule, String> {
    raw.parse::<RecurringSchedule>()
        .map_err(|err| err.message().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    User,
    LogFilter,
    SweepOnList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let field =
        canonicalize_flag_name(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match field.as_str() {
        "user" => ConfigOverrideTarget::User,
        "log_filter" | "log" => ConfigOverrideTarget::LogFilter,
        "sweep_on_list" => {
            if value.parse::<bool>().is_err() {
                return Err(format!("sweep_on_list expects true or false, got '{value}'"));
            }
            ConfigOverrideTarget::SweepOnList
        }
        other => return Err(format!("unknown config field '{other}'")),
    };

    Ok(ParsedConfigOverride { target, value })
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
