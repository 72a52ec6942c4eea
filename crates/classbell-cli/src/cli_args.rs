use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use classbell_core::config::{MAX_TIME_OFFSET_SECONDS, RuntimeOverrides};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Top-level CLI entrypoint.
#[derive(Parser, Debug, Clone)]
#[command(name = "classbell", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Supported subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Resolve the schedule once and print what is happening.
    Status(StatusArgs),
    /// Follow the schedule live and print transitions and notifications.
    Watch(WatchArgs),
    /// Show an entry as the editor would with the best-ranked override applied.
    Preview(PreviewArgs),
    /// Manage day swaps stored in config.toml.
    #[command(subcommand)]
    Reschedule(RescheduleCommand),
    /// Check a schedule document for errors.
    Validate(ValidateArgs),
}

/// Flags that layer over config.toml for this invocation only.
#[derive(Debug, Clone, Args, Default)]
pub struct GlobalArgs {
    /// Schedule document path.
    #[arg(long, global = true, value_hint = ValueHint::FilePath, value_name = "PATH")]
    pub schedule: Option<String>,

    /// Shift "now" by this many seconds before resolving.
    #[arg(
        long = "offset-seconds",
        global = true,
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i64)
            .range(-MAX_TIME_OFFSET_SECONDS..=MAX_TIME_OFFSET_SECONDS),
        value_name = "SECONDS"
    )]
    pub offset_seconds: Option<i64>,

    /// Minutes before the next class at which the preparation bell rings.
    #[arg(
        long = "prep-minutes",
        global = true,
        value_parser = clap::value_parser!(u32).range(1..),
        value_name = "MINUTES"
    )]
    pub prep_minutes: Option<u32>,

    /// Mirror logs to stderr in addition to the log file.
    #[arg(long = "log-stderr", global = true, action = ArgAction::SetTrue)]
    pub log_stderr: bool,
}

impl GlobalArgs {
    /// Returns true when no overrides were provided.
    pub fn is_empty(&self) -> bool {
        self.schedule.is_none() && self.offset_seconds.is_none() && self.prep_minutes.is_none()
    }

    /// Convert CLI flags into runtime overrides plus any advisory warnings.
    pub fn to_runtime_overrides(&self) -> (RuntimeOverrides, Vec<String>) {
        let mut overrides = RuntimeOverrides::default();
        let mut warnings = Vec::new();

        if let Some(ref schedule) = self.schedule {
            match parse_optional_field(schedule) {
                Some(path) => overrides.schedule_path = Some(path),
                None => warnings.push(
                    "Empty --schedule value ignored; using the configured schedule.".to_string(),
                ),
            }
        }
        overrides.time_offset_seconds = self.offset_seconds;
        overrides.preparation_minutes = self.prep_minutes;

        (overrides, warnings)
    }
}

#[derive(Debug, Clone, Args, Default)]
pub struct StatusArgs {
    /// Resolve at this local time instead of now (YYYY-MM-DDTHH:MM[:SS]).
    #[arg(long, value_parser = parse_datetime, value_name = "DATETIME")]
    pub at: Option<NaiveDateTime>,

    /// Print the snapshot as JSON.
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    /// Polling interval; polls are collapsed to one refresh per second.
    #[arg(
        long = "poll-ms",
        default_value_t = 50,
        value_parser = clap::value_parser!(u64).range(1..=1000),
        value_name = "MS"
    )]
    pub poll_ms: u64,
}

#[derive(Debug, Clone, Args)]
pub struct PreviewArgs {
    /// Entry id to preview.
    #[arg(long = "entry", value_name = "ID")]
    pub entry_id: String,

    /// Absolute week number.
    #[arg(long, allow_negative_numbers = true)]
    pub week: i64,

    /// ISO weekday (1 = Monday).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=7))]
    pub weekday: u8,
}

/// Reschedule management subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum RescheduleCommand {
    /// Follow another weekday's timetable on a date.
    #[command(alias = "set")]
    Add(RescheduleAddArgs),
    /// Drop the swap for a date.
    #[command(alias = "rm")]
    Remove(RescheduleRemoveArgs),
    /// List configured swaps.
    #[command(alias = "ls")]
    List,
}

#[derive(Debug, Clone, Args)]
pub struct RescheduleAddArgs {
    #[arg(long, value_parser = parse_date, value_name = "YYYY-MM-DD")]
    pub date: NaiveDate,

    /// ISO weekday whose timetable applies (1 = Monday).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=7))]
    pub weekday: u8,
}

#[derive(Debug, Clone, Args)]
pub struct RescheduleRemoveArgs {
    #[arg(long, value_parser = parse_date, value_name = "YYYY-MM-DD")]
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    #[arg(value_hint = ValueHint::FilePath, value_name = "PATH")]
    pub path: PathBuf,
}

fn parse_optional_field(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || matches!(
            trimmed.to_ascii_lowercase().as_str(),
            "none" | "null" | "unset"
        )
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| format!("'{value}' is not a YYYY-MM-DD date"))
}

pub fn parse_datetime(value: &str) -> Result<NaiveDateTime, String> {
    let trimmed = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| format!("'{value}' is not a YYYY-MM-DDTHH:MM[:SS] timestamp"))
}
