//! Command-line host for the classbell schedule engine.

pub mod cli_args;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::{Local, NaiveDate, NaiveDateTime, SubsecRound};
use clap::Parser;
use classbell_core::{
    ConfigSection, ConfigStore, FileConfig, LoggingDestination, NotificationProviders,
    RuntimeEvent, RuntimeSnapshot, ScheduleDocument, ScheduleRuntime, apply_runtime_overrides,
    best_override, config_path, init_logging, load_config, load_config_from, load_document,
    load_document_or_default, preview_entry, save_config_to,
};
use cli_args::{Cli, Command, PreviewArgs, RescheduleCommand, StatusArgs, WatchArgs};
use tracing::{debug, info};

/// Parse `std::env::args` and run the selected command.
pub async fn run() -> Result<(), String> {
    run_with(Cli::parse()).await
}

pub async fn run_with(cli: Cli) -> Result<(), String> {
    let destination = if cli.global.log_stderr {
        LoggingDestination::FileAndStderr
    } else {
        LoggingDestination::FileOnly
    };
    if let Err(err) = init_logging(destination) {
        eprintln!("Warning: logging disabled: {err}");
    }

    match cli.command {
        Command::Status(args) => {
            let config = effective_config(&cli.global);
            run_status(&config, &args)
        }
        Command::Watch(args) => {
            let config = effective_config(&cli.global);
            run_watch(&config, &args).await
        }
        Command::Preview(args) => {
            let config = effective_config(&cli.global);
            run_preview(&config, &args)
        }
        Command::Reschedule(cmd) => {
            if !cli.global.is_empty() {
                return Err(
                    "Schedule flags cannot be combined with reschedule management commands."
                        .into(),
                );
            }
            handle_reschedule_command(cmd, &config_path(), Local::now().date_naive())
        }
        Command::Validate(args) => run_validate(args.path),
    }
}

/// Loads config.toml and layers the CLI flags over it, printing warnings to stderr.
fn effective_config(global: &cli_args::GlobalArgs) -> FileConfig {
    let load = load_config();
    let mut warnings = load.warnings;
    let mut config = load.config;

    let (overrides, mut override_warnings) = global.to_runtime_overrides();
    warnings.append(&mut override_warnings);
    apply_runtime_overrides(&mut config, &overrides, &mut warnings);

    for warning in warnings {
        eprintln!("Warning: {warning}");
    }
    config
}

/// Runtime wired to the configured settings and provider toggles.
fn build_runtime(config: &FileConfig) -> ScheduleRuntime {
    let mut providers = NotificationProviders::default();
    for unknown in config.notifications.apply_to(&mut providers) {
        eprintln!("Warning: notification provider '{unknown}' is not registered.");
    }
    ScheduleRuntime::new(config.runtime_settings(), providers)
}

fn load_active_document(config: &FileConfig) -> ScheduleDocument {
    let path = config.schedule.schedule_path();
    let (document, err) = load_document_or_default(&path, Local::now().date_naive());
    if let Some(err) = err {
        eprintln!(
            "Warning: could not load {}: {err}. Using an empty schedule.",
            path.display()
        );
    }
    document
}

fn run_status(config: &FileConfig, args: &StatusArgs) -> Result<(), String> {
    let document = load_active_document(config);
    let mut runtime = build_runtime(config);
    let wall_clock = args.at.unwrap_or_else(|| Local::now().naive_local());
    runtime.refresh(Some(&document), wall_clock);

    let snapshot = runtime
        .snapshot()
        .ok_or_else(|| "Schedule state was not computed.".to_string())?;
    if args.json {
        let json = serde_json::to_string_pretty(&snapshot).map_err(|err| err.to_string())?;
        println!("{json}");
    } else {
        print!("{}", render_snapshot(&snapshot));
    }
    Ok(())
}

/// Human-readable multi-line status report.
pub fn render_snapshot(snapshot: &RuntimeSnapshot) -> String {
    let mut out = String::new();
    let weekday = if snapshot.rescheduled {
        format!(
            "{} (rescheduled from {})",
            snapshot.weekday, snapshot.natural_weekday
        )
    } else {
        snapshot.weekday.to_string()
    };
    out.push_str(&format!(
        "Time:      {}  weekday {}  week {} ({}/{})\n",
        snapshot.time_of_day, weekday, snapshot.week, snapshot.cycle_position, snapshot.cycle_length
    ));
    out.push_str(&format!(
        "Timeline:  {}\n",
        snapshot.timeline_id.as_deref().unwrap_or("(none)")
    ));
    out.push_str(&format!("Status:    {}\n", snapshot.status));

    if let Some(entry) = &snapshot.current_entry {
        let label = snapshot
            .current_title
            .clone()
            .or_else(|| snapshot.current_subject.as_ref().map(|s| s.name.clone()))
            .unwrap_or_else(|| entry.entry_type.to_string());
        out.push_str(&format!(
            "Current:   {label} {}-{} ({:.0}%)\n",
            entry.start_time,
            entry.end_time,
            snapshot.progress * 100.0
        ));
    }
    out.push_str(&format!("Remaining: {}\n", snapshot.remaining));

    if !snapshot.next_entries.is_empty() {
        out.push_str("Next:\n");
        for entry in &snapshot.next_entries {
            let name = entry
                .display_title()
                .map(str::to_string)
                .or_else(|| {
                    entry.subject_id.as_deref().and_then(|id| {
                        snapshot
                            .subjects
                            .iter()
                            .find(|subject| subject.id == id)
                            .map(|subject| subject.name.clone())
                    })
                })
                .unwrap_or_else(|| entry.entry_type.to_string());
            out.push_str(&format!("  {} {name}\n", entry.start_time));
        }
    }
    out
}

async fn run_watch(config: &FileConfig, args: &WatchArgs) -> Result<(), String> {
    let document = load_active_document(config);
    let mut runtime = build_runtime(config);
    let mut ticker = tokio::time::interval(StdDuration::from_millis(args.poll_ms));
    let mut last_second: Option<NaiveDateTime> = None;

    info!(poll_ms = args.poll_ms, "Watching schedule");
    println!("Watching {} (Ctrl+C to stop)", config.schedule.schedule_path().display());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.map_err(|err| format!("Failed to listen for Ctrl+C: {err}"))?;
                debug!("Stopping watch loop");
                return Ok(());
            }
            _ = ticker.tick() => {
                let wall_clock = Local::now().naive_local();
                let second = wall_clock.trunc_subsecs(0);
                if last_second == Some(second) {
                    continue;
                }
                last_second = Some(second);
                for event in runtime.refresh(Some(&document), second) {
                    if let Some(line) = render_event(&event, second) {
                        println!("{line}");
                    }
                }
            }
        }
    }
}

/// One line per transition or notification; `Updated` is silent.
pub fn render_event(event: &RuntimeEvent, at: NaiveDateTime) -> Option<String> {
    let stamp = at.format("%H:%M:%S");
    match event {
        RuntimeEvent::StatusChanged(status) => Some(format!("[{stamp}] status -> {status}")),
        RuntimeEvent::Notify(notification) => Some(match &notification.message {
            Some(message) => format!("[{stamp}] {}: {message}", notification.title),
            None => format!("[{stamp}] {}", notification.title),
        }),
        RuntimeEvent::Updated => None,
    }
}

fn run_preview(config: &FileConfig, args: &PreviewArgs) -> Result<(), String> {
    let path = config.schedule.schedule_path();
    let document = load_document(&path).map_err(|err| format!("{}: {err}", path.display()))?;
    let entry = preview_entry(&document, &args.entry_id, args.week, args.weekday)
        .ok_or_else(|| format!("Entry '{}' not found.", args.entry_id))?;
    match best_override(&document, &args.entry_id, args.week, args.weekday) {
        Some(rule) => println!("Override '{}' applies.", rule.id),
        None => println!("No override applies."),
    }
    let json = serde_json::to_string_pretty(&entry).map_err(|err| err.to_string())?;
    println!("{json}");
    Ok(())
}

/// Reads, edits and rewrites the config at `path`. A config file that exists but could not
/// be loaded is left untouched.
pub fn handle_reschedule_command(
    command: RescheduleCommand,
    path: &Path,
    today: NaiveDate,
) -> Result<(), String> {
    let load = load_config_from(path, today);
    let refuse_save = load.would_discard_file();
    for warning in &load.warnings {
        eprintln!("Warning: {warning}");
    }
    let save = |config: &FileConfig| -> Result<(), String> {
        if refuse_save {
            return Err(format!(
                "Refusing to overwrite {} because it could not be loaded. Fix or remove it first.",
                path.display()
            ));
        }
        save_config_to(path, config).map_err(|err| err.to_string())
    };
    let mut store = ConfigStore::new(load.config);
    store.subscribe(
        ConfigSection::Schedule,
        std::sync::Arc::new(|config: &FileConfig| {
            debug!(
                entries = config.schedule.reschedule_day.len(),
                "Reschedule map changed"
            );
        }),
    );

    match command {
        RescheduleCommand::Add(args) => {
            let key = args.date.format("%Y-%m-%d").to_string();
            store.update_schedule(|schedule| {
                schedule.reschedule_day.insert(key.clone(), args.weekday);
            });
            save(store.config())?;
            println!("{key} now follows weekday {}", args.weekday);
            Ok(())
        }
        RescheduleCommand::Remove(args) => {
            let key = args.date.format("%Y-%m-%d").to_string();
            let removed = store.update_schedule(|schedule| {
                schedule.reschedule_day.remove(&key);
            });
            if !removed {
                return Err(format!("No reschedule entry for {key}."));
            }
            save(store.config())?;
            println!("Removed reschedule entry for {key}");
            Ok(())
        }
        RescheduleCommand::List => {
            let days = &store.config().schedule.reschedule_day;
            if days.is_empty() {
                println!("No reschedule entries.");
            }
            for (date, weekday) in days {
                println!("{date} -> weekday {weekday}");
            }
            Ok(())
        }
    }
}

fn run_validate(path: PathBuf) -> Result<(), String> {
    let document = load_document(&path).map_err(|err| format!("{}: {err}", path.display()))?;
    let issues = document_issues(&document);
    println!(
        "{}: {} subjects, {} timelines, {} overrides",
        path.display(),
        document.subjects.len(),
        document.days.len(),
        document.overrides.len()
    );
    for issue in &issues {
        println!("  - {issue}");
    }
    if issues.is_empty() {
        println!("OK");
    }
    Ok(())
}

/// Problems the engine tolerates at runtime but an author should fix.
pub fn document_issues(document: &ScheduleDocument) -> Vec<String> {
    let mut issues = Vec::new();
    let subject_ids: HashSet<&str> = document.subjects.iter().map(|s| s.id.as_str()).collect();
    let mut entry_ids = HashSet::new();

    for day in &document.days {
        if day.day_of_week.as_ref().is_none_or(|days| days.is_empty()) {
            issues.push(format!("timeline '{}' has no dayOfWeek and never runs", day.id));
        }
        let mut spans = Vec::new();
        for entry in &day.entries {
            if !entry_ids.insert(entry.id.as_str()) {
                issues.push(format!("entry id '{}' is used more than once", entry.id));
            }
            match entry.bounds() {
                Ok((start, end)) if end <= start => issues.push(format!(
                    "entry '{}' ends at or before it starts",
                    entry.id
                )),
                Ok(bounds) => spans.push((bounds, entry.id.as_str())),
                Err(err) => issues.push(err.to_string()),
            }
            if let Some(subject) = entry.subject_id.as_deref() {
                if !subject.is_empty() && !subject_ids.contains(subject) {
                    issues.push(format!(
                        "entry '{}' references unknown subject '{subject}'",
                        entry.id
                    ));
                }
            }
        }
        spans.sort();
        for pair in spans.windows(2) {
            let ((_, first_end), first_id) = pair[0];
            let ((second_start, _), second_id) = pair[1];
            if second_start < first_end {
                issues.push(format!(
                    "entries '{first_id}' and '{second_id}' overlap in timeline '{}'",
                    day.id
                ));
            }
        }
    }

    for rule in &document.overrides {
        if !entry_ids.contains(rule.entry_id.as_str()) {
            issues.push(format!(
                "override '{}' targets unknown entry '{}'",
                rule.id, rule.entry_id
            ));
        }
    }
    issues
}
