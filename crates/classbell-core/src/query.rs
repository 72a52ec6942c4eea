//! Pure queries over a resolved timeline at a point in time.
//!
//! Entries whose times fail to parse are skipped by every time-dependent query.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::model::{Entry, EntryType, Subject, Timeline};

fn parsed_bounds(entry: &Entry) -> Option<(NaiveTime, NaiveTime)> {
    match entry.bounds() {
        Ok(bounds) => Some(bounds),
        Err(err) => {
            debug!(error = %err, "Skipping entry with malformed time");
            None
        }
    }
}

fn parsed_start(entry: &Entry) -> Option<NaiveTime> {
    match entry.start() {
        Ok(start) => Some(start),
        Err(err) => {
            debug!(error = %err, "Skipping entry with malformed time");
            None
        }
    }
}

/// First entry whose `[start, end)` interval contains the time of day of `now`.
pub fn current_entry(day: &Timeline, now: NaiveDateTime) -> Option<&Entry> {
    let time = now.time();
    day.entries.iter().find(|entry| {
        parsed_bounds(entry).is_some_and(|(start, end)| start <= time && time < end)
    })
}

/// Class and activity entries, ascending by start time.
///
/// Entries with an unparsable start are kept and sorted last.
pub fn all_displayable_entries(day: &Timeline) -> Vec<&Entry> {
    let mut entries: Vec<&Entry> = day
        .entries
        .iter()
        .filter(|entry| entry.entry_type.is_displayable())
        .collect();
    entries.sort_by_key(|entry| match entry.start() {
        Ok(start) => (false, start),
        Err(_) => (true, NaiveTime::MIN),
    });
    entries
}

/// Class and activity entries starting strictly after `now`, ascending.
pub fn next_entries(day: &Timeline, now: NaiveDateTime) -> Vec<&Entry> {
    let time = now.time();
    let mut upcoming: Vec<(NaiveTime, &Entry)> = day
        .entries
        .iter()
        .filter(|entry| entry.entry_type.is_displayable())
        .filter_map(|entry| parsed_start(entry).map(|start| (start, entry)))
        .filter(|(start, _)| *start > time)
        .collect();
    upcoming.sort_by_key(|(start, _)| *start);
    upcoming.into_iter().map(|(_, entry)| entry).collect()
}

/// Time left in the current entry, else until the next entry starts, else zero.
pub fn remaining_time(day: &Timeline, now: NaiveDateTime) -> Duration {
    let target = match current_entry(day, now) {
        Some(entry) => entry.end().ok(),
        None => next_entries(day, now)
            .first()
            .and_then(|entry| entry.start().ok()),
    };
    match target {
        Some(time) => (now.date().and_time(time) - now).max(Duration::zero()),
        None => Duration::zero(),
    }
}

/// Type of the current entry, or [`EntryType::Free`] between entries.
pub fn current_status(day: &Timeline, now: NaiveDateTime) -> EntryType {
    current_entry(day, now)
        .map(|entry| entry.entry_type)
        .unwrap_or(EntryType::Free)
}

/// Subject referenced by the current entry, if it names one that exists.
pub fn current_subject<'a>(
    day: &Timeline,
    subjects: &'a [Subject],
    now: NaiveDateTime,
) -> Option<&'a Subject> {
    let subject_id = current_entry(day, now)?.subject_id.as_deref()?;
    find_subject(subjects, subject_id)
}

pub fn find_subject<'a>(subjects: &'a [Subject], subject_id: &str) -> Option<&'a Subject> {
    if subject_id.is_empty() {
        return None;
    }
    subjects.iter().find(|subject| subject.id == subject_id)
}

/// Elapsed fraction of `entry` at `now`, clamped to `[0, 1]`.
///
/// Unparsable or zero-length entries count as fully elapsed.
pub fn progress_fraction(entry: &Entry, now: NaiveDateTime) -> f64 {
    let Ok((start, end)) = entry.bounds() else {
        return 1.0;
    };
    let start = now.date().and_time(start);
    let end = now.date().and_time(end);
    let total = (end - start).num_milliseconds();
    if total <= 0 || now >= end {
        return 1.0;
    }
    if now <= start {
        return 0.0;
    }
    let elapsed = (now - start).num_milliseconds();
    (elapsed as f64 / total as f64).clamp(0.0, 1.0)
}
