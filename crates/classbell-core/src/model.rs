//! Timetable document model.
//!
//! Field names follow the persisted JSON document (camelCase). Resolved timelines are
//! always owned clones of these values; the engine never writes back into a document.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::week::{WeekSpec, deserialize_weekdays};

/// Schema version this engine understands.
pub const SCHEDULE_SCHEMA_VERSION: u32 = 1;

const TIME_FORMAT: &str = "%H:%M";

/// A subject that class entries reference by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub simplified_name: Option<String>,
    #[serde(default)]
    pub teacher: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// `false` means the subject is taught off-site.
    #[serde(default = "Subject::default_local_classroom")]
    pub is_local_classroom: bool,
}

impl Subject {
    const fn default_local_classroom() -> bool {
        true
    }
}

/// Kind of scheduled block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    Class,
    Break,
    Activity,
    Free,
    Preparation,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Class => "class",
            EntryType::Break => "break",
            EntryType::Activity => "activity",
            EntryType::Free => "free",
            EntryType::Preparation => "preparation",
        }
    }

    /// Class and activity blocks are schedulable content; the rest are fillers.
    pub fn is_displayable(&self) -> bool {
        matches!(self, EntryType::Class | EntryType::Activity)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry's `startTime`/`endTime` could not be parsed as `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("entry '{entry_id}' has malformed {field} '{value}' (expected HH:MM)")]
pub struct TimeFieldError {
    pub entry_id: String,
    pub field: &'static str,
    pub value: String,
}

/// A single scheduled block inside a timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl Entry {
    pub fn start(&self) -> Result<NaiveTime, TimeFieldError> {
        self.parse_field("startTime", &self.start_time)
    }

    pub fn end(&self) -> Result<NaiveTime, TimeFieldError> {
        self.parse_field("endTime", &self.end_time)
    }

    /// Both bounds, or the first parse failure.
    pub fn bounds(&self) -> Result<(NaiveTime, NaiveTime), TimeFieldError> {
        Ok((self.start()?, self.end()?))
    }

    fn parse_field(&self, field: &'static str, value: &str) -> Result<NaiveTime, TimeFieldError> {
        NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).map_err(|_| TimeFieldError {
            entry_id: self.id.clone(),
            field,
            value: value.to_string(),
        })
    }

    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().filter(|title| !title.is_empty())
    }
}

/// A day definition: entries plus the weekday/week conditions it applies under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub id: String,
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default, deserialize_with = "deserialize_weekdays")]
    pub day_of_week: Option<Vec<u8>>,
    #[serde(default)]
    pub weeks: WeekSpec,
    /// Informational calendar date for one-off days; selection does not consult it.
    #[serde(default)]
    pub date: Option<String>,
}

impl Timeline {
    pub fn runs_on(&self, weekday: u8) -> bool {
        self.day_of_week
            .as_ref()
            .is_some_and(|days| days.contains(&weekday))
    }
}

/// Per-entry substitution of subject and/or title. Matched by entry id at resolution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Override {
    pub id: String,
    pub entry_id: String,
    #[serde(default, deserialize_with = "deserialize_weekdays")]
    pub day_of_week: Option<Vec<u8>>,
    #[serde(default)]
    pub weeks: WeekSpec,
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Document metadata anchoring the week rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaInfo {
    #[serde(default)]
    pub id: Option<String>,
    pub version: u32,
    #[serde(default = "MetaInfo::default_week_cycle")]
    pub max_week_cycle: u32,
    /// `YYYY-MM-DD`.
    pub start_date: NaiveDate,
}

impl MetaInfo {
    const fn default_week_cycle() -> u32 {
        1
    }
}

/// Root aggregate handed to the engine on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDocument {
    pub meta: MetaInfo,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub days: Vec<Timeline>,
    #[serde(default)]
    pub overrides: Vec<Override>,
}

impl ScheduleDocument {
    pub fn subject(&self, id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|subject| subject.id == id)
    }

    /// Looks an entry up by id across every timeline.
    pub fn entry(&self, id: &str) -> Option<&Entry> {
        self.days
            .iter()
            .flat_map(|day| day.entries.iter())
            .find(|entry| entry.id == id)
    }

    pub fn week_cycle(&self) -> u32 {
        self.meta.max_week_cycle.max(1)
    }
}
