//! Loading and persisting schedule documents.

use chrono::{Datelike, NaiveDate};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{MetaInfo, SCHEDULE_SCHEMA_VERSION, ScheduleDocument, Subject};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to access schedule document: {0}")]
    Io(#[from] std::io::Error),
    #[error("schedule document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schedule document is missing meta.version or meta.startDate")]
    MissingMeta,
    #[error("unsupported schedule schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u64, expected: u32 },
    #[error("meta.startDate '{0}' is not a YYYY-MM-DD date")]
    InvalidStartDate(String),
    #[error("meta.maxWeekCycle must be at least 1 (found {0})")]
    InvalidWeekCycle(u32),
}

/// Parses and validates a document from JSON text.
pub fn parse_document(text: &str) -> Result<ScheduleDocument, DocumentError> {
    let raw: Value = serde_json::from_str(text)?;
    let meta = raw
        .get("meta")
        .and_then(Value::as_object)
        .ok_or(DocumentError::MissingMeta)?;
    let version = meta.get("version").ok_or(DocumentError::MissingMeta)?;
    let start_date = meta.get("startDate").ok_or(DocumentError::MissingMeta)?;

    if let Some(found) = version.as_u64() {
        if found != u64::from(SCHEDULE_SCHEMA_VERSION) {
            return Err(DocumentError::UnsupportedVersion {
                found,
                expected: SCHEDULE_SCHEMA_VERSION,
            });
        }
    }
    let start_text = start_date.as_str().unwrap_or_default();
    if NaiveDate::parse_from_str(start_text, "%Y-%m-%d").is_err() {
        return Err(DocumentError::InvalidStartDate(start_date.to_string()));
    }

    let document: ScheduleDocument = serde_json::from_value(raw)?;
    if document.meta.max_week_cycle == 0 {
        return Err(DocumentError::InvalidWeekCycle(0));
    }
    Ok(document)
}

pub fn load_document(path: &Path) -> Result<ScheduleDocument, DocumentError> {
    let text = fs::read_to_string(path)?;
    let document = parse_document(&text)?;
    info!(
        path = %path.display(),
        timelines = document.days.len(),
        overrides = document.overrides.len(),
        "Loaded schedule document"
    );
    Ok(document)
}

/// Writes `document` as pretty-printed JSON, creating parent directories.
pub fn save_document(path: &Path, document: &ScheduleDocument) -> Result<(), DocumentError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(document)?;
    fs::write(path, json)?;
    Ok(())
}

/// Loads `path`, falling back to [`ScheduleDocument::empty`] so the host stays usable.
///
/// The load error, if any, is returned alongside the fallback so it can be surfaced once.
pub fn load_document_or_default(
    path: &Path,
    today: NaiveDate,
) -> (ScheduleDocument, Option<DocumentError>) {
    match load_document(path) {
        Ok(document) => (document, None),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "Falling back to an empty schedule"
            );
            (ScheduleDocument::empty(today), Some(err))
        }
    }
}

impl ScheduleDocument {
    /// A fresh document: two-week rotation starting on 1 September of `today`'s year.
    pub fn empty(today: NaiveDate) -> Self {
        let start_date = NaiveDate::from_ymd_opt(today.year(), 9, 1).unwrap_or(today);
        Self {
            meta: MetaInfo {
                id: None,
                version: SCHEDULE_SCHEMA_VERSION,
                max_week_cycle: 2,
                start_date,
            },
            subjects: default_subjects(),
            days: Vec::new(),
            overrides: Vec::new(),
        }
    }
}

// (id, name, simplified name, icon, color, local classroom)
const DEFAULT_SUBJECTS: &[(&str, &str, &str, &str, &str, bool)] = &[
    ("chinese", "Chinese", "CHN", "ic_fluent_book_20_regular", "#FF5722", true),
    ("math", "Mathematics", "Math", "ic_fluent_ruler_20_regular", "#3F51B5", true),
    ("english", "English", "Eng", "ic_fluent_text_list_abc_uppercase_ltr_20_filled", "#2196F3", true),
    ("politics", "Politics", "Civics", "ic_fluent_book_globe_20_regular", "#9C27B0", true),
    ("history", "History", "Hist", "ic_fluent_clock_20_regular", "#795548", true),
    ("physics", "Physics", "Phys", "ic_fluent_lightbulb_filament_20_regular", "#00BCD4", true),
    ("chemistry", "Chemistry", "Chem", "ic_fluent_hexagon_three_20_regular", "#4CAF50", true),
    ("biology", "Biology", "Bio", "ic_fluent_leaf_three_20_regular", "#8BC34A", true),
    ("geography", "Geography", "Geo", "ic_fluent_earth_20_regular", "#009688", true),
    ("music", "Music", "Mus", "ic_fluent_music_note_2_20_regular", "#E91E63", true),
    ("art", "Art", "Art", "ic_fluent_draw_shape_20_regular", "#F44336", true),
    ("psychology", "Psychology", "Psy", "ic_fluent_brain_sparkle_20_regular", "#FF9800", true),
    ("pe", "Physical Education", "PE", "ic_fluent_person_running_20_regular", "#CDDC39", false),
    ("it", "Information Technology", "IT", "ic_fluent_laptop_20_regular", "#607D8B", true),
    ("generaltech", "General Technology", "GenTech", "ic_fluent_wrench_settings_20_regular", "#FF9800", true),
    ("elective", "Elective", "Elective", "ic_fluent_sign_out_20_regular", "#9E9E9E", false),
    ("selfstudy", "Self Study", "Study", "ic_fluent_notebook_20_regular", "#607D8B", true),
    ("club", "Club", "Club", "ic_fluent_people_team_20_regular", "#673AB7", true),
    ("classmeeting", "Class Meeting", "Meeting", "ic_fluent_chat_20_regular", "#3F51B5", true),
    ("weeklytest", "Weekly Test", "Test", "ic_fluent_clipboard_20_regular", "#FF5722", true),
];

/// Built-in subject catalog for new documents.
pub fn default_subjects() -> Vec<Subject> {
    DEFAULT_SUBJECTS
        .iter()
        .map(|(id, name, short, icon, color, local)| Subject {
            id: (*id).to_string(),
            name: (*name).to_string(),
            simplified_name: Some((*short).to_string()),
            teacher: None,
            icon: Some((*icon).to_string()),
            color: Some((*color).to_string()),
            location: None,
            is_local_classroom: *local,
        })
        .collect()
}
