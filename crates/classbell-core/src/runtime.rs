//! Tick-driven schedule state machine.
//!
//! # Threading
//!
//! [`ScheduleRuntime`] is `Send` but performs no internal synchronization. A host that
//! calls [`ScheduleRuntime::refresh`] from a timer while another thread reads the exposed
//! state must wrap the runtime in its own lock or marshal reads onto the owning thread.
//! Stopping the engine means no longer calling `refresh`; there is nothing to cancel.

use chrono::{Duration, NaiveDateTime, SubsecRound};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::model::{Entry, EntryType, ScheduleDocument, Subject, Timeline};
use crate::notify::{
    Notification, NotificationContent, NotificationProviders, TransitionContext,
    compose_preparation_bell, compose_transition,
};
use crate::query;
use crate::resolve::{DayContext, RescheduleMap, resolve_day};

pub const DEFAULT_PREPARATION_MINUTES: u32 = 2;

/// What the schedule is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduleStatus {
    /// No timeline is active today.
    #[default]
    Idle,
    Free,
    Preparation,
    Class,
    Activity,
    Break,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Idle => "idle",
            ScheduleStatus::Free => "free",
            ScheduleStatus::Preparation => "preparation",
            ScheduleStatus::Class => "class",
            ScheduleStatus::Activity => "activity",
            ScheduleStatus::Break => "break",
        }
    }
}

impl From<EntryType> for ScheduleStatus {
    fn from(kind: EntryType) -> Self {
        match kind {
            EntryType::Class => ScheduleStatus::Class,
            EntryType::Break => ScheduleStatus::Break,
            EntryType::Activity => ScheduleStatus::Activity,
            EntryType::Free => ScheduleStatus::Free,
            EntryType::Preparation => ScheduleStatus::Preparation,
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted by [`ScheduleRuntime::refresh`], in emission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum RuntimeEvent {
    /// The current entry changed identity.
    StatusChanged(ScheduleStatus),
    /// A routed notification ready for a dispatcher.
    Notify(Notification),
    /// State was recomputed; always the last event of a refresh.
    Updated,
}

pub type EventListener = Arc<dyn Fn(&RuntimeEvent) + Send + Sync + 'static>;

/// Host-tunable inputs applied before resolution.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub time_offset_seconds: i64,
    pub preparation_minutes: u32,
    pub reschedule: RescheduleMap,
    pub notifications_enabled: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            time_offset_seconds: 0,
            preparation_minutes: DEFAULT_PREPARATION_MINUTES,
            reschedule: RescheduleMap::new(),
            notifications_enabled: true,
        }
    }
}

/// Values recomputed on every refresh.
#[derive(Debug, Clone)]
struct TickState {
    wall_clock: Option<NaiveDateTime>,
    now: Option<NaiveDateTime>,
    context: Option<DayContext>,
    day: Option<Timeline>,
    current_entry: Option<Entry>,
    next_entries: Vec<Entry>,
    all_entries: Vec<Entry>,
    remaining: Duration,
    progress: f64,
    status: ScheduleStatus,
    subject: Option<Subject>,
    title: Option<String>,
    subjects: Vec<Subject>,
}

impl TickState {
    fn idle() -> Self {
        Self {
            wall_clock: None,
            now: None,
            context: None,
            day: None,
            current_entry: None,
            next_entries: Vec::new(),
            all_entries: Vec::new(),
            remaining: Duration::zero(),
            progress: 1.0,
            status: ScheduleStatus::Idle,
            subject: None,
            title: None,
            subjects: Vec::new(),
        }
    }
}

pub struct ScheduleRuntime {
    settings: RuntimeSettings,
    providers: NotificationProviders,
    listeners: Vec<EventListener>,
    previous_entry: Option<Entry>,
    last_bell: Option<(String, NaiveDateTime)>,
    state: TickState,
}

impl Default for ScheduleRuntime {
    fn default() -> Self {
        Self::new(RuntimeSettings::default(), NotificationProviders::default())
    }
}

impl ScheduleRuntime {
    pub fn new(settings: RuntimeSettings, providers: NotificationProviders) -> Self {
        Self {
            settings,
            providers,
            listeners: Vec::new(),
            previous_entry: None,
            last_bell: None,
            state: TickState::idle(),
        }
    }

    pub fn add_listener(&mut self, listener: EventListener) {
        self.listeners.push(listener);
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn set_time_offset(&mut self, seconds: i64) {
        self.settings.time_offset_seconds = seconds;
    }

    pub fn set_preparation_minutes(&mut self, minutes: u32) {
        self.settings.preparation_minutes = minutes;
    }

    pub fn set_reschedule(&mut self, reschedule: RescheduleMap) {
        self.settings.reschedule = reschedule;
    }

    pub fn set_notifications_enabled(&mut self, enabled: bool) {
        self.settings.notifications_enabled = enabled;
    }

    pub fn providers(&self) -> &NotificationProviders {
        &self.providers
    }

    pub fn providers_mut(&mut self) -> &mut NotificationProviders {
        &mut self.providers
    }

    /// Recomputes state for `wall_clock` (shifted by the configured offset) and returns
    /// the events raised, after handing each one to every listener.
    ///
    /// Without a document this is a no-op. Repeating a call with the same inputs yields
    /// the same state and never re-fires transition or bell notifications.
    pub fn refresh(
        &mut self,
        document: Option<&ScheduleDocument>,
        wall_clock: NaiveDateTime,
    ) -> Vec<RuntimeEvent> {
        let Some(document) = document else {
            return Vec::new();
        };

        let now = self.shifted(wall_clock);
        let (context, day) = resolve_day(document, now, &self.settings.reschedule);
        self.recompute(document, wall_clock, now, context, day);

        let mut events = Vec::new();
        self.detect_transition(document, &mut events);
        self.ring_preparation_bell(document, now, &mut events);
        events.push(RuntimeEvent::Updated);

        for event in &events {
            for listener in &self.listeners {
                listener(event);
            }
        }
        events
    }

    /// `wall_clock` plus the configured offset, or `wall_clock` itself when the shift
    /// leaves chrono's range.
    fn shifted(&self, wall_clock: NaiveDateTime) -> NaiveDateTime {
        let offset = self.settings.time_offset_seconds;
        match Duration::try_seconds(offset).and_then(|delta| wall_clock.checked_add_signed(delta))
        {
            Some(now) => now,
            None => {
                warn!(offset_seconds = offset, "Time offset out of range; ignoring it");
                wall_clock
            }
        }
    }

    fn recompute(
        &mut self,
        document: &ScheduleDocument,
        wall_clock: NaiveDateTime,
        now: NaiveDateTime,
        context: DayContext,
        day: Option<Timeline>,
    ) {
        let state = &mut self.state;
        state.wall_clock = Some(wall_clock);
        state.now = Some(now);
        state.context = Some(context);
        state.subjects = document.subjects.clone();

        match &day {
            Some(day) => {
                let current = query::current_entry(day, now).cloned();
                state.next_entries = query::next_entries(day, now).into_iter().cloned().collect();
                state.all_entries = query::all_displayable_entries(day)
                    .into_iter()
                    .cloned()
                    .collect();
                state.remaining = query::remaining_time(day, now);
                state.status = query::current_status(day, now).into();
                state.subject = query::current_subject(day, &document.subjects, now).cloned();
                state.title = current
                    .as_ref()
                    .and_then(Entry::display_title)
                    .map(str::to_string);
                state.progress = current
                    .as_ref()
                    .map_or(1.0, |entry| query::progress_fraction(entry, now));
                state.current_entry = current;
            }
            None => {
                state.current_entry = None;
                state.next_entries.clear();
                state.all_entries.clear();
                state.remaining = Duration::zero();
                state.status = ScheduleStatus::Idle;
                state.subject = None;
                state.title = None;
                state.progress = 1.0;
            }
        }
        state.day = day;
    }

    fn detect_transition(&mut self, document: &ScheduleDocument, events: &mut Vec<RuntimeEvent>) {
        let previous_id = self.previous_entry.as_ref().map(|entry| entry.id.as_str());
        let current_id = self.state.current_entry.as_ref().map(|entry| entry.id.as_str());
        if previous_id == current_id {
            return;
        }

        let status = self.state.status;
        info!(
            status = %status,
            from = previous_id.unwrap_or("-"),
            to = current_id.unwrap_or("-"),
            "Schedule status changed"
        );
        events.push(RuntimeEvent::StatusChanged(status));

        let ctx = TransitionContext {
            status,
            current_entry: self.state.current_entry.as_ref(),
            current_subject: self.state.subject.as_ref(),
            next_entry: self.state.next_entries.first(),
            subjects: &document.subjects,
        };
        match compose_transition(&ctx) {
            Ok(content) => {
                if let Some(notification) = self.route(content) {
                    events.push(RuntimeEvent::Notify(notification));
                }
            }
            Err(err) => warn!(error = %err, "Failed to build status notification"),
        }

        self.previous_entry = self.state.current_entry.clone();
    }

    fn ring_preparation_bell(
        &mut self,
        document: &ScheduleDocument,
        now: NaiveDateTime,
        events: &mut Vec<RuntimeEvent>,
    ) {
        if !matches!(
            self.state.status,
            ScheduleStatus::Free | ScheduleStatus::Preparation
        ) {
            return;
        }
        let Some(next) = self.state.next_entries.first() else {
            return;
        };
        let Ok(start) = next.start() else {
            return;
        };

        let second = now.trunc_subsecs(0);
        let lead = Duration::minutes(i64::from(self.settings.preparation_minutes));
        if now.date().and_time(start) - lead != second {
            return;
        }
        let key = (next.id.clone(), second);
        if self.last_bell.as_ref() == Some(&key) {
            return;
        }

        debug!(entry = %next.id, "Preparation bell");
        match compose_preparation_bell(next, &document.subjects) {
            Ok(content) => {
                if let Some(notification) = self.route(content) {
                    events.push(RuntimeEvent::Notify(notification));
                }
            }
            Err(err) => warn!(error = %err, "Failed to build preparation bell"),
        }
        self.last_bell = Some(key);
    }

    fn route(&self, content: NotificationContent) -> Option<Notification> {
        if !self.settings.notifications_enabled {
            return None;
        }
        match self.providers.route(content.category) {
            Some(provider) => Some(content.into_notification(provider)),
            None => {
                debug!(category = ?content.category, "No enabled provider; notification dropped");
                None
            }
        }
    }

    /// Effective ("offset") time used for resolution, if refreshed at least once.
    pub fn now(&self) -> Option<NaiveDateTime> {
        self.state.now
    }

    pub fn wall_clock(&self) -> Option<NaiveDateTime> {
        self.state.wall_clock
    }

    pub fn weekday(&self) -> Option<u8> {
        self.state.context.map(|ctx| ctx.weekday)
    }

    pub fn week(&self) -> Option<i64> {
        self.state.context.map(|ctx| ctx.week)
    }

    pub fn cycle_position(&self) -> Option<i64> {
        self.state.context.map(|ctx| ctx.cycle_position)
    }

    pub fn current_day(&self) -> Option<&Timeline> {
        self.state.day.as_ref()
    }

    pub fn current_entry(&self) -> Option<&Entry> {
        self.state.current_entry.as_ref()
    }

    pub fn previous_entry(&self) -> Option<&Entry> {
        self.previous_entry.as_ref()
    }

    pub fn next_entries(&self) -> &[Entry] {
        &self.state.next_entries
    }

    pub fn all_entries(&self) -> &[Entry] {
        &self.state.all_entries
    }

    pub fn remaining_time(&self) -> Duration {
        self.state.remaining
    }

    pub fn progress(&self) -> f64 {
        self.state.progress
    }

    pub fn status(&self) -> ScheduleStatus {
        self.state.status
    }

    pub fn current_subject(&self) -> Option<&Subject> {
        self.state.subject.as_ref()
    }

    pub fn current_title(&self) -> Option<&str> {
        self.state.title.as_deref()
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.state.subjects
    }

    /// Owned copy of the query surface, or `None` before the first refresh.
    pub fn snapshot(&self) -> Option<RuntimeSnapshot> {
        let state = &self.state;
        let now = state.now?;
        let wall_clock = state.wall_clock?;
        let context = state.context?;
        let remaining_seconds = state.remaining.num_seconds().max(0);
        Some(RuntimeSnapshot {
            wall_clock,
            now,
            time_of_day: now.format("%H:%M:%S").to_string(),
            weekday: context.weekday,
            natural_weekday: context.natural_weekday,
            rescheduled: context.rescheduled,
            week: context.week,
            cycle_position: context.cycle_position,
            cycle_length: context.cycle_length,
            timeline_id: state.day.as_ref().map(|day| day.id.clone()),
            status: state.status,
            current_entry: state.current_entry.clone(),
            current_subject: state.subject.clone(),
            current_title: state.title.clone(),
            next_entries: state.next_entries.clone(),
            entries: state.all_entries.clone(),
            remaining_seconds,
            remaining: format!("{:02}:{:02}", remaining_seconds / 60, remaining_seconds % 60),
            progress: state.progress,
            subjects: state.subjects.clone(),
        })
    }
}

/// Serializable view of everything a presentation layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSnapshot {
    pub wall_clock: NaiveDateTime,
    pub now: NaiveDateTime,
    pub time_of_day: String,
    pub weekday: u8,
    pub natural_weekday: u8,
    pub rescheduled: bool,
    pub week: i64,
    pub cycle_position: i64,
    pub cycle_length: u32,
    pub timeline_id: Option<String>,
    pub status: ScheduleStatus,
    pub current_entry: Option<Entry>,
    pub current_subject: Option<Subject>,
    pub current_title: Option<String>,
    pub next_entries: Vec<Entry>,
    pub entries: Vec<Entry>,
    pub remaining_seconds: i64,
    /// `MM:SS`, minutes not wrapped at 60.
    pub remaining: String,
    pub progress: f64,
    pub subjects: Vec<Subject>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetaInfo;
    use crate::notify::ProviderCategory;
    use crate::week::WeekSpec;
    use chrono::{NaiveDate, NaiveTime};
    use std::sync::Mutex;

    fn entry(id: &str, kind: EntryType, start: &str, end: &str, subject: Option<&str>) -> Entry {
        Entry {
            id: id.to_string(),
            entry_type: kind,
            start_time: start.to_string(),
            end_time: end.to_string(),
            subject_id: subject.map(str::to_string),
            title: None,
        }
    }

    fn document() -> ScheduleDocument {
        ScheduleDocument {
            meta: MetaInfo {
                id: None,
                version: 1,
                max_week_cycle: 1,
                start_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            },
            subjects: vec![Subject {
                id: "math".to_string(),
                name: "Math".to_string(),
                simplified_name: None,
                teacher: Some("Ms. Lee".to_string()),
                icon: None,
                color: None,
                location: None,
                is_local_classroom: true,
            }],
            days: vec![Timeline {
                id: "mon".to_string(),
                entries: vec![
                    entry("prep", EntryType::Preparation, "07:50", "08:00", None),
                    entry("math", EntryType::Class, "08:00", "08:45", Some("math")),
                    entry("recess", EntryType::Break, "08:45", "08:55", None),
                ],
                day_of_week: Some(vec![1]),
                weeks: WeekSpec::All,
                date: None,
            }],
            overrides: Vec::new(),
        }
    }

    fn monday(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn status_changes(events: &[RuntimeEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, RuntimeEvent::StatusChanged(_)))
            .count()
    }

    fn notifications(events: &[RuntimeEvent]) -> Vec<&Notification> {
        events
            .iter()
            .filter_map(|event| match event {
                RuntimeEvent::Notify(notification) => Some(notification),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_refresh_without_document_is_noop() {
        let mut runtime = ScheduleRuntime::default();
        assert!(runtime.refresh(None, monday(8, 0, 0)).is_empty());
        assert!(runtime.snapshot().is_none());
        assert_eq!(runtime.status(), ScheduleStatus::Idle);
        assert_eq!(runtime.progress(), 1.0);
    }

    #[test]
    fn test_transition_fires_once_across_identical_ticks() {
        let doc = document();
        let mut runtime = ScheduleRuntime::default();
        let mut changes = 0;
        for tick in 0..100 {
            let at = monday(8, 10, 0) + Duration::milliseconds(tick * 50);
            changes += status_changes(&runtime.refresh(Some(&doc), at));
        }
        assert_eq!(changes, 1);
        assert_eq!(runtime.status(), ScheduleStatus::Class);
        assert_eq!(runtime.previous_entry().unwrap().id, "math");

        let events = runtime.refresh(Some(&doc), monday(8, 45, 0));
        assert_eq!(events.first(), Some(&RuntimeEvent::StatusChanged(ScheduleStatus::Break)));
        assert_eq!(events.last(), Some(&RuntimeEvent::Updated));
    }

    #[test]
    fn test_class_notification_is_routed() {
        let doc = document();
        let mut runtime = ScheduleRuntime::default();
        let events = runtime.refresh(Some(&doc), monday(8, 0, 0));
        let notices = notifications(&events);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Class Started");
        assert_eq!(notices[0].message.as_deref(), Some("Math — Ms. Lee"));
        assert_eq!(notices[0].provider_id, "com.classbell.schedule.runtime.class");
        assert_eq!(notices[0].duration_ms, 5_000);
    }

    #[test]
    fn test_disabled_notifications_keep_status_events() {
        let doc = document();
        let mut runtime = ScheduleRuntime::default();
        runtime.set_notifications_enabled(false);
        let events = runtime.refresh(Some(&doc), monday(8, 0, 0));
        assert_eq!(status_changes(&events), 1);
        assert!(notifications(&events).is_empty());
    }

    #[test]
    fn test_missing_provider_drops_only_the_notice() {
        let doc = document();
        let mut runtime = ScheduleRuntime::default();
        runtime.providers_mut().unregister(ProviderCategory::Class);
        let events = runtime.refresh(Some(&doc), monday(8, 0, 0));
        assert_eq!(status_changes(&events), 1);
        assert!(notifications(&events).is_empty());
    }

    #[test]
    fn test_preparation_bell_once_per_second() {
        let doc = document();
        let mut runtime = ScheduleRuntime::default();
        runtime.refresh(Some(&doc), monday(7, 57, 59));

        let mut bells = 0;
        for tick in 0..20 {
            let at = monday(7, 58, 0) + Duration::milliseconds(tick * 50);
            bells += notifications(&runtime.refresh(Some(&doc), at))
                .iter()
                .filter(|notice| notice.category == ProviderCategory::PreparationBell)
                .count();
        }
        assert_eq!(bells, 1);

        let events = runtime.refresh(Some(&doc), monday(7, 58, 1));
        assert!(notifications(&events).is_empty());
    }

    #[test]
    fn test_preparation_bell_message() {
        let doc = document();
        let mut runtime = ScheduleRuntime::default();
        runtime.set_preparation_minutes(5);
        runtime.refresh(Some(&doc), monday(7, 54, 0));
        let events = runtime.refresh(Some(&doc), monday(7, 55, 0));
        let bell = notifications(&events)
            .into_iter()
            .find(|notice| notice.category == ProviderCategory::PreparationBell)
            .expect("bell should ring");
        assert_eq!(bell.title, "Preparation Bell");
        assert_eq!(bell.message.as_deref(), Some("Coming up: Math"));
    }

    #[test]
    fn test_bell_suppressed_during_class() {
        let mut doc = document();
        doc.days[0].entries[2] =
            entry("physics", EntryType::Class, "08:47", "09:30", Some("math"));
        let mut runtime = ScheduleRuntime::default();
        runtime.set_preparation_minutes(5);
        runtime.refresh(Some(&doc), monday(8, 41, 0));
        let events = runtime.refresh(Some(&doc), monday(8, 42, 0));
        assert_eq!(runtime.status(), ScheduleStatus::Class);
        assert!(notifications(&events).is_empty());
    }

    #[test]
    fn test_time_offset_shifts_resolution() {
        let doc = document();
        let mut runtime = ScheduleRuntime::default();
        runtime.set_time_offset(600);
        runtime.refresh(Some(&doc), monday(7, 55, 0));
        assert_eq!(runtime.current_entry().unwrap().id, "math");
        assert_eq!(runtime.wall_clock(), Some(monday(7, 55, 0)));
        assert_eq!(runtime.now(), Some(monday(8, 5, 0)));
        assert_eq!(runtime.remaining_time(), Duration::minutes(40));
    }

    #[test]
    fn test_unrepresentable_offset_uses_wall_clock() {
        let doc = document();
        let mut runtime = ScheduleRuntime::default();
        runtime.set_time_offset(9_000_000_000_000_000);
        runtime.refresh(Some(&doc), monday(8, 5, 0));
        assert_eq!(runtime.now(), Some(monday(8, 5, 0)));
        assert_eq!(runtime.current_entry().unwrap().id, "math");

        runtime.set_time_offset(i64::MIN);
        runtime.refresh(Some(&doc), monday(8, 6, 0));
        assert_eq!(runtime.now(), Some(monday(8, 6, 0)));
    }

    #[test]
    fn test_failed_notice_keeps_status_event() {
        let mut doc = document();
        doc.days[0]
            .entries
            .push(entry("lab", EntryType::Class, "09:00", "09:45", Some("chem")));
        let mut runtime = ScheduleRuntime::default();
        runtime.refresh(Some(&doc), monday(8, 44, 0));

        let events = runtime.refresh(Some(&doc), monday(8, 45, 0));
        assert_eq!(
            events,
            vec![
                RuntimeEvent::StatusChanged(ScheduleStatus::Break),
                RuntimeEvent::Updated
            ]
        );
        assert_eq!(runtime.status(), ScheduleStatus::Break);
        assert_eq!(runtime.previous_entry().unwrap().id, "recess");

        runtime.refresh(Some(&doc), monday(8, 57, 0));
        let events = runtime.refresh(Some(&doc), monday(8, 58, 0));
        assert_eq!(runtime.status(), ScheduleStatus::Free);
        assert!(notifications(&events).is_empty());
        assert_eq!(events.last(), Some(&RuntimeEvent::Updated));
    }

    #[test]
    fn test_no_timeline_is_idle() {
        let doc = document();
        let mut runtime = ScheduleRuntime::default();
        runtime.refresh(Some(&doc), monday(8, 0, 0));
        let tuesday = NaiveDate::from_ymd_opt(2024, 4, 2)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        let events = runtime.refresh(Some(&doc), tuesday);
        assert_eq!(runtime.status(), ScheduleStatus::Idle);
        assert!(runtime.current_day().is_none());
        assert_eq!(runtime.progress(), 1.0);
        assert_eq!(events[0], RuntimeEvent::StatusChanged(ScheduleStatus::Idle));
        let notice = notifications(&events)[0];
        assert_eq!(notice.title, "Status Changed");
        assert_eq!(notice.message.as_deref(), Some("Current status: idle"));
    }

    #[test]
    fn test_listeners_see_every_event() {
        let doc = document();
        let seen: Arc<Mutex<Vec<RuntimeEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut runtime = ScheduleRuntime::default();
        runtime.add_listener(Arc::new(move |event: &RuntimeEvent| {
            sink.lock().unwrap().push(event.clone());
        }));
        let events = runtime.refresh(Some(&doc), monday(8, 0, 0));
        assert_eq!(*seen.lock().unwrap(), events);
    }

    #[test]
    fn test_snapshot_reports_query_surface() {
        let doc = document();
        let mut runtime = ScheduleRuntime::default();
        runtime.refresh(Some(&doc), monday(8, 30, 15));
        let snapshot = runtime.snapshot().unwrap();
        assert_eq!(snapshot.time_of_day, "08:30:15");
        assert_eq!(snapshot.weekday, 1);
        assert_eq!(snapshot.week, 1);
        assert_eq!(snapshot.status, ScheduleStatus::Class);
        assert_eq!(snapshot.remaining, "14:45");
        assert_eq!(snapshot.timeline_id.as_deref(), Some("mon"));
        assert_eq!(snapshot.entries.len(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "class");
        assert_eq!(json["remainingSeconds"], 885);
    }
}
