//! Picks the timeline that applies at a given instant and applies entry overrides to it.
//!
//! Resolution order: reschedule map, then natural weekday, then week membership. The
//! first matching timeline in document order wins. Overrides are applied to an owned copy.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::debug;

use crate::model::{Entry, Override, ScheduleDocument, Timeline};
use crate::week::{WeekSpec, cycle_position, week_number};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Ad-hoc day swaps: on `date`, follow the timetable of the mapped ISO weekday.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescheduleMap {
    days: BTreeMap<NaiveDate, u8>,
}

impl RescheduleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from `YYYY-MM-DD -> weekday` pairs, reporting entries it had to drop.
    pub fn from_raw(raw: &BTreeMap<String, u8>) -> (Self, Vec<String>) {
        let mut map = Self::new();
        let mut warnings = Vec::new();
        for (key, weekday) in raw {
            let Ok(date) = NaiveDate::parse_from_str(key.trim(), DATE_FORMAT) else {
                warnings.push(format!(
                    "Ignoring reschedule entry '{key}': date must be YYYY-MM-DD."
                ));
                continue;
            };
            if !(1..=7).contains(weekday) {
                warnings.push(format!(
                    "Ignoring reschedule entry '{key}': weekday {weekday} is outside 1..=7."
                ));
                continue;
            }
            map.days.insert(date, *weekday);
        }
        (map, warnings)
    }

    pub fn insert(&mut self, date: NaiveDate, weekday: u8) -> Option<u8> {
        self.days.insert(date, weekday)
    }

    pub fn remove(&mut self, date: NaiveDate) -> Option<u8> {
        self.days.remove(&date)
    }

    pub fn get(&self, date: NaiveDate) -> Option<u8> {
        self.days.get(&date).copied()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, u8)> + '_ {
        self.days.iter().map(|(date, weekday)| (*date, *weekday))
    }

    /// Drops swaps dated before `today`, returning how many were removed.
    pub fn prune_before(&mut self, today: NaiveDate) -> usize {
        let before = self.days.len();
        self.days.retain(|date, _| *date >= today);
        before - self.days.len()
    }

    pub fn to_raw(&self) -> BTreeMap<String, u8> {
        self.days
            .iter()
            .map(|(date, weekday)| (date.format(DATE_FORMAT).to_string(), *weekday))
            .collect()
    }
}

/// Calendar facts every resolution step shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayContext {
    /// ISO weekday after applying the reschedule map.
    pub weekday: u8,
    /// ISO weekday of the calendar date itself.
    pub natural_weekday: u8,
    pub rescheduled: bool,
    pub week: i64,
    pub cycle_length: u32,
    pub cycle_position: i64,
}

impl DayContext {
    pub fn new(document: &ScheduleDocument, now: NaiveDateTime, reschedule: &RescheduleMap) -> Self {
        let date = now.date();
        let natural_weekday = iso_weekday(date);
        let mapped = reschedule.get(date);
        let week = week_number(document.meta.start_date, date);
        let cycle_length = document.week_cycle();
        Self {
            weekday: mapped.unwrap_or(natural_weekday),
            natural_weekday,
            rescheduled: mapped.is_some(),
            week,
            cycle_length,
            cycle_position: cycle_position(week, cycle_length),
        }
    }
}

pub fn iso_weekday(date: NaiveDate) -> u8 {
    // number_from_monday is always within 1..=7
    date.weekday().number_from_monday() as u8
}

/// Returns an owned copy of the first timeline active in `context`, if any.
pub fn select_day(document: &ScheduleDocument, context: &DayContext) -> Option<Timeline> {
    let selected = document.days.iter().find(|day| {
        day.runs_on(context.weekday) && day.weeks.contains(context.week, context.cycle_length)
    })?;
    debug!(
        timeline = %selected.id,
        weekday = context.weekday,
        week = context.week,
        "Selected timeline"
    );
    Some(selected.clone())
}

/// Whether `rule` applies on `context`'s weekday and week.
///
/// An empty weekday list, an empty explicit week list or a week of 0 places no restriction.
pub fn override_applies(rule: &Override, context: &DayContext) -> bool {
    let day_ok = match rule.day_of_week.as_deref() {
        None | Some([]) => true,
        Some(days) => days.contains(&context.weekday),
    };
    let week_ok = match &rule.weeks {
        WeekSpec::Explicit(weeks) if weeks.is_empty() => true,
        WeekSpec::Cyclic(0) => true,
        spec => spec.contains(context.week, context.cycle_length),
    };
    day_ok && week_ok
}

/// Applies every matching override to `day` in document order; later writes win per field.
///
/// Only non-empty `subjectId`/`title` values are written. Times and entry types are never
/// touched.
pub fn apply_overrides(day: &mut Timeline, overrides: &[Override], context: &DayContext) {
    for entry in &mut day.entries {
        for rule in overrides.iter().filter(|rule| rule.entry_id == entry.id) {
            if !override_applies(rule, context) {
                continue;
            }
            if let Some(subject_id) = rule.subject_id.as_ref().filter(|id| !id.is_empty()) {
                entry.subject_id = Some(subject_id.clone());
            }
            if let Some(title) = rule.title.as_ref().filter(|title| !title.is_empty()) {
                entry.title = Some(title.clone());
            }
        }
    }
}

/// Selects the active timeline for `now` and applies overrides to the copy.
pub fn resolve_day(
    document: &ScheduleDocument,
    now: NaiveDateTime,
    reschedule: &RescheduleMap,
) -> (DayContext, Option<Timeline>) {
    let context = DayContext::new(document, now, reschedule);
    let day = select_day(document, &context).map(|mut day| {
        apply_overrides(&mut day, &document.overrides, &context);
        day
    });
    (context, day)
}

/// Editor preview: the single best override for `entry_id` on `week`/`weekday`.
///
/// Ranking: explicit week list (3) > cyclic week (2) > unrestricted (1). Ties keep the
/// first encountered rule. Unlike [`apply_overrides`] this never merges several rules.
pub fn best_override<'a>(
    document: &'a ScheduleDocument,
    entry_id: &str,
    week: i64,
    weekday: u8,
) -> Option<&'a Override> {
    let cycle_length = document.week_cycle();
    let mut best: Option<(u8, &Override)> = None;
    for rule in document.overrides.iter().filter(|rule| rule.entry_id == entry_id) {
        let day_ok = match rule.day_of_week.as_deref() {
            None | Some([]) => true,
            Some(days) => days.contains(&weekday),
        };
        if !day_ok {
            continue;
        }
        let priority = match &rule.weeks {
            WeekSpec::Explicit(weeks) if weeks.contains(&week) => 3,
            spec @ WeekSpec::Cyclic(_) if spec.contains(week, cycle_length) => 2,
            WeekSpec::All => 1,
            _ => continue,
        };
        if best.is_none_or(|(current, _)| priority > current) {
            best = Some((priority, rule));
        }
    }
    best.map(|(_, rule)| rule)
}

/// Copy of the entry as it would appear with the best-ranked override applied.
pub fn preview_entry(
    document: &ScheduleDocument,
    entry_id: &str,
    week: i64,
    weekday: u8,
) -> Option<Entry> {
    let mut entry = document.entry(entry_id)?.clone();
    if let Some(rule) = best_override(document, entry_id, week, weekday) {
        if let Some(subject_id) = rule.subject_id.as_ref().filter(|id| !id.is_empty()) {
            entry.subject_id = Some(subject_id.clone());
        }
        if let Some(title) = rule.title.as_ref().filter(|title| !title.is_empty()) {
            entry.title = Some(title.clone());
        }
    }
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntryType, MetaInfo, SCHEDULE_SCHEMA_VERSION};

    fn entry(id: &str, start: &str, end: &str, subject: Option<&str>) -> Entry {
        Entry {
            id: id.to_string(),
            entry_type: EntryType::Class,
            start_time: start.to_string(),
            end_time: end.to_string(),
            subject_id: subject.map(str::to_string),
            title: None,
        }
    }

    fn timeline(id: &str, days: &[u8], weeks: WeekSpec, entries: Vec<Entry>) -> Timeline {
        Timeline {
            id: id.to_string(),
            entries,
            day_of_week: Some(days.to_vec()),
            weeks,
            date: None,
        }
    }

    fn rule(id: &str, entry_id: &str, weeks: WeekSpec, subject: Option<&str>) -> Override {
        Override {
            id: id.to_string(),
            entry_id: entry_id.to_string(),
            day_of_week: None,
            weeks,
            subject_id: subject.map(str::to_string),
            title: None,
        }
    }

    fn document() -> ScheduleDocument {
        ScheduleDocument {
            meta: MetaInfo {
                id: None,
                version: SCHEDULE_SCHEMA_VERSION,
                max_week_cycle: 2,
                // A Monday
                start_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            },
            subjects: Vec::new(),
            days: vec![
                timeline(
                    "wed",
                    &[3],
                    WeekSpec::All,
                    vec![entry("wed-1", "08:00", "08:45", Some("math"))],
                ),
                timeline(
                    "thu",
                    &[4],
                    WeekSpec::All,
                    vec![entry("thu-1", "08:00", "08:45", Some("physics"))],
                ),
            ],
            overrides: Vec::new(),
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_reschedule_map_replaces_weekday() {
        let doc = document();
        let mut reschedule = RescheduleMap::new();
        reschedule.insert(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), 4);

        // 2024-05-01 is a Wednesday
        let (context, day) = resolve_day(&doc, at(2024, 5, 1, 8, 0), &reschedule);
        assert_eq!(context.natural_weekday, 3);
        assert_eq!(context.weekday, 4);
        assert!(context.rescheduled);
        assert_eq!(day.unwrap().id, "thu");

        let (_, day) = resolve_day(&doc, at(2024, 5, 1, 8, 0), &RescheduleMap::new());
        assert_eq!(day.unwrap().id, "wed");
    }

    #[test]
    fn test_first_matching_timeline_wins() {
        let mut doc = document();
        doc.days.push(timeline("wed-dup", &[3], WeekSpec::All, Vec::new()));
        let (_, day) = resolve_day(&doc, at(2024, 5, 1, 8, 0), &RescheduleMap::new());
        assert_eq!(day.unwrap().id, "wed");
    }

    #[test]
    fn test_week_membership_filters_timelines() {
        let mut doc = document();
        doc.days = vec![
            timeline("mon-odd", &[1], WeekSpec::Cyclic(1), Vec::new()),
            timeline("mon-even", &[1], WeekSpec::Cyclic(2), Vec::new()),
        ];
        // Week 1 and week 2 Mondays
        let (_, day) = resolve_day(&doc, at(2024, 4, 1, 9, 0), &RescheduleMap::new());
        assert_eq!(day.unwrap().id, "mon-odd");
        let (_, day) = resolve_day(&doc, at(2024, 4, 8, 9, 0), &RescheduleMap::new());
        assert_eq!(day.unwrap().id, "mon-even");
    }

    #[test]
    fn test_no_match_is_not_an_error() {
        let doc = document();
        // A Sunday
        let (context, day) = resolve_day(&doc, at(2024, 4, 7, 9, 0), &RescheduleMap::new());
        assert_eq!(context.weekday, 7);
        assert!(day.is_none());
    }

    #[test]
    fn test_overrides_do_not_mutate_document() {
        let mut doc = document();
        doc.overrides
            .push(rule("o1", "wed-1", WeekSpec::All, Some("chemistry")));
        let original = doc.clone();

        let (_, day) = resolve_day(&doc, at(2024, 5, 1, 8, 0), &RescheduleMap::new());
        assert_eq!(
            day.unwrap().entries[0].subject_id.as_deref(),
            Some("chemistry")
        );
        assert_eq!(doc, original);

        let mut other = doc.clone();
        other.overrides[0].subject_id = Some("biology".to_string());
        let (_, day) = resolve_day(&other, at(2024, 5, 1, 8, 0), &RescheduleMap::new());
        assert_eq!(day.unwrap().entries[0].subject_id.as_deref(), Some("biology"));
        assert_eq!(doc, original);
    }

    #[test]
    fn test_last_applied_override_wins_per_field() {
        let mut doc = document();
        doc.overrides.push(rule("o1", "wed-1", WeekSpec::All, Some("english")));
        let mut titled = rule("o2", "wed-1", WeekSpec::All, None);
        titled.title = Some("Exam".to_string());
        doc.overrides.push(titled);
        doc.overrides.push(rule("o3", "wed-1", WeekSpec::All, Some("history")));

        let (_, day) = resolve_day(&doc, at(2024, 5, 1, 8, 0), &RescheduleMap::new());
        let resolved = &day.unwrap().entries[0];
        assert_eq!(resolved.subject_id.as_deref(), Some("history"));
        assert_eq!(resolved.title.as_deref(), Some("Exam"));
        assert_eq!(resolved.start_time, "08:00");
    }

    #[test]
    fn test_override_respects_weekday_and_week() {
        let mut doc = document();
        let mut tuesday_only = rule("o1", "wed-1", WeekSpec::All, Some("art"));
        tuesday_only.day_of_week = Some(vec![2]);
        doc.overrides.push(tuesday_only);
        // 2024-05-01 is in week 5 (cycle position 1)
        doc.overrides.push(rule("o2", "wed-1", WeekSpec::Cyclic(2), Some("music")));

        let (context, day) = resolve_day(&doc, at(2024, 5, 1, 8, 0), &RescheduleMap::new());
        assert_eq!(context.week, 5);
        assert_eq!(context.cycle_position, 1);
        assert_eq!(day.unwrap().entries[0].subject_id.as_deref(), Some("math"));

        let (_, day) = resolve_day(&doc, at(2024, 5, 8, 8, 0), &RescheduleMap::new());
        assert_eq!(day.unwrap().entries[0].subject_id.as_deref(), Some("music"));
    }

    #[test]
    fn test_override_week_zero_is_unrestricted() {
        let mut doc = document();
        doc.overrides.push(rule("o1", "wed-1", WeekSpec::Cyclic(0), Some("art")));
        // week 5 is not a multiple of the 2-week cycle
        let (context, day) = resolve_day(&doc, at(2024, 5, 1, 8, 0), &RescheduleMap::new());
        assert_eq!(context.week, 5);
        assert_eq!(day.unwrap().entries[0].subject_id.as_deref(), Some("art"));

        doc.overrides[0].weeks = WeekSpec::Explicit(Vec::new());
        let (_, day) = resolve_day(&doc, at(2024, 5, 1, 8, 0), &RescheduleMap::new());
        assert_eq!(day.unwrap().entries[0].subject_id.as_deref(), Some("art"));
    }

    #[test]
    fn test_override_on_rescheduled_day_uses_effective_weekday() {
        let mut doc = document();
        let mut thursday_only = rule("o1", "thu-1", WeekSpec::All, Some("geography"));
        thursday_only.day_of_week = Some(vec![4]);
        doc.overrides.push(thursday_only);
        let mut reschedule = RescheduleMap::new();
        reschedule.insert(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), 4);

        let (_, day) = resolve_day(&doc, at(2024, 5, 1, 8, 0), &reschedule);
        assert_eq!(
            day.unwrap().entries[0].subject_id.as_deref(),
            Some("geography")
        );
    }

    #[test]
    fn test_best_override_ranks_specific_weeks_first() {
        let mut doc = document();
        doc.overrides.push(rule("all", "wed-1", WeekSpec::All, Some("a")));
        doc.overrides.push(rule("cyc", "wed-1", WeekSpec::Cyclic(1), Some("b")));
        doc.overrides
            .push(rule("list", "wed-1", WeekSpec::Explicit(vec![3]), Some("c")));

        assert_eq!(best_override(&doc, "wed-1", 3, 3).unwrap().id, "list");
        assert_eq!(best_override(&doc, "wed-1", 5, 3).unwrap().id, "cyc");
        assert_eq!(best_override(&doc, "wed-1", 4, 3).unwrap().id, "all");
        assert!(best_override(&doc, "thu-1", 3, 4).is_none());
    }

    #[test]
    fn test_best_override_ties_keep_first() {
        let mut doc = document();
        doc.overrides.push(rule("first", "wed-1", WeekSpec::All, Some("a")));
        doc.overrides.push(rule("second", "wed-1", WeekSpec::All, Some("b")));
        assert_eq!(best_override(&doc, "wed-1", 1, 3).unwrap().id, "first");

        let preview = preview_entry(&doc, "wed-1", 1, 3).unwrap();
        assert_eq!(preview.subject_id.as_deref(), Some("a"));
        assert_eq!(doc.entry("wed-1").unwrap().subject_id.as_deref(), Some("math"));
    }

    #[test]
    fn test_reschedule_map_from_raw_drops_invalid_entries() {
        let mut raw = BTreeMap::new();
        raw.insert("2024-05-01".to_string(), 4);
        raw.insert("May 2".to_string(), 5);
        raw.insert("2024-05-03".to_string(), 9);

        let (map, warnings) = RescheduleMap::from_raw(&raw);
        assert_eq!(map.len(), 1);
        assert_eq!(warnings.len(), 2);
        assert_eq!(map.to_raw().get("2024-05-01"), Some(&4));
    }

    #[test]
    fn test_reschedule_map_prunes_past_days() {
        let mut map = RescheduleMap::new();
        map.insert(NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(), 1);
        map.insert(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), 4);
        let removed = map.prune_before(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(removed, 1);
        assert_eq!(map.len(), 1);
    }
}
