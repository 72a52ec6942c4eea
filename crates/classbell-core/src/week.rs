//! Week arithmetic for rotating timetables.
//!
//! Week indices are 1-based and anchored at the document's start date. Dates before the
//! anchor produce week numbers of zero or below; nothing here clamps them.

use chrono::NaiveDate;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ALL_WEEKS: &str = "all";

/// Absolute week index of `today` relative to `start_date` (week 1 starts on `start_date`).
pub fn week_number(start_date: NaiveDate, today: NaiveDate) -> i64 {
    let delta_days = (today - start_date).num_days();
    delta_days.div_euclid(7) + 1
}

/// Position of `week_number` inside an N-week rotation, always in `1..=cycle_length`.
///
/// A `cycle_length` of zero is treated as one.
pub fn cycle_position(week_number: i64, cycle_length: u32) -> i64 {
    let cycle = i64::from(cycle_length.max(1));
    (week_number - 1).rem_euclid(cycle) + 1
}

/// Which weeks a timeline or override is active in.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WeekSpec {
    /// No restriction (`"all"` or an absent field).
    #[default]
    All,
    /// Every `cycle_length` weeks, starting at the given absolute week.
    Cyclic(i64),
    /// Exactly the listed absolute weeks.
    Explicit(Vec<i64>),
    /// Any other JSON shape. Never matches.
    Unrecognized(Value),
}

impl WeekSpec {
    /// Whether `current_week` satisfies this specifier.
    pub fn contains(&self, current_week: i64, cycle_length: u32) -> bool {
        match self {
            WeekSpec::All => true,
            WeekSpec::Cyclic(start) => {
                let cycle = i64::from(cycle_length.max(1));
                current_week >= *start && (current_week - start).rem_euclid(cycle) == 0
            }
            WeekSpec::Explicit(weeks) => weeks.contains(&current_week),
            WeekSpec::Unrecognized(_) => false,
        }
    }
}

impl Serialize for WeekSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WeekSpec::All => serializer.serialize_str(ALL_WEEKS),
            WeekSpec::Cyclic(week) => serializer.serialize_i64(*week),
            WeekSpec::Explicit(weeks) => weeks.serialize(serializer),
            WeekSpec::Unrecognized(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for WeekSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(WeekSpec::from_value(value))
    }
}

impl WeekSpec {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Null => WeekSpec::All,
            Value::String(ref text) if text == ALL_WEEKS => WeekSpec::All,
            Value::Number(ref number) => match number.as_i64() {
                Some(week) => WeekSpec::Cyclic(week),
                None => WeekSpec::Unrecognized(value),
            },
            Value::Array(ref items) => {
                let weeks: Option<Vec<i64>> = items.iter().map(Value::as_i64).collect();
                match weeks {
                    Some(weeks) => WeekSpec::Explicit(weeks),
                    None => WeekSpec::Unrecognized(value),
                }
            }
            other => WeekSpec::Unrecognized(other),
        }
    }
}

/// Accepts either a single ISO weekday or a list of them.
pub(crate) fn deserialize_weekdays<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(u8),
        Many(Vec<u8>),
    }

    let days = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(OneOrMany::One(day)) => vec![day],
        Some(OneOrMany::Many(days)) => days,
    };
    if let Some(bad) = days.iter().find(|day| !(1..=7).contains(*day)) {
        return Err(de::Error::custom(format!("weekday {bad} is outside 1..=7")));
    }
    Ok(Some(days))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_number_counts_from_start_date() {
        let start = date(2024, 9, 2);
        assert_eq!(week_number(start, start), 1);
        assert_eq!(week_number(start, date(2024, 9, 8)), 1);
        assert_eq!(week_number(start, date(2024, 9, 9)), 2);
        assert_eq!(week_number(start, date(2024, 9, 23)), 4);
    }

    #[test]
    fn test_week_number_before_start_is_not_clamped() {
        let start = date(2024, 9, 2);
        assert_eq!(week_number(start, date(2024, 9, 1)), 0);
        assert_eq!(week_number(start, date(2024, 8, 26)), 0);
        assert_eq!(week_number(start, date(2024, 8, 25)), -1);
    }

    #[test]
    fn test_cycle_position_stays_in_range() {
        for cycle in 1..=5u32 {
            for week in -20..=20 {
                let position = cycle_position(week, cycle);
                assert!(
                    (1..=i64::from(cycle)).contains(&position),
                    "week {week} cycle {cycle} gave {position}"
                );
            }
        }
        assert_eq!(cycle_position(1, 2), 1);
        assert_eq!(cycle_position(2, 2), 2);
        assert_eq!(cycle_position(3, 2), 1);
        assert_eq!(cycle_position(0, 2), 2);
        assert_eq!(cycle_position(-1, 2), 1);
    }

    #[test]
    fn test_unrestricted_matches_every_week() {
        for week in -10..=10 {
            assert!(WeekSpec::All.contains(week, 2));
        }
    }

    #[test]
    fn test_cyclic_week_two_of_two() {
        let spec = WeekSpec::Cyclic(2);
        for week in [2, 4, 6, 8] {
            assert!(spec.contains(week, 2), "week {week} should match");
        }
        for week in [-2, 0, 1, 3, 5, 7] {
            assert!(!spec.contains(week, 2), "week {week} should not match");
        }
    }

    #[test]
    fn test_cyclic_supports_longer_rotations() {
        let spec = WeekSpec::Cyclic(3);
        assert!(spec.contains(3, 3));
        assert!(spec.contains(6, 3));
        assert!(!spec.contains(4, 3));
    }

    #[test]
    fn test_explicit_list_matches_absolute_weeks() {
        let spec = WeekSpec::Explicit(vec![1, 5]);
        assert!(spec.contains(5, 2));
        assert!(!spec.contains(3, 2));
    }

    #[test]
    fn test_week_spec_json_shapes() {
        let all: WeekSpec = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(all, WeekSpec::All);
        let null: WeekSpec = serde_json::from_str("null").unwrap();
        assert_eq!(null, WeekSpec::All);
        let cyclic: WeekSpec = serde_json::from_str("2").unwrap();
        assert_eq!(cyclic, WeekSpec::Cyclic(2));
        let list: WeekSpec = serde_json::from_str("[1, 3]").unwrap();
        assert_eq!(list, WeekSpec::Explicit(vec![1, 3]));

        let odd: WeekSpec = serde_json::from_str("\"odd\"").unwrap();
        assert!(matches!(odd, WeekSpec::Unrecognized(_)));
        assert!(!odd.contains(1, 2));
    }
}
