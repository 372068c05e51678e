use chrono::{Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use once_cell::sync::Lazy;
use queryseed_query::{Interval, IntervalDirection, IntervalUnit};
use regex::Regex;

/// Fixed-width date or date-time text, before any calendar check.
static DATE_SHAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}(?:[ T]\d{2}:\d{2}(?::\d{2}(?:\.\d{1,9})?)?)?$").unwrap()
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

pub fn is_date_shaped(text: &str) -> bool {
    DATE_SHAPE_RE.is_match(text.trim())
}

/// Parsed form of a date-shaped string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temporal {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

pub fn parse_temporal(text: &str) -> Option<Temporal> {
    let text = text.trim();
    if !is_date_shaped(text) {
        return None;
    }
    if text.len() == 10 {
        return NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(Temporal::Date);
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(Temporal::DateTime)
}

pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    match parse_temporal(text)? {
        Temporal::Date(date) => Some(date.and_time(NaiveTime::MIN)),
        Temporal::DateTime(datetime) => Some(datetime),
    }
}

/// Apply an interval to `now` in its direction.
pub fn shift(now: NaiveDateTime, interval: &Interval) -> Option<NaiveDateTime> {
    let amount = interval.amount;
    let forward = interval.direction == IntervalDirection::Future;
    let months = |count: i64| -> Option<NaiveDateTime> {
        let months = Months::new(u32::try_from(count).ok()?);
        if forward {
            now.checked_add_months(months)
        } else {
            now.checked_sub_months(months)
        }
    };
    let delta = |delta: Option<TimeDelta>| -> Option<NaiveDateTime> {
        let delta = delta?;
        if forward {
            now.checked_add_signed(delta)
        } else {
            now.checked_sub_signed(delta)
        }
    };

    match interval.unit {
        IntervalUnit::Second => delta(TimeDelta::try_seconds(amount)),
        IntervalUnit::Minute => delta(TimeDelta::try_minutes(amount)),
        IntervalUnit::Hour => delta(TimeDelta::try_hours(amount)),
        IntervalUnit::Day => delta(TimeDelta::try_days(amount)),
        IntervalUnit::Week => delta(TimeDelta::try_weeks(amount)),
        IntervalUnit::Month => months(amount),
        IntervalUnit::Quarter => months(amount.checked_mul(3)?),
        IntervalUnit::Year => months(amount.checked_mul(12)?),
    }
}

pub fn year_bounds(year: i32) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?.and_time(NaiveTime::MIN);
    let end = NaiveDate::from_ymd_opt(year, 12, 31)?.and_hms_opt(23, 59, 59)?;
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn recognizes_date_shapes() {
        assert!(is_date_shaped("2024-05-10"));
        assert!(is_date_shaped("2024-05-10 08:30:00"));
        assert!(is_date_shaped("2024-05-10T08:30"));
        assert!(!is_date_shaped("10/05/2024"));
        assert_eq!(parse_temporal("2024-02-30"), None);
        assert!(matches!(parse_temporal("2024-02-29"), Some(Temporal::Date(_))));
    }

    #[test]
    fn shifts_by_calendar_units() {
        let now = at(2024, 3, 31);
        let back = Interval {
            amount: 1,
            unit: IntervalUnit::Month,
            direction: IntervalDirection::Past,
        };
        assert_eq!(shift(now, &back), Some(at(2024, 2, 29)));

        let ahead = Interval {
            amount: 2,
            unit: IntervalUnit::Week,
            direction: IntervalDirection::Future,
        };
        assert_eq!(shift(now, &ahead), Some(at(2024, 4, 14)));
    }
}
