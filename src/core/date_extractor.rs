//! Maps query text to the calendar dates it refers to.

use crate::domain::model::DateRange;
use chrono::{Datelike, Duration, NaiveDate};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

type Resolver = fn(&Captures, NaiveDate) -> Option<DateRange>;

lazy_static! {
    // 順序即優先序：明確的月/日優先於相對詞
    static ref PATTERNS: Vec<(Regex, Resolver)> = vec![
        (
            Regex::new(r"\b(\d{1,2})/(\d{1,2})\b").expect("month/day pattern"),
            month_day as Resolver,
        ),
        (
            Regex::new(r"(?i)\bthis weekend\b").expect("this weekend pattern"),
            this_weekend as Resolver,
        ),
        (
            Regex::new(r"(?i)\bnext weekend\b").expect("next weekend pattern"),
            next_weekend as Resolver,
        ),
        (
            Regex::new(r"(?i)\btoday\b").expect("today pattern"),
            today as Resolver,
        ),
        (
            Regex::new(r"(?i)\btomorrow\b").expect("tomorrow pattern"),
            tomorrow as Resolver,
        ),
    ];
}

/// Returns the first pattern's range, or `None` when the query names no date.
pub fn extract(query: &str, now: NaiveDate) -> Option<DateRange> {
    PATTERNS.iter().find_map(|(pattern, resolve)| {
        pattern
            .captures(query)
            .and_then(|caps| resolve(&caps, now))
    })
}

fn month_day(caps: &Captures, now: NaiveDate) -> Option<DateRange> {
    let month: u32 = caps.get(1)?.as_str().parse().ok()?;
    let day: u32 = caps.get(2)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(now.year(), month, day).map(DateRange::single)
}

fn upcoming_saturday(now: NaiveDate) -> NaiveDate {
    let weekday = now.weekday().num_days_from_sunday() as i64;
    now + Duration::days(6 - weekday)
}

fn weekend_from(saturday: NaiveDate) -> DateRange {
    DateRange {
        start_date: saturday,
        end_date: saturday + Duration::days(1),
    }
}

fn this_weekend(_: &Captures, now: NaiveDate) -> Option<DateRange> {
    Some(weekend_from(upcoming_saturday(now)))
}

fn next_weekend(_: &Captures, now: NaiveDate) -> Option<DateRange> {
    Some(weekend_from(upcoming_saturday(now) + Duration::days(7)))
}

fn today(_: &Captures, now: NaiveDate) -> Option<DateRange> {
    Some(DateRange::single(now))
}

fn tomorrow(_: &Captures, now: NaiveDate) -> Option<DateRange> {
    Some(DateRange::single(now + Duration::days(1)))
}
