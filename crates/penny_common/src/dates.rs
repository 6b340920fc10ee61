//! Date ranges and explicit date-phrase parsing
//!
//! The planner and clarification engine both need to know whether a prompt
//! carries an explicit date phrase ("last month", "last 30 days", an ISO
//! date). Parsing takes `today` as a parameter so resolution is a pure
//! function of its inputs.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::normalize::{contains_phrase, tokens};

/// An inclusive date range. The constructor normalizes so `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        if a <= b {
            DateRange { start: a, end: b }
        } else {
            DateRange { start: b, end: a }
        }
    }

    pub fn single_day(day: NaiveDate) -> Self {
        DateRange::new(day, day)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// Calendar unit a parsed phrase referred to; carried in session so
/// continuations can keep the user's granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Day,
    Week,
    Month,
    Year,
}

/// A parsed explicit date phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDates {
    pub range: DateRange,
    pub unit: PeriodUnit,
}

fn month_bounds(year: i32, month: u32) -> Option<DateRange> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let next_first = NaiveDate::from_ymd_opt(ny, nm, 1)?;
    Some(DateRange::new(first, next_first.pred_opt()?))
}

fn week_start(day: NaiveDate) -> NaiveDate {
    let back = day.weekday().num_days_from_monday() as u64;
    day.checked_sub_days(Days::new(back)).unwrap_or(day)
}

/// Parse the first explicit date phrase in already-normalized text.
///
/// Recognized: today, yesterday, this/last week, this/last month, this
/// year, "last N days", ISO dates (single, or "from A to B").
pub fn parse_date_phrase(normalized: &str, today: NaiveDate) -> Option<ParsedDates> {
    // ISO dates first: an explicit date outranks relative wording.
    // Normalization turned "2024-03-01" into "2024 03 01".
    let words = tokens(normalized);
    let mut iso_dates: Vec<NaiveDate> = Vec::new();
    for w in words.windows(3) {
        if let (Ok(y), Ok(m), Ok(d)) = (
            w[0].parse::<i32>(),
            w[1].parse::<u32>(),
            w[2].parse::<u32>(),
        ) {
            if w[0].len() == 4 && w[1].len() <= 2 && w[2].len() <= 2 {
                if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                    iso_dates.push(date);
                }
            }
        }
    }
    match iso_dates.len() {
        1 => {
            return Some(ParsedDates {
                range: DateRange::single_day(iso_dates[0]),
                unit: PeriodUnit::Day,
            })
        }
        n if n >= 2 => {
            return Some(ParsedDates {
                range: DateRange::new(iso_dates[0], iso_dates[1]),
                unit: PeriodUnit::Day,
            })
        }
        _ => {}
    }

    // "last N days"
    for w in words.windows(3) {
        if w[0] == "last" && w[2] == "days" {
            if let Ok(n) = w[1].parse::<u64>() {
                if n >= 1 {
                    let start = today
                        .checked_sub_days(Days::new(n - 1))
                        .unwrap_or(today);
                    return Some(ParsedDates {
                        range: DateRange::new(start, today),
                        unit: PeriodUnit::Day,
                    });
                }
            }
        }
    }

    if contains_phrase(normalized, "today") {
        return Some(ParsedDates {
            range: DateRange::single_day(today),
            unit: PeriodUnit::Day,
        });
    }
    if contains_phrase(normalized, "yesterday") {
        let y = today.pred_opt()?;
        return Some(ParsedDates {
            range: DateRange::single_day(y),
            unit: PeriodUnit::Day,
        });
    }
    if contains_phrase(normalized, "this week") {
        return Some(ParsedDates {
            range: DateRange::new(week_start(today), today),
            unit: PeriodUnit::Week,
        });
    }
    if contains_phrase(normalized, "last week") {
        let this_start = week_start(today);
        let last_start = this_start.checked_sub_days(Days::new(7))?;
        let last_end = this_start.pred_opt()?;
        return Some(ParsedDates {
            range: DateRange::new(last_start, last_end),
            unit: PeriodUnit::Week,
        });
    }
    if contains_phrase(normalized, "this month") {
        let range = month_bounds(today.year(), today.month())?;
        return Some(ParsedDates {
            range,
            unit: PeriodUnit::Month,
        });
    }
    if contains_phrase(normalized, "last month") {
        let (y, m) = if today.month() == 1 {
            (today.year() - 1, 12)
        } else {
            (today.year(), today.month() - 1)
        };
        let range = month_bounds(y, m)?;
        return Some(ParsedDates {
            range,
            unit: PeriodUnit::Month,
        });
    }
    if contains_phrase(normalized, "this year") {
        let start = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
        let end = NaiveDate::from_ymd_opt(today.year(), 12, 31)?;
        return Some(ParsedDates {
            range: DateRange::new(start, end),
            unit: PeriodUnit::Year,
        });
    }

    None
}

/// Whether the normalized text carries any explicit date phrase at all.
pub fn has_explicit_date_phrase(normalized: &str, today: NaiveDate) -> bool {
    parse_date_phrase(normalized, today).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn range_constructor_swaps_reversed_bounds() {
        let r = DateRange::new(day(2024, 5, 10), day(2024, 5, 1));
        assert_eq!(r.start(), day(2024, 5, 1));
        assert_eq!(r.end(), day(2024, 5, 10));
    }

    #[test]
    fn this_month_spans_calendar_month() {
        let today = day(2024, 2, 14);
        let parsed = parse_date_phrase(&normalize("spend this month"), today).unwrap();
        assert_eq!(parsed.range.start(), day(2024, 2, 1));
        assert_eq!(parsed.range.end(), day(2024, 2, 29));
        assert_eq!(parsed.unit, PeriodUnit::Month);
    }

    #[test]
    fn last_month_rolls_over_january() {
        let today = day(2024, 1, 5);
        let parsed = parse_date_phrase(&normalize("last month"), today).unwrap();
        assert_eq!(parsed.range.start(), day(2023, 12, 1));
        assert_eq!(parsed.range.end(), day(2023, 12, 31));
    }

    #[test]
    fn last_n_days_is_inclusive_of_today() {
        let today = day(2024, 3, 10);
        let parsed = parse_date_phrase(&normalize("last 7 days"), today).unwrap();
        assert_eq!(parsed.range.start(), day(2024, 3, 4));
        assert_eq!(parsed.range.end(), today);
    }

    #[test]
    fn iso_date_parses() {
        let today = day(2024, 3, 10);
        let parsed = parse_date_phrase(&normalize("spend on 2024-03-01"), today).unwrap();
        assert_eq!(parsed.range, DateRange::single_day(day(2024, 3, 1)));
    }

    #[test]
    fn iso_pair_forms_range() {
        let today = day(2024, 3, 10);
        let parsed =
            parse_date_phrase(&normalize("from 2024-01-01 to 2024-02-01"), today).unwrap();
        assert_eq!(parsed.range.start(), day(2024, 1, 1));
        assert_eq!(parsed.range.end(), day(2024, 2, 1));
    }

    #[test]
    fn no_phrase_means_none() {
        let today = day(2024, 3, 10);
        assert!(parse_date_phrase(&normalize("card spend"), today).is_none());
    }
}
