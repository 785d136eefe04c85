//! Date normalization and the recency window.
//!
//! Sources publish dates as RFC 2822 feed timestamps, ISO strings, numeric
//! day/month/year, English or French month names, and relative phrases such
//! as "3 hours ago" or "il y a 2 jours". [`normalize`] resolves all of these
//! to a calendar date against the run's clock. Anything it cannot resolve is
//! an error; callers drop the article rather than guess.

use crate::errors::DateParseError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").unwrap());
static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4})\b").unwrap());
static RELATIVE_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+|an?)\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?|months?)\s+ago")
        .unwrap()
});
static RELATIVE_FR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"il y a\s+(\d+|une?)\s*(secondes?|minutes?|heures?|h|jours?|semaines?|mois)")
        .unwrap()
});
static YESTERDAY_FR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bhier\b").unwrap());
static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th|er)?\s+(\p{L}+)\.?,?\s+(\d{4})\b").unwrap()
});
static MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\p{L}+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b").unwrap()
});
static MONTH_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\p{L}+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b").unwrap());
static DAY_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th|er)?\s+(\p{L}+)\b").unwrap());

/// Resolve `raw` to a calendar date.
///
/// `locale` is a hint such as `en`, `en-US` or `fr`; it only changes how
/// ambiguous numeric dates are read (`en-US` is month-first, everything else
/// day-first). Relative phrases and year-less dates resolve against `now`.
pub fn normalize(raw: &str, locale: &str, now: DateTime<Utc>) -> Result<NaiveDate, DateParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DateParseError::Empty);
    }
    let today = now.date_naive();

    if let Some(date) = parse_structured(trimmed) {
        return Ok(date);
    }

    let lower = trimmed.to_lowercase();

    if let Some(caps) = ISO_DATE.captures(&lower) {
        return ymd(&caps[1], &caps[2], &caps[3], trimmed);
    }

    if let Some(caps) = NUMERIC_DATE.captures(&lower) {
        let (a, b, year) = (&caps[1], &caps[2], &caps[3]);
        let month_first = locale.eq_ignore_ascii_case("en-us");
        let (first, second) = if month_first { (b, a) } else { (a, b) };
        if let Ok(date) = ymd(year, second, first, trimmed) {
            return Ok(date);
        }
        // A day above 12 in the month slot means the other reading was meant.
        return ymd(year, first, second, trimmed);
    }

    for caps in DAY_MONTH_YEAR.captures_iter(&lower) {
        if let Some(month) = month_number(&caps[2]) {
            return ymd_num(&caps[3], month, &caps[1], trimmed);
        }
    }
    for caps in MONTH_DAY_YEAR.captures_iter(&lower) {
        if let Some(month) = month_number(&caps[1]) {
            return ymd_num(&caps[3], month, &caps[2], trimmed);
        }
    }
    // Relative phrases only count when no absolute date is present.
    if let Some(result) = parse_relative(&lower, now) {
        return result;
    }

    for caps in MONTH_DAY.captures_iter(&lower) {
        if let Some(month) = month_number(&caps[1]) {
            return without_year(month, &caps[2], today, trimmed);
        }
    }
    for caps in DAY_MONTH.captures_iter(&lower) {
        if let Some(month) = month_number(&caps[2]) {
            return without_year(month, &caps[1], today, trimmed);
        }
    }

    Err(DateParseError::Unrecognized(trimmed.to_string()))
}

/// `true` iff `date` is not in the future and at most `window_days` old.
pub fn is_recent(date: NaiveDate, today: NaiveDate, window_days: i64) -> bool {
    date <= today && (today - date).num_days() <= window_days
}

fn parse_structured(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_relative(lower: &str, now: DateTime<Utc>) -> Option<Result<NaiveDate, DateParseError>> {
    let today = now.date_naive();
    if lower.contains("yesterday") || YESTERDAY_FR.is_match(lower) {
        return Some(Ok(today - TimeDelta::days(1)));
    }
    if lower.contains("today")
        || lower.contains("just now")
        || lower.contains("aujourd'hui")
        || lower.contains("aujourd’hui")
    {
        return Some(Ok(today));
    }

    let (amount, unit) = if let Some(caps) = RELATIVE_EN.captures(lower) {
        (caps[1].to_string(), caps[2].to_string())
    } else if let Some(caps) = RELATIVE_FR.captures(lower) {
        (caps[1].to_string(), caps[2].to_string())
    } else {
        return None;
    };

    let n: i64 = match amount.as_str() {
        "a" | "an" | "un" | "une" => 1,
        digits => match digits.parse() {
            Ok(n) => n,
            Err(_) => return Some(Err(DateParseError::OutOfRange(lower.to_string()))),
        },
    };

    let delta = match unit.trim_end_matches('s') {
        "second" | "sec" | "seconde" => TimeDelta::try_seconds(n),
        "minute" | "min" => TimeDelta::try_minutes(n),
        "hour" | "hr" | "heure" | "h" => TimeDelta::try_hours(n),
        "day" | "jour" => TimeDelta::try_days(n),
        "week" | "semaine" => TimeDelta::try_weeks(n),
        // "mois" also loses its trailing s; months are approximated as 30 days.
        "month" | "moi" => n.checked_mul(30).and_then(TimeDelta::try_days),
        _ => None,
    };

    let resolved = delta
        .and_then(|d| now.checked_sub_signed(d))
        .map(|dt| dt.date_naive())
        .ok_or_else(|| DateParseError::OutOfRange(lower.to_string()));
    Some(resolved)
}

fn ymd(year: &str, month: &str, day: &str, raw: &str) -> Result<NaiveDate, DateParseError> {
    let month: u32 = month
        .parse()
        .map_err(|_| DateParseError::Unrecognized(raw.to_string()))?;
    ymd_num(year, month, day, raw)
}

fn ymd_num(year: &str, month: u32, day: &str, raw: &str) -> Result<NaiveDate, DateParseError> {
    let year: i32 = year
        .parse()
        .map_err(|_| DateParseError::Unrecognized(raw.to_string()))?;
    let day: u32 = day
        .parse()
        .map_err(|_| DateParseError::Unrecognized(raw.to_string()))?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| DateParseError::OutOfRange(raw.to_string()))
}

/// Year-less dates take the current year unless that lands in the future.
fn without_year(month: u32, day: &str, today: NaiveDate, raw: &str) -> Result<NaiveDate, DateParseError> {
    let day: u32 = day
        .parse()
        .map_err(|_| DateParseError::Unrecognized(raw.to_string()))?;
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
    match this_year {
        Some(date) if date <= today => Ok(date),
        _ => NaiveDate::from_ymd_opt(today.year() - 1, month, day)
            .ok_or_else(|| DateParseError::OutOfRange(raw.to_string())),
    }
}

/// English and French month names and their common abbreviations.
fn month_number(word: &str) -> Option<u32> {
    let m = match word.trim_end_matches('.') {
        "jan" | "january" | "janv" | "janvier" => 1,
        "feb" | "february" | "fév" | "fev" | "févr" | "fevr" | "février" | "fevrier" => 2,
        "mar" | "march" | "mars" => 3,
        "apr" | "april" | "avr" | "avril" => 4,
        "may" | "mai" => 5,
        "jun" | "june" | "juin" => 6,
        "jul" | "july" | "juil" | "juillet" => 7,
        "aug" | "august" | "août" | "aout" => 8,
        "sep" | "sept" | "september" | "septembre" => 9,
        "oct" | "october" | "octobre" => 10,
        "nov" | "november" | "novembre" => 11,
        "dec" | "december" | "déc" | "decembre" | "décembre" => 12,
        _ => return None,
    };
    Some(m)
}
