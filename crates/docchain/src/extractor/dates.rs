//! Document date parsing.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;

const NUMERIC_FORMATS: &[&str] = &["%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%d.%m.%y"];

/// Month name stems, nominative and genitive forms share them. `март` must be
/// tried before `ма` (май, мая).
const MONTH_STEMS: &[(&str, u32)] = &[
    ("январ", 1),
    ("феврал", 2),
    ("март", 3),
    ("апрел", 4),
    ("ма", 5),
    ("июн", 6),
    ("июл", 7),
    ("август", 8),
    ("сентябр", 9),
    ("октябр", 10),
    ("ноябр", 11),
    ("декабр", 12),
];

static WORD_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\s+([а-яё]+)\s+(\d{4})").unwrap());

/// Parses the date formats seen on documents: `15.01.2024`, `15/01/2024`,
/// `15-01-2024`, `2024-01-15` and `«15» января 2024 г.`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '«' | '»' | '"' | '\''))
        .collect();
    let cleaned = cleaned
        .trim()
        .trim_end_matches('.')
        .trim_end_matches("года")
        .trim_end_matches(" г")
        .trim_end_matches("г")
        .trim();

    for format in NUMERIC_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(cleaned, format) {
            return Some(date);
        }
    }

    let lowered = cleaned.to_lowercase();
    let caps = WORD_DATE.captures(&lowered)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = month_from_word(&caps[2])?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn month_from_word(word: &str) -> Option<u32> {
    MONTH_STEMS
        .iter()
        .find(|(stem, _)| word.starts_with(stem))
        .map(|(_, month)| *month)
}

/// ISO `YYYY-MM-DD` form of a parseable date.
pub fn to_iso(raw: &str) -> Option<String> {
    parse_date(raw).map(|d| d.format("%Y-%m-%d").to_string())
}

/// A date is plausible when it is not before 1990 and not more than a year
/// after `today`.
pub fn is_plausible(date: NaiveDate, today: NaiveDate) -> bool {
    date >= NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or(NaiveDate::MIN)
        && date <= today + Duration::days(365)
}
