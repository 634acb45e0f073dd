//! Normalization of heterogeneous publish dates into calendar dates.
//!
//! Strategies are tried in a fixed order and the first one producing a valid
//! calendar date wins:
//!
//! 1. URL-embedded `/YYYYMMDD/` segment
//! 2. Long form `D de <mes> de YYYY`
//! 3. Numeric day-first `D/M/YYYY`, `D-M-YYYY`, `D.M.YYYY`
//! 4. ISO `YYYY-MM-DD` or `YYYY/MM/DD`
//! 5. Best-effort parse of anything else: RFC 3339 and RFC 2822 first, then
//!    loose English forms (`Thursday, March 20, 2025`, `20 Mar 2025 10:00`),
//!    then whatever `dateparser` understands

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static URL_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|/)(\d{4})(\d{2})(\d{2})(?:/|$|\?|#)").expect("valid regex"));

static LONG_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,2})\s+de\s+(\p{L}+)\s+(?:de|del)\s+(\d{4})").expect("valid regex")
});

static DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\d])(\d{1,2})([/.-])(\d{1,2})([/.-])(\d{4})(?:[^\d]|$)").expect("valid regex")
});

static ISO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\d])(\d{4})[-/](\d{1,2})[-/](\d{1,2})(?:[^\d]|$)").expect("valid regex")
});

static WEEKDAY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+").expect("valid regex")
});

/// Date-only patterns tried against the start of the string; a trailing
/// time or zone is ignored. `%B` accepts full and abbreviated month names.
const LOOSE_PATTERNS: &[&str] = &[
    "%B %d, %Y", // March 20, 2025
    "%B %d %Y",  // Mar 20 2025
    "%d %B %Y",  // 20 Mar 2025 10:00
    "%d %B, %Y", // 20 March, 2025
];

const MONTHS: &[(&str, u32)] = &[
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

/// Look a month name up in the month table, case-insensitively.
pub fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    MONTHS
        .iter()
        .find(|(month, _)| *month == lower)
        .map(|(_, n)| *n)
}

/// Parse any supported date representation. Never panics; returns `None`
/// when every strategy fails.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = date_from_url(raw)
        .or_else(|| parse_long_form(raw))
        .or_else(|| parse_day_first(raw))
        .or_else(|| parse_iso(raw))
        .or_else(|| parse_generic(raw));

    if parsed.is_none() {
        debug!(raw, "No date strategy matched");
    }
    parsed
}

/// Extract an 8-digit `YYYYMMDD` path segment. Invalid calendar dates
/// (month 13, February 30) yield `None`.
pub fn date_from_url(url: &str) -> Option<NaiveDate> {
    URL_DATE.captures_iter(url).find_map(|caps| {
        ymd(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )
    })
}

fn parse_long_form(raw: &str) -> Option<NaiveDate> {
    let caps = LONG_FORM.captures(raw)?;
    let day = caps[1].parse().ok()?;
    let month = month_number(&caps[2])?;
    let year = caps[3].parse().ok()?;
    ymd(year, month, day)
}

fn parse_day_first(raw: &str) -> Option<NaiveDate> {
    DAY_FIRST.captures_iter(raw).find_map(|caps| {
        // Mixed separators such as 1/2-2025 are not a date.
        if caps[2] != caps[4] {
            return None;
        }
        ymd(caps[5].parse().ok()?, caps[3].parse().ok()?, caps[1].parse().ok()?)
    })
}

fn parse_iso(raw: &str) -> Option<NaiveDate> {
    ISO.captures_iter(raw).find_map(|caps| {
        ymd(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )
    })
}

fn parse_generic(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y%m%d") {
        return Some(date);
    }

    let loose = WEEKDAY_PREFIX.replace(raw, "");
    if let Some(date) = LOOSE_PATTERNS
        .iter()
        .find_map(|fmt| NaiveDate::parse_and_remainder(&loose, fmt).ok())
        .map(|(date, _rest)| date)
    {
        return Some(date);
    }

    // Interpreted in UTC so that date-only input keeps its calendar day.
    dateparser::parse_with_timezone(raw, &Utc)
        .ok()
        .map(|dt| dt.date_naive())
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_url_date() {
        assert_eq!(
            parse_date("https://www.newtral.es/antiguedad-coches-espana-factcheck/20250320/"),
            Some(d(2025, 3, 20))
        );
        assert_eq!(date_from_url("/20240229/"), Some(d(2024, 2, 29)));
    }

    #[test]
    fn test_url_date_rejects_invalid_calendar_dates() {
        assert_eq!(parse_date("https://www.newtral.es/slug/20251301/"), None);
        assert_eq!(parse_date("https://www.newtral.es/slug/20230229/"), None);
    }

    #[test]
    fn test_long_form_spanish() {
        assert_eq!(parse_date("20 de marzo de 2025"), Some(d(2025, 3, 20)));
        assert_eq!(parse_date("Publicado el 1 de Diciembre del 2023"), Some(d(2023, 12, 1)));
        assert_eq!(parse_date("5 de setiembre de 2022"), Some(d(2022, 9, 5)));
    }

    #[test]
    fn test_long_form_unknown_month() {
        assert_eq!(parse_date("20 de brumario de 2025"), None);
    }

    #[test]
    fn test_numeric_day_first() {
        assert_eq!(parse_date("20/03/2025"), Some(d(2025, 3, 20)));
        assert_eq!(parse_date("7-1-2024"), Some(d(2024, 1, 7)));
        assert_eq!(parse_date("31.12.2023 | 10:00"), Some(d(2023, 12, 31)));
        assert_eq!(parse_date("31/02/2023"), None);
    }

    #[test]
    fn test_iso() {
        assert_eq!(parse_date("2025-03-20"), Some(d(2025, 3, 20)));
        assert_eq!(parse_date("2025/3/9"), Some(d(2025, 3, 9)));
        assert_eq!(parse_date("2025-03-20T10:15:00+01:00"), Some(d(2025, 3, 20)));
    }

    #[test]
    fn test_generic_formats() {
        assert_eq!(parse_date("March 20, 2025"), Some(d(2025, 3, 20)));
        assert_eq!(parse_date("Thu, 20 Mar 2025 10:00:00 +0000"), Some(d(2025, 3, 20)));
    }

    #[test]
    fn test_loose_formats() {
        assert_eq!(parse_date("20 Mar 2025 10:00"), Some(d(2025, 3, 20)));
        assert_eq!(parse_date("Thursday, March 20, 2025"), Some(d(2025, 3, 20)));
        assert_eq!(parse_date("Mar 20 2025"), Some(d(2025, 3, 20)));
        assert_eq!(parse_date("Thu. Mar 20, 2025 at 9:00 am"), Some(d(2025, 3, 20)));
        assert_eq!(parse_date("20 March, 2025"), Some(d(2025, 3, 20)));
    }

    #[test]
    fn test_unix_timestamp_falls_through_to_dateparser() {
        // 2025-03-20T10:03:20Z
        assert_eq!(parse_date("1742465000"), Some(d(2025, 3, 20)));
    }

    #[test]
    fn test_garbage_is_none() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("ayer por la tarde"), None);
    }

    #[test]
    fn test_month_number() {
        assert_eq!(month_number("MARZO"), Some(3));
        assert_eq!(month_number("Setiembre"), Some(9));
        assert_eq!(month_number("marz"), None);
    }

    proptest! {
        #[test]
        fn url_token_roundtrips_valid_dates(days in 0i64..40_000) {
            let date = d(1990, 1, 1) + chrono::Duration::days(days);
            let url = format!("https://www.newtral.es/slug/{}/", date.format("%Y%m%d"));
            prop_assert_eq!(parse_date(&url), Some(date));
        }

        #[test]
        fn url_token_with_bad_month_is_none(year in 1990i32..2100, month in 13u32..100, day in 1u32..29) {
            let url = format!("https://www.newtral.es/slug/{year:04}{month:02}{day:02}/");
            prop_assert_eq!(parse_date(&url), None);
        }

        #[test]
        fn long_form_matches_iso(days in 0i64..40_000) {
            let date = d(1990, 1, 1) + chrono::Duration::days(days);
            let names = ["enero", "febrero", "marzo", "abril", "mayo", "junio", "julio",
                         "agosto", "septiembre", "octubre", "noviembre", "diciembre"];
            use chrono::Datelike;
            let raw = format!("{} de {} de {}", date.day(), names[date.month0() as usize], date.year());
            prop_assert_eq!(parse_date(&raw), Some(date));
        }
    }
}
