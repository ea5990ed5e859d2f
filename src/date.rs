use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::trace;

/// How a provider writes its publish dates.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateStrategy {
    /// ISO-like, RFC 2822, unix epoch seconds, then relative phrases.
    #[default]
    Auto,
    /// A fixed chrono format, e.g. `%d/%m/%Y %H:%M`.
    Format { format: String },
    /// "3 hours ago", "2d ago", "yesterday".
    Relative,
    /// `DD-MM-YYYY` with `-`, `/` or `.` and an optional time.
    DayFirst,
}

static NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const MAX_RELATIVE_SECONDS: i64 = 100_000 * 365 * 24 * 60 * 60;

pub struct DateParser {
    strategy: DateStrategy,
    relative_pattern: Regex,
    day_first_pattern: Regex,
}

impl DateParser {
    pub fn new(strategy: DateStrategy) -> Self {
        DateParser {
            strategy,
            relative_pattern: Regex::new(
                r"(?i)\b(\d+|an?|one)\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?|wks?|months?|years?|yrs?|[smhdwy])\b",
            )
            .unwrap(),
            day_first_pattern: Regex::new(
                r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{2}|\d{4})(?:[ T,]+(\d{1,2}):(\d{2})(?::(\d{2}))?)?$",
            )
            .unwrap(),
        }
    }

    pub fn strategy(&self) -> &DateStrategy {
        &self.strategy
    }

    pub fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        self.parse_at(raw, Utc::now())
    }

    /// Parse `raw`, resolving relative phrases against `now`.
    pub fn parse_at(&self, raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let parsed = match &self.strategy {
            DateStrategy::Auto => parse_absolute(raw)
                .or_else(|| parse_epoch(raw))
                .or_else(|| self.parse_relative(raw, now)),
            DateStrategy::Format { format } => parse_with_format(raw, format),
            DateStrategy::Relative => self.parse_relative(raw, now),
            DateStrategy::DayFirst => self.parse_day_first(raw),
        };

        if parsed.is_none() {
            trace!(raw, strategy = ?self.strategy, "unable to read date");
        }
        parsed
    }

    fn parse_relative(&self, raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let lower = raw.to_lowercase();
        match lower.as_str() {
            "now" | "just now" | "today" => return Some(now),
            "yesterday" | "y-day" => return Some(now - Duration::days(1)),
            _ => {}
        }

        let mut offset = Duration::zero();
        let mut matched = false;
        for captures in self.relative_pattern.captures_iter(&lower) {
            let amount: i64 = match &captures[1] {
                "a" | "an" | "one" => 1,
                digits => digits.parse().ok()?,
            };
            offset = offset.checked_add(&unit_duration(&captures[2], amount)?)?;
            matched = true;
        }

        if !matched {
            return None;
        }
        now.checked_sub_signed(offset)
    }

    fn parse_day_first(&self, raw: &str) -> Option<DateTime<Utc>> {
        let captures = self.day_first_pattern.captures(raw)?;
        let number = |idx: usize| -> Option<u32> {
            captures.get(idx).map_or(Some(0), |m| m.as_str().parse().ok())
        };

        let day = number(1)?;
        let month = number(2)?;
        let year = match &captures[3] {
            short if short.len() == 2 => 2000 + short.parse::<i32>().ok()?,
            long => long.parse().ok()?,
        };

        let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(
            number(4)?,
            number(5)?,
            number(6)?,
        )?;
        Some(Utc.from_utc_datetime(&naive))
    }
}

impl Default for DateParser {
    fn default() -> Self {
        DateParser::new(DateStrategy::default())
    }
}

fn unit_duration(unit: &str, amount: i64) -> Option<Duration> {
    let seconds_per_unit = match unit.trim_end_matches('s') {
        "" | "sec" | "second" => 1,
        "m" | "min" | "minute" => 60,
        "h" | "hr" | "hour" => 60 * 60,
        "d" | "day" => 24 * 60 * 60,
        "w" | "wk" | "week" => 7 * 24 * 60 * 60,
        "month" => 30 * 24 * 60 * 60,
        "y" | "yr" | "year" => 365 * 24 * 60 * 60,
        _ => return None,
    };
    let seconds = amount.checked_mul(seconds_per_unit)?;

    // Beyond this the phrase is noise and `Duration::seconds` would panic.
    (seconds.abs() <= MAX_RELATIVE_SECONDS).then(|| Duration::seconds(seconds))
}

fn parse_absolute(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.with_timezone(&Utc));
    }
    if let Ok(datetime) = DateTime::parse_from_rfc2822(raw) {
        return Some(datetime.with_timezone(&Utc));
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_epoch(raw: &str) -> Option<DateTime<Utc>> {
    if !(9..=11).contains(&raw.len()) || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Utc.timestamp_opt(raw.parse().ok()?, 0).single()
}

fn parse_with_format(raw: &str, format: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    DateTime::parse_from_str(raw, format)
        .ok()
        .map(|datetime| datetime.with_timezone(&Utc))
}
