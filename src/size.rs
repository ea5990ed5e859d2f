use regex::Regex;
use serde::Deserialize;
use tracing::trace;

use crate::units::{Base, UnitTable};

/// How a human-readable size should be read.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SizeOptions {
    pub base: Base,
    /// `None` or empty switches to pattern matching over the whole string.
    pub separator: Option<String>,
    pub units: UnitTable,
    /// Unit assumed when the separator is present but nothing follows it.
    pub default_unit: Option<String>,
}

impl Default for SizeOptions {
    fn default() -> Self {
        SizeOptions {
            base: Base::Binary,
            separator: Some(" ".into()),
            units: UnitTable::binary(),
            default_unit: None,
        }
    }
}

impl SizeOptions {
    pub fn with_units(mut self, units: UnitTable) -> Self {
        self.units = units;
        self
    }

    pub fn with_separator(mut self, separator: Option<&str>) -> Self {
        self.separator = separator.map(Into::into);
        self
    }

    pub fn with_base(mut self, base: Base) -> Self {
        self.base = base;
        self
    }

    pub fn with_default_unit(mut self, unit: &str) -> Self {
        self.default_unit = Some(unit.into());
        self
    }
}

/// Size reader with its unit pattern compiled once.
#[derive(Clone, Debug)]
pub struct SizeParser {
    options: SizeOptions,
    pattern: Regex,
}

impl SizeParser {
    pub fn new(options: SizeOptions) -> Self {
        let pattern = build_pattern(&options.units);
        SizeParser { options, pattern }
    }

    pub fn options(&self) -> &SizeOptions {
        &self.options
    }

    /// Byte count for `raw`, or `None` when no number/unit pair can be read.
    pub fn parse(&self, raw: &str) -> Option<i64> {
        let raw = raw.replace('\u{a0}', " ");
        let (number, unit) = match self.options.separator.as_deref() {
            Some(separator) if !separator.is_empty() => self.split(&raw, separator)?,
            _ => self.search(&raw)?,
        };

        let scalar = parse_number(&number)?;
        let index = self.options.units.index_of(&unit)?;
        let bytes = (scalar * self.options.base.multiplier(index)).trunc();

        // `as` saturates at i64::MAX for absurd magnitudes.
        Some((bytes as i64).max(0))
    }

    pub fn parse_or<T: From<i64>>(&self, raw: &str, default: T) -> T {
        match self.parse(raw) {
            Some(bytes) => T::from(bytes),
            None => {
                trace!(raw, "unable to read size, using default");
                default
            }
        }
    }

    fn split(&self, raw: &str, separator: &str) -> Option<(String, String)> {
        let raw = raw.trim();
        match raw.split_once(separator) {
            Some((number, rest)) => {
                let unit = rest
                    .split_whitespace()
                    .next()
                    .map(str::to_owned)
                    .or_else(|| self.options.default_unit.clone())?;
                Some((number.trim().to_owned(), unit))
            }
            None => Some((raw.to_owned(), self.options.default_unit.clone()?)),
        }
    }

    fn search(&self, raw: &str) -> Option<(String, String)> {
        let captures = self.pattern.captures(raw)?;
        Some((captures[1].to_owned(), captures[2].to_owned()))
    }
}

/// Read `raw` as a byte count, falling back to `default` on any failure.
///
/// The default is returned untouched, so callers pick their own sentinel:
/// `None`, `-1`, or anything else constructible from an `i64`.
pub fn convert_size<T: From<i64>>(raw: &str, default: T, options: &SizeOptions) -> T {
    SizeParser::new(options.clone()).parse_or(raw, default)
}

/// Render a byte count with the largest unit that keeps the value above one.
pub fn format_size(bytes: i64, units: &UnitTable, base: Base) -> String {
    if bytes < 0 {
        return "?".into();
    }

    let mut index = 0;
    let mut value = bytes as f64;
    while value >= base.step() && index + 1 < units.len() {
        value /= base.step();
        index += 1;
    }

    let label = units.label(index).unwrap_or_default();
    if index == 0 {
        format!("{bytes} {label}")
    } else {
        format!("{value:.2} {label}")
    }
}

fn build_pattern(units: &UnitTable) -> Regex {
    let mut labels: Vec<&String> = units.labels().iter().collect();
    labels.sort_by_key(|label| std::cmp::Reverse(label.chars().count()));
    let alternatives = labels
        .iter()
        .map(|label| regex::escape(label))
        .collect::<Vec<_>>()
        .join("|");

    // Labels are escaped literals, so the pattern is always valid.
    Regex::new(&format!(r"(?i)(\d+(?:[.,]\d+)*)\s*({alternatives})\b"))
        .expect("unreachable: escaped unit pattern")
}

/// Parse a decimal number written with either `.` or `,` as the decimal mark.
///
/// When both marks appear the later one is the decimal mark. A lone comma
/// followed by exactly three digits is a thousands separator.
fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let normalized = match (text.rfind('.'), text.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => text.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => text.replace(',', ""),
        (None, Some(comma)) => {
            let decimals = &text[comma + 1..];
            if text.matches(',').count() > 1 || decimals.len() == 3 {
                text.replace(',', "")
            } else {
                text.replace(',', ".")
            }
        }
        _ => text.to_owned(),
    };

    let value: f64 = normalized.parse().ok()?;
    value.is_finite().then_some(value)
}
