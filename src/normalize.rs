use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::{
    coerce::{try_int, IntCandidate, RawValue},
    date::{DateParser, DateStrategy},
    record::{RawRow, ResultRecord, SearchMode, UNKNOWN},
    size::{SizeOptions, SizeParser},
    table::{ColumnNotFound, Row, Table},
};

/// How the minimum-seeder threshold is applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinSeedPolicy {
    /// Drop rows with fewer seeders than configured.
    #[default]
    Configured,
    /// Compare against `min(configured, 1)`, as some legacy site adapters
    /// do. A threshold of 5 then only drops rows with zero seeders.
    CappedAtOne,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NormalizeOptions {
    pub min_seeders: i64,
    /// Used when the seeder count is missing or unreadable.
    pub default_seeders: i64,
    pub default_leechers: i64,
    pub min_seed_policy: MinSeedPolicy,
    pub size: SizeOptions,
    pub dates: DateStrategy,
    #[serde(skip)]
    pub mode: SearchMode,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions {
            min_seeders: 1,
            default_seeders: 0,
            default_leechers: 0,
            min_seed_policy: MinSeedPolicy::Configured,
            size: SizeOptions::default(),
            dates: DateStrategy::Auto,
            mode: SearchMode::Episode,
        }
    }
}

impl NormalizeOptions {
    pub fn seed_threshold(&self) -> i64 {
        match self.min_seed_policy {
            MinSeedPolicy::Configured => self.min_seeders,
            MinSeedPolicy::CappedAtOne => self.min_seeders.min(1),
        }
    }
}

/// Turns raw rows into result records, dropping the unusable ones.
pub struct Normalizer {
    options: NormalizeOptions,
    size: SizeParser,
    dates: DateParser,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Normalizer {
            size: SizeParser::new(options.size.clone()),
            dates: DateParser::new(options.dates.clone()),
            options,
        }
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.options.mode = mode;
        self
    }

    pub fn normalize(&self, row: &RawRow) -> Option<ResultRecord> {
        self.normalize_at(row, Utc::now())
    }

    /// Relative publish dates resolve against `now`.
    pub fn normalize_at(&self, row: &RawRow, now: DateTime<Utc>) -> Option<ResultRecord> {
        let title = non_empty(row.title.as_deref())?;
        let link = non_empty(row.link.as_deref())?;

        let seeders = peer_count(&row.seeders, self.options.default_seeders);
        let leechers = peer_count(&row.leechers, self.options.default_leechers);

        if seeders < self.options.seed_threshold() {
            if !self.options.mode.is_rss() {
                debug!(
                    title,
                    seeders,
                    leechers,
                    min_seeders = self.options.seed_threshold(),
                    "discarding result below minimum seeders"
                );
            }
            return None;
        }

        let record = ResultRecord {
            title: title.to_owned(),
            link: link.to_owned(),
            size: self.size_of(&row.size),
            seeders,
            leechers,
            pubdate: self.date_of(&row.pubdate, now),
        };

        if !self.options.mode.is_rss() {
            debug!(
                title = %record.title,
                seeders,
                leechers,
                size = record.size,
                "found result"
            );
        }

        Some(record)
    }

    /// Normalize every row, keeping the survivors in their original order.
    pub fn normalize_all<'a, I>(&self, rows: I) -> Vec<ResultRecord>
    where
        I: IntoIterator<Item = &'a RawRow>,
    {
        let now = Utc::now();
        rows.into_iter()
            .filter_map(|row| self.normalize_at(row, now))
            .collect()
    }

    pub fn normalize_table(&self, table: &Table, columns: &ColumnMap) -> Vec<ResultRecord> {
        self.normalize_table_with(table, columns, |link| link)
    }

    /// Like [`Normalizer::normalize_table`], passing every extracted link
    /// through `rewrite_link` first (e.g. to make it absolute).
    pub fn normalize_table_with<F>(
        &self,
        table: &Table,
        columns: &ColumnMap,
        rewrite_link: F,
    ) -> Vec<ResultRecord>
    where
        F: Fn(String) -> String,
    {
        let rows: Vec<RawRow> = table
            .rows()
            .filter_map(|row| match columns.extract(&row) {
                Ok(mut raw) => {
                    raw.link = raw.link.map(&rewrite_link);
                    Some(raw)
                }
                Err(e) => {
                    debug!(error = %e, "skipping row");
                    None
                }
            })
            .collect();
        self.normalize_all(&rows)
    }

    fn size_of(&self, raw: &RawValue) -> i64 {
        match raw {
            RawValue::Text(text) => self.size.parse_or(text, UNKNOWN),
            RawValue::Int(_) | RawValue::Float(_) => raw
                .to_int()
                .filter(|bytes| *bytes >= 0)
                .unwrap_or(UNKNOWN),
            RawValue::Missing => UNKNOWN,
        }
    }

    fn date_of(&self, raw: &RawValue, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match raw {
            RawValue::Text(text) => self.dates.parse_at(text, now),
            RawValue::Int(_) | RawValue::Float(_) => {
                Utc.timestamp_opt(raw.to_int()?, 0).single()
            }
            RawValue::Missing => None,
        }
    }
}

/// Swarm counts are never negative; a negative reading counts as unreadable.
fn peer_count(raw: &RawValue, default_value: i64) -> i64 {
    match try_int(raw, default_value) {
        count if count >= 0 => count,
        _ if default_value >= 0 => default_value,
        _ => UNKNOWN,
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|text| !text.is_empty())
}

/// Header labels to read each field from, with alternates in order of
/// preference. An empty list means the site has no such column.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ColumnMap {
    pub title: Vec<String>,
    /// Column holding the download link; empty means the title cell.
    pub link: Vec<String>,
    /// Preferred link scheme or path prefix, e.g. `magnet:`.
    pub link_prefix: Option<String>,
    pub size: Vec<String>,
    pub seeders: Vec<String>,
    pub leechers: Vec<String>,
    pub pubdate: Vec<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        fn labels(names: &[&str]) -> Vec<String> {
            names.iter().map(|&name| name.to_owned()).collect()
        }

        ColumnMap {
            title: labels(&["Name", "Title", "Nom", "Torrent"]),
            link: Vec::new(),
            link_prefix: None,
            size: labels(&["Size", "Taille"]),
            seeders: labels(&["Seeders", "Seeds", "SE", "S"]),
            leechers: labels(&["Leechers", "Peers", "LE", "L"]),
            pubdate: Vec::new(),
        }
    }
}

impl ColumnMap {
    /// Pull the configured fields out of `row`.
    ///
    /// Fails when a configured column is absent, in which case the row
    /// should be skipped.
    pub fn extract(&self, row: &Row) -> Result<RawRow, ColumnNotFound> {
        let title_cell = row.cell_any(&self.title)?;
        let title = title_cell
            .title
            .clone()
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| title_cell.text.clone());

        let link_cell = if self.link.is_empty() {
            title_cell
        } else {
            row.cell_any(&self.link)?
        };
        let link = match &self.link_prefix {
            Some(prefix) => link_cell.link_starting_with(prefix),
            None => link_cell.link(),
        };

        Ok(RawRow {
            title: Some(title),
            link: link.map(str::to_owned),
            size: self.text(row, &self.size)?,
            seeders: self.text(row, &self.seeders)?,
            leechers: self.text(row, &self.leechers)?,
            pubdate: self.text(row, &self.pubdate)?,
        })
    }

    fn text(&self, row: &Row, names: &[String]) -> Result<RawValue, ColumnNotFound> {
        if names.is_empty() {
            return Ok(RawValue::Missing);
        }
        Ok(RawValue::Text(row.cell_any(names)?.text.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{table::Cell, units::UnitTable};

    fn labels() -> Vec<String> {
        ["Name", "Size", "Seeders", "Leechers"]
            .iter()
            .map(|&l| l.to_owned())
            .collect()
    }

    fn linked(text: &str, href: &str) -> Cell {
        Cell {
            text: text.into(),
            links: vec![href.into()],
            title: None,
        }
    }

    fn table(rows: &[[&str; 4]]) -> Table {
        Table::new(
            labels(),
            rows.iter()
                .map(|[name, size, seeders, leechers]| {
                    vec![
                        linked(name, &format!("magnet:?xt=urn:btih:{name}")),
                        Cell::from(*size),
                        Cell::from(*seeders),
                        Cell::from(*leechers),
                    ]
                })
                .collect(),
        )
    }

    #[test]
    fn empty_title_is_dropped() {
        let normalizer = Normalizer::new(NormalizeOptions::default());
        let records = normalizer.normalize_table(&table(&[["", "2 GB", "5", "1"]]), &ColumnMap::default());
        assert!(records.is_empty());
    }

    #[test]
    fn below_min_seeders_is_dropped() {
        let normalizer = Normalizer::new(NormalizeOptions::default());
        let records = normalizer.normalize_table(
            &table(&[["Show.S01E01", "700 MB", "0", "3"]]),
            &ColumnMap::default(),
        );
        assert!(records.is_empty());
    }

    #[test]
    fn rss_mode_still_filters() {
        let normalizer = Normalizer::new(NormalizeOptions::default()).with_mode(SearchMode::Rss);
        let row = RawRow::new("Show.S01E01", "magnet:?a").seeders("0");
        assert_eq!(normalizer.normalize(&row), None);
    }

    #[test]
    fn builds_record() {
        let normalizer = Normalizer::new(NormalizeOptions::default());
        let records = normalizer.normalize_table(
            &table(&[["Show.S01E01", "700 MB", "12", "3"]]),
            &ColumnMap::default(),
        );
        assert_eq!(
            records,
            [ResultRecord {
                title: "Show.S01E01".into(),
                link: "magnet:?xt=urn:btih:Show.S01E01".into(),
                size: 734_003_200,
                seeders: 12,
                leechers: 3,
                pubdate: None,
            }]
        );
    }

    #[test]
    fn unreadable_size_is_unknown_not_zero() {
        let normalizer = Normalizer::new(NormalizeOptions::default());
        let row = RawRow::new("a", "b").seeders(4).size("big");
        assert_eq!(normalizer.normalize(&row).unwrap().size, UNKNOWN);

        let row = RawRow::new("a", "b").seeders(4);
        assert_eq!(normalizer.normalize(&row).unwrap().size, UNKNOWN);

        let row = RawRow::new("a", "b").seeders(4).size(-20_i64);
        assert_eq!(normalizer.normalize(&row).unwrap().size, UNKNOWN);

        let row = RawRow::new("a", "b").seeders(4).size(2048_i64);
        assert_eq!(normalizer.normalize(&row).unwrap().size, 2048);
    }

    #[test]
    fn missing_seeders_use_configured_default() {
        let row = RawRow::new("a", "b").seeders("n/a");

        let strict = Normalizer::new(NormalizeOptions::default());
        assert_eq!(strict.normalize(&row), None);

        let lenient = Normalizer::new(NormalizeOptions {
            default_seeders: 1,
            ..Default::default()
        });
        assert_eq!(lenient.normalize(&row).unwrap().seeders, 1);
    }

    #[test]
    fn capped_policy_only_drops_zero_seeders() {
        let row = RawRow::new("a", "b").seeders(2);
        let options = NormalizeOptions {
            min_seeders: 5,
            ..Default::default()
        };
        assert_eq!(Normalizer::new(options.clone()).normalize(&row), None);

        let capped = NormalizeOptions {
            min_seed_policy: MinSeedPolicy::CappedAtOne,
            ..options
        };
        assert_eq!(capped.seed_threshold(), 1);
        assert!(Normalizer::new(capped).normalize(&row).is_some());
    }

    #[test]
    fn dates_from_text_and_epoch() {
        let now = Utc.with_ymd_and_hms(2022, 5, 26, 12, 0, 0).unwrap();
        let normalizer = Normalizer::new(NormalizeOptions {
            dates: DateStrategy::DayFirst,
            ..Default::default()
        });

        let row = RawRow::new("a", "b").seeders(1).pubdate("02-05-2022");
        assert_eq!(
            normalizer.normalize_at(&row, now).unwrap().pubdate,
            Utc.with_ymd_and_hms(2022, 5, 2, 0, 0, 0).single()
        );

        let row = RawRow::new("a", "b").seeders(1).pubdate(1_651_516_620_i64);
        assert_eq!(
            normalizer.normalize_at(&row, now).unwrap().pubdate,
            Utc.with_ymd_and_hms(2022, 5, 2, 18, 37, 0).single()
        );

        let row = RawRow::new("a", "b").seeders(1).pubdate("whenever");
        assert_eq!(normalizer.normalize_at(&row, now).unwrap().pubdate, None);
    }

    #[test]
    fn survivors_keep_page_order() {
        let normalizer = Normalizer::new(NormalizeOptions::default());
        let records = normalizer.normalize_table(
            &table(&[
                ["c", "1 GB", "3", "0"],
                ["", "1 GB", "9", "0"],
                ["a", "1 GB", "0", "0"],
                ["b", "1 GB", "1", "0"],
                ["d", "1 GB", "7", "0"],
            ]),
            &ColumnMap::default(),
        );
        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["c", "b", "d"]);
    }

    #[test]
    fn localized_headers_and_units() {
        let table = Table::new(
            vec!["Nom".into(), "Taille".into(), "Seeds".into(), "Peers".into()],
            vec![vec![
                linked("Film.2022.FRENCH", "/torrent/42"),
                Cell::from("1,5 Go"),
                Cell::from("8"),
                Cell::from("2"),
            ]],
        );
        let normalizer = Normalizer::new(NormalizeOptions {
            size: SizeOptions::default()
                .with_separator(None)
                .with_units(UnitTable::french()),
            ..Default::default()
        });
        let records = normalizer.normalize_table(&table, &ColumnMap::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size, 1_610_612_736);
        assert_eq!(records[0].link, "/torrent/42");
    }

    #[test]
    fn missing_configured_column_skips_row() {
        let columns = ColumnMap {
            pubdate: vec!["Added".into()],
            ..Default::default()
        };
        let normalizer = Normalizer::new(NormalizeOptions::default());
        assert!(normalizer
            .normalize_table(&table(&[["a", "1 GB", "3", "0"]]), &columns)
            .is_empty());
    }

    #[test]
    fn link_prefix_picks_matching_link() {
        let table = Table::new(
            labels(),
            vec![vec![
                Cell {
                    text: "a".into(),
                    links: vec!["/details/1".into(), "magnet:?xt=urn:btih:1".into()],
                    title: Some("a full name".into()),
                },
                Cell::from("1 GB"),
                Cell::from("3"),
                Cell::from("0"),
            ]],
        );
        let columns = ColumnMap {
            link_prefix: Some("magnet:".into()),
            ..Default::default()
        };
        let records = Normalizer::new(NormalizeOptions::default()).normalize_table(&table, &columns);
        assert_eq!(records[0].title, "a full name");
        assert_eq!(records[0].link, "magnet:?xt=urn:btih:1");
    }

    #[test]
    fn missing_or_blank_link_is_dropped() {
        let normalizer = Normalizer::new(NormalizeOptions::default());

        let row = RawRow {
            link: None,
            ..RawRow::new("Show.S01E01", "").seeders(5)
        };
        assert_eq!(normalizer.normalize(&row), None);

        let row = RawRow::new("Show.S01E01", " \t ").seeders(5);
        assert_eq!(normalizer.normalize(&row), None);

        let table = Table::new(
            labels(),
            vec![vec![
                Cell::from("Show.S01E01"),
                Cell::from("1 GB"),
                Cell::from("5"),
                Cell::from("1"),
            ]],
        );
        assert!(normalizer
            .normalize_table(&table, &ColumnMap::default())
            .is_empty());
    }

    #[test]
    fn negative_counts_fall_back_to_defaults() {
        let normalizer = Normalizer::new(NormalizeOptions::default());
        let row = RawRow::new("Show.S01E01", "magnet:?a").seeders("5").leechers("-3");
        let record = normalizer.normalize(&row).unwrap();
        assert_eq!(record.seeders, 5);
        assert_eq!(record.leechers, 0);

        let lenient = Normalizer::new(NormalizeOptions {
            min_seeders: 0,
            ..Default::default()
        });
        let row = RawRow::new("Show.S01E01", "magnet:?a").seeders("-7");
        assert_eq!(lenient.normalize(&row).unwrap().seeders, 0);

        let no_default = Normalizer::new(NormalizeOptions {
            min_seeders: -10,
            default_seeders: -1,
            ..Default::default()
        });
        let record = no_default.normalize(&row).unwrap();
        assert_eq!(record.seeders, UNKNOWN);
        assert!(record.leechers >= 0);
    }

    #[test]
    fn link_rewrite_applies_to_every_row() {
        let normalizer = Normalizer::new(NormalizeOptions::default());
        let records = normalizer.normalize_table_with(
            &table(&[["a", "1 GB", "3", "0"], ["b", "1 GB", "2", "0"]]),
            &ColumnMap::default(),
            |link| format!("{link}&tr=udp://tracker"),
        );
        let links: Vec<_> = records.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(
            links,
            [
                "magnet:?xt=urn:btih:a&tr=udp://tracker",
                "magnet:?xt=urn:btih:b&tr=udp://tracker"
            ]
        );
    }
}
