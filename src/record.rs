use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coerce::RawValue;

/// Marker for a size, seeder or leecher count that could not be read.
pub const UNKNOWN: i64 = -1;

/// Search mode a page was fetched for.
///
/// RSS is background polling of a provider's latest uploads; the others are
/// user-triggered searches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Rss,
    #[default]
    Episode,
    Season,
}

impl SearchMode {
    pub fn is_rss(self) -> bool {
        self == SearchMode::Rss
    }
}

/// A normalized search result
///
/// This object is constructed from a RawRow by the normalizer and is not
/// modified afterward.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultRecord {
    pub title: String,
    pub link: String,
    /// Bytes, or [`UNKNOWN`].
    pub size: i64,
    pub seeders: i64,
    pub leechers: i64,
    pub pubdate: Option<DateTime<Utc>>,
}

impl ResultRecord {
    pub fn size_known(&self) -> bool {
        self.size != UNKNOWN
    }
}

/// Constructor context for ResultRecord
///
/// These fields are pulled directly out of a page or payload by a provider.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawRow {
    pub title: Option<String>,
    pub link: Option<String>,
    pub size: RawValue,
    pub seeders: RawValue,
    pub leechers: RawValue,
    pub pubdate: RawValue,
}

impl RawRow {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        RawRow {
            title: Some(title.into()),
            link: Some(link.into()),
            ..Default::default()
        }
    }

    pub fn size(mut self, size: impl Into<RawValue>) -> Self {
        self.size = size.into();
        self
    }

    pub fn seeders(mut self, seeders: impl Into<RawValue>) -> Self {
        self.seeders = seeders.into();
        self
    }

    pub fn leechers(mut self, leechers: impl Into<RawValue>) -> Self {
        self.leechers = leechers.into();
        self
    }

    pub fn pubdate(mut self, pubdate: impl Into<RawValue>) -> Self {
        self.pubdate = pubdate.into();
        self
    }
}

/// Most-seeded first. The sort is stable, so ties keep page order.
pub fn sort_by_seeders(records: &mut [ResultRecord]) {
    records.sort_by(|a, b| b.seeders.cmp(&a.seeders));
}
