use std::{path::PathBuf, str::FromStr};

use chrono::{Duration, NaiveDate, Utc};
use clap::Parser;
use thiserror::Error;

use crate::{
    naming::Numbering,
    provider::SearchQuery,
    record::SearchMode,
};

#[derive(Clone, Debug, Parser)]
#[command(version, about = "Search torrent indexers and list new results")]
pub struct Args {
    /// config path
    ///
    /// TOML file describing the sites to search.
    pub config: PathBuf,

    /// show to search for; omit to poll the sites' latest uploads
    #[arg(long)]
    pub show: Option<String>,

    #[arg(long)]
    pub season: Option<u32>,

    #[arg(long)]
    pub episode: Option<u32>,

    /// number episodes absolutely (anime) instead of SxxEyy
    #[arg(long)]
    pub absolute: bool,

    /// poll latest uploads even when a show is given
    #[arg(long)]
    pub rss: bool,

    /// only search these sites
    #[arg(long = "site")]
    pub sites: Vec<String>,

    /// read every page from this saved file instead of the network
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// all after date
    ///
    /// Filters results published before YYYY-MM-DD.
    #[arg(long)]
    after: Option<ArgDate>,

    /// report results even if they were listed before
    #[arg(long)]
    pub no_history: bool,

    /// print JSON lines instead of writing an HTML listing
    #[arg(long)]
    pub json: bool,

    #[arg(long, default_value = "listing.html")]
    pub output: PathBuf,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn take_after(&self, default_days: i64) -> NaiveDate {
        self.after
            .map(|date| date.0)
            .unwrap_or_else(|| (Utc::now() - Duration::days(default_days)).date_naive())
    }

    pub fn query(&self) -> Result<SearchQuery, QueryError> {
        let show = match &self.show {
            Some(show) if !self.rss => show.clone(),
            _ => return Ok(SearchQuery::rss()),
        };

        let numbering = if self.absolute {
            if self.season.is_some() && self.episode.is_some() {
                return Err(QueryError::AbsoluteWithSeason);
            }
            Numbering::Absolute
        } else {
            Numbering::Standard
        };
        let mode = match (numbering, self.season, self.episode) {
            (Numbering::Standard, Some(_), None) => SearchMode::Season,
            _ => SearchMode::Episode,
        };

        Ok(SearchQuery {
            show,
            season: self.season,
            episode: self.episode,
            numbering,
            mode,
        })
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("--absolute takes a single episode number; drop --season or --episode")]
    AbsoluteWithSeason,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct ArgDate(NaiveDate);

impl FromStr for ArgDate {
    type Err = ParseArgDateErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut s = s.split('-');
        let year = parse_with_error(s.next(), ParseArgDateErr::Year)?;
        let month = parse_with_error(s.next(), ParseArgDateErr::Month)?;
        let day = parse_with_error(s.next(), ParseArgDateErr::Day)?;
        NaiveDate::from_ymd_opt(year, month, day)
            .map(ArgDate)
            .ok_or(ParseArgDateErr::Invalid)
    }
}

fn parse_with_error<T: FromStr>(
    s: Option<&str>,
    error: ParseArgDateErr,
) -> Result<T, ParseArgDateErr> {
    s.ok_or(error)?.parse().map_err(|_| error)
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
enum ParseArgDateErr {
    #[error("bad year")]
    Year,
    #[error("bad month")]
    Month,
    #[error("bad day")]
    Day,
    #[error("no such date")]
    Invalid,
}
