mod html;
mod json;

pub use html::{TableProvider, TableSite};
pub use json::{JsonFields, JsonProvider, JsonSite};

use hashbrown::HashMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    date::DateStrategy,
    fetch::Source,
    naming::{episode_num, Numbering},
    normalize::{MinSeedPolicy, NormalizeOptions},
    record::{ResultRecord, SearchMode},
    size::SizeOptions,
    table::BadSelector,
};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Selector(#[from] BadSelector),
    #[error("unreadable JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no item list at {0:?}")]
    MissingItems(String),
    #[error("provider {0:?} is registered twice")]
    Duplicate(String),
    #[error("search url for {name:?} has no {{query}} placeholder: {url}")]
    BadTemplate { name: String, url: String },
}

/// A site-specific adapter: knows how to ask a site and how to read its answer.
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Address to fetch for one search string.
    fn search_url(&self, search: &str, mode: SearchMode) -> String;

    /// Records found in a fetched page, in page order.
    fn parse(&self, body: &str, mode: SearchMode) -> Result<Vec<ResultRecord>, ProviderError>;
}

/// What the user is looking for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub show: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub numbering: Numbering,
    pub mode: SearchMode,
}

impl SearchQuery {
    pub fn rss() -> Self {
        SearchQuery {
            mode: SearchMode::Rss,
            ..Default::default()
        }
    }

    pub fn episode(show: impl Into<String>, season: u32, episode: u32) -> Self {
        SearchQuery {
            show: show.into(),
            season: Some(season),
            episode: Some(episode),
            numbering: Numbering::Standard,
            mode: SearchMode::Episode,
        }
    }

    pub fn season(show: impl Into<String>, season: u32) -> Self {
        SearchQuery {
            show: show.into(),
            season: Some(season),
            episode: None,
            numbering: Numbering::Standard,
            mode: SearchMode::Season,
        }
    }

    /// Strings to submit to a site's search box.
    pub fn search_strings(&self) -> Vec<String> {
        let show = self.show.trim();
        match self.mode {
            SearchMode::Rss => vec![String::new()],
            SearchMode::Season => match (self.numbering, self.season) {
                (Numbering::Standard, Some(season)) => vec![
                    format!("{show} S{season:02}"),
                    format!("{show} Season {season}"),
                ],
                _ => vec![show.to_owned()],
            },
            SearchMode::Episode => {
                match episode_num(self.season, self.episode, self.numbering) {
                    Some(tag) => vec![format!("{show} {tag}")],
                    None => vec![show.to_owned()],
                }
            }
        }
    }
}

/// Normalization settings shared by all sites, each overridable per site.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Defaults {
    pub min_seeders: i64,
    pub default_seeders: i64,
    pub default_leechers: i64,
    pub min_seed_policy: MinSeedPolicy,
}

impl Default for Defaults {
    fn default() -> Self {
        let options = NormalizeOptions::default();
        Defaults {
            min_seeders: options.min_seeders,
            default_seeders: options.default_seeders,
            default_leechers: options.default_leechers,
            min_seed_policy: options.min_seed_policy,
        }
    }
}

/// Settings every site kind carries.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SiteCommon {
    pub name: String,
    /// Search address with a `{query}` placeholder.
    pub search_url: String,
    /// Address of the latest uploads; defaults to an empty search.
    pub rss_url: Option<String>,
    pub min_seeders: Option<i64>,
    pub default_seeders: Option<i64>,
    pub default_leechers: Option<i64>,
    pub min_seed_policy: Option<MinSeedPolicy>,
    #[serde(default)]
    pub size: SizeOptions,
    #[serde(default)]
    pub dates: DateStrategy,
}

impl SiteCommon {
    pub fn new(name: &str, search_url: &str) -> Self {
        SiteCommon {
            name: name.into(),
            search_url: search_url.into(),
            rss_url: None,
            min_seeders: None,
            default_seeders: None,
            default_leechers: None,
            min_seed_policy: None,
            size: SizeOptions::default(),
            dates: DateStrategy::default(),
        }
    }

    pub fn options(&self, defaults: &Defaults) -> NormalizeOptions {
        NormalizeOptions {
            min_seeders: self.min_seeders.unwrap_or(defaults.min_seeders),
            default_seeders: self.default_seeders.unwrap_or(defaults.default_seeders),
            default_leechers: self.default_leechers.unwrap_or(defaults.default_leechers),
            min_seed_policy: self.min_seed_policy.unwrap_or(defaults.min_seed_policy),
            size: self.size.clone(),
            dates: self.dates.clone(),
            mode: SearchMode::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if !self.search_url.contains("{query}") {
            return Err(ProviderError::BadTemplate {
                name: self.name.clone(),
                url: self.search_url.clone(),
            });
        }
        Ok(())
    }

    fn url_for(&self, search: &str, mode: SearchMode) -> String {
        match (&self.rss_url, mode) {
            (Some(rss), SearchMode::Rss) => rss.clone(),
            _ => self
                .search_url
                .replace("{query}", &urlencoding::encode(search.trim())),
        }
    }
}

/// Connector definition as found in the configuration file.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiteConfig {
    Table(TableSite),
    Json(JsonSite),
}

impl SiteConfig {
    pub fn common(&self) -> &SiteCommon {
        match self {
            SiteConfig::Table(site) => &site.common,
            SiteConfig::Json(site) => &site.common,
        }
    }

    pub fn build(&self, defaults: &Defaults) -> Result<Box<dyn Provider>, ProviderError> {
        self.common().validate()?;
        let provider: Box<dyn Provider> = match self {
            SiteConfig::Table(site) => Box::new(TableProvider::new(site.clone(), defaults)?),
            SiteConfig::Json(site) => Box::new(JsonProvider::new(site.clone(), defaults)),
        };
        Ok(provider)
    }
}

/// Providers by name.
#[derive(Default)]
pub struct Registry {
    providers: HashMap<String, Box<dyn Provider>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn from_sites(sites: &[SiteConfig], defaults: &Defaults) -> Result<Self, ProviderError> {
        let mut registry = Registry::new();
        for site in sites {
            registry.register(site.build(defaults)?)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, provider: Box<dyn Provider>) -> Result<(), ProviderError> {
        let name = provider.name().to_owned();
        if self.providers.contains_key(&name) {
            return Err(ProviderError::Duplicate(name));
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Provider> {
        self.providers.get(name).map(|provider| &**provider)
    }

    /// Names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Run every search string of `query` against one provider.
///
/// Fetch and parse failures are logged and skipped so one bad page does not
/// hide the rest.
pub fn search(provider: &dyn Provider, source: &mut dyn Source, query: &SearchQuery) -> Vec<ResultRecord> {
    let mut results = Vec::new();
    for search in query.search_strings() {
        let url = provider.search_url(&search, query.mode);
        let body = match source.fetch(&url) {
            Ok(body) => body,
            Err(e) => {
                warn!(provider = provider.name(), %url, error = %e, "fetch failed");
                continue;
            }
        };

        match provider.parse(&body, query.mode) {
            Ok(records) => results.extend(records),
            Err(e) => warn!(provider = provider.name(), %url, error = %e, "unable to parse response"),
        }
    }

    if results.is_empty() {
        info!(provider = provider.name(), "no results returned from provider");
    } else {
        info!(provider = provider.name(), results = results.len(), "search complete");
    }
    results
}
