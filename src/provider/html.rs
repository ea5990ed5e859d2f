use reqwest::Url;
use serde::Deserialize;

use super::{Defaults, Provider, ProviderError, SiteCommon};
use crate::{
    normalize::{ColumnMap, Normalizer},
    record::{ResultRecord, SearchMode},
    table::{Table, TableSelectors},
};

/// A site whose results come as an HTML table with a header row.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TableSite {
    #[serde(flatten)]
    pub common: SiteCommon,
    #[serde(default)]
    pub selectors: TableSelectors,
    #[serde(default)]
    pub columns: ColumnMap,
}

pub struct TableProvider {
    site: TableSite,
    base: Option<Url>,
    defaults: Defaults,
}

impl TableProvider {
    pub fn new(site: TableSite, defaults: &Defaults) -> Result<Self, ProviderError> {
        // Reject bad selectors up front.
        Table::from_html("", &site.selectors)?;

        let base = Url::parse(&site.common.search_url.replace("{query}", "")).ok();
        Ok(TableProvider {
            site,
            base,
            defaults: defaults.clone(),
        })
    }

    fn absolute(&self, link: String) -> String {
        match &self.base {
            Some(base) => base.join(&link).map(String::from).unwrap_or(link),
            None => link,
        }
    }
}

impl Provider for TableProvider {
    fn name(&self) -> &str {
        &self.site.common.name
    }

    fn search_url(&self, search: &str, mode: SearchMode) -> String {
        self.site.common.url_for(search, mode)
    }

    fn parse(&self, body: &str, mode: SearchMode) -> Result<Vec<ResultRecord>, ProviderError> {
        let table = Table::from_html(body, &self.site.selectors)?;
        let normalizer = Normalizer::new(self.site.common.options(&self.defaults)).with_mode(mode);

        Ok(normalizer.normalize_table_with(&table, &self.site.columns, |link| self.absolute(link)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::UnitTable;

    static PAGE: &str = r#"
        <table id="searchResult">
          <tr><th>Nom</th><th>Taille</th><th>Seed</th><th>Leech</th><th>Ajouté</th></tr>
          <tr>
            <td><a href="/torrent/1/show-s01e02">Show S01E02 FRENCH</a></td>
            <td>1,4 Go</td><td>15</td><td>2</td><td>02/05/2022</td>
          </tr>
          <tr>
            <td><a href="/torrent/2/show-s01e02-vostfr">Show S01E02 VOSTFR</a></td>
            <td>350 Mo</td><td>0</td><td>1</td><td>01/05/2022</td>
          </tr>
          <tr><td colspan="5">Publicité</td></tr>
        </table>
    "#;

    fn site() -> TableSite {
        TableSite {
            common: SiteCommon {
                size: crate::size::SizeOptions::default()
                    .with_separator(None)
                    .with_units(UnitTable::french()),
                dates: crate::date::DateStrategy::DayFirst,
                ..SiteCommon::new("frtracker", "https://fr.example/search/{query}")
            },
            selectors: TableSelectors {
                table: "table#searchResult".into(),
                ..Default::default()
            },
            columns: ColumnMap {
                seeders: vec!["Seed".into()],
                leechers: vec!["Leech".into()],
                pubdate: vec!["Ajouté".into()],
                ..Default::default()
            },
        }
    }

    #[test]
    fn parses_localized_table() {
        let provider = TableProvider::new(site(), &Defaults::default()).unwrap();
        let records = provider.parse(PAGE, SearchMode::Episode).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.title, "Show S01E02 FRENCH");
        assert_eq!(record.link, "https://fr.example/torrent/1/show-s01e02");
        assert_eq!(record.size, 1_503_238_553);
        assert_eq!(record.seeders, 15);
        assert_eq!(record.leechers, 2);
        assert_eq!(
            record.pubdate.map(|date| date.date_naive().to_string()).as_deref(),
            Some("2022-05-02")
        );
    }

    #[test]
    fn zero_threshold_keeps_unseeded_rows() {
        let defaults = Defaults {
            min_seeders: 0,
            ..Default::default()
        };
        let provider = TableProvider::new(site(), &defaults).unwrap();
        let records = provider.parse(PAGE, SearchMode::Rss).unwrap();
        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Show S01E02 FRENCH", "Show S01E02 VOSTFR"]);
    }

    #[test]
    fn magnet_links_stay_as_they_are() {
        let provider = TableProvider::new(site(), &Defaults::default()).unwrap();
        assert_eq!(
            provider.absolute("magnet:?xt=urn:btih:abc".into()),
            "magnet:?xt=urn:btih:abc"
        );
    }

    #[test]
    fn relative_links_with_colons_are_joined() {
        let provider = TableProvider::new(site(), &Defaults::default()).unwrap();
        assert_eq!(
            provider.absolute("/torrent/1/Show:_The_Movie".into()),
            "https://fr.example/torrent/1/Show:_The_Movie"
        );
        assert_eq!(
            provider.absolute("https://mirror.example/t/1".into()),
            "https://mirror.example/t/1"
        );
    }

    #[test]
    fn bad_selector_fails_construction() {
        let mut site = site();
        site.selectors.cell = "td[".into();
        assert!(TableProvider::new(site, &Defaults::default()).is_err());
    }

    #[test]
    fn builds_search_url() {
        let provider = TableProvider::new(site(), &Defaults::default()).unwrap();
        assert_eq!(
            provider.search_url("Show S01E02", SearchMode::Episode),
            "https://fr.example/search/Show%20S01E02"
        );
    }
}
