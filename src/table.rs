use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use unicase::UniCase;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("no column labelled {name:?}")]
pub struct ColumnNotFound {
    pub name: String,
}

#[derive(Clone, Debug, Error)]
#[error("bad selector {selector:?}: {reason}")]
pub struct BadSelector {
    pub selector: String,
    pub reason: String,
}

/// Position of the column labelled `name`, ignoring case and padding.
pub fn column_index<S: AsRef<str>>(labels: &[S], name: &str) -> Result<usize, ColumnNotFound> {
    let key = UniCase::new(name.trim());
    labels
        .iter()
        .position(|label| UniCase::new(label.as_ref().trim()) == key)
        .ok_or_else(|| ColumnNotFound { name: name.into() })
}

/// Text and link targets of one table cell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub links: Vec<String>,
    /// `title` attribute of the first link, where sites keep untruncated names.
    pub title: Option<String>,
}

impl Cell {
    pub fn link(&self) -> Option<&str> {
        self.links.first().map(String::as_str)
    }

    pub fn link_starting_with(&self, prefix: &str) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.starts_with(prefix))
            .map(String::as_str)
    }

    fn from_element(element: ElementRef, anchor: &Selector) -> Self {
        let mut links = Vec::new();
        let mut title = None;
        for a in element.select(anchor) {
            if let Some(href) = a.value().attr("href") {
                links.push(href.trim().to_owned());
            }
            if title.is_none() {
                title = a.value().attr("title").map(|t| t.trim().to_owned());
            }
        }

        Cell {
            text: collapse_whitespace(element.text()),
            links,
            title,
        }
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// One data row viewed through the table's header labels.
#[derive(Clone, Copy, Debug)]
pub struct Row<'a> {
    labels: &'a [String],
    cells: &'a [Cell],
}

impl<'a> Row<'a> {
    pub fn cell(&self, name: &str) -> Result<&'a Cell, ColumnNotFound> {
        let idx = column_index(self.labels, name)?;
        self.cells.get(idx).ok_or_else(|| ColumnNotFound { name: name.into() })
    }

    /// First cell found among alternate labels, e.g. `["Size", "Taille"]`.
    pub fn cell_any<S: AsRef<str>>(&self, names: &[S]) -> Result<&'a Cell, ColumnNotFound> {
        names
            .iter()
            .find_map(|name| self.cell(name.as_ref()).ok())
            .ok_or_else(|| ColumnNotFound {
                name: names
                    .iter()
                    .map(AsRef::as_ref)
                    .collect::<Vec<_>>()
                    .join("|"),
            })
    }

    pub fn cells(&self) -> &'a [Cell] {
        self.cells
    }
}

/// Selectors locating a results table inside a page.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TableSelectors {
    pub table: String,
    pub header: String,
    pub row: String,
    pub cell: String,
}

impl Default for TableSelectors {
    fn default() -> Self {
        TableSelectors {
            table: "table".into(),
            header: "tr th".into(),
            row: "tr".into(),
            cell: "td".into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    labels: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(labels: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Table { labels, rows }
    }

    pub fn from_html(html: &str, selectors: &TableSelectors) -> Result<Self, BadSelector> {
        let table_selector = parse_selector(&selectors.table)?;
        let header_selector = parse_selector(&selectors.header)?;
        let row_selector = parse_selector(&selectors.row)?;
        let cell_selector = parse_selector(&selectors.cell)?;
        let anchor_selector = parse_selector("a")?;

        let document = Html::parse_document(html);
        let Some(table) = document.select(&table_selector).next() else {
            debug!(selector = %selectors.table, "no results table in page");
            return Ok(Table::default());
        };

        let labels = table
            .select(&header_selector)
            .map(|th| collapse_whitespace(th.text()))
            .collect();
        let rows = table
            .select(&row_selector)
            .map(|tr| {
                tr.select(&cell_selector)
                    .map(|td| Cell::from_element(td, &anchor_selector))
                    .collect::<Vec<_>>()
            })
            .filter(|cells| !cells.is_empty())
            .collect();

        Ok(Table { labels, rows })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Rows in document order; rows with fewer cells than labels are skipped.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.rows.iter().enumerate().filter_map(move |(idx, cells)| {
            if cells.len() < self.labels.len() {
                debug!(
                    row = idx,
                    cells = cells.len(),
                    labels = self.labels.len(),
                    "skipping truncated row"
                );
                return None;
            }
            Some(Row {
                labels: &self.labels,
                cells,
            })
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, BadSelector> {
    Selector::parse(selector).map_err(|e| BadSelector {
        selector: selector.into(),
        reason: format!("{e:?}"),
    })
}

fn collapse_whitespace<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
