use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{Defaults, Provider, ProviderError, SiteCommon};
use crate::{
    coerce::RawValue,
    normalize::Normalizer,
    record::{RawRow, ResultRecord, SearchMode},
};

/// JSON pointers, relative to one item, for each field.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JsonFields {
    pub title: String,
    pub link: String,
    pub size: Option<String>,
    pub seeders: Option<String>,
    pub leechers: Option<String>,
    pub pubdate: Option<String>,
    pub freeleech: Option<String>,
}

impl Default for JsonFields {
    fn default() -> Self {
        JsonFields {
            title: "/title".into(),
            link: "/link".into(),
            size: Some("/size".into()),
            seeders: Some("/seeders".into()),
            leechers: Some("/leechers".into()),
            pubdate: Some("/pubdate".into()),
            freeleech: None,
        }
    }
}

/// A site with a JSON search API.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct JsonSite {
    #[serde(flatten)]
    pub common: SiteCommon,
    /// Pointer to the item array; empty for a top-level array.
    #[serde(default)]
    pub items: String,
    #[serde(default)]
    pub fields: JsonFields,
    /// Builds the link from the `link` field, e.g.
    /// `magnet:?xt=urn:btih:{value}&dn={title}`.
    #[serde(default)]
    pub link_template: Option<String>,
    #[serde(default)]
    pub freeleech_only: bool,
}

pub struct JsonProvider {
    site: JsonSite,
    defaults: Defaults,
}

impl JsonProvider {
    pub fn new(site: JsonSite, defaults: &Defaults) -> Self {
        JsonProvider {
            site,
            defaults: defaults.clone(),
        }
    }

    fn raw_row(&self, item: &Value) -> RawRow {
        let fields = &self.site.fields;
        let title = item.pointer(&fields.title).and_then(text);
        let link = item.pointer(&fields.link).and_then(text).map(|value| {
            match &self.site.link_template {
                Some(template) => template.replace("{value}", &value).replace(
                    "{title}",
                    &urlencoding::encode(title.as_deref().unwrap_or_default()),
                ),
                None => value,
            }
        });

        let field = |pointer: &Option<String>| -> RawValue {
            pointer
                .as_deref()
                .and_then(|pointer| item.pointer(pointer))
                .map(RawValue::from)
                .unwrap_or_default()
        };

        RawRow {
            title,
            link,
            size: field(&fields.size),
            seeders: field(&fields.seeders),
            leechers: field(&fields.leechers),
            pubdate: field(&fields.pubdate),
        }
    }

    fn is_freeleech(&self, item: &Value) -> bool {
        let flag = self
            .site
            .fields
            .freeleech
            .as_deref()
            .and_then(|pointer| item.pointer(pointer));

        match flag {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(number)) => number.as_f64().map_or(false, |n| n != 0.0),
            Some(Value::String(text)) => {
                matches!(text.trim().to_lowercase().as_str(), "1" | "true" | "yes")
            }
            _ => false,
        }
    }
}

impl Provider for JsonProvider {
    fn name(&self) -> &str {
        &self.site.common.name
    }

    fn search_url(&self, search: &str, mode: SearchMode) -> String {
        self.site.common.url_for(search, mode)
    }

    fn parse(&self, body: &str, mode: SearchMode) -> Result<Vec<ResultRecord>, ProviderError> {
        let payload: Value = serde_json::from_str(body)?;
        let items = payload
            .pointer(&self.site.items)
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::MissingItems(self.site.items.clone()))?;

        let rows: Vec<RawRow> = items
            .iter()
            .filter(|item| {
                let keep = !self.site.freeleech_only || self.is_freeleech(item);
                if !keep {
                    debug!(provider = self.name(), "skipping non-freeleech item");
                }
                keep
            })
            .map(|item| self.raw_row(item))
            .collect();

        let normalizer = Normalizer::new(self.site.common.options(&self.defaults)).with_mode(mode);
        Ok(normalizer.normalize_all(&rows))
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
