use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use hashbrown::HashSet;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    fetch::USER_AGENT,
    provider::{Defaults, SiteConfig},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(String),
    #[error("unable to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Root configuration
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(flatten)]
    pub defaults: Defaults,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Days of history kept, and the default age cut-off for results.
    #[serde(default = "default_history_days")]
    pub history_days: i64,
    pub history_path: Option<PathBuf>,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

fn default_request_delay_ms() -> u64 {
    750
}

fn default_user_agent() -> String {
    USER_AGENT.into()
}

fn default_history_days() -> i64 {
    3
}

/// Load configuration from file with `TORROW_` environment overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("TORROW_"))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.sites.is_empty() {
        return Err(ConfigError::Validation("no sites configured".into()));
    }
    if config.history_days < 0 {
        return Err(ConfigError::Validation("history_days cannot be negative".into()));
    }
    validate_counts("defaults", &config.defaults)?;

    let mut names = HashSet::new();
    for site in &config.sites {
        let common = site.common();
        if common.name.trim().is_empty() {
            return Err(ConfigError::Validation("site with an empty name".into()));
        }
        if !names.insert(common.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "site {:?} is defined twice",
                common.name
            )));
        }
        common
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        let counts = Defaults {
            min_seeders: common.min_seeders.unwrap_or_default(),
            default_seeders: common.default_seeders.unwrap_or_default(),
            default_leechers: common.default_leechers.unwrap_or_default(),
            min_seed_policy: Default::default(),
        };
        validate_counts(&common.name, &counts)?;
    }

    Ok(())
}

fn validate_counts(scope: &str, counts: &Defaults) -> Result<(), ConfigError> {
    let fields = [
        ("min_seeders", counts.min_seeders),
        ("default_seeders", counts.default_seeders),
        ("default_leechers", counts.default_leechers),
    ];
    match fields.iter().find(|(_, value)| *value < 0) {
        Some((field, value)) => Err(ConfigError::Validation(format!(
            "{scope}: {field} cannot be negative (got {value})"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::{date::DateStrategy, normalize::MinSeedPolicy, units::Base};

    static SAMPLE: &str = r#"
min_seeders = 2
default_seeders = 1
request_delay_ms = 250

[[sites]]
kind = "table"
name = "frtracker"
search_url = "https://fr.example/search/{query}"
min_seed_policy = "capped_at_one"
dates = { kind = "day_first" }

[sites.size]
separator = ""
units = ["O", "KO", "MO", "GO", "TO", "PO"]

[sites.columns]
seeders = ["Seed"]
leechers = ["Leech"]

[[sites]]
kind = "json"
name = "api"
search_url = "https://api.example/q?s={query}"
items = "/data/torrents"
link_template = "magnet:?xt=urn:btih:{value}"

[sites.fields]
title = "/name"
link = "/info_hash"
"#;

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(SAMPLE).unwrap();
        assert_eq!(config.defaults.min_seeders, 2);
        assert_eq!(config.defaults.default_seeders, 1);
        assert_eq!(config.request_delay_ms, 250);
        assert_eq!(config.history_days, 3);
        assert_eq!(config.sites.len(), 2);

        let SiteConfig::Table(table) = &config.sites[0] else {
            panic!("expected a table site");
        };
        assert_eq!(table.common.min_seed_policy, Some(MinSeedPolicy::CappedAtOne));
        assert_eq!(table.common.dates, DateStrategy::DayFirst);
        assert_eq!(table.common.size.separator.as_deref(), Some(""));
        assert_eq!(table.common.size.base, Base::Binary);
        assert_eq!(table.common.size.units.index_of("go"), Some(3));
        assert_eq!(table.columns.seeders, ["Seed"]);
        assert_eq!(table.columns.size, ["Size", "Taille"]);

        let SiteConfig::Json(json) = &config.sites[1] else {
            panic!("expected a json site");
        };
        assert_eq!(json.fields.title, "/name");
        assert_eq!(json.fields.seeders.as_deref(), Some("/seeders"));

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_config_from_str_unknown_kind() {
        let toml = r#"
[[sites]]
kind = "carrier_pigeon"
name = "x"
search_url = "{query}"
"#;
        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/torrow.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{SAMPLE}").unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.sites[1].common().name, "api");
    }

    #[test]
    fn test_validate_rejects_duplicates_and_bad_templates() {
        let mut config = load_config_from_str(SAMPLE).unwrap();
        config.sites.push(config.sites[0].clone());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation(_))
        ));

        let config = load_config_from_str(
            r#"
[[sites]]
kind = "json"
name = "api"
search_url = "https://api.example/latest"
"#,
        )
        .unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_site_list() {
        let config = load_config_from_str("min_seeders = 1").unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_negative_counts() {
        let config = load_config_from_str(&SAMPLE.replace("min_seeders = 2", "min_seeders = -10")).unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation(message)) if message.contains("min_seeders")
        ));

        let mut config = load_config_from_str(SAMPLE).unwrap();
        let SiteConfig::Table(table) = &mut config.sites[0] else {
            panic!("expected a table site");
        };
        table.common.default_leechers = Some(-1);
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation(message)) if message.contains("frtracker")
        ));
    }
}
