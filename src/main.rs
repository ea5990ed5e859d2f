use std::{fmt::Write, fs, io, path::Path, time::Duration};

use anyhow::{bail, Context};
use chrono::Utc;
use hashbrown::HashSet;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use torrow::{
    args::Args,
    config::{load_config, validate_config},
    fetch::{FileSource, Fetcher, Source},
    history::History,
    provider::{search, Registry},
    record::{sort_by_seeders, ResultRecord},
    size::format_size,
    units::{Base, UnitTable},
};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = load_config(&args.config)
        .with_context(|| format!("failed to load config from {:?}", args.config))?;
    validate_config(&config).context("configuration validation failed")?;
    let query = args.query()?;

    let registry = Registry::from_sites(&config.sites, &config.defaults)?;
    let names: Vec<&str> = if args.sites.is_empty() {
        registry.names()
    } else {
        args.sites.iter().map(String::as_str).collect()
    };
    for name in &names {
        if registry.get(name).is_none() {
            bail!("unknown site {name:?}; configured: {}", registry.names().join(", "));
        }
    }

    let mut source: Box<dyn Source> = match &args.input {
        Some(path) => Box::new(FileSource::new(path)),
        None => Box::new(Fetcher::new(
            &config.user_agent,
            Duration::from_millis(config.request_delay_ms),
        )?),
    };

    let mut history = match (&config.history_path, args.no_history) {
        (_, true) => None,
        (Some(path), false) => Some(History::load_from(path)?),
        (None, false) => Some(History::load()?),
    };

    let after = args.take_after(config.history_days);
    let today = Utc::now().date_naive();

    let mut results = Vec::new();
    let mut unique_link_filter = HashSet::new();

    for name in names {
        let Some(provider) = registry.get(name) else {
            continue;
        };

        let mut recent = search(provider, source.as_mut(), &query);
        recent.retain(|record| {
            record.pubdate.map_or(true, |date| date.date_naive() >= after)
                && unique_link_filter.insert(record.link.clone())
                && history.as_mut().map_or(true, |history| history.filter(record, today))
        });
        results.extend(recent);
    }

    if !query.mode.is_rss() {
        sort_by_seeders(&mut results);
    }
    info!(results = results.len(), "done");

    if args.json {
        for record in &results {
            println!("{}", serde_json::to_string(record)?);
        }
    } else {
        write_html(&args.output, &results)?;
    }

    if let Some(history) = history {
        history.write(after)?;
    }

    Ok(())
}

fn write_html(path: &Path, records: &[ResultRecord]) -> io::Result<()> {
    let units = UnitTable::binary();
    let mut buf = String::new();
    buf += "<ul>\n";
    records
        .iter()
        .for_each(|record| format_line(&mut buf, record, &units));
    buf += "</ul>\n";
    fs::write(path, &buf)
}

fn format_line(buf: &mut String, record: &ResultRecord, units: &UnitTable) {
    let date = record
        .pubdate
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "?".into());
    let link = escape(&record.link);
    let title = escape(&record.title);
    let size = format_size(record.size, units, Base::Binary);
    let seeders = record.seeders;
    writeln!(
        buf,
        r#"  <li><strong>{date}</strong> <a href="{link}">{title}</a> {size}, {seeders} seeders</li>"#
    )
    .expect("writing to a String cannot fail")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
