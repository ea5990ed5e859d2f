use std::{
    fs::{self, File},
    hash::Hash,
    io,
    path::{Path, PathBuf},
};

use chrono::{Duration, NaiveDate};
use directories::UserDirs;
use hashbrown::HashSet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::ResultRecord;

#[derive(Clone, Debug, Eq, Deserialize, Serialize)]
struct Entry {
    key: String,
    date: NaiveDate,
}

impl Hash for Entry {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

/// Results already handed on, so repeated polling only reports new ones.
#[derive(Clone, Debug)]
pub struct History {
    entries: HashSet<Entry>,
    hash_pattern: Regex,
    path: PathBuf,
}

impl History {
    /// History file in the user's home directory.
    pub fn load() -> io::Result<Self> {
        Self::load_from(get_history_path()?)
    }

    pub fn load_from(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let mut history = History::empty(path.clone());
        if !path.exists() {
            return Ok(history);
        }

        let text = fs::read_to_string(&path)?;
        history.entries = serde_json::from_str(&text)?;
        debug!(path = %path.display(), entries = history.entries.len(), "loaded history");
        Ok(history)
    }

    fn empty(path: PathBuf) -> Self {
        History {
            entries: Default::default(),
            hash_pattern: Regex::new(r#"(?i)btih:([^&]+)"#).unwrap(),
            path,
        }
    }

    /// True if `record` has not been seen before. Either way it is
    /// remembered as last seen on `today`, so items still listed are not
    /// pruned.
    pub fn filter(&mut self, record: &ResultRecord, today: NaiveDate) -> bool {
        let entry = Entry {
            key: self.key(&record.link),
            date: today,
        };
        self.entries.replace(entry).is_none()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist entries seen on or after `limit`, keeping one extra day of slack.
    pub fn write(&self, limit: NaiveDate) -> io::Result<()> {
        let slack_date = limit - Duration::days(1);
        let entries: HashSet<_> = self
            .entries
            .iter()
            .filter(|entry| entry.date >= slack_date)
            .cloned()
            .collect();

        let new_history = new_path(&self.path);
        let mut file = File::create(&new_history)?;
        serde_json::to_writer_pretty(&mut file, &entries)?;
        fs::rename(&new_history, &self.path)
    }

    /// Magnet links are keyed by info hash, so the same torrent listed with
    /// different trackers counts once.
    fn key(&self, link: &str) -> String {
        self.hash_pattern
            .captures(link)
            .and_then(|captures| captures.get(1))
            .map(|hash| hash.as_str().to_lowercase())
            .unwrap_or_else(|| link.to_owned())
    }
}

fn get_history_path() -> io::Result<PathBuf> {
    let directories = UserDirs::new()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "user dirs not found"))?;

    let mut history = directories.home_dir().to_owned();
    history.push(".torrow_history");
    Ok(history)
}

fn new_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_owned();
    name.push(".new");
    path.with_file_name(name)
}
