use std::{
    fs, io,
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::debug;

pub static USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:99.0) Gecko/20100101 Firefox/99.0";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{url} answered {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("nothing to read for {0}")]
    NotFound(String),
}

/// Where page bodies come from.
pub trait Source {
    fn fetch(&mut self, url: &str) -> Result<String, FetchError>;
}

/// Live HTTP source with a polite delay between requests.
pub struct Fetcher {
    client: Client,
    delay: Duration,
    last_request: Option<Instant>,
}

impl Fetcher {
    pub fn new(user_agent: &str, delay: Duration) -> Result<Self, FetchError> {
        Ok(Fetcher {
            client: build_client(user_agent)?,
            delay,
            last_request: None,
        })
    }

    /// Sleep out whatever is left of the delay since the previous request.
    /// The first request goes out immediately.
    fn pause(&mut self) {
        if let Some(remaining) = self
            .last_request
            .and_then(|last| self.delay.checked_sub(last.elapsed()))
        {
            thread::sleep(remaining);
        }
        self.last_request = Some(Instant::now());
    }
}

impl Source for Fetcher {
    fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        self.pause();
        debug!(url, "fetching");

        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.into(),
                status,
            });
        }
        Ok(response.text()?)
    }
}

/// Serves one saved page for every request; used to replay a capture offline.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }
}

impl Source for FileSource {
    fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        debug!(url, path = %self.path.display(), "reading saved page");
        Ok(fs::read_to_string(&self.path)?)
    }
}

fn build_client(user_agent: &str) -> Result<Client, FetchError> {
    Ok(Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .build()?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn build_client() {
        super::build_client(USER_AGENT).unwrap();
    }

    #[test]
    fn first_request_is_not_delayed() {
        let mut fetcher = Fetcher::new(USER_AGENT, Duration::from_millis(50)).unwrap();
        let start = Instant::now();
        fetcher.pause();
        assert!(start.elapsed() < Duration::from_millis(50));
        fetcher.pause();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn file_source_serves_saved_page() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<table></table>").unwrap();

        let mut source = FileSource::new(file.path());
        assert_eq!(source.fetch("https://any.example/").unwrap(), "<table></table>");
    }

    #[test]
    fn file_source_reports_missing_file() {
        let mut source = FileSource::new("/nonexistent/page.html");
        assert!(matches!(source.fetch("x"), Err(FetchError::Io(_))));
    }
}
