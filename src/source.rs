//! Where raw feeds come from.

use crate::error::{LoaderError, Result};
use crate::feed::Feed;
use chrono::{NaiveDate, NaiveTime};
use log::debug;
use reqwest::blocking::Client;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default request timeout for feed endpoints.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot time sent to feed endpoints for `date`: midnight UTC, unix seconds.
pub fn feed_timestamp(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Fetches the raw bytes of one feed as of a point in time.
pub trait FeedSource {
    fn fetch(&self, feed: Feed, date: i64) -> Result<Vec<u8>>;
}

/// Feeds served over HTTP at `<base>/<feed>?date=<unix seconds>`.
pub struct HttpFeedSource {
    client: Client,
    base_url: String,
}

impl HttpFeedSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpFeedSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, feed: Feed) -> String {
        format!("{}/{}", self.base_url, feed.endpoint())
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch(&self, feed: Feed, date: i64) -> Result<Vec<u8>> {
        let url = self.url(feed);
        debug!("Fetching {} from {}", feed, url);

        let resp = self
            .client
            .get(&url)
            .query(&[("date", date)])
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().unwrap_or_default();
            return Err(LoaderError::Transport(format!(
                "{} feed returned status {}: {}",
                feed,
                status.as_u16(),
                message
            )));
        }

        Ok(resp.bytes()?.to_vec())
    }
}

/// Feeds stored as files in one directory: `buyers.json`, `products.txt`,
/// `transactions.bin`. The date is ignored.
pub struct DirFeedSource {
    dir: PathBuf,
}

impl DirFeedSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirFeedSource { dir: dir.into() }
    }
}

impl FeedSource for DirFeedSource {
    fn fetch(&self, feed: Feed, _date: i64) -> Result<Vec<u8>> {
        let path = self.dir.join(feed.file_name());
        debug!("Reading {} from {}", feed, path.display());
        Ok(fs::read(path)?)
    }
}
