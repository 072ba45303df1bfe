//! External collaborators: metadata catalog, cover art and video search

use thiserror::Error;

use crate::{
    domain::work::Work,
    resolve::{
        fetcher::{RateLimitedFetcher, Sleeper},
        matcher::VideoCandidate,
    },
};

pub mod deezer;
pub mod ytdlp;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("http status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("{0}")]
    NotFound(String),

    #[error("search process failed: {0}")]
    Process(String),

    #[error("interrupted")]
    Interrupted,
}

impl LookupError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// Crawls the whole discography of an artist
pub trait CatalogCrawler {
    fn crawl<S: Sleeper>(
        &mut self,
        artist: &str,
        fetcher: &mut RateLimitedFetcher<S>,
    ) -> Result<Vec<Work>, LookupError>;
}

/// Cover image for a release group, `None` when it has none
pub trait CoverArtLookup {
    fn cover_for(&mut self, group_id: u64) -> Result<Option<String>, LookupError>;
}

/// Free-text video search returning candidates in ranking order
pub trait VideoSearch {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<VideoCandidate>, LookupError>;
}

/// Treats a free-form failure message as throttling when it says so
pub(crate) fn looks_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["429", "too many requests", "rate limit", "quota"]
        .iter()
        .any(|needle| lower.contains(needle))
}
