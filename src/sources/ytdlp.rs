//! Video search backed by the `yt-dlp` command line tool

use std::process::Command;

use serde::Deserialize;

use crate::{
    config::VideoConfig,
    resolve::matcher::VideoCandidate,
    sources::{LookupError, VideoSearch, looks_rate_limited},
};

const UNKNOWN_UPLOADER: &str = "Unknown";

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    entries: Vec<Option<Entry>>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    title: String,
    webpage_url: Option<String>,
    url: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
}

impl Entry {
    fn into_candidate(self) -> Option<VideoCandidate> {
        let url = self.webpage_url.or(self.url)?;
        let uploader = self
            .uploader
            .or(self.channel)
            .unwrap_or_else(|| UNKNOWN_UPLOADER.to_string());
        Some(VideoCandidate {
            title: self.title,
            url,
            uploader,
        })
    }
}

pub struct YtDlpSearch {
    program: String,
    sleep_requests_secs: f64,
}

impl YtDlpSearch {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            program: config.program.clone(),
            sleep_requests_secs: config.sleep_requests_secs,
        }
    }
}

impl VideoSearch for YtDlpSearch {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<VideoCandidate>, LookupError> {
        let sleep_requests = self.sleep_requests_secs.to_string();
        let output = Command::new(&self.program)
            .args([
                "--dump-single-json",
                "--skip-download",
                "--no-warnings",
                "--no-check-certificates",
                "--sleep-requests",
                sleep_requests.as_str(),
            ])
            .arg(format!("ytsearch{limit}:{query}"))
            .output()
            .map_err(|e| LookupError::Process(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(if looks_rate_limited(&stderr) {
                LookupError::RateLimited(stderr)
            } else {
                LookupError::Process(stderr)
            });
        }

        parse_search_output(&output.stdout)
    }
}

fn parse_search_output(stdout: &[u8]) -> Result<Vec<VideoCandidate>, LookupError> {
    let result: SearchResult =
        serde_json::from_slice(stdout).map_err(|e| LookupError::Decode(e.to_string()))?;
    Ok(result
        .entries
        .into_iter()
        .flatten()
        .filter_map(Entry::into_candidate)
        .collect())
}
