use anyhow::{Context, ensure};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    /// Canonical artist name, also the uploader trusted for video matches
    pub artist: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub resolution: ResolutionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let config: Config =
            toml::from_str(&contents).with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.artist.trim().is_empty(), "artist must not be empty");
        ensure!(
            self.resolution.checkpoint_every > 0,
            "resolution.checkpoint_every must be positive"
        );
        ensure!(self.retry.max_attempts > 0, "retry.max_attempts must be positive");
        ensure!(self.video.search_results > 0, "video.search_results must be positive");
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the snapshot file of every stage
    pub output_dir: PathBuf,
    /// Reduced `{title, album, art, url}` list published to the site
    pub public_artifact: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("scripts/output"),
            public_artifact: PathBuf::from("src/settings/music.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub page_pause_ms: u64,
    pub art_pause_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deezer.com".to_string(),
            timeout_secs: 20,
            page_pause_ms: 250,
            art_pause_ms: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VideoConfig {
    pub program: String,
    pub search_results: usize,
    pub sleep_requests_secs: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            search_results: 5,
            sleep_requests_secs: 0.1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ResolutionConfig {
    pub checkpoint_every: usize,
    pub pacing_ms: u64,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            checkpoint_every: 10,
            pacing_ms: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_secs: 15,
            max_backoff_secs: 300,
            max_attempts: 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_minimal_config_toml() -> anyhow::Result<()> {
        let toml_str = r#"
version = 1
artist = "Matthew Parker"
"#;

        let cfg: Config = toml::from_str(toml_str)?;
        cfg.validate()?;

        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.artist, "Matthew Parker");

        // defaults
        assert_eq!(cfg.paths.output_dir, PathBuf::from("scripts/output"));
        assert_eq!(cfg.video.search_results, 5);
        assert_eq!(cfg.resolution.checkpoint_every, 10);
        assert_eq!(cfg.resolution.pacing_ms, 600);
        assert_eq!(cfg.retry.initial_backoff_secs, 15);
        assert_eq!(cfg.retry.max_backoff_secs, 300);
        assert_eq!(cfg.retry.max_attempts, 6);

        Ok(())
    }

    #[test]
    fn test_parse_full_config_toml() -> anyhow::Result<()> {
        let toml_str = r#"
version = 1
artist = "Someone"

[paths]
output_dir = "/tmp/out"
public_artifact = "/tmp/site/music.json"

[catalog]
base_url = "http://localhost:9000/"
page_pause_ms = 0

[video]
program = "/usr/local/bin/yt-dlp"
search_results = 3

[resolution]
checkpoint_every = 2
pacing_ms = 0

[retry]
initial_backoff_secs = 1
max_backoff_secs = 8
max_attempts = 4
"#;

        let cfg: Config = toml::from_str(toml_str)?;
        cfg.validate()?;

        assert_eq!(cfg.paths.public_artifact, PathBuf::from("/tmp/site/music.json"));
        assert_eq!(cfg.catalog.base_url, "http://localhost:9000/");
        // unspecified keys inside a table keep their defaults
        assert_eq!(cfg.catalog.timeout_secs, 20);
        assert_eq!(cfg.video.program, "/usr/local/bin/yt-dlp");
        assert_eq!(cfg.resolution.checkpoint_every, 2);
        assert_eq!(cfg.retry.max_attempts, 4);

        Ok(())
    }

    #[test]
    fn test_zero_checkpoint_interval_is_rejected() -> anyhow::Result<()> {
        let toml_str = r#"
version = 1
artist = "Someone"

[resolution]
checkpoint_every = 0
"#;

        let cfg: Config = toml::from_str(toml_str)?;
        assert!(cfg.validate().is_err());

        Ok(())
    }

    #[test]
    fn test_missing_artist_fails_to_parse() {
        assert!(toml::from_str::<Config>("version = 1").is_err());
    }
}
