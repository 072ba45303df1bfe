//! Deezer public API: discography crawl and album covers

use std::{collections::HashSet, time::Duration};

use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    config::CatalogConfig,
    domain::work::{ReleaseKind, SINGLE_ALBUM_LABEL, Work},
    resolve::fetcher::{RateLimitedFetcher, Sleeper},
    sources::{CatalogCrawler, CoverArtLookup, LookupError},
};

/// in-band error code the API uses for quota exhaustion
const QUOTA_EXCEEDED: u32 = 4;
/// in-band error code for unknown objects
const NO_DATA: u32 = 800;

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: u32,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistRecord {
    id: u64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumRecord {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub record_type: String,
    pub tracklist: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackRecord {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    pub artist: Option<ArtistRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
struct AlbumDetails {
    cover_medium: Option<String>,
    cover: Option<String>,
    cover_big: Option<String>,
}

impl AlbumDetails {
    fn best_cover(self) -> Option<String> {
        [self.cover_medium, self.cover, self.cover_big]
            .into_iter()
            .flatten()
            .find(|url| !url.is_empty())
    }
}

pub struct DeezerCatalog {
    agent: ureq::Agent,
    base_url: String,
    page_pause: Duration,
}

impl DeezerCatalog {
    pub fn new(config: &CatalogConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_pause: Duration::from_millis(config.page_pause_ms),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, LookupError> {
        let response = self.agent.get(url).call().map_err(|e| classify(url, e))?;
        let value: serde_json::Value = response
            .into_json()
            .map_err(|e| LookupError::Decode(format!("{url}: {e}")))?;

        if let Some(error) = value.get("error") {
            let error: ApiError = serde_json::from_value(error.clone())
                .map_err(|e| LookupError::Decode(format!("{url}: {e}")))?;
            return Err(match error.code {
                QUOTA_EXCEEDED => LookupError::RateLimited(error.message),
                NO_DATA => LookupError::NotFound(format!("{url}: {}", error.message)),
                _ => LookupError::Decode(format!("{url}: {}", error.message)),
            });
        }

        serde_json::from_value(value).map_err(|e| LookupError::Decode(format!("{url}: {e}")))
    }

    /// Follows `next` links until the resource is exhausted
    fn fetch_all<T: DeserializeOwned, S: Sleeper>(
        &self,
        url: &str,
        fetcher: &mut RateLimitedFetcher<S>,
    ) -> Result<Vec<T>, LookupError> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        let mut page_no = 1;
        while let Some(url) = next {
            let page: Page<T> =
                fetcher.fetch(|| self.get_json(&url), LookupError::is_rate_limited)?;
            log::debug!("page {page_no}: {} items from {url}", page.data.len());
            items.extend(page.data);
            next = page.next;
            page_no += 1;
            fetcher.pause(self.page_pause);
        }
        Ok(items)
    }

    fn find_artist<S: Sleeper>(
        &self,
        name: &str,
        fetcher: &mut RateLimitedFetcher<S>,
    ) -> Result<u64, LookupError> {
        let url = format!(
            "{}/search/artist?q={}",
            self.base_url,
            urlencoding::encode(name)
        );
        println!("Searching catalog for artist '{name}'");
        let page: Page<ArtistRecord> =
            fetcher.fetch(|| self.get_json(&url), LookupError::is_rate_limited)?;

        if let Some(artist) = page
            .data
            .iter()
            .find(|a| a.name.to_lowercase() == name.to_lowercase())
        {
            println!("Matched artist: {} (id={})", artist.name, artist.id);
            return Ok(artist.id);
        }
        match page.data.first() {
            Some(fallback) => {
                println!(
                    "Using first search result as fallback: {} (id={})",
                    fallback.name, fallback.id
                );
                Ok(fallback.id)
            }
            None => Err(LookupError::NotFound(format!(
                "no artist results for '{name}'"
            ))),
        }
    }

    fn fetch_albums<S: Sleeper>(
        &self,
        artist_id: u64,
        fetcher: &mut RateLimitedFetcher<S>,
    ) -> Result<Vec<AlbumRecord>, LookupError> {
        let url = format!("{}/artist/{artist_id}/albums?limit=100", self.base_url);
        let mut seen = HashSet::new();
        let albums: Vec<AlbumRecord> = self
            .fetch_all::<AlbumRecord, _>(&url, fetcher)?
            .into_iter()
            .filter(|album| seen.insert(album.id))
            .collect();
        println!("Found {} unique albums/EPs/singles", albums.len());
        Ok(albums)
    }
}

impl CatalogCrawler for DeezerCatalog {
    fn crawl<S: Sleeper>(
        &mut self,
        artist: &str,
        fetcher: &mut RateLimitedFetcher<S>,
    ) -> Result<Vec<Work>, LookupError> {
        let artist_id = self.find_artist(artist, fetcher)?;
        let albums = self.fetch_albums(artist_id, fetcher)?;

        let mut builder = TrackListBuilder::new(artist_id);
        for (idx, album) in albums.iter().enumerate() {
            println!(
                "[{}/{}] Album: {} (record_type={}, id={})",
                idx + 1,
                albums.len(),
                album.title.trim(),
                album.record_type,
                album.id
            );
            let Some(tracklist) = &album.tracklist else {
                println!("  No tracklist url; skipping");
                continue;
            };
            let tracks = self.fetch_all::<TrackRecord, _>(tracklist, fetcher)?;
            builder.add_album(album, tracks);
            if fetcher.interrupted() {
                return Err(LookupError::Interrupted);
            }
        }

        let (works, summary) = builder.finish();
        println!(
            "Collected {} unique tracks across {} albums",
            works.len(),
            summary.len()
        );
        for (album, count) in &summary {
            println!("  {album}: {count} tracks");
        }
        Ok(works)
    }
}

impl CoverArtLookup for DeezerCatalog {
    fn cover_for(&mut self, group_id: u64) -> Result<Option<String>, LookupError> {
        let url = format!("{}/album/{group_id}", self.base_url);
        match self.get_json::<AlbumDetails>(&url) {
            Ok(details) => Ok(details.best_cover()),
            Err(LookupError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn classify(url: &str, error: ureq::Error) -> LookupError {
    match error {
        ureq::Error::Status(429, _) => LookupError::RateLimited(format!("429 from {url}")),
        ureq::Error::Status(404, _) => LookupError::NotFound(url.to_string()),
        ureq::Error::Status(status, _) => LookupError::Status {
            status,
            url: url.to_string(),
        },
        ureq::Error::Transport(transport) => LookupError::Transport(transport.to_string()),
    }
}

/// Turns crawled albums into a flat, de-duplicated list of works
pub struct TrackListBuilder {
    artist_id: u64,
    seen: HashSet<(String, String)>,
    works: Vec<Work>,
    summary: Vec<(String, usize)>,
}

impl TrackListBuilder {
    pub fn new(artist_id: u64) -> Self {
        Self {
            artist_id,
            seen: HashSet::new(),
            works: Vec::new(),
            summary: Vec::new(),
        }
    }

    pub fn add_album(&mut self, album: &AlbumRecord, tracks: Vec<TrackRecord>) {
        let kind = ReleaseKind::parse(&album.record_type);
        let album_title = album.title.trim();
        let label = if kind == ReleaseKind::Single {
            SINGLE_ALBUM_LABEL
        } else {
            album_title
        };

        let mut count = 0;
        for track in tracks {
            // appearances on other artists' records
            if track.artist.as_ref().map(|a| a.id) != Some(self.artist_id) {
                continue;
            }
            let title = track.title.trim();
            if !self
                .seen
                .insert((title.to_lowercase(), label.to_lowercase()))
            {
                continue;
            }
            let mut work = Work::new(title, label, kind);
            work.catalog_track_id = Some(track.id);
            work.catalog_group_id = Some(album.id);
            log::debug!("  + {title}");
            self.works.push(work);
            count += 1;
        }
        self.summary.push((album_title.to_string(), count));
    }

    pub fn finish(mut self) -> (Vec<Work>, Vec<(String, usize)>) {
        self.works
            .sort_by_cached_key(|w| (w.album.to_lowercase(), w.title.to_lowercase()));
        (self.works, self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn album(id: u64, title: &str, record_type: &str) -> AlbumRecord {
        AlbumRecord {
            id,
            title: title.into(),
            record_type: record_type.into(),
            tracklist: None,
        }
    }

    fn track(id: u64, title: &str, artist: u64) -> TrackRecord {
        TrackRecord {
            id,
            title: title.into(),
            artist: Some(ArtistRef { id: artist }),
        }
    }

    #[test]
    fn singles_are_filed_under_fixed_label() {
        let mut builder = TrackListBuilder::new(1);
        builder.add_album(&album(10, "Fireworks", "single"), vec![track(100, "Fireworks", 1)]);

        let (works, _) = builder.finish();
        assert_eq!(works[0].album, SINGLE_ALBUM_LABEL);
        assert_eq!(works[0].release_kind, ReleaseKind::Single);
        assert_eq!(works[0].catalog_group_id, Some(10));
    }

    #[test]
    fn other_artists_and_repeats_are_skipped() {
        let mut builder = TrackListBuilder::new(1);
        builder.add_album(
            &album(10, " Record ", "album"),
            vec![
                track(100, "Intro", 1),
                track(101, "Guest Spot", 2),
                track(102, "intro ", 1),
            ],
        );
        builder.add_album(&album(11, "Other", "album"), vec![track(103, "Intro", 1)]);

        let (works, summary) = builder.finish();
        assert_eq!(works.len(), 2);
        assert_eq!(summary, vec![("Record".to_string(), 1), ("Other".to_string(), 1)]);
    }

    #[test]
    fn output_is_sorted_by_album_and_title() {
        let mut builder = TrackListBuilder::new(1);
        builder.add_album(
            &album(10, "b", "album"),
            vec![track(1, "z", 1), track(2, "A", 1)],
        );
        builder.add_album(&album(11, "A", "ep"), vec![track(3, "m", 1)]);

        let (works, _) = builder.finish();
        let order: Vec<_> = works.iter().map(|w| w.title.as_str()).collect();
        assert_eq!(order, ["m", "A", "z"]);
    }

    #[test]
    fn cover_prefers_medium_then_default_then_big() {
        let details: AlbumDetails = serde_json::from_str(
            r#"{"cover": "https://c/default", "cover_big": "https://c/big", "cover_medium": ""}"#,
        )
        .unwrap();
        assert_eq!(details.best_cover().as_deref(), Some("https://c/default"));

        let details: AlbumDetails = serde_json::from_str(r#"{"cover_big": null}"#).unwrap();
        assert_eq!(details.best_cover(), None);
    }

    #[test]
    fn paginated_response_parses_next_link() {
        let page: Page<TrackRecord> = serde_json::from_str(
            r#"{"data":[{"id":1,"title":"A","artist":{"id":9}}],"total":2,"next":"https://api/next"}"#,
        )
        .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.next.as_deref(), Some("https://api/next"));
    }
}
