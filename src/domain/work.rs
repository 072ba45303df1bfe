use std::fmt::Display;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Album label every single is filed under.
pub const SINGLE_ALBUM_LABEL: &str = "Single";

/// Literal written for works a human still has to resolve.
pub const NEEDS_ATTENTION: &str = "URL NEEDED";

/// Kind of release a work was crawled from
///
/// Snapshots are read leniently: any casing is accepted and unknown or
/// missing values become [`ReleaseKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ReleaseKind {
    Album,
    Ep,
    Single,
    #[default]
    Other,
}

impl From<String> for ReleaseKind {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl ReleaseKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "album" => Self::Album,
            "ep" => Self::Ep,
            "single" => Self::Single,
            _ => Self::Other,
        }
    }

    /// albums and EPs outrank singles and everything else
    pub fn is_full_release(self) -> bool {
        matches!(self, Self::Album | Self::Ep)
    }
}

impl Display for ReleaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Album => "album",
            Self::Ep => "ep",
            Self::Single => "single",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// A single track as found in the metadata catalog.
///
/// The title is the identity key; two works with the same normalized title
/// are the same song no matter which release they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub title: String,
    pub album: String,
    #[serde(rename = "album_record_type", default)]
    pub release_kind: ReleaseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_track_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_group_id: Option<u64>,
}

impl Work {
    pub fn new(title: &str, album: &str, release_kind: ReleaseKind) -> Self {
        Self {
            title: title.to_string(),
            album: album.to_string(),
            release_kind,
            catalog_track_id: None,
            catalog_group_id: None,
        }
    }
}

/// State of a work's playable video link.
///
/// In snapshot files an absent `url` field means the work was never looked up,
/// `null` means a lookup ran and found nothing, and [`NEEDS_ATTENTION`] marks it
/// for a human.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VideoLink {
    #[default]
    Unresolved,
    NotFound,
    NeedsAttention,
    Url(String),
}

impl VideoLink {
    /// Interprets free text typed by a reviewer or read from a file
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            Self::NotFound
        } else if raw == NEEDS_ATTENTION {
            Self::NeedsAttention
        } else {
            Self::Url(raw.to_string())
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved)
    }

    /// a real link that does not need another lookup
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    /// Value exposed in the public artifact
    pub fn public_value(&self) -> Option<String> {
        match self {
            Self::Unresolved | Self::NotFound => None,
            Self::NeedsAttention => Some(NEEDS_ATTENTION.to_string()),
            Self::Url(url) => Some(url.clone()),
        }
    }
}

impl Display for VideoLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unresolved => write!(f, "(not looked up)"),
            Self::NotFound => write!(f, "None"),
            Self::NeedsAttention => write!(f, "{NEEDS_ATTENTION}"),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

impl Serialize for VideoLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unresolved | Self::NotFound => serializer.serialize_none(),
            Self::NeedsAttention => serializer.serialize_str(NEEDS_ATTENTION),
            Self::Url(url) => serializer.serialize_str(url),
        }
    }
}

impl<'de> Deserialize<'de> for VideoLink {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // a missing field never reaches here, it takes the `Unresolved` default
        Ok(match Option::<String>::deserialize(deserializer)? {
            None => Self::NotFound,
            Some(raw) => Self::parse(&raw),
        })
    }
}

/// Why an automatic match was picked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchProvenance {
    pub uploader: String,
    pub score: f64,
}

/// A canonical work together with everything enrichment found for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWork {
    #[serde(flatten)]
    pub work: Work,
    #[serde(default)]
    pub art: Option<String>,
    #[serde(default, skip_serializing_if = "VideoLink::is_unresolved")]
    pub url: VideoLink,
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub provenance: Option<MatchProvenance>,
}

impl From<Work> for ResolvedWork {
    fn from(work: Work) -> Self {
        Self {
            work,
            art: None,
            url: VideoLink::Unresolved,
            provenance: None,
        }
    }
}

impl ResolvedWork {
    pub fn title(&self) -> &str {
        &self.work.title
    }

    pub fn album(&self) -> &str {
        &self.work.album
    }

    /// true when the automatic match came from someone other than `artist`
    pub fn is_off_provenance(&self, artist: &str) -> bool {
        self.url.is_usable()
            && self.provenance.as_ref().is_some_and(|p| {
                !p.uploader.is_empty() && p.uploader.to_lowercase() != artist.to_lowercase()
            })
    }

    /// Replaces the link by hand, automatic provenance no longer applies
    pub fn override_link(&mut self, link: VideoLink) {
        self.url = link;
        self.provenance = None;
    }

    pub fn to_public(&self) -> PublicEntry {
        PublicEntry {
            title: self.work.title.clone(),
            album: self.work.album.clone(),
            art: self.art.clone(),
            url: self.url.public_value(),
        }
    }
}

/// The reduced record published to the front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicEntry {
    pub title: String,
    pub album: String,
    pub art: Option<String>,
    pub url: Option<String>,
}
