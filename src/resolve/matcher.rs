use crate::domain::{similarity, work::MatchProvenance};

/// A video record returned by the search backend
#[derive(Debug, Clone, PartialEq)]
pub struct VideoCandidate {
    pub title: String,
    pub url: String,
    pub uploader: String,
}

/// Best candidate for a work; `url`, `uploader` and `score` always travel together
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub url: Option<String>,
    pub uploader: Option<String>,
    pub score: f64,
}

impl MatchOutcome {
    pub fn none() -> Self {
        Self {
            url: None,
            uploader: None,
            score: 0.0,
        }
    }

    pub fn is_match(&self) -> bool {
        self.url.is_some()
    }

    pub fn provenance(&self) -> Option<MatchProvenance> {
        self.uploader.as_ref().map(|uploader| MatchProvenance {
            uploader: uploader.clone(),
            score: self.score,
        })
    }
}

/// Picks the candidate whose title scores highest against `title`, first one on ties
pub fn select_best(title: &str, candidates: &[VideoCandidate]) -> MatchOutcome {
    let mut best: Option<(&VideoCandidate, f64)> = None;
    for candidate in candidates {
        let score = similarity::score(title, &candidate.title);
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((candidate, score));
        }
    }

    match best {
        Some((candidate, score)) => MatchOutcome {
            url: Some(candidate.url.clone()),
            uploader: Some(candidate.uploader.clone()),
            score,
        },
        None => MatchOutcome::none(),
    }
}
