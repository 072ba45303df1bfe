//! Drives video resolution over the canonical work list.
//!
//! A run walks the works in order, skipping any that already carry a playable
//! link, so an interrupted run can simply be started again. Progress is
//! persisted through a [`Checkpoint`] every `checkpoint_every` looked-up works
//! and once more at the end.
//!
//! Matches whose uploader is not the canonical artist are flagged. The flagged
//! queue gets one aggregate decision after the pass ([`adjudicate_flagged`]);
//! finer per-work corrections happen later in [`manual_review`].

use std::time::Duration;

use crate::{
    config::Config,
    domain::work::{ResolvedWork, VideoLink},
    resolve::{
        fetcher::{RateLimitedFetcher, Sleeper},
        matcher::{MatchOutcome, select_best},
    },
    review::{BatchDecision, ReviewCommand, ReviewError, Reviewer},
    sources::{LookupError, VideoSearch},
    storage::error::StorageError,
};

/// Durable sink for in-progress work lists
pub trait Checkpoint {
    fn persist(&mut self, works: &[ResolvedWork]) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub artist: String,
    pub search_results: usize,
    pub checkpoint_every: usize,
    pub pacing: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            artist: config.artist.clone(),
            search_results: config.video.search_results,
            checkpoint_every: config.resolution.checkpoint_every,
            pacing: Duration::from_millis(config.resolution.pacing_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Matched,
    Flagged,
    NoneFound,
    LookupFailed,
}

#[derive(Debug, Default)]
pub struct ResolutionReport {
    pub skipped: usize,
    pub matched: usize,
    pub none_found: usize,
    pub failed: usize,
    /// indices of works matched to a foreign uploader
    pub flagged: Vec<usize>,
    pub decision: Option<BatchDecision>,
    pub interrupted: bool,
}

impl ResolutionReport {
    fn record(&mut self, outcome: Outcome, idx: usize) {
        match outcome {
            Outcome::Skipped => self.skipped += 1,
            Outcome::Matched => self.matched += 1,
            Outcome::Flagged => {
                self.matched += 1;
                self.flagged.push(idx);
            }
            Outcome::NoneFound => self.none_found += 1,
            Outcome::LookupFailed => self.failed += 1,
        }
    }

    pub fn looked_up(&self) -> usize {
        self.matched + self.none_found + self.failed
    }
}

pub struct ResolutionPipeline<V, S> {
    settings: PipelineSettings,
    search: V,
    fetcher: RateLimitedFetcher<S>,
}

impl<V: VideoSearch, S: Sleeper> ResolutionPipeline<V, S> {
    pub fn new(settings: PipelineSettings, search: V, fetcher: RateLimitedFetcher<S>) -> Self {
        Self {
            settings,
            search,
            fetcher,
        }
    }

    /// Full automatic pass: resolve, then settle the flagged queue with `decide`,
    /// then persist. Always persists, even when interrupted.
    pub fn run<C, D>(
        &mut self,
        works: &mut [ResolvedWork],
        checkpoint: &mut C,
        decide: D,
    ) -> Result<ResolutionReport, StorageError>
    where
        C: Checkpoint,
        D: FnOnce(&[&ResolvedWork], &str) -> Result<BatchDecision, ReviewError>,
    {
        let mut report = self.resolve_videos(works, checkpoint);

        if !report.interrupted && !report.flagged.is_empty() {
            let flagged: Vec<&ResolvedWork> = report.flagged.iter().map(|&i| &works[i]).collect();
            match decide(&flagged, &self.settings.artist) {
                Ok(decision) => {
                    adjudicate_flagged(works, &report.flagged, decision);
                    report.decision = Some(decision);
                }
                Err(e) => {
                    println!("Flagged tracks left for manual review: {e}");
                    report.interrupted = matches!(e, ReviewError::Interrupted);
                }
            }
        }

        checkpoint.persist(works)?;
        Ok(report)
    }

    /// Looks up every work lacking a playable link
    pub fn resolve_videos<C: Checkpoint>(
        &mut self,
        works: &mut [ResolvedWork],
        checkpoint: &mut C,
    ) -> ResolutionReport {
        let mut report = ResolutionReport::default();
        let total = works.len();

        for idx in 0..total {
            if self.fetcher.interrupted() {
                report.interrupted = true;
                break;
            }
            let work = &mut works[idx];
            println!("[{}/{total}] {} ({})", idx + 1, work.title(), work.album());

            let Some(outcome) = self.resolve_one(work) else {
                report.interrupted = true;
                break;
            };
            report.record(outcome, idx);
            if outcome == Outcome::Skipped {
                continue;
            }

            self.fetcher.pause(self.settings.pacing);

            if report.looked_up() % self.settings.checkpoint_every.max(1) == 0 {
                println!("  Checkpoint: saving intermediate results...");
                if let Err(e) = checkpoint.persist(works) {
                    log::warn!("failed to save checkpoint: {e}");
                }
            }
        }

        report
    }

    /// `None` when the lookup was abandoned because of an interrupt
    fn resolve_one(&mut self, work: &mut ResolvedWork) -> Option<Outcome> {
        if work.url.is_usable() {
            println!("  Skipping (already has URL)");
            return Some(Outcome::Skipped);
        }

        let query = format!("{} - {}", self.settings.artist, work.title());
        let limit = self.settings.search_results;
        println!("  Searching for: {query}");

        let search = &mut self.search;
        let (outcome, failed) = match self.fetcher.fetch(
            || search.search(&query, limit),
            LookupError::is_rate_limited,
        ) {
            Ok(candidates) => (select_best(work.title(), &candidates), false),
            Err(_) if self.fetcher.interrupted() => return None,
            Err(e) => {
                println!("  Video search error: {e}");
                (MatchOutcome::none(), true)
            }
        };

        work.provenance = outcome.provenance();
        work.url = match &outcome.url {
            Some(url) => VideoLink::Url(url.clone()),
            None => VideoLink::NotFound,
        };

        if failed {
            return Some(Outcome::LookupFailed);
        }
        let Some(uploader) = &outcome.uploader else {
            println!("  No video results");
            return Some(Outcome::NoneFound);
        };
        println!(
            "  Best match: {} | uploader={uploader} | score={:.2}",
            work.url, outcome.score
        );

        if work.is_off_provenance(&self.settings.artist) {
            println!(
                "  FLAGGED: uploader is '{uploader}', not '{}'",
                self.settings.artist
            );
            Some(Outcome::Flagged)
        } else {
            Some(Outcome::Matched)
        }
    }
}

/// Applies one coarse decision to every flagged work, without re-checking each
pub fn adjudicate_flagged(works: &mut [ResolvedWork], flagged: &[usize], decision: BatchDecision) {
    match decision {
        BatchDecision::AcceptAll => {
            println!("Keeping all {} flagged URLs as found", flagged.len());
        }
        BatchDecision::MarkAllNeedsAttention => {
            println!("Marking {} tracks as needing attention", flagged.len());
            for &idx in flagged {
                if let Some(work) = works.get_mut(idx) {
                    work.url = VideoLink::NeedsAttention;
                }
            }
        }
    }
}

/// Works a human should look at: no playable link, or one from a foreign uploader
pub fn needs_review(work: &ResolvedWork, artist: &str) -> bool {
    !work.url.is_usable() || work.is_off_provenance(artist)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReviewReport {
    pub pending: usize,
    pub kept: usize,
    pub replaced: usize,
    pub marked: usize,
    pub skipped: usize,
    pub interrupted: bool,
}

/// Presents every work that [`needs_review`] one at a time.
///
/// Each change is persisted right away, so stopping at any prompt loses nothing.
pub fn manual_review<R: Reviewer, C: Checkpoint>(
    works: &mut [ResolvedWork],
    artist: &str,
    reviewer: &mut R,
    checkpoint: &mut C,
) -> Result<ReviewReport, StorageError> {
    let pending: Vec<usize> = works
        .iter()
        .enumerate()
        .filter(|(_, work)| needs_review(work, artist))
        .map(|(idx, _)| idx)
        .collect();

    let mut report = ReviewReport {
        pending: pending.len(),
        ..Default::default()
    };

    for (pos, &idx) in pending.iter().enumerate() {
        let command = match reviewer.review(&works[idx], pos + 1, pending.len()) {
            Ok(command) => command,
            Err(e) => {
                log::info!("review stopped: {e}");
                report.interrupted = true;
                break;
            }
        };

        let work = &mut works[idx];
        match command {
            ReviewCommand::Keep => {
                report.kept += 1;
                continue;
            }
            ReviewCommand::Skip => {
                report.skipped += 1;
                continue;
            }
            ReviewCommand::Replace(url) => {
                work.override_link(VideoLink::parse(&url));
                println!("Updated URL to: {}", work.url);
                report.replaced += 1;
            }
            ReviewCommand::MarkNeedsAttention => {
                work.override_link(VideoLink::NeedsAttention);
                report.marked += 1;
            }
        }

        if let Err(e) = checkpoint.persist(works) {
            log::warn!("failed to save review progress: {e}");
        }
    }

    checkpoint.persist(works)?;
    Ok(report)
}
