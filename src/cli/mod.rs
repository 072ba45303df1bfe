use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::{path::PathBuf, time::Duration};

use crate::{
    config::{self, Config},
    domain::work::{ResolvedWork, VideoLink, Work},
    interrupt::Interrupt,
    resolve::{
        art::{ArtEnricher, carry_over_art},
        dedupe::dedupe,
        fetcher::{RateLimitedFetcher, RetryPolicy, ThreadSleeper},
        pipeline::{PipelineSettings, ResolutionPipeline, manual_review, needs_review},
    },
    review::{BatchDecision, Reviewer, TerminalReviewer},
    sources::{CatalogCrawler, LookupError, deezer::DeezerCatalog, ytdlp::YtDlpSearch},
    storage::{
        snapshot::{SnapshotStore, Stage},
        system_time_to_local,
    },
};

#[derive(Parser)]
#[command(name = "tunecat")]
#[command(version = "0.1")]
#[command(about = "Builds a deduplicated, video-linked catalog of an artist's tracks")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "tunecat.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show which stage snapshots exist and how far resolution got
    Status,
    /// Crawl the artist's discography from the metadata catalog
    Fetch,
    /// Collapse duplicate tracks across releases
    Dedupe,
    /// Attach album cover art
    Art,
    /// Find a video link for every track (resumes an earlier run)
    Videos(FlaggedArgs),
    /// Review unresolved and flagged tracks one by one
    Review,
    /// Rewrite the public music list from the resolved snapshot
    Export,
    /// Fetch, dedupe, art and videos in one go
    Run(FlaggedArgs),
}

#[derive(Args, Clone, Copy)]
pub struct FlaggedArgs {
    /// Keep every match from a foreign uploader without asking
    #[arg(long, conflicts_with = "reject_flagged")]
    pub accept_flagged: bool,
    /// Mark every match from a foreign uploader as needing attention without asking
    #[arg(long)]
    pub reject_flagged: bool,
}

impl FlaggedArgs {
    fn preset(self) -> Option<BatchDecision> {
        if self.accept_flagged {
            Some(BatchDecision::AcceptAll)
        } else if self.reject_flagged {
            Some(BatchDecision::MarkAllNeedsAttention)
        } else {
            None
        }
    }
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::Config::load(&cli.config.to_string_lossy())?;
    let mut store = SnapshotStore::new(&cfg.paths);
    let interrupt = Interrupt::install()?;

    match cli.command {
        Commands::Status => status(&store),
        Commands::Fetch => fetch(&cfg, &store, &interrupt).map(|_| ()),
        Commands::Dedupe => dedupe_stage(&store),
        Commands::Art => art(&cfg, &store, &interrupt).map(|_| ()),
        Commands::Videos(flagged) => videos(&cfg, &mut store, &interrupt, flagged.preset()),
        Commands::Review => review(&cfg, &mut store, &interrupt),
        Commands::Export => {
            let works: Vec<ResolvedWork> = store.load(Stage::Resolved)?;
            store.write_public(&works)?;
            println!(
                "Saved {} tracks -> {}",
                works.len(),
                store.public_artifact().display()
            );
            Ok(())
        }
        Commands::Run(flagged) => {
            if !fetch(&cfg, &store, &interrupt)? {
                return Ok(());
            }
            dedupe_stage(&store)?;
            if art(&cfg, &store, &interrupt)? {
                videos(&cfg, &mut store, &interrupt, flagged.preset())?;
            }
            Ok(())
        }
    }
}

fn fetcher(cfg: &Config, interrupt: &Interrupt) -> RateLimitedFetcher<ThreadSleeper> {
    RateLimitedFetcher::new(
        RetryPolicy::from(&cfg.retry),
        ThreadSleeper::new(interrupt.clone()),
    )
}

fn status(store: &SnapshotStore) -> anyhow::Result<()> {
    for stage in Stage::ALL {
        match store.stage_info(stage)? {
            Some(info) => println!(
                "{:<16} {:>5} records, updated {}",
                stage.file_name(),
                info.records,
                system_time_to_local(info.modified).format("%Y-%m-%d %H:%M:%S")
            ),
            None => println!("{:<16} missing", stage.file_name()),
        }
    }

    if store.exists(Stage::Resolved) {
        let works: Vec<ResolvedWork> = store.load(Stage::Resolved)?;
        let count = |f: fn(&ResolvedWork) -> bool| works.iter().filter(|w| f(w)).count();
        println!();
        println!("Video links:");
        println!("  matched:         {}", count(|w| w.url.is_usable()));
        println!(
            "  needs attention: {}",
            count(|w| w.url == VideoLink::NeedsAttention)
        );
        println!("  none found:      {}", count(|w| w.url == VideoLink::NotFound));
        println!("  not looked up:   {}", count(|w| w.url.is_unresolved()));
        println!("  without art:     {}", count(|w| w.art.is_none()));
    }
    Ok(())
}

/// returns false when interrupted
fn fetch(cfg: &Config, store: &SnapshotStore, interrupt: &Interrupt) -> anyhow::Result<bool> {
    let mut catalog = DeezerCatalog::new(&cfg.catalog);
    let mut fetcher = fetcher(cfg, interrupt);

    let crawled = catalog.crawl(&cfg.artist, &mut fetcher);
    let Some(works) = finished_crawl(crawled, interrupt.is_set(), &cfg.artist)? else {
        println!(
            "Crawl interrupted, {} left unchanged",
            store.path(Stage::Crawled).display()
        );
        return Ok(false);
    };

    store.save(Stage::Crawled, &works)?;
    println!(
        "Saved crawled track list -> {}",
        store.path(Stage::Crawled).display()
    );
    Ok(true)
}

/// A crawl cut short by Ctrl+C is a clean stop, not a failure
fn finished_crawl(
    crawled: Result<Vec<Work>, LookupError>,
    interrupted: bool,
    artist: &str,
) -> anyhow::Result<Option<Vec<Work>>> {
    match crawled {
        Ok(works) => Ok(Some(works)),
        Err(LookupError::Interrupted) => Ok(None),
        Err(_) if interrupted => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to crawl discography of '{artist}'")),
    }
}

fn dedupe_stage(store: &SnapshotStore) -> anyhow::Result<()> {
    let works: Vec<Work> = store.load(Stage::Crawled)?;
    let original = works.len();
    println!("Loaded {original} tracks");

    let report = dedupe(works);
    let removed = report.removed_count();
    let canonical: Vec<ResolvedWork> = report
        .canonical
        .into_iter()
        .map(ResolvedWork::from)
        .collect();

    println!("Deduplication complete:");
    println!("  Original: {original} tracks");
    println!("  After deduplication: {} tracks", canonical.len());
    println!("  Removed: {removed} duplicates");

    store.save(Stage::Canonical, &canonical)?;
    println!(
        "Saved deduplicated tracks -> {}",
        store.path(Stage::Canonical).display()
    );
    Ok(())
}

/// returns false when interrupted
fn art(cfg: &Config, store: &SnapshotStore, interrupt: &Interrupt) -> anyhow::Result<bool> {
    let mut works: Vec<ResolvedWork> = store.load(Stage::Canonical)?;
    println!("Loaded {} tracks", works.len());
    if store.exists(Stage::WithArt) {
        let earlier: Vec<ResolvedWork> = store.load(Stage::WithArt)?;
        let reused = carry_over_art(&mut works, &earlier);
        println!(
            "Reusing art for {reused} tracks from {}",
            Stage::WithArt.file_name()
        );
    }

    let mut enricher = ArtEnricher::new(
        DeezerCatalog::new(&cfg.catalog),
        fetcher(cfg, interrupt),
        Duration::from_millis(cfg.catalog.art_pause_ms),
    );
    let report = enricher.enrich(&mut works);

    store.save(Stage::WithArt, &works)?;
    println!(
        "Album art: {} lookups, {} tracks with art, {} without",
        report.lookups, report.attached, report.missing
    );
    println!(
        "Saved tracks with album art -> {}",
        store.path(Stage::WithArt).display()
    );
    Ok(!report.interrupted)
}

fn videos(
    cfg: &Config,
    store: &mut SnapshotStore,
    interrupt: &Interrupt,
    preset: Option<BatchDecision>,
) -> anyhow::Result<()> {
    let (stage, mut works) = store.load_resolution_input()?;
    println!("Loaded {} tracks from {}", works.len(), stage.file_name());

    let mut pipeline = ResolutionPipeline::new(
        PipelineSettings::from_config(cfg),
        YtDlpSearch::new(&cfg.video),
        fetcher(cfg, interrupt),
    );
    let mut reviewer = TerminalReviewer::new(interrupt.clone());

    let report = pipeline.run(&mut works, store, |flagged, artist| match preset {
        Some(decision) => Ok(decision),
        None => reviewer.decide_flagged(flagged, artist),
    })?;

    println!();
    println!(
        "Matched {} ({} flagged), none found {}, failed {}, skipped {}",
        report.matched,
        report.flagged.len(),
        report.none_found,
        report.failed,
        report.skipped
    );
    if report.interrupted {
        println!("Stopped early; run again to resume");
    }
    println!(
        "Saved resolved tracks -> {}",
        store.path(Stage::Resolved).display()
    );
    println!(
        "Saved public music list -> {}",
        store.public_artifact().display()
    );
    Ok(())
}

fn review(cfg: &Config, store: &mut SnapshotStore, interrupt: &Interrupt) -> anyhow::Result<()> {
    let mut works: Vec<ResolvedWork> = store.load(Stage::Resolved)?;
    println!("Loaded {} tracks", works.len());

    let pending = works.iter().filter(|w| needs_review(w, &cfg.artist)).count();
    if pending == 0 {
        println!(
            "All tracks have valid URLs uploaded by {}, no manual review needed",
            cfg.artist
        );
        return Ok(());
    }
    println!(
        "Found {pending} tracks to review, skipping {} with valid URLs",
        works.len() - pending
    );
    println!("Press Ctrl+C to save and exit early");

    let mut reviewer = TerminalReviewer::new(interrupt.clone());
    let report = manual_review(&mut works, &cfg.artist, &mut reviewer, store)?;

    println!();
    println!(
        "Kept {}, replaced {}, marked {}, skipped {}",
        report.kept, report.replaced, report.marked, report.skipped
    );
    if report.interrupted {
        println!("Review interrupted, progress saved");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::work::ReleaseKind;

    #[test]
    fn interrupted_crawl_is_a_clean_stop() {
        let stopped = finished_crawl(Err(LookupError::Interrupted), true, "Artist").unwrap();
        assert!(stopped.is_none());

        let throttled = Err(LookupError::RateLimited("429".into()));
        assert!(finished_crawl(throttled, true, "Artist").unwrap().is_none());
    }

    #[test]
    fn crawl_failure_is_an_error() {
        let err = finished_crawl(Err(LookupError::Transport("reset".into())), false, "Artist")
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to crawl discography of 'Artist'"));
    }

    #[test]
    fn finished_crawl_passes_works_through() {
        let works = vec![Work::new("A", "B", ReleaseKind::Album)];
        let done = finished_crawl(Ok(works.clone()), false, "Artist").unwrap();
        assert_eq!(done, Some(works));
    }

    #[test]
    fn flagged_flags_conflict() {
        let parsed = Cli::try_parse_from(["tunecat", "run", "--accept-flagged", "--reject-flagged"]);
        assert!(parsed.is_err());

        let cli = Cli::try_parse_from(["tunecat", "videos", "--reject-flagged"]).unwrap();
        let Commands::Videos(flagged) = cli.command else {
            panic!("expected videos command");
        };
        assert_eq!(flagged.preset(), Some(BatchDecision::MarkAllNeedsAttention));
    }
}
