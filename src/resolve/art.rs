use std::{collections::HashMap, time::Duration};

use crate::{
    domain::work::ResolvedWork,
    resolve::fetcher::{RateLimitedFetcher, Sleeper},
    sources::{CoverArtLookup, LookupError},
};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ArtReport {
    pub lookups: usize,
    pub attached: usize,
    pub missing: usize,
    pub interrupted: bool,
}

/// Attaches cover art to works, one lookup per release group and run.
///
/// A failed lookup is remembered as "no art" so later works of the same group
/// do not hit the source again. The cache lives only as long as the enricher.
pub struct ArtEnricher<L, S> {
    lookup: L,
    fetcher: RateLimitedFetcher<S>,
    pause: Duration,
    cache: HashMap<u64, Option<String>>,
}

impl<L: CoverArtLookup, S: Sleeper> ArtEnricher<L, S> {
    pub fn new(lookup: L, fetcher: RateLimitedFetcher<S>, pause: Duration) -> Self {
        Self {
            lookup,
            fetcher,
            pause,
            cache: HashMap::new(),
        }
    }

    pub fn enrich(&mut self, works: &mut [ResolvedWork]) -> ArtReport {
        let mut report = ArtReport::default();
        let total = works.len();

        for (idx, work) in works.iter_mut().enumerate() {
            if work.art.is_some() {
                continue;
            }
            let Some(group_id) = work.work.catalog_group_id else {
                report.missing += 1;
                continue;
            };

            if !self.cache.contains_key(&group_id) {
                if self.fetcher.interrupted() {
                    report.interrupted = true;
                    break;
                }
                let art = self.lookup_group(group_id, idx + 1, total);
                self.cache.insert(group_id, art);
                report.lookups += 1;
                self.fetcher.pause(self.pause);
            }

            work.art = self.cache.get(&group_id).cloned().flatten();
            if work.art.is_some() {
                report.attached += 1;
            } else {
                report.missing += 1;
            }
        }

        report
    }

    fn lookup_group(&mut self, group_id: u64, position: usize, total: usize) -> Option<String> {
        let lookup = &mut self.lookup;
        match self
            .fetcher
            .fetch(|| lookup.cover_for(group_id), LookupError::is_rate_limited)
        {
            Ok(Some(url)) => {
                println!("[{position}/{total}] Album {group_id} art -> {url}");
                Some(url)
            }
            Ok(None) => {
                println!("[{position}/{total}] Album {group_id} has no cover art");
                None
            }
            Err(e) => {
                println!("[{position}/{total}] Failed to fetch art for album {group_id}: {e}");
                None
            }
        }
    }
}

/// Copies art found by an earlier run onto works with the same title and album.
///
/// Returns how many works received art.
pub fn carry_over_art(works: &mut [ResolvedWork], previous: &[ResolvedWork]) -> usize {
    let known: HashMap<(&str, &str), &str> = previous
        .iter()
        .filter_map(|w| Some(((w.title(), w.album()), w.art.as_deref()?)))
        .collect();

    let mut reused = 0;
    for work in works.iter_mut().filter(|w| w.art.is_none()) {
        if let Some(art) = known.get(&(work.title(), work.album())) {
            work.art = Some(art.to_string());
            reused += 1;
        }
    }
    reused
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{
        domain::work::{ReleaseKind, Work},
        resolve::fetcher::{RetryPolicy, tests::RecordingSleeper},
    };

    #[derive(Default)]
    struct FakeCovers {
        covers: HashMap<u64, String>,
        failing: Vec<u64>,
        calls: Vec<u64>,
    }

    impl CoverArtLookup for FakeCovers {
        fn cover_for(&mut self, group_id: u64) -> Result<Option<String>, LookupError> {
            self.calls.push(group_id);
            if self.failing.contains(&group_id) {
                return Err(LookupError::Transport("connection reset".into()));
            }
            Ok(self.covers.get(&group_id).cloned())
        }
    }

    fn work(title: &str, group: Option<u64>) -> ResolvedWork {
        let mut work = Work::new(title, "Album", ReleaseKind::Album);
        work.catalog_group_id = group;
        ResolvedWork::from(work)
    }

    fn enricher(covers: FakeCovers) -> ArtEnricher<FakeCovers, RecordingSleeper> {
        ArtEnricher::new(
            covers,
            RateLimitedFetcher::new(RetryPolicy::default(), RecordingSleeper::default()),
            Duration::from_millis(200),
        )
    }

    #[test]
    fn one_lookup_per_group() {
        let covers = FakeCovers {
            covers: HashMap::from([(1, "https://c/1".to_string())]),
            ..Default::default()
        };
        let mut enricher = enricher(covers);
        let mut works = vec![work("a", Some(1)), work("b", Some(1)), work("c", None)];

        let report = enricher.enrich(&mut works);

        assert_eq!(enricher.lookup.calls, vec![1]);
        assert_eq!(report.lookups, 1);
        assert_eq!(report.attached, 2);
        assert_eq!(report.missing, 1);
        assert_eq!(works[1].art.as_deref(), Some("https://c/1"));
        assert_eq!(enricher.fetcher.sleeper().slept, vec![Duration::from_millis(200)]);
    }

    #[test]
    fn failures_are_cached_for_the_run() {
        let covers = FakeCovers {
            failing: vec![2],
            ..Default::default()
        };
        let mut enricher = enricher(covers);
        let mut works = vec![work("a", Some(2)), work("b", Some(2))];

        enricher.enrich(&mut works);
        enricher.enrich(&mut works);

        assert_eq!(enricher.lookup.calls, vec![2]);
        assert!(works.iter().all(|w| w.art.is_none()));
    }

    #[test]
    fn interrupt_stops_before_next_group() {
        let covers = FakeCovers {
            covers: HashMap::from([(1, "https://c/1".to_string()), (2, "https://c/2".to_string())]),
            ..Default::default()
        };
        let mut enricher = ArtEnricher::new(
            covers,
            RateLimitedFetcher::new(
                RetryPolicy::default(),
                RecordingSleeper {
                    interrupt_after: Some(1),
                    ..Default::default()
                },
            ),
            Duration::from_millis(200),
        );
        let mut works = vec![work("a", Some(1)), work("b", Some(1)), work("c", Some(2))];

        let report = enricher.enrich(&mut works);

        assert!(report.interrupted);
        assert_eq!(enricher.lookup.calls, vec![1]);
        assert_eq!(report.attached, 2);
        assert!(works[2].art.is_none());
    }

    #[test]
    fn earlier_art_is_reused_and_skipped() {
        let mut earlier = vec![work("a", Some(1)), work("b", Some(2))];
        earlier[0].art = Some("https://c/1".into());

        let mut works = vec![work("a", Some(1)), work("b", Some(2)), work("new", Some(1))];
        assert_eq!(carry_over_art(&mut works, &earlier), 1);

        let covers = FakeCovers {
            covers: HashMap::from([(1, "https://c/1".to_string())]),
            ..Default::default()
        };
        let mut enricher = enricher(covers);
        let report = enricher.enrich(&mut works);

        assert_eq!(works[0].art.as_deref(), Some("https://c/1"));
        assert_eq!(enricher.lookup.calls, vec![2, 1]);
        assert_eq!(report.lookups, 2);
    }

    #[test]
    fn works_with_art_are_left_alone() {
        let mut enricher = enricher(FakeCovers::default());
        let mut works = vec![work("a", Some(3))];
        works[0].art = Some("https://c/old".into());

        let report = enricher.enrich(&mut works);

        assert!(enricher.lookup.calls.is_empty());
        assert_eq!(report, ArtReport::default());
        assert_eq!(works[0].art.as_deref(), Some("https://c/old"));
    }
}
