//! Collapses the same song released on several albums into one canonical work

use std::collections::HashMap;

use crate::domain::{similarity::normalize, work::Work};

/// Album names containing any of these are re-releases of an earlier record
const REISSUE_MARKERS: &[&str] = &["deluxe", "expanded", "special edition", "anniversary"];

pub fn is_reissue(album: &str) -> bool {
    let lower = album.to_lowercase();
    REISSUE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Lower is better: full releases first, then original editions over reissues
fn priority(work: &Work) -> (u8, u8) {
    let kind = if work.release_kind.is_full_release() { 0 } else { 1 };
    let reissue = if is_reissue(&work.album) { 1 } else { 0 };
    (kind, reissue)
}

/// Key works are grouped under
pub fn title_key(title: &str) -> String {
    let key = normalize(title);
    if key.is_empty() {
        // titles made of punctuation only must not all collapse together
        title.trim().to_lowercase()
    } else {
        key
    }
}

#[derive(Debug)]
pub struct DiscardedDuplicate {
    pub kept: Work,
    pub removed: Vec<Work>,
}

#[derive(Debug, Default)]
pub struct DedupeReport {
    pub canonical: Vec<Work>,
    pub duplicates: Vec<DiscardedDuplicate>,
}

impl DedupeReport {
    pub fn removed_count(&self) -> usize {
        self.duplicates.iter().map(|d| d.removed.len()).sum()
    }
}

/// Keeps one representative per normalized title.
///
/// Within a group the representative has the lowest [`priority`]; ties go to the
/// work seen first. Output is ordered by album, then title, case-insensitively.
pub fn dedupe(works: Vec<Work>) -> DedupeReport {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Work>> = HashMap::new();

    for work in works {
        let key = title_key(&work.title);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(work);
    }

    let mut report = DedupeReport::default();

    for key in order {
        let Some(mut group) = groups.remove(&key) else {
            continue;
        };
        // stable, so first-seen wins among equal priorities
        group.sort_by_key(priority);
        let mut members = group.into_iter();
        let Some(kept) = members.next() else {
            continue;
        };
        let removed: Vec<Work> = members.collect();

        if !removed.is_empty() {
            log::info!(
                "duplicate '{}': kept {} ({})",
                kept.title,
                kept.album,
                kept.release_kind
            );
            for dup in &removed {
                log::info!("  removed {} ({})", dup.album, dup.release_kind);
            }
            report.duplicates.push(DiscardedDuplicate {
                kept: kept.clone(),
                removed,
            });
        }
        report.canonical.push(kept);
    }

    report
        .canonical
        .sort_by_cached_key(|w| (w.album.to_lowercase(), w.title.to_lowercase()));
    report
}
