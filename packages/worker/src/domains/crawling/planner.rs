//! Chapter selection for one crawl run.
//!
//! Input is the newest-first chapter list from an index page plus the
//! numbers already stored; output is the ordered list of chapters to visit.
//! Precedence: auto-advance, then chapter range, then max chapters.
//!
//! Auto-advance keeps stored chapters in the walk so the executor reports
//! them as skipped; only numbers above the stored maximum are new work.
//! Gaps below the maximum are never filled.

use extraction::{ChapterLink, ChapterNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use super::models::{ChapterRange, MaxChapters};

/// Which chapters a run should consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CrawlScope {
    pub max_chapters: Option<MaxChapters>,
    pub chapter_range: Option<ChapterRange>,
    pub auto_advance: bool,
}

impl CrawlScope {
    pub fn auto_advance() -> Self {
        Self {
            auto_advance: true,
            ..Default::default()
        }
    }

    pub fn latest(limit: u32) -> Self {
        Self {
            max_chapters: Some(MaxChapters::Limit(limit)),
            ..Default::default()
        }
    }

    pub fn range(start: u32, end: u32) -> Self {
        Self {
            max_chapters: Some(MaxChapters::Limit(end.saturating_sub(start).saturating_add(1))),
            chapter_range: Some(ChapterRange::between(start, end)),
            auto_advance: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("no chapters found in range {start}–{end}")]
    EmptyRange {
        start: ChapterNumber,
        end: ChapterNumber,
    },
}

/// Select and order the chapters to crawl. The result is ascending by number
/// and holds each number once.
pub fn plan_chapters(
    discovered: &[ChapterLink],
    known: &BTreeSet<ChapterNumber>,
    scope: &CrawlScope,
) -> Result<Vec<ChapterLink>, PlanError> {
    // Newest first, first occurrence of a number wins
    let mut seen = BTreeSet::new();
    let mut newest_first: Vec<ChapterLink> = Vec::with_capacity(discovered.len());
    for link in discovered {
        if seen.insert(link.number) {
            newest_first.push(link.clone());
        }
    }
    newest_first.sort_by(|a, b| b.number.cmp(&a.number));

    let mut selected: Vec<ChapterLink> = if scope.auto_advance {
        match known.iter().next_back() {
            Some(max) => newest_first
                .into_iter()
                .filter(|c| c.number > *max || known.contains(&c.number))
                .collect(),
            None => newest_first,
        }
    } else if let Some(range) = scope.chapter_range {
        let in_range: Vec<_> = newest_first
            .into_iter()
            .filter(|c| range.contains(c.number))
            .collect();
        if in_range.is_empty() {
            return Err(PlanError::EmptyRange {
                start: range.start,
                end: range.end,
            });
        }
        in_range
    } else {
        match scope.max_chapters.and_then(|m| m.limit()) {
            Some(limit) => newest_first.into_iter().take(limit).collect(),
            None => newest_first,
        }
    };

    selected.reverse();
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn links(numbers: &[u32]) -> Vec<ChapterLink> {
        numbers
            .iter()
            .map(|n| {
                ChapterLink::new(
                    ChapterNumber::from(*n),
                    format!("Chapter {}", n),
                    format!("https://site.example/chap-{}", n),
                )
            })
            .collect()
    }

    fn numbers(plan: &[ChapterLink]) -> Vec<String> {
        plan.iter().map(|c| c.number.to_string()).collect()
    }

    fn known(numbers: &[u32]) -> BTreeSet<ChapterNumber> {
        numbers.iter().map(|n| ChapterNumber::from(*n)).collect()
    }

    #[test]
    fn test_auto_advance_bootstrap_takes_everything_ascending() {
        let plan = plan_chapters(&links(&[5, 4, 3, 2, 1]), &known(&[]), &CrawlScope::auto_advance()).unwrap();
        assert_eq!(numbers(&plan), ["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_auto_advance_only_newer_than_max() {
        let plan = plan_chapters(
            &links(&[7, 6, 5, 4, 3, 2, 1]),
            &known(&[1, 2, 3, 4, 5]),
            &CrawlScope::auto_advance(),
        )
        .unwrap();
        assert_eq!(numbers(&plan), ["1", "2", "3", "4", "5", "6", "7"]);

        let stored = known(&[1, 2, 3, 4, 5]);
        let new: Vec<_> = plan.iter().filter(|c| !stored.contains(&c.number)).collect();
        assert_eq!(new.len(), 2);
        assert!(new.iter().all(|c| c.number > ChapterNumber::from(5u32)));
    }

    #[test]
    fn test_auto_advance_ignores_gaps_below_max() {
        let plan = plan_chapters(&links(&[4, 3, 2, 1]), &known(&[1, 4]), &CrawlScope::auto_advance()).unwrap();
        assert_eq!(numbers(&plan), ["1", "4"]);
    }

    #[test]
    fn test_auto_advance_with_nothing_new_walks_stored_chapters() {
        let plan = plan_chapters(&links(&[3, 2, 1]), &known(&[1, 2, 3]), &CrawlScope::auto_advance()).unwrap();
        assert_eq!(numbers(&plan), ["1", "2", "3"]);
    }

    #[test]
    fn test_auto_advance_wins_over_range() {
        let scope = CrawlScope {
            auto_advance: true,
            ..CrawlScope::range(1, 2)
        };
        let plan = plan_chapters(&links(&[3, 2, 1]), &known(&[1]), &scope).unwrap();
        assert_eq!(numbers(&plan), ["1", "2", "3"]);
    }

    #[test]
    fn test_range_is_inclusive_and_ascending() {
        let plan = plan_chapters(&links(&[5, 4, 3, 2, 1]), &known(&[]), &CrawlScope::range(3, 10)).unwrap();
        assert_eq!(numbers(&plan), ["3", "4", "5"]);
    }

    #[test]
    fn test_range_without_matches_is_an_error() {
        let err = plan_chapters(&links(&[5, 4, 3, 2, 1]), &known(&[]), &CrawlScope::range(20, 30)).unwrap_err();
        assert_eq!(err.to_string(), "no chapters found in range 20–30");
    }

    #[test]
    fn test_range_keeps_decimal_chapters() {
        let mut discovered = links(&[3, 2]);
        discovered.insert(
            1,
            ChapterLink::new(ChapterNumber::parse("2.5").unwrap(), "Extra", "https://site.example/chap-2-5"),
        );
        let plan = plan_chapters(&discovered, &known(&[]), &CrawlScope::range(2, 3)).unwrap();
        assert_eq!(numbers(&plan), ["2", "2.5", "3"]);
    }

    #[test]
    fn test_max_chapters_takes_newest() {
        let plan = plan_chapters(&links(&[9, 8, 7, 6]), &known(&[]), &CrawlScope::latest(2)).unwrap();
        assert_eq!(numbers(&plan), ["8", "9"]);

        let all = CrawlScope {
            max_chapters: Some(MaxChapters::All),
            ..Default::default()
        };
        let plan = plan_chapters(&links(&[9, 8, 7, 6]), &known(&[]), &all).unwrap();
        assert_eq!(plan.len(), 4);

        let plan = plan_chapters(&links(&[9, 8]), &known(&[]), &CrawlScope::default()).unwrap();
        assert_eq!(numbers(&plan), ["8", "9"]);
    }

    #[test]
    fn test_duplicate_numbers_collapse() {
        let plan = plan_chapters(&links(&[3, 3, 2, 1, 1]), &known(&[]), &CrawlScope::default()).unwrap();
        assert_eq!(numbers(&plan), ["1", "2", "3"]);
    }

    proptest! {
        #[test]
        fn plan_is_strictly_ascending(raw in proptest::collection::vec(0u32..200, 0..60), limit in 1u32..80) {
            let plan = plan_chapters(&links(&raw), &known(&[]), &CrawlScope::latest(limit)).unwrap();
            prop_assert!(plan.len() <= limit as usize);
            prop_assert!(plan.windows(2).all(|w| w[0].number < w[1].number));
        }

        #[test]
        fn auto_advance_only_fetches_above_max(raw in proptest::collection::vec(0u32..100, 0..40), stored in proptest::collection::vec(0u32..100, 0..20)) {
            let stored = known(&stored);
            let plan = plan_chapters(&links(&raw), &stored, &CrawlScope::auto_advance()).unwrap();
            if let Some(max) = stored.iter().next_back() {
                prop_assert!(plan.iter().all(|c| stored.contains(&c.number) || c.number > *max));
            }
            prop_assert!(plan.windows(2).all(|w| w[0].number < w[1].number));
        }
    }
}
