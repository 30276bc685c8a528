//! Turns a query vector plus filters into the filtered ranking a session pages over.
//!
//! Filtering happens after vector ranking, so how many neighbours to pull from
//! the index decides how many filtered matches exist. `Exhaustive` ranks the
//! whole corpus. `Widening` starts small and doubles `k` until every reachable
//! page is full or the corpus is exhausted.

use tracing::debug;

use mythsearch_core::config::{SearchSettings, StrategyKind};
use mythsearch_core::types::{FilterSpec, SearchHit};
use mythsearch_core::{FilterEngine, Result};

use crate::corpus::Corpus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RankingStrategy {
    #[default]
    Exhaustive,
    Widening { initial_k: usize },
}

impl RankingStrategy {
    pub fn from_settings(search: &SearchSettings) -> Self {
        match search.strategy {
            StrategyKind::Exhaustive => RankingStrategy::Exhaustive,
            StrategyKind::Widening => RankingStrategy::Widening { initial_k: search.widening_initial_k.max(1) },
        }
    }
}

/// Filtered ranking, cut to the reachable window.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    /// Most relevant first; at most `window` entries.
    pub hits: Vec<SearchHit>,
    /// Number of filtered matches. A lower bound when `total_exact` is false.
    pub total: usize,
    pub total_exact: bool,
}

/// Ranks `query` against the corpus, applies `filters` and keeps the first
/// `window` matches.
pub fn rank_filtered(
    corpus: &Corpus,
    query: &[f32],
    filters: &FilterSpec,
    strategy: RankingStrategy,
    window: usize,
) -> Result<Ranked> {
    let n = corpus.len();
    let engine = FilterEngine::new(corpus.metadata());

    let (mut hits, total, total_exact, k) = match strategy {
        RankingStrategy::Exhaustive => {
            let hits = engine.apply(corpus.index().search(query, n)?, filters);
            let total = hits.len();
            (hits, total, true, n)
        }
        RankingStrategy::Widening { .. } if filters.is_unconstrained() => {
            let k = window.min(n);
            (corpus.index().search(query, k)?, n, true, k)
        }
        RankingStrategy::Widening { initial_k } => {
            let mut k = initial_k.max(1).min(n);
            loop {
                let hits = engine.apply(corpus.index().search(query, k)?, filters);
                if hits.len() >= window || k >= n {
                    let total = hits.len();
                    break (hits, total, k >= n, k);
                }
                k = k.saturating_mul(2).min(n);
            }
        }
    };
    hits.truncate(window);
    debug!(?strategy, k, total, total_exact, "ranked");
    Ok(Ranked { hits, total, total_exact })
}
