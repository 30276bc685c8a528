use std::cmp::Ordering;
use std::path::PathBuf;

use mythsearch_core::traits::VectorIndex;
use mythsearch_core::types::{Metric, SearchHit};
use mythsearch_core::{Error, Result};

/// Exhaustive in-memory index: row-major `f32` vectors scanned in full on
/// every query. Exact, and trivially safe for concurrent reads.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    metric: Metric,
    vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize, metric: Metric, vectors: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            return Err(in_memory("dimension must be at least 1".into()));
        }
        if vectors.len() % dim != 0 {
            return Err(in_memory(format!("{} floats is not a multiple of dimension {}", vectors.len(), dim)));
        }
        Ok(Self { dim, metric, vectors })
    }

    pub fn from_rows(dim: usize, metric: Metric, rows: &[Vec<f32>]) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
            return Err(in_memory(format!("row {} has {} dims, expected {}", i, row.len(), dim)));
        }
        Self::new(dim, metric, rows.concat())
    }

    pub fn row(&self, id: usize) -> Option<&[f32]> {
        self.vectors.chunks_exact(self.dim).nth(id)
    }

    pub fn vectors(&self) -> &[f32] {
        &self.vectors
    }

    fn score(&self, query: &[f32], row: &[f32]) -> f32 {
        match self.metric {
            Metric::InnerProduct => query.iter().zip(row).map(|(a, b)| a * b).sum(),
            Metric::L2 => query.iter().zip(row).map(|(a, b)| (a - b) * (a - b)).sum(),
        }
    }
}

/// Most relevant first, then ascending story id.
pub(crate) fn rank_order(metric: Metric) -> impl Fn(&SearchHit, &SearchHit) -> Ordering {
    move |a, b| metric.rank(a.score, b.score).then(a.story.cmp(&b.story))
}

impl VectorIndex for FlatIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.vectors.len() / self.dim
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(Error::Backend(format!("query has {} dims, index expects {}", query.len(), self.dim)));
        }
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut hits: Vec<SearchHit> = self
            .vectors
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(story, row)| SearchHit { score: self.score(query, row), story })
            .collect();
        let order = rank_order(self.metric);
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, &order);
            hits.truncate(k);
        }
        hits.sort_unstable_by(&order);
        Ok(hits)
    }
}

fn in_memory(reason: String) -> Error {
    Error::CorruptIndex { path: PathBuf::from("<memory>"), reason }
}
