use crate::types::{Metric, SearchHit};
use crate::Result;

/// Turns text into fixed-dimension vectors.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("encoder returned no vector"))
    }
}

/// Read-only nearest-neighbor index over story embeddings.
///
/// `search` returns at most `k` hits ordered most relevant first according to
/// `metric()`, ties broken by ascending story id. Implementations are shared
/// across concurrent queries without locking.
pub trait VectorIndex: Send + Sync {
    fn dim(&self) -> usize;
    fn len(&self) -> usize;
    fn metric(&self) -> Metric;
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Retrieves the full text of a story.
///
/// `Ok(None)` means the story does not exist; `Err` is a transient failure.
pub trait StoryFetcher: Send + Sync {
    fn fetch(&self, continent: &str, culture: &str, filename: &str) -> Result<Option<String>>;
}
