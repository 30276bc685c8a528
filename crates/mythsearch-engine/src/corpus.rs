use tracing::info;

use mythsearch_core::config::{Config, IndexBackend};
use mythsearch_core::traits::VectorIndex;
use mythsearch_core::types::{FilterOptions, StoryId, StoryRecord};
use mythsearch_core::{Error, MetadataStore, Result};

/// The vector index and its metadata, loaded together and validated as a unit.
///
/// Read-only after construction; share it behind an `Arc`.
pub struct Corpus {
    index: Box<dyn VectorIndex>,
    metadata: MetadataStore,
}

impl Corpus {
    /// Loads index and metadata named by `config`. Any failure here is fatal:
    /// the caller must not serve queries from a partially loaded corpus.
    pub fn load(config: &Config, encoder_dim: usize) -> Result<Self> {
        let data = &config.settings().data;
        let metadata = MetadataStore::load(&config.path(&data.metadata_path))?;
        let index = open_index(config)?;
        Self::from_parts(index, metadata, encoder_dim)
    }

    /// Pairs an index with its metadata, enforcing row alignment and encoder
    /// dimensionality.
    pub fn from_parts(index: Box<dyn VectorIndex>, metadata: MetadataStore, encoder_dim: usize) -> Result<Self> {
        if index.dim() != encoder_dim {
            return Err(Error::DimensionMismatch { index: index.dim(), encoder: encoder_dim });
        }
        if index.len() != metadata.len() {
            return Err(Error::CardinalityMismatch { index_rows: index.len(), metadata_records: metadata.len() });
        }
        info!(stories = metadata.len(), dim = index.dim(), metric = ?index.metric(), "corpus ready");
        Ok(Self { index, metadata })
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn record(&self, id: StoryId) -> Option<&StoryRecord> {
        self.metadata.get(id)
    }

    pub fn filter_options(&self) -> &FilterOptions {
        self.metadata.filter_options()
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }
}

fn open_index(config: &Config) -> Result<Box<dyn VectorIndex>> {
    let data = &config.settings().data;
    match data.backend {
        IndexBackend::Faiss => Ok(Box::new(mythsearch_vector::read_flat(&config.path(&data.index_path))?)),
        IndexBackend::Lancedb => open_lance(config),
    }
}

#[cfg(feature = "lancedb")]
fn open_lance(config: &Config) -> Result<Box<dyn VectorIndex>> {
    let data = &config.settings().data;
    let uri = config.path(&data.lance_uri);
    Ok(Box::new(mythsearch_vector::LanceIndex::open(&uri.to_string_lossy(), &data.lance_table)?))
}

#[cfg(not(feature = "lancedb"))]
fn open_lance(_config: &Config) -> Result<Box<dyn VectorIndex>> {
    Err(Error::InvalidConfig("data.backend = \"lancedb\" requires the `lancedb` feature".into()))
}
