//! In-memory story metadata, index-aligned with the vector index.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::types::{FilterOptions, StoryId, StoryRecord};
use crate::{Error, Result};

/// Immutable, ordered story records. Record `i` describes index row `i`.
///
/// Never mutated after construction, so it can be shared across threads
/// behind an `Arc` without locking.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    records: Vec<StoryRecord>,
    options: FilterOptions,
}

impl MetadataStore {
    /// Loads the metadata document: a JSON array with one object per indexed
    /// vector, in index order.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::MissingData(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let store = Self::from_json(&bytes).map_err(|reason| Error::CorruptMetadata {
            path: path.to_path_buf(),
            reason,
        })?;
        info!(records = store.len(), path = %path.display(), "loaded story metadata");
        Ok(store)
    }

    /// Parses a metadata document. A row that is not an object is kept as an
    /// empty record so row alignment is preserved; a field of the wrong type
    /// is treated as absent without discarding the rest of the record.
    pub fn from_json(bytes: &[u8]) -> std::result::Result<Self, String> {
        let values: Vec<Value> = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        let records = values
            .into_iter()
            .enumerate()
            .map(|(row, value)| record_from_value(row, value))
            .collect();
        Ok(Self::from_records(records))
    }

    /// Takes ownership of records in index order, assigning ids by position.
    pub fn from_records(mut records: Vec<StoryRecord>) -> Self {
        for (row, rec) in records.iter_mut().enumerate() {
            rec.id = row;
            if let Some(emotions) = rec.emotion_pred_top3.as_mut() {
                emotions.truncate(3);
            }
        }
        let options = collect_options(&records);
        Self { records, options }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: StoryId) -> Option<&StoryRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> &[StoryRecord] {
        &self.records
    }

    /// Filter choices present in the corpus, computed once at load.
    pub fn filter_options(&self) -> &FilterOptions {
        &self.options
    }
}

fn record_from_value(row: usize, value: Value) -> StoryRecord {
    let Value::Object(mut fields) = value else {
        warn!(row, "metadata record is not an object; treating as empty");
        return StoryRecord::default();
    };
    StoryRecord {
        id: row,
        filename: field(row, &mut fields, "filename"),
        culture: field(row, &mut fields, "culture"),
        continent: field(row, &mut fields, "continent"),
        species_mentions: field(row, &mut fields, "species_mentions"),
        emotion_pred_top3: field(row, &mut fields, "emotion_pred_top3"),
    }
}

fn field<T: DeserializeOwned>(row: usize, fields: &mut Map<String, Value>, name: &str) -> Option<T> {
    let value = fields.remove(name).filter(|v| !v.is_null())?;
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(row, field = name, error = %e, "malformed metadata field; treating as absent");
            None
        }
    }
}

fn collect_options(records: &[StoryRecord]) -> FilterOptions {
    let mut options = FilterOptions::default();
    for rec in records {
        if let Some(c) = &rec.continent {
            options.continents.insert(c.clone());
        }
        if let Some(c) = &rec.culture {
            options.cultures.insert(c.clone());
        }
        options.creatures.extend(rec.species().map(str::to_string));
    }
    options
}
