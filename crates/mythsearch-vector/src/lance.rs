//! LanceDB-backed index.
//!
//! The table carries a `story_id` integer column (metadata row position) and a
//! fixed-size `vector` column. Lance ranks by L2 `_distance`. The async client
//! is driven from a private runtime, so `search` must not be called from inside
//! another tokio runtime's async context (use `spawn_blocking`).

use std::path::PathBuf;

use arrow_array::{Array, Float32Array, Int32Array, Int64Array, RecordBatch, UInt64Array};
use arrow_schema::DataType;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Table};
use tracing::info;

use mythsearch_core::traits::VectorIndex;
use mythsearch_core::types::{Metric, SearchHit};
use mythsearch_core::{Error, Result};

use crate::flat::rank_order;

pub struct LanceIndex {
    rt: tokio::runtime::Runtime,
    table: Table,
    dim: usize,
    rows: usize,
}

impl LanceIndex {
    pub fn open(uri: &str, table_name: &str) -> Result<Self> {
        let corrupt = |reason: String| Error::CorruptIndex { path: PathBuf::from(uri), reason };
        let rt = tokio::runtime::Runtime::new()?;
        let (table, schema, rows) = rt
            .block_on(async {
                let db = connect(uri).execute().await?;
                let table = db.open_table(table_name).execute().await?;
                let schema = table.schema().await?;
                let rows = table.count_rows(None).await?;
                Ok::<_, lancedb::Error>((table, schema, rows))
            })
            .map_err(|e| corrupt(e.to_string()))?;
        let dim = match schema.field_with_name("vector").map(|f| f.data_type().clone()) {
            Ok(DataType::FixedSizeList(_, n)) if n > 0 => n as usize,
            _ => return Err(corrupt("table has no fixed-size `vector` column".into())),
        };
        if schema.field_with_name("story_id").is_err() {
            return Err(corrupt("table has no `story_id` column".into()));
        }
        info!(uri, table = table_name, rows, dim, "opened lance index");
        Ok(Self { rt, table, dim, rows })
    }
}

impl VectorIndex for LanceIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn metric(&self) -> Metric {
        Metric::L2
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(Error::Backend(format!("query has {} dims, index expects {}", query.len(), self.dim)));
        }
        let k = k.min(self.rows);
        if k == 0 {
            return Ok(Vec::new());
        }
        let batches = self
            .rt
            .block_on(async {
                let stream = self.table.vector_search(query.to_vec())?.limit(k).execute().await?;
                stream.try_collect::<Vec<RecordBatch>>().await
            })
            .map_err(|e| Error::Backend(e.to_string()))?;

        let mut hits = Vec::with_capacity(k);
        for batch in &batches {
            let ids = story_ids(batch)?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| Error::Backend("lance result has no _distance column".into()))?;
            for (i, story) in ids.into_iter().enumerate() {
                hits.push(SearchHit { score: distances.value(i), story });
            }
        }
        hits.sort_unstable_by(rank_order(Metric::L2));
        hits.truncate(k);
        Ok(hits)
    }
}

fn story_ids(batch: &RecordBatch) -> Result<Vec<usize>> {
    let col = batch
        .column_by_name("story_id")
        .ok_or_else(|| Error::Backend("lance result has no story_id column".into()))?;
    let any = col.as_any();
    if let Some(a) = any.downcast_ref::<Int64Array>() {
        return Ok(a.values().iter().map(|&v| v as usize).collect());
    }
    if let Some(a) = any.downcast_ref::<Int32Array>() {
        return Ok(a.values().iter().map(|&v| v as usize).collect());
    }
    if let Some(a) = any.downcast_ref::<UInt64Array>() {
        return Ok(a.values().iter().map(|&v| v as usize).collect());
    }
    Err(Error::Backend(format!("unsupported story_id column type {:?}", col.data_type())))
}
