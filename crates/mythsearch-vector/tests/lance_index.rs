#![cfg(feature = "lancedb")]

use std::sync::Arc;

use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator};
use arrow_schema::{DataType, Field, Schema};
use mythsearch_core::traits::VectorIndex;
use mythsearch_vector::LanceIndex;

#[test]
fn lance_table_ranks_by_distance() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let uri = tmp.path().to_string_lossy().to_string();
    let schema = Arc::new(Schema::new(vec![
        Field::new("story_id", DataType::Int64, false),
        Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), 2), true),
    ]));
    let vectors: Vec<Option<Vec<Option<f32>>>> = vec![
        Some(vec![Some(0.0), Some(1.0)]),
        Some(vec![Some(1.0), Some(0.0)]),
        Some(vec![Some(0.9), Some(0.1)]),
    ];
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![0i64, 1, 2])),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), 2)),
        ],
    )?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let db = lancedb::connect(&uri).execute().await?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema.clone()));
        db.create_table("stories", reader).execute().await?;
        Ok::<_, lancedb::Error>(())
    })?;
    drop(rt);

    let index = LanceIndex::open(&uri, "stories")?;
    assert_eq!((index.len(), index.dim()), (3, 2));
    let ids: Vec<_> = index.search(&[1.0, 0.0], 3)?.iter().map(|h| h.story).collect();
    assert_eq!(ids, vec![1, 2, 0]);
    Ok(())
}
