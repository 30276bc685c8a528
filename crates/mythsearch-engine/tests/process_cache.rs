//! The service's encoder and corpus are process-wide; this file is its own
//! test binary so nothing else touches them.

use std::fs;

use tempfile::TempDir;

use mythsearch_core::config::{Config, Settings};
use mythsearch_core::types::{FilterSpec, Metric};
use mythsearch_engine::{Action, SearchService};
use mythsearch_vector::{write_flat, FlatIndex};

#[test]
fn corpus_and_encoder_load_once_per_process() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("vector_db")).unwrap();
    let rows: Vec<Vec<f32>> = (0..4).map(|i| (0..16).map(|j| ((i * 16 + j) % 7) as f32).collect()).collect();
    write_flat(&tmp.path().join("vector_db/stories.index"), &FlatIndex::from_rows(16, Metric::L2, &rows).unwrap()).unwrap();
    fs::write(
        tmp.path().join("vector_db/metadata.json"),
        r#"[{"continent": "Asia"}, {"continent": "Europe"}, {"continent": "Asia"}, {}]"#,
    )
    .unwrap();

    let mut settings = Settings::default();
    settings.embedding.use_fake = true;
    settings.embedding.dimension = 16;
    let first = SearchService::from_config(&Config::from_settings(settings.clone(), tmp.path().to_path_buf())).unwrap();

    let resp = first
        .handle("s", Action::Search { query: "tide".into(), filters: FilterSpec::default() })
        .unwrap();
    assert_eq!(resp.page.unwrap().total_results, 4);

    // A second service shares the cached corpus even though its data directory is empty.
    let elsewhere = TempDir::new().unwrap();
    let second = SearchService::from_config(&Config::from_settings(settings, elsewhere.path().to_path_buf())).unwrap();
    assert!(std::ptr::eq(first.corpus(), second.corpus()));
    assert_eq!(second.corpus().len(), 4);
}
