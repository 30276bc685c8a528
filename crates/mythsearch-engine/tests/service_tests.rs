use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use tempfile::TempDir;

use mythsearch_core::traits::{Embedder, StoryFetcher};
use mythsearch_core::types::{FilterSpec, Metric, StoryRecord};
use mythsearch_core::{Error, MetadataStore};
use mythsearch_engine::{Action, Corpus, FsStoryFetcher, RankingStrategy, Response, SearchOptions, SearchService, StoryText};
use mythsearch_vector::FlatIndex;

/// Every query maps to the same direction, so the ranking is fixed by the rows.
struct AxisEmbedder;

impl Embedder for AxisEmbedder {
    fn dim(&self) -> usize {
        2
    }
    fn max_len(&self) -> usize {
        256
    }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

struct SlowEmbedder(Duration);

impl Embedder for SlowEmbedder {
    fn dim(&self) -> usize {
        2
    }
    fn max_len(&self) -> usize {
        256
    }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        std::thread::sleep(self.0);
        AxisEmbedder.embed_batch(texts)
    }
}

struct OfflineEmbedder;

impl Embedder for OfflineEmbedder {
    fn dim(&self) -> usize {
        2
    }
    fn max_len(&self) -> usize {
        256
    }
    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        bail!("model server unreachable")
    }
}

/// 25 stories ranked 0..25 for any query; the 12 even ids below 24 mention a kitsune.
fn corpus() -> Corpus {
    let continents = ["Asia", "Europe", "Africa"];
    let records = (0..25)
        .map(|i| {
            let creature = if i < 24 && i % 2 == 0 { "Kitsune" } else { "Dragon" };
            StoryRecord {
                filename: Some(format!("story_{i:02}.txt")),
                continent: Some(continents[i % 3].to_string()),
                culture: Some(format!("Culture{}", i % 5)),
                species_mentions: Some(BTreeMap::from([(creature.to_string(), serde_json::json!(1))])),
                ..StoryRecord::default()
            }
        })
        .collect();
    let rows: Vec<Vec<f32>> = (0..25).map(|i| vec![1.0 - i as f32 * 0.01, 0.0]).collect();
    let index = FlatIndex::from_rows(2, Metric::InnerProduct, &rows).unwrap();
    Corpus::from_parts(Box::new(index), MetadataStore::from_records(records), 2).unwrap()
}

fn service_with(encoder: Arc<dyn Embedder>, fetcher: Arc<dyn StoryFetcher>, options: SearchOptions) -> SearchService {
    SearchService::new(Arc::new(corpus()), encoder, fetcher, options, Duration::from_secs(600)).unwrap()
}

fn service() -> SearchService {
    service_with(Arc::new(AxisEmbedder), Arc::new(FsStoryFetcher::new("/nonexistent")), SearchOptions::default())
}

fn search(query: &str, filters: FilterSpec) -> Action {
    Action::Search { query: query.into(), filters }
}

fn creature(name: &str) -> FilterSpec {
    FilterSpec { creature: Some(name.into()), ..FilterSpec::default() }
}

fn stories(resp: &Response) -> Vec<usize> {
    resp.page.as_ref().unwrap().items.iter().map(|i| i.story.id).collect()
}

fn ranks(resp: &Response) -> Vec<usize> {
    resp.page.as_ref().unwrap().items.iter().map(|i| i.rank).collect()
}

#[test]
fn twelve_creature_matches_fill_two_pages() {
    let svc = service();
    let first = svc.handle("s", search("fox spirit", creature("Kitsune"))).unwrap();
    let page = first.page.as_ref().unwrap();
    assert_eq!((page.total_results, page.total_pages, page.current_page), (12, 2, 1));
    assert!(page.total_exact);
    assert_eq!(stories(&first), (0..20).step_by(2).collect::<Vec<_>>());
    assert_eq!(ranks(&first), (1..=10).collect::<Vec<_>>());

    let second = svc.handle("s", Action::Next).unwrap();
    assert_eq!(second.page.as_ref().unwrap().current_page, 2);
    assert_eq!(stories(&second), vec![20, 22]);
    assert_eq!(ranks(&second), vec![11, 12]);
}

#[test]
fn navigation_stops_at_both_ends() {
    let svc = service();
    svc.handle("s", search("fox", creature("Kitsune"))).unwrap();
    let first = svc.handle("s", Action::Prev).unwrap();
    assert_eq!(first.page.unwrap().current_page, 1);

    svc.handle("s", Action::Next).unwrap();
    let last = svc.handle("s", Action::Next).unwrap();
    assert_eq!(last.page.as_ref().unwrap().current_page, 2);
    assert_eq!(stories(&last), vec![20, 22]);
}

#[test]
fn changing_filters_on_page_three_returns_to_page_one() {
    let svc = service();
    svc.handle("s", search("river", FilterSpec::default())).unwrap();
    svc.handle("s", Action::Next).unwrap();
    let third = svc.handle("s", Action::Next).unwrap();
    assert_eq!(third.page.as_ref().unwrap().current_page, 3);
    assert_eq!(stories(&third), vec![20, 21, 22, 23, 24]);

    let asia = FilterSpec { continent: Some("Asia".into()), ..FilterSpec::default() };
    let refiltered = svc.handle("s", search("river", asia)).unwrap();
    let page = refiltered.page.as_ref().unwrap();
    assert_eq!(page.current_page, 1);
    assert_eq!(page.total_results, 9);
    assert_eq!(stories(&refiltered)[..3], [0, 3, 6]);
}

#[test]
fn no_matches_is_an_empty_first_page() {
    let svc = service();
    let resp = svc.handle("s", search("horse", creature("Unicorn"))).unwrap();
    let page = resp.page.unwrap();
    assert_eq!((page.total_results, page.total_pages, page.current_page), (0, 1, 1));
    assert!(page.items.is_empty());

    let next = svc.handle("s", Action::Next).unwrap().page.unwrap();
    assert_eq!(next.current_page, 1);
}

#[test]
fn blank_query_renders_nothing() {
    let svc = service();
    let resp = svc.handle("s", search("   ", creature("Kitsune"))).unwrap();
    assert!(resp.page.is_none());
    assert!(resp.story.is_none());
}

#[test]
fn widening_serves_the_same_pages_as_exhaustive() {
    let fetcher: Arc<dyn StoryFetcher> = Arc::new(FsStoryFetcher::new("/nonexistent"));
    let exhaustive = SearchOptions { page_size: 3, max_pages: 2, ..SearchOptions::default() };
    let widening = SearchOptions { strategy: RankingStrategy::Widening { initial_k: 2 }, ..exhaustive };
    let a = service_with(Arc::new(AxisEmbedder), fetcher.clone(), exhaustive);
    let b = service_with(Arc::new(AxisEmbedder), fetcher, widening);

    for action in [search("fox", creature("Kitsune")), Action::Next, Action::Next] {
        let ra = a.handle("s", action.clone()).unwrap().page.unwrap();
        let rb = b.handle("s", action).unwrap().page.unwrap();
        assert_eq!(ra.items, rb.items);
        assert_eq!((ra.current_page, ra.total_pages), (rb.current_page, rb.total_pages));
    }
}

#[test]
fn selecting_a_story_reads_it_without_moving_the_page() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("Europe/Culture1");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("story_01.txt"), "Once upon a time.").unwrap();
    let svc = service_with(Arc::new(AxisEmbedder), Arc::new(FsStoryFetcher::new(tmp.path())), SearchOptions::default());

    svc.handle("s", search("river", FilterSpec::default())).unwrap();
    svc.handle("s", Action::Next).unwrap();
    let resp = svc.handle("s", Action::Select { story: 1 }).unwrap();
    assert_eq!(resp.page.unwrap().current_page, 2);
    assert_eq!(resp.story.unwrap().text.text(), Some("Once upon a time."));

    let missing = svc.handle("s", Action::Select { story: 2 }).unwrap();
    assert!(matches!(missing.story.unwrap().text, StoryText::Unavailable { .. }));
    let unknown = svc.read_story(99);
    assert!(unknown.record.is_none());
    assert!(unknown.text.text().is_none());
}

#[test]
fn sessions_do_not_share_pages() {
    let svc = service();
    svc.handle("alice", search("fox", creature("Kitsune"))).unwrap();
    svc.handle("alice", Action::Next).unwrap();
    let bob = svc.handle("bob", search("fox", creature("Kitsune"))).unwrap();
    assert_eq!(bob.page.unwrap().current_page, 1);
    assert_eq!(svc.sessions().load("alice").pagination().current_page(), 2);
}

#[test]
fn encoder_failure_is_transient_and_keeps_the_session() {
    let svc = service_with(Arc::new(OfflineEmbedder), Arc::new(FsStoryFetcher::new("/nonexistent")), SearchOptions::default());
    let before = svc.sessions().load("s");
    let err = svc.handle("s", search("fox", FilterSpec::default())).unwrap_err();
    assert!(matches!(err, Error::Backend(_)), "{err:?}");
    assert!(err.is_transient());
    assert_eq!(svc.sessions().load("s"), before);
}

#[test]
fn encoder_dimension_must_match_the_index() {
    struct Wide;
    impl Embedder for Wide {
        fn dim(&self) -> usize {
            384
        }
        fn max_len(&self) -> usize {
            256
        }
        fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(vec![vec![0.0; 384]; texts.len()])
        }
    }
    let err = SearchService::new(
        Arc::new(corpus()),
        Arc::new(Wide),
        Arc::new(FsStoryFetcher::new("/nonexistent")),
        SearchOptions::default(),
        Duration::from_secs(60),
    )
    .err()
    .unwrap();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn slow_request_times_out_and_leaves_the_session_alone() {
    let svc = Arc::new(service_with(
        Arc::new(SlowEmbedder(Duration::from_millis(300))),
        Arc::new(FsStoryFetcher::new("/nonexistent")),
        SearchOptions::default(),
    ));
    let before = svc.sessions().load("s");
    let err = svc
        .handle_with_timeout("s", search("fox", creature("Kitsune")), Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)), "{err:?}");
    assert!(err.is_transient());
    assert_eq!(svc.sessions().load("s"), before);
}

#[tokio::test]
async fn request_within_the_timeout_commits_the_session() {
    let svc = Arc::new(service());
    let resp = svc
        .handle_with_timeout("s", search("fox", creature("Kitsune")), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(resp.page.unwrap().total_results, 12);
    svc.handle_with_timeout("s", Action::Next, Duration::from_secs(5)).await.unwrap();
    assert_eq!(svc.sessions().load("s").pagination().current_page(), 2);
}

#[test]
fn go_to_lands_on_the_requested_page_in_one_request() {
    let svc = service();
    svc.handle("s", search("fox", creature("Kitsune"))).unwrap();
    let second = svc.handle("s", Action::GoTo { page: 2 }).unwrap();
    assert_eq!(second.page.as_ref().unwrap().current_page, 2);
    assert_eq!(stories(&second), vec![20, 22]);

    let clamped = svc.handle("s", Action::GoTo { page: 40 }).unwrap();
    assert_eq!(clamped.page.as_ref().unwrap().current_page, 2);
}

#[test]
fn concurrent_sessions_share_one_service() {
    let svc = Arc::new(service());
    let expected: Vec<Vec<usize>> = {
        let first = svc.handle("reference", search("fox", creature("Kitsune"))).unwrap();
        let second = svc.handle("reference", Action::Next).unwrap();
        vec![stories(&first), stories(&second)]
    };

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let svc = Arc::clone(&svc);
            std::thread::spawn(move || {
                let session = format!("user-{i}");
                let mut pages = Vec::new();
                for _ in 0..5 {
                    let first = svc.handle(&session, search("fox", creature("Kitsune"))).unwrap();
                    let second = svc.handle(&session, Action::Next).unwrap();
                    pages = vec![stories(&first), stories(&second)];
                    svc.handle(&session, Action::Prev).unwrap();
                }
                pages
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
    assert_eq!(svc.sessions().len(), 9);
}
