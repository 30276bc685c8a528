//! Request handlers: one call per user action, from session id + action to a
//! rendered response.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use mythsearch_core::config::{Config, SearchSettings};
use mythsearch_core::traits::{Embedder, StoryFetcher};
use mythsearch_core::types::{FilterOptions, FilterSpec, StoryId, StoryRecord};
use mythsearch_core::{Error, Result};
use mythsearch_embed::get_default_embedder;

use crate::cache::ProcessCache;
use crate::corpus::Corpus;
use crate::fetch::{fetch_story, FsStoryFetcher, StoryText};
use crate::ranking::{rank_filtered, Ranked, RankingStrategy};
use crate::session::{Action, SessionState, SessionStore};

static CORPUS: ProcessCache<Arc<Corpus>> = ProcessCache::new();
static ENCODER: ProcessCache<Arc<dyn Embedder>> = ProcessCache::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub page_size: usize,
    pub max_pages: usize,
    pub strategy: RankingStrategy,
    pub timeout: Duration,
}

impl SearchOptions {
    pub fn from_settings(search: &SearchSettings) -> Self {
        Self {
            page_size: search.page_size.max(1),
            max_pages: search.max_pages.max(1),
            strategy: RankingStrategy::from_settings(search),
            timeout: Duration::from_millis(search.query_timeout_ms),
        }
    }

    /// Largest number of filtered results reachable through paging.
    pub fn window(&self) -> usize {
        self.page_size.saturating_mul(self.max_pages)
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from_settings(&SearchSettings::default())
    }
}

/// What a client renders after an action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// `None` while the session has no query.
    pub page: Option<PageView>,
    /// Set when the action selected a story.
    pub story: Option<StoryView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub query: String,
    pub filters: FilterSpec,
    pub total_results: usize,
    /// False when `total_results` is a lower bound.
    pub total_exact: bool,
    pub current_page: usize,
    pub total_pages: usize,
    pub page_size: usize,
    pub items: Vec<ResultItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultItem {
    /// 1-based position across all pages.
    pub rank: usize,
    pub score: f32,
    pub story: StoryRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryView {
    pub id: StoryId,
    pub record: Option<StoryRecord>,
    pub text: StoryText,
}

pub struct SearchService {
    corpus: Arc<Corpus>,
    encoder: Arc<dyn Embedder>,
    fetcher: Arc<dyn StoryFetcher>,
    sessions: SessionStore,
    options: SearchOptions,
}

impl SearchService {
    pub fn new(
        corpus: Arc<Corpus>,
        encoder: Arc<dyn Embedder>,
        fetcher: Arc<dyn StoryFetcher>,
        options: SearchOptions,
        session_ttl: Duration,
    ) -> Result<Self> {
        if corpus.index().dim() != encoder.dim() {
            return Err(Error::DimensionMismatch { index: corpus.index().dim(), encoder: encoder.dim() });
        }
        let sessions = SessionStore::new(session_ttl, options.page_size, options.max_pages);
        Ok(Self { corpus, encoder, fetcher, sessions, options })
    }

    /// Builds the service from configuration. The encoder and corpus are
    /// process-wide: the first successful call loads them and later calls
    /// reuse them regardless of `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.settings();
        let encoder = ENCODER.get_or_try_init(|| {
            let model_dir = config.path(&settings.embedding.model_dir);
            get_default_embedder(&settings.embedding, &model_dir)
                .map(Arc::from)
                .map_err(|e| Error::InvalidConfig(format!("loading encoder {}: {e:#}", settings.embedding.model)))
        })?;
        let corpus = CORPUS.get_or_try_init(|| Corpus::load(config, encoder.dim()).map(Arc::new))?;
        let fetcher = Arc::new(FsStoryFetcher::new(config.path(&settings.data.stories_dir)));
        Self::new(
            corpus,
            encoder,
            fetcher,
            SearchOptions::from_settings(&settings.search),
            Duration::from_secs(settings.session.ttl_secs),
        )
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn filter_options(&self) -> &FilterOptions {
        self.corpus.filter_options()
    }

    /// Encodes `query` and returns the filtered ranking cut to the reachable window.
    pub fn search(&self, query: &str, filters: &FilterSpec) -> Result<Ranked> {
        let start = Instant::now();
        let vector = self.encoder.embed(query).map_err(|e| Error::Backend(format!("encoder: {e:#}")))?;
        let encoded = start.elapsed();
        let unknown = self.corpus.filter_options().unknown_selections(filters);
        if !unknown.is_empty() {
            debug!(?unknown, "filter values not present in the corpus");
        }
        let ranked = rank_filtered(&self.corpus, &vector, filters, self.options.strategy, self.options.window())?;
        debug!(?encoded, elapsed = ?start.elapsed(), total = ranked.total, "search");
        Ok(ranked)
    }

    /// Applies `action` to `session` and renders the result. The session is
    /// only updated when the request succeeds.
    pub fn handle(&self, session: &str, action: Action) -> Result<Response> {
        let state = self.sessions.load(session);
        let (next, response) = self.execute(&state, &action)?;
        self.sessions.store(session, next);
        Ok(response)
    }

    /// Like [`handle`](Self::handle), but runs the work on the blocking pool
    /// and gives up after `timeout`. On expiry the session keeps its previous
    /// state and `Error::Timeout` is returned.
    pub async fn handle_with_timeout(self: &Arc<Self>, session: &str, action: Action, timeout: Duration) -> Result<Response> {
        let state = self.sessions.load(session);
        let this = Arc::clone(self);
        let work = tokio::task::spawn_blocking(move || this.execute(&state, &action));
        match tokio::time::timeout(timeout, work).await {
            Err(_) => {
                warn!(session, ?timeout, "request timed out");
                Err(Error::Timeout(timeout))
            }
            Ok(Err(join)) => Err(Error::Backend(format!("search task failed: {join}"))),
            Ok(Ok(result)) => {
                let (next, response) = result?;
                self.sessions.store(session, next);
                Ok(response)
            }
        }
    }

    /// Pure with respect to the session store: returns the next state and the
    /// response without committing either.
    pub fn execute(&self, state: &SessionState, action: &Action) -> Result<(SessionState, Response)> {
        let mut next = state.apply(action);
        let page = match next.query().cloned() {
            Some(key) => {
                let ranked = self.search(&key.text, &key.filters)?;
                next.observe(ranked.total);
                Some(self.render_page(&next, key.text, key.filters, &ranked))
            }
            None => None,
        };
        let story = match action {
            Action::Select { story } => Some(self.read_story(*story)),
            _ => None,
        };
        Ok((next, Response { page, story }))
    }

    fn render_page(&self, state: &SessionState, query: String, filters: FilterSpec, ranked: &Ranked) -> PageView {
        let pagination = state.pagination();
        let offset = pagination.offset();
        let items = pagination
            .slice(&ranked.hits)
            .iter()
            .enumerate()
            .filter_map(|(i, hit)| {
                self.corpus
                    .record(hit.story)
                    .map(|story| ResultItem { rank: offset + i + 1, score: hit.score, story: story.clone() })
            })
            .collect();
        PageView {
            query,
            filters,
            total_results: ranked.total,
            total_exact: ranked.total_exact,
            current_page: pagination.current_page(),
            total_pages: pagination.total_pages(),
            page_size: pagination.page_size(),
            items,
        }
    }

    /// Full text of `story`. Failures are reported as unavailable.
    pub fn read_story(&self, story: StoryId) -> StoryView {
        match self.corpus.record(story) {
            Some(record) => {
                let text = fetch_story(self.fetcher.as_ref(), record);
                if let StoryText::Unavailable { reason } = &text {
                    info!(story, reason = %reason, "story unavailable");
                }
                StoryView { id: story, record: Some(record.clone()), text }
            }
            None => StoryView {
                id: story,
                record: None,
                text: StoryText::Unavailable { reason: format!("no story with id {story}") },
            },
        }
    }
}
