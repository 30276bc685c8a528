//! Per-session navigation state.
//!
//! `SessionState::apply` is a pure reducer from (state, action) to the next
//! state. `SessionStore` keeps one state per session id, creates it on first
//! use and forgets it after a period of inactivity.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use mythsearch_core::types::{FilterSpec, StoryId};
use mythsearch_core::PaginationState;

/// The (query text, filters) pair a pagination position belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    pub text: String,
    pub filters: FilterSpec,
}

/// A user intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Search { query: String, filters: FilterSpec },
    Next,
    Prev,
    /// Jump to a 1-based page of the current results.
    GoTo { page: usize },
    Select { story: StoryId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    query: Option<QueryKey>,
    pagination: PaginationState,
    selected: Option<StoryId>,
}

impl SessionState {
    pub fn new(page_size: usize, max_pages: usize) -> Self {
        Self { query: None, pagination: PaginationState::new(page_size, max_pages), selected: None }
    }

    /// `None` until a non-blank query has been submitted.
    pub fn query(&self) -> Option<&QueryKey> {
        self.query.as_ref()
    }

    pub fn pagination(&self) -> &PaginationState {
        &self.pagination
    }

    pub fn selected(&self) -> Option<StoryId> {
        self.selected
    }

    /// Next state after `action`. A search whose trimmed text or filters
    /// differ from the current ones starts again at page 1; resubmitting the
    /// same search keeps the page. Navigation stays within the last observed
    /// page count.
    pub fn apply(&self, action: &Action) -> SessionState {
        let mut next = self.clone();
        match action {
            Action::Search { query, filters } => {
                let text = query.trim();
                let key = (!text.is_empty()).then(|| QueryKey { text: text.to_string(), filters: filters.clone() });
                if key != self.query {
                    next.query = key;
                    next.pagination.reset();
                }
                next.selected = None;
            }
            Action::Next => {
                next.pagination.next();
                next.selected = None;
            }
            Action::Prev => {
                next.pagination.prev();
                next.selected = None;
            }
            Action::GoTo { page } => {
                next.pagination.go_to(*page);
                next.selected = None;
            }
            Action::Select { story } => next.selected = Some(*story),
        }
        next
    }

    /// Records the result count of the current query.
    pub fn observe(&mut self, filtered_count: usize) {
        self.pagination.observe(filtered_count);
    }
}

struct Entry {
    state: SessionState,
    touched: Instant,
}

/// Session states keyed by session id.
///
/// Writes to the same session from concurrent requests are last-writer-wins.
pub struct SessionStore {
    ttl: Duration,
    page_size: usize,
    max_pages: usize,
    sessions: Mutex<HashMap<String, Entry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration, page_size: usize, max_pages: usize) -> Self {
        Self { ttl, page_size, max_pages, sessions: Mutex::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current state of `session`, or a fresh one if it is unknown or expired.
    pub fn load(&self, session: &str) -> SessionState {
        self.load_at(session, Instant::now())
    }

    pub fn load_at(&self, session: &str, now: Instant) -> SessionState {
        let mut sessions = self.lock();
        if let Some(entry) = sessions.get_mut(session) {
            if now.saturating_duration_since(entry.touched) < self.ttl {
                entry.touched = now;
                return entry.state.clone();
            }
            sessions.remove(session);
            debug!(session, "session expired");
        }
        let purged = Self::purge(&mut sessions, self.ttl, now);
        if purged > 0 {
            debug!(purged, "purged expired sessions");
        }
        let state = SessionState::new(self.page_size, self.max_pages);
        sessions.insert(session.to_string(), Entry { state: state.clone(), touched: now });
        debug!(session, live = sessions.len(), "session created");
        state
    }

    pub fn store(&self, session: &str, state: SessionState) {
        self.store_at(session, state, Instant::now());
    }

    pub fn store_at(&self, session: &str, state: SessionState, now: Instant) {
        self.lock().insert(session.to_string(), Entry { state, touched: now });
    }

    pub fn remove(&self, session: &str) -> bool {
        self.lock().remove(session).is_some()
    }

    /// Drops sessions idle for longer than the TTL; returns how many.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        Self::purge(&mut self.lock(), self.ttl, now)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge(sessions: &mut HashMap<String, Entry>, ttl: Duration, now: Instant) -> usize {
        let before = sessions.len();
        sessions.retain(|_, e| now.saturating_duration_since(e.touched) < ttl);
        before - sessions.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
