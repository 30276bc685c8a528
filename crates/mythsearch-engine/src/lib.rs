//! mythsearch-engine
//!
//! Wires the encoder, vector index and metadata into the query pipeline
//! (encode, rank, filter, paginate) and exposes it as per-session request
//! handlers.

pub mod cache;
pub mod corpus;
pub mod fetch;
pub mod ranking;
pub mod service;
pub mod session;

pub use cache::ProcessCache;
pub use corpus::Corpus;
pub use fetch::{fetch_story, FsStoryFetcher, StoryText};
pub use ranking::{rank_filtered, Ranked, RankingStrategy};
pub use service::{PageView, Response, ResultItem, SearchOptions, SearchService, StoryView};
pub use session::{Action, QueryKey, SessionState, SessionStore};
