pub mod config;
pub mod error;
pub mod filter;
pub mod metadata;
pub mod paginate;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use filter::FilterEngine;
pub use metadata::MetadataStore;
pub use paginate::PaginationState;
