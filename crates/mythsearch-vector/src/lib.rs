//! mythsearch-vector
//!
//! `VectorIndex` implementations. `FlatIndex` is an exact in-memory scan loaded
//! from a FAISS flat index file (see `faiss`); `LanceIndex` (feature `lancedb`)
//! queries a LanceDB table.

pub mod faiss;
pub mod flat;
#[cfg(feature = "lancedb")]
pub mod lance;

pub use faiss::{read_flat, write_flat};
pub use flat::FlatIndex;
#[cfg(feature = "lancedb")]
pub use lance::LanceIndex;
