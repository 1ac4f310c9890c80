//! Vector index and passage retrieval

mod index;
mod retriever;

pub use index::{IndexStats, ScoredChunk, VectorIndex};
pub use retriever::Retriever;
