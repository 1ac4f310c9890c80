//! Guideline ingestion: multi-format parsing, chunking and indexing

mod chunker;
mod parser;
mod pipeline;

pub use chunker::{chunk, TextChunker, TextSpan};
pub use parser::{DocumentParser, PageContent, ParsedDocument};
pub use pipeline::{IngestPipeline, IngestReport};
