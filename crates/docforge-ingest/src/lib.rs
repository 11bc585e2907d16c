//! Docforge Ingest — text cleaning, chunk splitting, extractor dispatch.

pub mod clean;
pub mod extract;
pub mod hierarchical;
pub mod qa;
pub mod splitter;

pub use clean::CleanProcessor;
pub use extract::ExtractorDispatch;
pub use hierarchical::HierarchicalSplitter;
pub use qa::{parse_qa_pairs, QaPair};
pub use splitter::{
    build_chunks, get_splitter, heuristic_token_count, token_counter, FixedRecursiveSplitter,
    RecursiveCharacterSplitter, TextSplitter, TokenCounter,
};
