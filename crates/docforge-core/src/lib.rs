//! Docforge Core — model types, platform configuration, capability traits.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod memory;
pub mod model;

pub use capabilities::{
    Billing, CloudPlan, DocumentStore, EmbeddingHandle, EmbeddingProvider, FeatureGate, Features,
    FileStore, KeywordSink, NotionConnector, PauseFlags, VectorRecord, VectorSink, VectorSpace,
    WebsiteConnector,
};
pub use config::{PlatformConfig, MIN_SEGMENTATION_TOKENS};
pub use error::{Error, Result};
pub use memory::{MemoryDocumentStore, MemoryPauseFlags};
pub use model::{
    doc_hash, Chunk, ChunkMetadata, ChildChunk, Dataset, DocForm, Document, IndexingStatus,
    IndexingTechnique, ParentMode, PreProcessingRule, PreProcessingRuleId, ProcessMode,
    ProcessRule, RawDocument, Rules, Segment, SegmentStatus, Segmentation, SourceKind,
};
