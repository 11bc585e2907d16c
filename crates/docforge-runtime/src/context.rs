//! Shared collaborator handles injected into the indexing runner.

use std::sync::Arc;

use docforge_core::capabilities::{
    DocumentStore, EmbeddingProvider, FeatureGate, FileStore, KeywordSink, NotionConnector,
    PauseFlags, VectorSink, WebsiteConnector,
};
use docforge_core::config::PlatformConfig;

/// Everything the pipeline talks to, bundled for injection. Cloning is cheap;
/// all collaborators sit behind `Arc`.
#[derive(Clone)]
pub struct RunnerContext {
    pub config: PlatformConfig,
    pub store: Arc<dyn DocumentStore>,
    pub pause_flags: Arc<dyn PauseFlags>,
    pub feature_gate: Arc<dyn FeatureGate>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub vector_sink: Arc<dyn VectorSink>,
    pub keyword_sink: Arc<dyn KeywordSink>,
    pub file_store: Arc<dyn FileStore>,
    pub notion: Arc<dyn NotionConnector>,
    pub website: Arc<dyn WebsiteConnector>,
}
