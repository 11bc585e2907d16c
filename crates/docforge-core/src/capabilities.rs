//! Capability traits for the external collaborators of the pipeline.
//!
//! The indexing core owns no I/O of its own: file storage, source connectors,
//! embedding inference, index sinks, quota lookups, the pause-flag store, and
//! document persistence are all injected behind these narrow traits.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Chunk, Dataset, Document, RawDocument, Segment};

/// Object storage holding uploaded files.
pub trait FileStore: Send + Sync {
    /// Fetch an uploaded file's bytes. `None` when the upload no longer
    /// exists; the extractor treats that as an empty source, not a failure.
    fn get_uploaded_file(&self, upload_file_id: &str) -> Result<Option<Vec<u8>>>;
}

/// Notion workspace connector.
pub trait NotionConnector: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn fetch(
        &self,
        tenant_id: &str,
        credential_id: &str,
        workspace_id: &str,
        page_id: &str,
        page_type: &str,
    ) -> Result<Vec<RawDocument>>;
}

/// Website crawl result connector.
pub trait WebsiteConnector: Send + Sync {
    fn fetch(
        &self,
        tenant_id: &str,
        provider: &str,
        url: &str,
        job_id: &str,
        mode: &str,
    ) -> Result<Vec<RawDocument>>;
}

/// Handle to one tenant-scoped embedding model.
pub trait EmbeddingHandle: Send + Sync {
    /// Token count of `text` under this model's tokenizer.
    fn tokenize(&self, text: &str) -> usize;

    /// Embed a batch of texts; one vector per input.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Acquires embedding-model handles keyed by `(tenant, provider, model)`.
///
/// Fails with [`crate::Error::ProviderNotInitialized`] when the tenant has no
/// credentials configured for the requested provider.
pub trait EmbeddingProvider: Send + Sync {
    fn get_model_instance(
        &self,
        tenant_id: &str,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Result<Arc<dyn EmbeddingHandle>>;
}

/// One retrievable unit plus its vector, as handed to the vector sink.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Index node id — the chunk or child-chunk id.
    pub node_id: String,
    pub content: String,
    pub doc_hash: String,
    pub document_id: String,
    pub vector: Vec<f32>,
}

/// Vector index sink, keyed implicitly by dataset.
pub trait VectorSink: Send + Sync {
    fn write(&self, dataset_id: &str, records: &[VectorRecord]) -> Result<()>;
}

/// Keyword index sink used by economy-mode datasets.
pub trait KeywordSink: Send + Sync {
    fn write(&self, dataset_id: &str, chunks: &[Chunk]) -> Result<()>;
}

/// Billing plan of a tenant's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudPlan {
    Sandbox,
    Professional,
    Team,
    Enterprise,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Billing {
    pub enabled: bool,
    pub plan: CloudPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSpace {
    pub limit: u64,
    pub size: u64,
}

/// Tenant feature/quota snapshot, consulted read-only before each batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Features {
    pub billing: Billing,
    pub vector_space: VectorSpace,
}

impl Features {
    /// Self-hosted defaults: billing off, nothing to enforce.
    pub fn unlimited() -> Self {
        Self {
            billing: Billing {
                enabled: false,
                plan: CloudPlan::Sandbox,
            },
            vector_space: VectorSpace { limit: 0, size: 0 },
        }
    }
}

/// Feature/quota lookup service.
pub trait FeatureGate: Send + Sync {
    fn get_features(&self, tenant_id: &str) -> Result<Features>;
}

/// Fast key-value store holding per-document pause flags, written by the
/// user's "stop processing" action and polled at phase boundaries.
pub trait PauseFlags: Send + Sync {
    fn is_paused(&self, document_id: &str) -> bool;
    fn set_paused(&self, document_id: &str, paused: bool);
}

/// Persistent document/segment store. The host guarantees single-writer
/// semantics per document row.
pub trait DocumentStore: Send + Sync {
    fn get_dataset(&self, dataset_id: &str) -> Result<Option<Dataset>>;
    fn get_document(&self, document_id: &str) -> Result<Option<Document>>;
    fn save_document(&self, document: &Document) -> Result<()>;

    /// Replace the segments of a document with freshly split rows.
    fn upsert_segments(&self, segments: &[Segment]) -> Result<()>;
    fn get_segments(&self, document_id: &str) -> Result<Vec<Segment>>;
    fn delete_segments(&self, document_id: &str) -> Result<()>;

    /// Apply `update` to every segment of `document_id`, in one logical step.
    fn update_segments(
        &self,
        document_id: &str,
        update: &mut dyn FnMut(&mut Segment),
    ) -> Result<()>;
}
