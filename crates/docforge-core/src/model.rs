//! Model types for datasets, documents, process rules, and chunks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Compute the SHA-256 content fingerprint used for idempotent re-indexing.
pub fn doc_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Indexing progress states for a document.
///
/// Happy path: waiting → parsing → splitting → indexing → completed.
/// `Error` is terminal; `Paused` is terminal for the current run only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingStatus {
    Waiting,
    Parsing,
    Splitting,
    Indexing,
    Completed,
    Error,
    Paused,
}

impl IndexingStatus {
    /// Position along the happy path, if this is a forward-progress state.
    pub fn phase_rank(&self) -> Option<u8> {
        match self {
            Self::Waiting => Some(0),
            Self::Parsing => Some(1),
            Self::Splitting => Some(2),
            Self::Indexing => Some(3),
            Self::Completed => Some(4),
            Self::Error | Self::Paused => None,
        }
    }
}

impl std::fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Parsing => "parsing",
            Self::Splitting => "splitting",
            Self::Indexing => "indexing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

/// Chunking/index strategy selected per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocForm {
    Paragraph,
    Qa,
    ParentChild,
}

/// Embedding-based vs keyword-only indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingTechnique {
    HighQuality,
    Economy,
}

/// Segmentation rule mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
    Automatic,
    Custom,
    Hierarchical,
}

/// How parent chunks are formed in hierarchical mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParentMode {
    Paragraph,
    FullDoc,
}

/// A single cleaning toggle, applied in list order when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreProcessingRuleId {
    RemoveExtraSpaces,
    RemoveUrlsEmails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreProcessingRule {
    pub id: PreProcessingRuleId,
    pub enabled: bool,
}

/// Token-budget and separator settings for one splitting level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segmentation {
    pub max_tokens: usize,
    #[serde(default)]
    pub chunk_overlap: usize,
    #[serde(default)]
    pub separator: Option<String>,
}

/// Nested rule payload of a [`ProcessRule`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rules {
    #[serde(default)]
    pub pre_processing_rules: Vec<PreProcessingRule>,
    #[serde(default)]
    pub segmentation: Option<Segmentation>,
    /// Child-level segmentation for hierarchical mode.
    #[serde(default)]
    pub subchunk_segmentation: Option<Segmentation>,
    #[serde(default)]
    pub parent_mode: Option<ParentMode>,
}

/// Per-document chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRule {
    pub mode: ProcessMode,
    #[serde(default)]
    pub rules: Rules,
}

impl ProcessRule {
    pub fn automatic() -> Self {
        Self {
            mode: ProcessMode::Automatic,
            rules: Rules::default(),
        }
    }
}

/// Validated data source descriptor, parsed from the raw
/// `(data_source_type, data_source_info)` pair on a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    UploadFile {
        upload_file_id: String,
    },
    NotionImport {
        credential_id: String,
        workspace_id: String,
        page_id: String,
        page_type: String,
    },
    WebsiteCrawl {
        provider: String,
        url: String,
        job_id: String,
        mode: String,
    },
    /// Unknown source kinds extract to an empty document list rather than
    /// failing the batch.
    Unsupported(String),
}

impl SourceKind {
    /// Parse and validate a raw source descriptor.
    ///
    /// Missing required fields fail with the user-facing messages the
    /// document UI expects; an unrecognized type parses as `Unsupported`.
    pub fn parse(data_source_type: &str, info: &Map<String, Value>) -> Result<Self> {
        fn field(info: &Map<String, Value>, key: &str, missing: &str) -> Result<String> {
            info.get(key)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| Error::MissingSourceInfo(missing.to_string()))
        }

        match data_source_type {
            "upload_file" => Ok(Self::UploadFile {
                upload_file_id: field(info, "upload_file_id", "no upload file found")?,
            }),
            "notion_import" => {
                let missing = "no notion import info found";
                Ok(Self::NotionImport {
                    credential_id: field(info, "credential_id", missing)?,
                    workspace_id: field(info, "notion_workspace_id", missing)?,
                    page_id: field(info, "notion_page_id", missing)?,
                    page_type: field(info, "type", missing)?,
                })
            }
            "website_crawl" => {
                let missing = "no website import info found";
                Ok(Self::WebsiteCrawl {
                    provider: field(info, "provider", missing)?,
                    url: field(info, "url", missing)?,
                    job_id: field(info, "job_id", missing)?,
                    mode: field(info, "mode", missing)?,
                })
            }
            other => Ok(Self::Unsupported(other.to_string())),
        }
    }
}

/// A document being indexed. Mutated only by the indexing runner and the
/// status tracker; deletion belongs to dataset management, not this pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub dataset_id: String,
    pub tenant_id: String,
    pub data_source_type: String,
    #[serde(default)]
    pub data_source_info: Map<String, Value>,
    pub doc_form: DocForm,
    pub doc_language: String,
    pub process_rule: ProcessRule,
    pub indexing_status: IndexingStatus,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub tokens: u64,
    /// Character count of the extracted source text. The name is historical;
    /// hosts display and bill against this figure as-is.
    #[serde(default)]
    pub word_count: u64,
    /// Wall-clock seconds spent in the load phase.
    #[serde(default)]
    pub indexing_latency: f64,
    #[serde(default)]
    pub processing_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parsing_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cleaning_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub splitting_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        dataset_id: impl Into<String>,
        tenant_id: impl Into<String>,
        data_source_type: impl Into<String>,
        doc_form: DocForm,
        process_rule: ProcessRule,
    ) -> Self {
        Self {
            id: id.into(),
            dataset_id: dataset_id.into(),
            tenant_id: tenant_id.into(),
            data_source_type: data_source_type.into(),
            data_source_info: Map::new(),
            doc_form,
            doc_language: "English".to_string(),
            process_rule,
            indexing_status: IndexingStatus::Waiting,
            is_paused: false,
            error: None,
            tokens: 0,
            word_count: 0,
            indexing_latency: 0.0,
            processing_started_at: None,
            parsing_completed_at: None,
            cleaning_completed_at: None,
            splitting_completed_at: None,
            completed_at: None,
            stopped_at: None,
        }
    }
}

/// Shared context for a batch of documents. Read-only from the pipeline's
/// perspective apart from index-sink bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub tenant_id: String,
    pub indexing_technique: IndexingTechnique,
    #[serde(default)]
    pub embedding_model_provider: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
}

/// Raw text fetched from a data source, before cleaning and splitting.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub content: String,
    pub document_id: Option<String>,
    pub dataset_id: Option<String>,
    /// QA answer carried alongside the question for QA-form documents.
    pub answer: Option<String>,
}

impl RawDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            document_id: None,
            dataset_id: None,
            answer: None,
        }
    }
}

/// Index position metadata attached to every chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub dataset_id: String,
    pub position: usize,
}

/// A child chunk of a hierarchical parent. Written to the index as its own
/// retrievable unit; never outlives the parent's indexing pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildChunk {
    pub id: String,
    pub content: String,
    pub doc_hash: String,
    pub position: usize,
}

/// A bounded span of document text, the atomic unit written to an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub doc_hash: String,
    pub token_count: usize,
    pub metadata: ChunkMetadata,
    /// QA answer for QA-form chunks.
    #[serde(default)]
    pub answer: Option<String>,
    /// Child chunks in hierarchical mode; empty for flat forms.
    #[serde(default)]
    pub children: Vec<ChildChunk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    Waiting,
    Indexing,
    Completed,
    Error,
}

/// Persisted row mirroring one chunk of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Index node id — same id the chunk is written under in the index sink.
    pub id: String,
    pub document_id: String,
    pub dataset_id: String,
    pub position: usize,
    pub content: String,
    pub doc_hash: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub children: Vec<ChildChunk>,
    pub status: SegmentStatus,
    pub enabled: bool,
    #[serde(default)]
    pub indexing_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Segment {
    /// Build the persisted row for a freshly split chunk.
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            document_id: chunk.metadata.document_id.clone(),
            dataset_id: chunk.metadata.dataset_id.clone(),
            position: chunk.metadata.position,
            content: chunk.content.clone(),
            doc_hash: chunk.doc_hash.clone(),
            answer: chunk.answer.clone(),
            children: chunk.children.clone(),
            status: SegmentStatus::Waiting,
            enabled: false,
            indexing_at: None,
            completed_at: None,
        }
    }

    /// Rebuild the in-memory chunk for the resume-from-indexing path.
    pub fn to_chunk(&self, token_count: usize) -> Chunk {
        Chunk {
            id: self.id.clone(),
            content: self.content.clone(),
            doc_hash: self.doc_hash.clone(),
            token_count,
            metadata: ChunkMetadata {
                document_id: self.document_id.clone(),
                dataset_id: self.dataset_id.clone(),
                position: self.position,
            },
            answer: self.answer.clone(),
            children: self.children.clone(),
        }
    }
}
