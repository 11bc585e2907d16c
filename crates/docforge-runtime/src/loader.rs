//! Embedding and index loading, the final pipeline phase.
//!
//! High-quality datasets embed in sub-batches and write to the vector sink;
//! economy datasets write chunks to the keyword sink. Segments complete
//! batch by batch, so an interrupted run can resume from the incomplete
//! remainder.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::debug;

use docforge_core::capabilities::{
    EmbeddingProvider, KeywordSink, PauseFlags, VectorRecord, VectorSink,
};
use docforge_core::config::PlatformConfig;
use docforge_core::error::{Error, Result};
use docforge_core::model::{Chunk, Dataset, Document, IndexingStatus, IndexingTechnique};

use crate::status::StatusTracker;

pub struct IndexLoader {
    config: PlatformConfig,
    embeddings: Arc<dyn EmbeddingProvider>,
    vector_sink: Arc<dyn VectorSink>,
    keyword_sink: Arc<dyn KeywordSink>,
    pause_flags: Arc<dyn PauseFlags>,
}

impl IndexLoader {
    pub fn new(
        config: PlatformConfig,
        embeddings: Arc<dyn EmbeddingProvider>,
        vector_sink: Arc<dyn VectorSink>,
        keyword_sink: Arc<dyn KeywordSink>,
        pause_flags: Arc<dyn PauseFlags>,
    ) -> Self {
        Self {
            config,
            embeddings,
            vector_sink,
            keyword_sink,
            pause_flags,
        }
    }

    /// Write `chunks` to the dataset's index and complete the document.
    ///
    /// On success the document lands in `completed` with its token usage,
    /// load latency, and a cleared error field.
    pub fn load(
        &self,
        tracker: &StatusTracker,
        dataset: &Dataset,
        document: &Document,
        chunks: &[Chunk],
    ) -> Result<()> {
        let started = Instant::now();

        let tokens = match dataset.indexing_technique {
            IndexingTechnique::HighQuality => {
                self.load_high_quality(tracker, dataset, document, chunks)?
            }
            IndexingTechnique::Economy => {
                if !chunks.is_empty() {
                    self.keyword_sink.write(&dataset.id, chunks)?;
                    let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
                    tracker.complete_segments(&document.id, &ids)?;
                }
                0
            }
        };

        let latency = started.elapsed().as_secs_f64();
        debug!(
            document_id = %document.id,
            chunks = chunks.len(),
            tokens,
            latency,
            "index load finished"
        );
        tracker.update_status(&document.id, IndexingStatus::Completed, |d| {
            d.tokens = tokens;
            d.indexing_latency = latency;
            d.completed_at = Some(Utc::now());
            d.error = None;
        })?;
        Ok(())
    }

    /// Embed chunks in sub-batches and write them to the vector sink,
    /// re-checking the pause flag between batches.
    fn load_high_quality(
        &self,
        tracker: &StatusTracker,
        dataset: &Dataset,
        document: &Document,
        chunks: &[Chunk],
    ) -> Result<u64> {
        let handle = self.embeddings.get_model_instance(
            &dataset.tenant_id,
            dataset.embedding_model_provider.as_deref(),
            dataset.embedding_model.as_deref(),
        )?;

        let batch_size = self.config.embedding_batch_size.max(1);
        let mut tokens = 0u64;

        for batch in chunks.chunks(batch_size) {
            if self.pause_flags.is_paused(&document.id) {
                return Err(Error::DocumentPaused(document.id.clone()));
            }

            // Children are the retrievable units when present; flat chunks
            // embed their own content.
            let mut nodes: Vec<(String, String, String)> = Vec::new();
            for chunk in batch {
                if chunk.children.is_empty() {
                    nodes.push((chunk.id.clone(), chunk.doc_hash.clone(), chunk.content.clone()));
                } else {
                    for child in &chunk.children {
                        nodes.push((child.id.clone(), child.doc_hash.clone(), child.content.clone()));
                    }
                }
                tokens += handle.tokenize(&chunk.content) as u64;
            }

            let texts: Vec<String> = nodes.iter().map(|(_, _, content)| content.clone()).collect();
            let vectors = handle.embed(&texts)?;
            if vectors.len() != nodes.len() {
                return Err(Error::Embedding(format!(
                    "expected {} vectors, got {}",
                    nodes.len(),
                    vectors.len()
                )));
            }

            let records: Vec<VectorRecord> = nodes
                .into_iter()
                .zip(vectors)
                .map(|((node_id, doc_hash, content), vector)| VectorRecord {
                    node_id,
                    content,
                    doc_hash,
                    document_id: document.id.clone(),
                    vector,
                })
                .collect();
            self.vector_sink.write(&dataset.id, &records)?;

            let ids: Vec<String> = batch.iter().map(|c| c.id.clone()).collect();
            tracker.complete_segments(&document.id, &ids)?;
        }

        Ok(tokens)
    }
}
