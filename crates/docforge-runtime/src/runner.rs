//! Indexing orchestrator.
//!
//! Drives a batch of documents through extract, clean, split, and load.
//! Quota checks run once per batch before any document is touched; after
//! that, each document fails or pauses on its own without affecting the
//! rest of the batch.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use docforge_core::capabilities::{CloudPlan, EmbeddingHandle};
use docforge_core::error::{Error, Result};
use docforge_core::model::{
    Chunk, Dataset, DocForm, Document, IndexingStatus, IndexingTechnique, RawDocument, Segment,
    SegmentStatus,
};

use docforge_ingest::{
    build_chunks, get_splitter, heuristic_token_count, parse_qa_pairs, token_counter,
    CleanProcessor, ExtractorDispatch, HierarchicalSplitter, TextSplitter, TokenCounter,
};

use crate::context::RunnerContext;
use crate::loader::IndexLoader;
use crate::status::StatusTracker;

pub struct IndexingRunner {
    ctx: RunnerContext,
    tracker: StatusTracker,
    extractor: ExtractorDispatch,
    loader: IndexLoader,
}

impl IndexingRunner {
    pub fn new(ctx: RunnerContext) -> Self {
        let tracker = StatusTracker::new(ctx.store.clone(), ctx.pause_flags.clone());
        let extractor = ExtractorDispatch::new(
            ctx.file_store.clone(),
            ctx.notion.clone(),
            ctx.website.clone(),
        );
        let loader = IndexLoader::new(
            ctx.config.clone(),
            ctx.embeddings.clone(),
            ctx.vector_sink.clone(),
            ctx.keyword_sink.clone(),
            ctx.pause_flags.clone(),
        );
        Self {
            ctx,
            tracker,
            extractor,
            loader,
        }
    }

    /// Index a batch of documents belonging to one dataset.
    ///
    /// A failed quota check marks every document in the batch as errored and
    /// returns without extracting anything. Past that point documents are
    /// isolated: one document's failure or pause never stops its peers.
    pub fn run(&self, dataset_id: &str, document_ids: &[String]) -> Result<()> {
        let Some(dataset) = self.ctx.store.get_dataset(dataset_id)? else {
            debug!(dataset_id, "dataset not found, nothing to index");
            return Ok(());
        };

        if let Err(err) = self.check_quota(&dataset, document_ids.len()) {
            let message = err.to_string();
            warn!(dataset_id, %message, "batch rejected by quota check");
            for document_id in document_ids {
                if let Err(err) = self.tracker.mark_error(document_id, &message) {
                    warn!(document_id, %err, "failed to record quota error");
                }
            }
            return Ok(());
        }

        for document_id in document_ids {
            let document = match self.ctx.store.get_document(document_id)? {
                Some(document) => document,
                None => {
                    warn!(document_id, "document not found, skipping");
                    continue;
                }
            };
            if document.indexing_status == IndexingStatus::Completed {
                debug!(document_id, "document already completed, skipping");
                continue;
            }
            if let Err(err) = self.process_document(&dataset, &document) {
                self.handle_document_error(document_id, err);
            }
        }
        Ok(())
    }

    /// Resume a document stuck in the splitting phase: discard its segments
    /// and redo extract, split, and load.
    pub fn run_in_splitting_status(&self, document_id: &str) -> Result<()> {
        let Some((dataset, document)) = self.load_pair(document_id)? else {
            return Ok(());
        };
        self.ctx.store.delete_segments(document_id)?;
        if let Err(err) = self.index_document(&dataset, &document) {
            self.handle_document_error(document_id, err);
        }
        Ok(())
    }

    /// Resume a document stuck in the indexing phase: reload its incomplete
    /// segments and run only the load phase.
    pub fn run_in_indexing_status(&self, document_id: &str) -> Result<()> {
        let Some((dataset, document)) = self.load_pair(document_id)? else {
            return Ok(());
        };
        let chunks: Vec<Chunk> = self
            .ctx
            .store
            .get_segments(document_id)?
            .iter()
            .filter(|s| s.status != SegmentStatus::Completed)
            .map(|s| s.to_chunk(heuristic_token_count(&s.content)))
            .collect();
        if let Err(err) = self.loader.load(&self.tracker, &dataset, &document, &chunks) {
            self.handle_document_error(document_id, err);
        }
        Ok(())
    }

    fn load_pair(&self, document_id: &str) -> Result<Option<(Dataset, Document)>> {
        let Some(document) = self.ctx.store.get_document(document_id)? else {
            warn!(document_id, "document not found, nothing to resume");
            return Ok(None);
        };
        let Some(dataset) = self.ctx.store.get_dataset(&document.dataset_id)? else {
            self.tracker.mark_error(document_id, "no dataset found")?;
            return Ok(None);
        };
        Ok(Some((dataset, document)))
    }

    fn check_quota(&self, dataset: &Dataset, document_count: usize) -> Result<()> {
        let features = self.ctx.feature_gate.get_features(&dataset.tenant_id)?;
        if !features.billing.enabled {
            return Ok(());
        }
        if document_count > self.ctx.config.batch_upload_limit {
            return Err(Error::QuotaExceeded(format!(
                "You have reached the batch upload limit of {}.",
                self.ctx.config.batch_upload_limit
            )));
        }
        if features.billing.plan == CloudPlan::Sandbox && document_count > 1 {
            return Err(Error::QuotaExceeded(
                "Your current plan does not support batch upload, please upgrade your plan."
                    .to_string(),
            ));
        }
        if dataset.indexing_technique == IndexingTechnique::HighQuality {
            let space = &features.vector_space;
            if space.limit > 0 && space.size >= space.limit {
                return Err(Error::QuotaExceeded(
                    "Your total number of documents plus the number of uploads have over the \
                     limit of your subscription."
                        .to_string(),
                ));
            }
        }
        Ok(())
    }

    fn handle_document_error(&self, document_id: &str, err: Error) {
        if err.is_document_failure() {
            warn!(document_id, %err, "document indexing failed");
            if let Err(err) = self.tracker.mark_error(document_id, &err.to_string()) {
                warn!(document_id, %err, "failed to record document error");
            }
        } else {
            debug!(document_id, %err, "document indexing interrupted");
        }
    }

    fn process_document(&self, dataset: &Dataset, document: &Document) -> Result<()> {
        let document =
            self.tracker
                .update_status(&document.id, IndexingStatus::Parsing, |d| {
                    d.processing_started_at = Some(Utc::now());
                })?;
        self.index_document(dataset, &document)
    }

    /// Extract, split, persist segments, and load. Shared by the fresh run
    /// and the resume-from-splitting path.
    fn index_document(&self, dataset: &Dataset, document: &Document) -> Result<()> {
        let raw_docs = self.extractor.extract(document)?;
        let word_count: u64 = raw_docs
            .iter()
            .map(|raw| raw.content.chars().count() as u64)
            .sum();

        let document =
            self.tracker
                .update_status(&document.id, IndexingStatus::Splitting, |d| {
                    d.word_count = word_count;
                    d.parsing_completed_at = Some(Utc::now());
                })?;

        let handle = match dataset.indexing_technique {
            IndexingTechnique::HighQuality => Some(self.ctx.embeddings.get_model_instance(
                &dataset.tenant_id,
                dataset.embedding_model_provider.as_deref(),
                dataset.embedding_model.as_deref(),
            )?),
            IndexingTechnique::Economy => None,
        };
        let chunks = self.transform(&document, raw_docs, handle)?;

        let segments: Vec<Segment> = chunks.iter().map(Segment::from_chunk).collect();
        self.ctx.store.upsert_segments(&segments)?;

        let document =
            self.tracker
                .update_status(&document.id, IndexingStatus::Indexing, |d| {
                    let now = Utc::now();
                    d.cleaning_completed_at = Some(now);
                    d.splitting_completed_at = Some(now);
                })?;
        self.tracker.mark_segments_indexing(&document.id)?;

        self.loader.load(&self.tracker, dataset, &document, &chunks)
    }

    /// Clean each raw document and split it into chunks per the document
    /// form, keeping one ordinal position sequence across sources.
    fn transform(
        &self,
        document: &Document,
        raw_docs: Vec<RawDocument>,
        handle: Option<Arc<dyn EmbeddingHandle>>,
    ) -> Result<Vec<Chunk>> {
        let counter = token_counter(handle.clone());
        let rule = &document.process_rule;

        enum DocSplitter {
            Hierarchical(HierarchicalSplitter),
            Flat(Box<dyn TextSplitter>),
        }

        let splitter = match document.doc_form {
            DocForm::ParentChild => DocSplitter::Hierarchical(HierarchicalSplitter::new(
                &self.ctx.config,
                rule,
                &document.doc_language,
                handle,
            )?),
            DocForm::Paragraph | DocForm::Qa => DocSplitter::Flat(get_splitter(
                &self.ctx.config,
                rule.mode,
                rule.rules.segmentation.as_ref(),
                &document.doc_language,
                handle,
            )?),
        };

        let mut position = 0usize;
        let mut out = Vec::new();
        for raw in raw_docs {
            let cleaned = CleanProcessor::clean(&raw.content, rule);
            let chunks = match &splitter {
                DocSplitter::Hierarchical(hierarchical) => {
                    hierarchical.split(&cleaned, &document.id, &document.dataset_id, position)
                }
                DocSplitter::Flat(flat) if document.doc_form == DocForm::Qa => {
                    self.qa_chunks(&cleaned, raw.answer.as_deref(), flat.as_ref(), document, position, &counter)
                }
                DocSplitter::Flat(flat) => build_chunks(
                    flat.split_text(&cleaned),
                    &document.id,
                    &document.dataset_id,
                    position,
                    &counter,
                ),
            };
            position += chunks.len();
            out.extend(chunks);
        }
        Ok(out)
    }

    /// Chunk QA-form text: one chunk per question, with the answer carried
    /// alongside. Text without QA markers falls back to plain splitting.
    fn qa_chunks(
        &self,
        cleaned: &str,
        answer: Option<&str>,
        splitter: &dyn TextSplitter,
        document: &Document,
        position: usize,
        counter: &TokenCounter,
    ) -> Vec<Chunk> {
        if let Some(answer) = answer {
            // Pre-paired QA source: the raw text is the question.
            let mut chunks = build_chunks(
                vec![cleaned.to_string()],
                &document.id,
                &document.dataset_id,
                position,
                counter,
            );
            for chunk in &mut chunks {
                chunk.answer = Some(answer.to_string());
            }
            return chunks;
        }

        let pairs = parse_qa_pairs(cleaned);
        if pairs.is_empty() {
            return build_chunks(
                splitter.split_text(cleaned),
                &document.id,
                &document.dataset_id,
                position,
                counter,
            );
        }
        let questions = pairs.iter().map(|p| p.question.clone()).collect();
        let mut chunks = build_chunks(
            questions,
            &document.id,
            &document.dataset_id,
            position,
            counter,
        );
        for (chunk, pair) in chunks.iter_mut().zip(&pairs) {
            chunk.answer = Some(pair.answer.clone());
        }
        chunks
    }
}
