//! Document status machine.
//!
//! All forward transitions funnel through [`StatusTracker::update_status`],
//! which re-checks the pause flag and reloads the row before every write.
//! Error marking bypasses the pause check so a failed document is always
//! recorded, and monotonicity along the happy path is enforced here rather
//! than trusted to callers.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use docforge_core::capabilities::{DocumentStore, PauseFlags};
use docforge_core::error::{Error, Result};
use docforge_core::model::{Document, IndexingStatus, Segment, SegmentStatus};

pub struct StatusTracker {
    store: Arc<dyn DocumentStore>,
    pause_flags: Arc<dyn PauseFlags>,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn DocumentStore>, pause_flags: Arc<dyn PauseFlags>) -> Self {
        Self { store, pause_flags }
    }

    /// Move a document forward along the happy path, applying `extra` field
    /// updates in the same write.
    ///
    /// Fails with [`Error::DocumentPaused`] when the pause flag is set, with
    /// [`Error::DocumentDeleted`] when the row is gone, and with a store
    /// error on a backwards transition. Re-entering the current phase is
    /// allowed so resume paths can restart a phase in place.
    pub fn update_status(
        &self,
        document_id: &str,
        status: IndexingStatus,
        extra: impl FnOnce(&mut Document),
    ) -> Result<Document> {
        let mut document = self
            .store
            .get_document(document_id)?
            .ok_or_else(|| Error::DocumentDeleted(document_id.to_string()))?;

        if document.is_paused || self.pause_flags.is_paused(document_id) {
            return Err(Error::DocumentPaused(document_id.to_string()));
        }

        if let (Some(old), Some(new)) =
            (document.indexing_status.phase_rank(), status.phase_rank())
        {
            if new < old {
                return Err(Error::Store(format!(
                    "refusing status regression {} -> {} for document {}",
                    document.indexing_status, status, document_id
                )));
            }
        }

        debug!(document_id, %status, "document status transition");
        document.indexing_status = status;
        extra(&mut document);
        self.store.save_document(&document)?;
        Ok(document)
    }

    /// Record a failure on the document row. Writes unconditionally: a
    /// paused flag must not hide a real error.
    pub fn mark_error(&self, document_id: &str, message: &str) -> Result<()> {
        let Some(mut document) = self.store.get_document(document_id)? else {
            return Ok(());
        };
        document.indexing_status = IndexingStatus::Error;
        document.error = Some(message.to_string());
        document.stopped_at = Some(Utc::now());
        self.store.save_document(&document)
    }

    /// Move every segment of a document into the indexing state.
    pub fn mark_segments_indexing(&self, document_id: &str) -> Result<()> {
        let now = Utc::now();
        self.store.update_segments(document_id, &mut |segment: &mut Segment| {
            segment.status = SegmentStatus::Indexing;
            segment.indexing_at = Some(now);
        })
    }

    /// Complete and enable segments whose ids appear in `ids`, in one pass.
    pub fn complete_segments(&self, document_id: &str, ids: &[String]) -> Result<()> {
        let now = Utc::now();
        self.store.update_segments(document_id, &mut |segment: &mut Segment| {
            if ids.iter().any(|id| id == &segment.id) {
                segment.status = SegmentStatus::Completed;
                segment.enabled = true;
                segment.completed_at = Some(now);
            }
        })
    }
}
