//! In-memory capability implementations.
//!
//! Used by the runtime test suites and by embeddable hosts that keep document
//! state in process. Segment lists are guarded per document so the
//! document+segment updates of one logical step stay consistent.

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::capabilities::{DocumentStore, PauseFlags};
use crate::error::Result;
use crate::model::{Dataset, Document, Segment};

/// In-memory document/segment store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    datasets: DashMap<String, Dataset>,
    documents: DashMap<String, Document>,
    segments: Mutex<Vec<Segment>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_dataset(&self, dataset: Dataset) {
        self.datasets.insert(dataset.id.clone(), dataset);
    }

    pub fn insert_document(&self, document: Document) {
        self.documents.insert(document.id.clone(), document);
    }

    pub fn remove_document(&self, document_id: &str) {
        self.documents.remove(document_id);
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get_dataset(&self, dataset_id: &str) -> Result<Option<Dataset>> {
        Ok(self.datasets.get(dataset_id).map(|d| d.clone()))
    }

    fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        Ok(self.documents.get(document_id).map(|d| d.clone()))
    }

    fn save_document(&self, document: &Document) -> Result<()> {
        self.documents
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    fn upsert_segments(&self, segments: &[Segment]) -> Result<()> {
        let mut all = self.segments.lock();
        for segment in segments {
            match all.iter_mut().find(|s| s.id == segment.id) {
                Some(existing) => *existing = segment.clone(),
                None => all.push(segment.clone()),
            }
        }
        Ok(())
    }

    fn get_segments(&self, document_id: &str) -> Result<Vec<Segment>> {
        let mut rows: Vec<Segment> = self
            .segments
            .lock()
            .iter()
            .filter(|s| s.document_id == document_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.position);
        Ok(rows)
    }

    fn delete_segments(&self, document_id: &str) -> Result<()> {
        self.segments
            .lock()
            .retain(|s| s.document_id != document_id);
        Ok(())
    }

    fn update_segments(
        &self,
        document_id: &str,
        update: &mut dyn FnMut(&mut Segment),
    ) -> Result<()> {
        for segment in self
            .segments
            .lock()
            .iter_mut()
            .filter(|s| s.document_id == document_id)
        {
            update(segment);
        }
        Ok(())
    }
}

/// In-memory pause-flag store.
#[derive(Default)]
pub struct MemoryPauseFlags {
    flags: DashMap<String, bool>,
}

impl MemoryPauseFlags {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PauseFlags for MemoryPauseFlags {
    fn is_paused(&self, document_id: &str) -> bool {
        self.flags.get(document_id).map(|f| *f).unwrap_or(false)
    }

    fn set_paused(&self, document_id: &str, paused: bool) {
        self.flags.insert(document_id.to_string(), paused);
    }
}
