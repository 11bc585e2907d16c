//! Error types for docforge.
//!
//! The pipeline models its control flow as tagged error variants rather than
//! opaque exceptions: `DocumentPaused` stops a document without marking it
//! failed, `QuotaExceeded` aborts a batch before any extraction, and the rest
//! are per-document failures recorded on the document row.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid process rule or request parameters, raised before any mutation.
    #[error("{0}")]
    Validation(String),

    /// A data source descriptor is missing required fields.
    #[error("{0}")]
    MissingSourceInfo(String),

    /// A pre-flight quota or plan check failed for the whole batch.
    #[error("{0}")]
    QuotaExceeded(String),

    /// The embedding provider has no credentials configured for this tenant.
    #[error("Provider token not initialized: {0}")]
    ProviderNotInitialized(String),

    /// The document's pause flag is set. Not a failure: the document keeps
    /// its last committed status.
    #[error("document paused: {0}")]
    DocumentPaused(String),

    /// The document row disappeared mid-flight.
    #[error("document deleted: {0}")]
    DocumentDeleted(String),

    /// Persistent document/segment store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Embedding computation failure.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Vector or keyword index sink failure.
    #[error("index error: {0}")]
    Index(String),

    /// Connector or file-store fetch failure.
    #[error("extract error: {0}")]
    Extract(String),
}

impl Error {
    /// Whether this error should be recorded on the document's `error` field.
    ///
    /// Pause interruptions and deletions leave the row alone.
    pub fn is_document_failure(&self) -> bool {
        !matches!(self, Error::DocumentPaused(_) | Error::DocumentDeleted(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_is_not_a_failure() {
        assert!(!Error::DocumentPaused("doc-1".into()).is_document_failure());
        assert!(!Error::DocumentDeleted("doc-1".into()).is_document_failure());
        assert!(Error::Validation("bad rule".into()).is_document_failure());
        assert!(Error::ProviderNotInitialized("openai".into()).is_document_failure());
    }
}
