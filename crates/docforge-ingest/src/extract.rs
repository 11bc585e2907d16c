//! Extractor dispatch: fetches raw text for a document's data source.

use std::sync::Arc;

use tracing::warn;

use docforge_core::capabilities::{FileStore, NotionConnector, WebsiteConnector};
use docforge_core::error::Result;
use docforge_core::model::{Document, RawDocument, SourceKind};

/// Routes a document's source descriptor to the matching connector.
pub struct ExtractorDispatch {
    file_store: Arc<dyn FileStore>,
    notion: Arc<dyn NotionConnector>,
    website: Arc<dyn WebsiteConnector>,
}

impl ExtractorDispatch {
    pub fn new(
        file_store: Arc<dyn FileStore>,
        notion: Arc<dyn NotionConnector>,
        website: Arc<dyn WebsiteConnector>,
    ) -> Self {
        Self {
            file_store,
            notion,
            website,
        }
    }

    /// Fetch the raw text documents behind `document`'s data source.
    ///
    /// Required source-info fields are validated before any fetch; an
    /// unsupported source kind yields an empty list rather than failing the
    /// batch. Every returned document is stamped with the owning document
    /// and dataset ids.
    pub fn extract(&self, document: &Document) -> Result<Vec<RawDocument>> {
        let kind = SourceKind::parse(&document.data_source_type, &document.data_source_info)?;

        let mut raw_docs = match kind {
            SourceKind::UploadFile { upload_file_id } => {
                match self.file_store.get_uploaded_file(&upload_file_id)? {
                    Some(bytes) => {
                        let content = String::from_utf8_lossy(&bytes).into_owned();
                        vec![RawDocument::new(content)]
                    }
                    None => {
                        warn!(document_id = %document.id, upload_file_id, "upload file missing");
                        Vec::new()
                    }
                }
            }
            SourceKind::NotionImport {
                credential_id,
                workspace_id,
                page_id,
                page_type,
            } => self.notion.fetch(
                &document.tenant_id,
                &credential_id,
                &workspace_id,
                &page_id,
                &page_type,
            )?,
            SourceKind::WebsiteCrawl {
                provider,
                url,
                job_id,
                mode,
            } => self.website.fetch(
                &document.tenant_id,
                &provider,
                &url,
                &job_id,
                &mode,
            )?,
            SourceKind::Unsupported(kind) => {
                // Preserved behavior: unknown kinds are skipped, not failed.
                warn!(document_id = %document.id, kind, "unsupported data source type, skipping");
                Vec::new()
            }
        };

        for raw in &mut raw_docs {
            raw.document_id = Some(document.id.clone());
            raw.dataset_id = Some(document.dataset_id.clone());
        }
        Ok(raw_docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docforge_core::error::Error;
    use docforge_core::model::{DocForm, ProcessRule};
    use serde_json::json;

    struct StubFileStore(Option<Vec<u8>>);
    impl FileStore for StubFileStore {
        fn get_uploaded_file(&self, _id: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.0.clone())
        }
    }

    struct StubNotion;
    impl NotionConnector for StubNotion {
        fn fetch(
            &self,
            _tenant_id: &str,
            _credential_id: &str,
            _workspace_id: &str,
            _page_id: &str,
            _page_type: &str,
        ) -> Result<Vec<RawDocument>> {
            Ok(vec![RawDocument::new("notion page text")])
        }
    }

    struct StubWebsite;
    impl WebsiteConnector for StubWebsite {
        fn fetch(
            &self,
            _tenant_id: &str,
            _provider: &str,
            _url: &str,
            _job_id: &str,
            _mode: &str,
        ) -> Result<Vec<RawDocument>> {
            Ok(vec![RawDocument::new("crawled page")])
        }
    }

    fn dispatch(file: Option<Vec<u8>>) -> ExtractorDispatch {
        ExtractorDispatch::new(
            Arc::new(StubFileStore(file)),
            Arc::new(StubNotion),
            Arc::new(StubWebsite),
        )
    }

    fn document(source_type: &str) -> Document {
        Document::new(
            "doc-1",
            "ds-1",
            "tenant-1",
            source_type,
            DocForm::Paragraph,
            ProcessRule::automatic(),
        )
    }

    #[test]
    fn test_upload_file_extraction() {
        let mut doc = document("upload_file");
        doc.data_source_info
            .insert("upload_file_id".into(), json!("f1"));
        let raw = dispatch(Some(b"file body".to_vec())).extract(&doc).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].content, "file body");
        assert_eq!(raw[0].document_id.as_deref(), Some("doc-1"));
        assert_eq!(raw[0].dataset_id.as_deref(), Some("ds-1"));
    }

    #[test]
    fn test_missing_upload_file_id_fails() {
        let doc = document("upload_file");
        let err = dispatch(None).extract(&doc).unwrap_err();
        assert!(matches!(err, Error::MissingSourceInfo(_)));
        assert_eq!(err.to_string(), "no upload file found");
    }

    #[test]
    fn test_vanished_upload_is_empty_not_error() {
        let mut doc = document("upload_file");
        doc.data_source_info
            .insert("upload_file_id".into(), json!("f1"));
        let raw = dispatch(None).extract(&doc).unwrap();
        assert!(raw.is_empty());
    }

    #[test]
    fn test_notion_extraction() {
        let mut doc = document("notion_import");
        for (k, v) in [
            ("credential_id", "c1"),
            ("notion_workspace_id", "w1"),
            ("notion_page_id", "p1"),
            ("type", "page"),
        ] {
            doc.data_source_info.insert(k.into(), json!(v));
        }
        let raw = dispatch(None).extract(&doc).unwrap();
        assert_eq!(raw[0].content, "notion page text");
    }

    #[test]
    fn test_website_extraction() {
        let mut doc = document("website_crawl");
        for (k, v) in [
            ("provider", "firecrawl"),
            ("url", "https://example.com"),
            ("job_id", "j1"),
            ("mode", "scrape"),
        ] {
            doc.data_source_info.insert(k.into(), json!(v));
        }
        let raw = dispatch(None).extract(&doc).unwrap();
        assert_eq!(raw[0].content, "crawled page");
    }

    #[test]
    fn test_unsupported_source_is_skipped() {
        let doc = document("fax_machine");
        let raw = dispatch(None).extract(&doc).unwrap();
        assert!(raw.is_empty());
    }
}
