//! PDF text extraction.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lopdf::Document;
use tracing::{debug, warn};

use crate::storage::{AssetRef, ObjectStore};
use crate::types::ConversionError;

/// Per-page text in physical page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub pages: Vec<String>,
}

impl ExtractedText {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pages joined by a blank line; the form the transform pass consumes.
    pub fn joined(&self) -> String {
        self.pages.join("\n\n")
    }
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, reference: &AssetRef) -> Result<ExtractedText, ConversionError>;
}

/// Fetches the stored upload and decodes it with `lopdf`.
pub struct PdfTextExtractor {
    store: Arc<dyn ObjectStore>,
}

impl PdfTextExtractor {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, reference: &AssetRef) -> Result<ExtractedText, ConversionError> {
        let bytes = self
            .store
            .get(reference)
            .await
            .map_err(|e| ConversionError::Extraction(format!("Failed to fetch document: {}", e)))?;

        debug!(key = %reference.key, bytes = bytes.len(), "Fetched document for extraction");

        // lopdf is synchronous and CPU-bound
        tokio::task::spawn_blocking(move || extract_pages(&bytes))
            .await
            .map_err(|e| ConversionError::Extraction(format!("Extraction task failed: {}", e)))?
    }
}

/// Decode `bytes` as a PDF and pull the text of every page.
///
/// A page whose text cannot be extracted (image-only, unsupported font
/// encoding) contributes an empty string rather than failing the document.
pub fn extract_pages(bytes: &Bytes) -> Result<ExtractedText, ConversionError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| ConversionError::Extraction(format!("Not a readable PDF: {}", e)))?;

    // BTreeMap keyed by 1-based page number, so iteration is physical order
    let pages = doc
        .get_pages()
        .into_keys()
        .map(|page_num| match doc.extract_text(&[page_num]) {
            Ok(text) => text.trim_end().to_string(),
            Err(e) => {
                warn!(page = page_num, error = %e, "No extractable text on page");
                String::new()
            }
        })
        .collect();

    Ok(ExtractedText { pages })
}
