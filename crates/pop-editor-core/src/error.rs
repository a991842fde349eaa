use pop_pdf::PdfError;
use thiserror::Error;

use crate::store::FieldId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Failed to load document: {0}")]
    Load(String),

    #[error("Page {page} out of range (document has {page_count} pages)")]
    PageRange { page: u32, page_count: u32 },

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Document mutation failed: {0}")]
    Mutation(String),

    #[error("No recorded position for field: {0}")]
    FieldMissing(FieldId),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Parse and page errors keep their meaning; operation failures while reading
/// a page surface as render errors. Export maps them to `Mutation` itself.
impl From<PdfError> for EditorError {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::Load(msg) => EditorError::Load(msg),
            PdfError::PageRange { page, page_count } => EditorError::PageRange { page, page_count },
            PdfError::Operation(msg) => EditorError::Render(msg),
        }
    }
}
