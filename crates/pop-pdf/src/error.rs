use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PdfError {
    #[error("Failed to load PDF: {0}")]
    Load(String),

    #[error("Page {page} out of range (document has {page_count} pages)")]
    PageRange { page: u32, page_count: u32 },

    #[error("PDF operation failed: {0}")]
    Operation(String),
}
