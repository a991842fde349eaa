//! Shared PDF handling utilities
//!
//! This crate provides PDF parsing, viewport descriptors, coordinate
//! transformation between rendered pixels and PDF user space, and text
//! stamping used by the field editor.

pub mod coords;
pub mod error;
pub mod parser;
pub mod stamp;
pub mod viewport;

pub use coords::{to_document_space, to_pixel_space, DocumentPosition, FieldPosition};
pub use error::PdfError;
pub use parser::PdfDocument;
pub use stamp::{stamp_text, StampStyle, TextStamp};
pub use viewport::{Rotation, ViewportDescriptor};
