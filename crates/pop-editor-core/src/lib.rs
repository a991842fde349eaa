//! Field overlay editor core
//!
//! Positions draggable field markers over a rendered PDF page and writes the
//! final positions back into the document, or exports them as a config
//! manifest. The host supplies the raster surface and gesture handling; this
//! crate sequences renders, tracks positions and converts them to PDF space.

pub mod config;
pub mod drag;
pub mod editor;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod render;
pub mod session;
pub mod store;

pub use config::{EditorConfig, ResetPolicy, StampText, TargetPage};
pub use drag::{DragController, DragEvent, OverlayHost};
pub use editor::PopEditor;
pub use error::EditorError;
pub use export::{FieldConfigNode, FieldKind, FieldPlacement, ModifiedDocument};
pub use pipeline::{RenderObserver, RenderOutcome, RenderPipeline, RenderState};
pub use render::{
    DocumentLoader, DocumentSource, LopdfDocument, LopdfLoader, LopdfPage, PageSource,
    RenderSurface, RenderablePage, ViewSettings,
};
pub use session::FieldSession;
pub use store::{FieldId, PositionStore};

pub use pop_pdf::{DocumentPosition, FieldPosition, Rotation, StampStyle, ViewportDescriptor};
