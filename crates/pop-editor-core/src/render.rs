//! Page rendering service contracts and the lopdf-backed implementation
//!
//! Rendering is split the way browsers split it: the document side produces
//! the page box and viewport, the host side owns the raster surface. The
//! bundled `LopdfLoader` covers the document side and validates page content;
//! rasterizing into the surface is left to the host.

use std::rc::Rc;

use async_trait::async_trait;
use pop_pdf::{PdfDocument, Rotation, ViewportDescriptor};

use crate::error::EditorError;

/// Where a document comes from
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSource {
    /// Local path or `file://` URL
    Url(String),
    Bytes(Vec<u8>),
}

/// Zoom and rotation applied to the next render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSettings {
    pub scale: f64,
    pub rotation: Rotation,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation: Rotation::Deg0,
        }
    }
}

/// Raster target owned by the host
pub trait RenderSurface {
    fn resize(&mut self, width: u32, height: u32);
    fn dimensions(&self) -> (u32, u32);
}

#[async_trait(?Send)]
pub trait DocumentLoader {
    type Document: PageSource + 'static;

    async fn load(&self, source: &DocumentSource) -> Result<Self::Document, EditorError>;
}

#[async_trait(?Send)]
pub trait PageSource {
    type Page: RenderablePage + 'static;

    fn page_count(&self) -> u32;

    /// Bytes the document was loaded from
    fn bytes(&self) -> &[u8];

    /// Fetch a 1-indexed page
    async fn page(&self, page_num: u32) -> Result<Self::Page, EditorError>;
}

#[async_trait(?Send)]
pub trait RenderablePage {
    fn viewport(&self, view: ViewSettings) -> ViewportDescriptor;

    async fn render_into(
        &self,
        surface: &mut dyn RenderSurface,
        viewport: &ViewportDescriptor,
    ) -> Result<(), EditorError>;
}

/// Loads PDFs with lopdf
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfLoader;

pub struct LopdfDocument {
    pdf: Rc<PdfDocument>,
}

pub struct LopdfPage {
    pdf: Rc<PdfDocument>,
    page_num: u32,
    media_box: [f64; 4],
    page_rotation: Rotation,
}

impl LopdfLoader {
    async fn read_source(source: &DocumentSource) -> Result<Vec<u8>, EditorError> {
        match source {
            DocumentSource::Bytes(bytes) => Ok(bytes.clone()),
            DocumentSource::Url(url) => {
                if url.starts_with("http://") || url.starts_with("https://") {
                    return Err(EditorError::Load(format!(
                        "Remote sources must be fetched by the host: {}",
                        url
                    )));
                }
                let path = url.strip_prefix("file://").unwrap_or(url);
                tokio::fs::read(path)
                    .await
                    .map_err(|e| EditorError::Load(format!("{}: {}", path, e)))
            }
        }
    }
}

#[async_trait(?Send)]
impl DocumentLoader for LopdfLoader {
    type Document = LopdfDocument;

    async fn load(&self, source: &DocumentSource) -> Result<LopdfDocument, EditorError> {
        let bytes = Self::read_source(source).await?;
        let pdf = PdfDocument::from_bytes(bytes)?;
        tracing::info!(pages = pdf.page_count(), "document loaded");
        Ok(LopdfDocument { pdf: Rc::new(pdf) })
    }
}

#[async_trait(?Send)]
impl PageSource for LopdfDocument {
    type Page = LopdfPage;

    fn page_count(&self) -> u32 {
        self.pdf.page_count()
    }

    fn bytes(&self) -> &[u8] {
        self.pdf.bytes()
    }

    async fn page(&self, page_num: u32) -> Result<LopdfPage, EditorError> {
        let media_box = self.pdf.page_dimensions(page_num)?;
        let page_rotation = self.pdf.page_rotation(page_num)?;
        Ok(LopdfPage {
            pdf: Rc::clone(&self.pdf),
            page_num,
            media_box,
            page_rotation,
        })
    }
}

#[async_trait(?Send)]
impl RenderablePage for LopdfPage {
    fn viewport(&self, view: ViewSettings) -> ViewportDescriptor {
        ViewportDescriptor::new(
            self.media_box,
            view.scale,
            self.page_rotation.compose(view.rotation),
        )
    }

    async fn render_into(
        &self,
        surface: &mut dyn RenderSurface,
        viewport: &ViewportDescriptor,
    ) -> Result<(), EditorError> {
        if surface.dimensions() != viewport.surface_size() {
            return Err(EditorError::Render(format!(
                "surface is {:?}, viewport needs {:?}",
                surface.dimensions(),
                viewport.surface_size()
            )));
        }

        let operations = self
            .pdf
            .page_operation_count(self.page_num)
            .map_err(|e| EditorError::Render(e.to_string()))?;

        tracing::debug!(
            page = self.page_num,
            operations,
            width = viewport.pixel_width,
            height = viewport.pixel_height,
            "page content decoded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object};

    /// Single-page PDF with no content stream
    fn blank_pdf(width: i64, height: i64) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        });
        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[derive(Default)]
    struct Canvas {
        size: (u32, u32),
    }

    impl RenderSurface for Canvas {
        fn resize(&mut self, width: u32, height: u32) {
            self.size = (width, height);
        }

        fn dimensions(&self) -> (u32, u32) {
            self.size
        }
    }

    #[tokio::test]
    async fn test_load_bytes_and_render_page() {
        let doc = LopdfLoader
            .load(&DocumentSource::Bytes(blank_pdf(300, 400)))
            .await
            .unwrap();
        assert_eq!(doc.page_count(), 1);

        let page = doc.page(1).await.unwrap();
        let vp = page.viewport(ViewSettings {
            scale: 2.0,
            rotation: Rotation::Deg0,
        });
        assert_eq!((vp.pixel_width, vp.pixel_height), (600.0, 800.0));
        assert_eq!(vp.document_box, [0.0, 0.0, 300.0, 400.0]);

        let mut canvas = Canvas::default();
        let (w, h) = vp.surface_size();
        canvas.resize(w, h);
        page.render_into(&mut canvas, &vp).await.unwrap();
    }

    #[tokio::test]
    async fn test_render_into_unsized_surface_fails() {
        let doc = LopdfLoader
            .load(&DocumentSource::Bytes(blank_pdf(300, 400)))
            .await
            .unwrap();
        let page = doc.page(1).await.unwrap();
        let vp = page.viewport(ViewSettings::default());

        let mut canvas = Canvas::default();
        let err = page.render_into(&mut canvas, &vp).await.unwrap_err();
        assert!(matches!(err, EditorError::Render(_)));
    }

    #[tokio::test]
    async fn test_page_out_of_range() {
        let doc = LopdfLoader
            .load(&DocumentSource::Bytes(blank_pdf(300, 400)))
            .await
            .unwrap();
        let err = doc.page(2).await.err().unwrap();
        assert_eq!(
            err,
            EditorError::PageRange {
                page: 2,
                page_count: 1
            }
        );
    }

    #[tokio::test]
    async fn test_load_garbage_is_load_error() {
        let err = LopdfLoader
            .load(&DocumentSource::Bytes(b"<html>".to_vec()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, EditorError::Load(_)));
    }

    #[tokio::test]
    async fn test_remote_url_rejected() {
        let err = LopdfLoader
            .load(&DocumentSource::Url("https://example.com/a.pdf".to_string()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, EditorError::Load(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_load_error() {
        let err = LopdfLoader
            .load(&DocumentSource::Url(
                "file:///definitely/not/here.pdf".to_string(),
            ))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, EditorError::Load(_)));
    }
}
