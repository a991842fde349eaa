//! PDF parsing and manipulation using lopdf

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::PdfError;
use crate::viewport::{Rotation, ViewportDescriptor};

/// US Letter, used when no MediaBox can be found in the page tree
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page tree depth guard against malformed Parent cycles
const MAX_TREE_DEPTH: usize = 64;

/// Wrapper around lopdf::Document keeping the bytes it was parsed from
pub struct PdfDocument {
    pub(crate) doc: Document,
    pub(crate) bytes: Vec<u8>,
}

impl PdfDocument {
    /// Load a PDF from raw bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PdfError> {
        let doc = Document::load_mem(&bytes).map_err(|e| PdfError::Load(e.to_string()))?;
        if doc.get_pages().is_empty() {
            return Err(PdfError::Load("document has no pages".to_string()));
        }
        Ok(Self { doc, bytes })
    }

    /// Get the raw bytes the document was loaded from
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get the number of pages
    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Get page object ID for a given page number (1-indexed)
    pub fn page_id(&self, page_num: u32) -> Result<ObjectId, PdfError> {
        self.doc
            .get_pages()
            .get(&page_num)
            .copied()
            .ok_or(PdfError::PageRange {
                page: page_num,
                page_count: self.page_count(),
            })
    }

    /// Get page dimensions (MediaBox) as [x, y, width, height]
    pub fn page_dimensions(&self, page_num: u32) -> Result<[f64; 4], PdfError> {
        let page_id = self.page_id(page_num)?;

        match self.inherited_attribute(page_id, b"MediaBox") {
            Some(media_box) => self.parse_rect(media_box),
            None => Ok(DEFAULT_MEDIA_BOX),
        }
    }

    /// Get the page's own /Rotate entry (inherited through the page tree)
    pub fn page_rotation(&self, page_num: u32) -> Result<Rotation, PdfError> {
        let page_id = self.page_id(page_num)?;

        let degrees = match self.inherited_attribute(page_id, b"Rotate") {
            Some(obj) => self.extract_number(obj)? as i64,
            None => 0,
        };

        // Invalid /Rotate values are ignored the way viewers ignore them
        Ok(Rotation::from_degrees(degrees).unwrap_or_default())
    }

    /// Viewport for rendering `page_num` at `scale`, rotated by `rotation`
    /// on top of the page's own /Rotate
    pub fn viewport(
        &self,
        page_num: u32,
        scale: f64,
        rotation: Rotation,
    ) -> Result<ViewportDescriptor, PdfError> {
        let media_box = self.page_dimensions(page_num)?;
        let rotation = self.page_rotation(page_num)?.compose(rotation);
        Ok(ViewportDescriptor::new(media_box, scale, rotation))
    }

    /// Decode the page content stream and return the number of operators in it
    pub fn page_operation_count(&self, page_num: u32) -> Result<usize, PdfError> {
        let page_id = self.page_id(page_num)?;
        let data = self
            .doc
            .get_page_content(page_id)
            .map_err(|e| PdfError::Operation(format!("Failed to read page content: {}", e)))?;
        let content = Content::decode(&data)
            .map_err(|e| PdfError::Operation(format!("Failed to decode page content: {}", e)))?;
        Ok(content.operations.len())
    }

    /// Look up a page attribute, walking up the page tree for inheritable keys
    pub(crate) fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = Some(page_id);
        let mut depth = 0;

        while let Some(id) = current {
            if depth > MAX_TREE_DEPTH {
                break;
            }
            depth += 1;

            let dict = self.doc.get_object(id).and_then(Object::as_dict).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(self.resolve(value));
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }

        None
    }

    /// Follow a reference one level, returning the object itself otherwise
    pub(crate) fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            _ => obj,
        }
    }

    pub(crate) fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary, PdfError> {
        self.doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfError::Operation(format!("Failed to get page object: {}", e)))
    }

    /// Parse a PDF rectangle array into [x, y, width, height]
    fn parse_rect(&self, obj: &Object) -> Result<[f64; 4], PdfError> {
        let arr = self
            .resolve(obj)
            .as_array()
            .map_err(|_| PdfError::Operation("MediaBox is not an array".to_string()))?;

        if arr.len() != 4 {
            return Err(PdfError::Operation(format!(
                "MediaBox has {} elements, expected 4",
                arr.len()
            )));
        }

        let mut values = [0.0f64; 4];
        for (i, obj) in arr.iter().enumerate() {
            values[i] = self.extract_number(obj)?;
        }

        // Corners may be given in any order
        let (x0, x1) = (values[0].min(values[2]), values[0].max(values[2]));
        let (y0, y1) = (values[1].min(values[3]), values[1].max(values[3]));

        Ok([x0, y0, x1 - x0, y1 - y0])
    }

    /// Extract a number from a PDF object
    fn extract_number(&self, obj: &Object) -> Result<f64, PdfError> {
        match self.resolve(obj) {
            Object::Integer(i) => Ok(*i as f64),
            Object::Real(r) => Ok(*r as f64),
            _ => Err(PdfError::Operation("Expected number".to_string())),
        }
    }

    /// Save the document to bytes
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, PdfError> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| PdfError::Operation(format!("Failed to save PDF: {}", e)))?;
        Ok(buffer)
    }
}
