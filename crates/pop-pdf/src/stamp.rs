//! Draw text stamps into a page's content stream

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};
use serde::{Deserialize, Serialize};

use crate::coords::DocumentPosition;
use crate::error::PdfError;
use crate::parser::PdfDocument;

/// Resource name prefix for fonts added by stamping
const FONT_KEY_PREFIX: &str = "PopF";

/// Appearance of stamped text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StampStyle {
    /// Font family; mapped onto one of the standard 14 fonts
    pub font: String,
    pub size: f64,
    /// RGB in 0..=1
    pub color: [f32; 3],
}

impl Default for StampStyle {
    fn default() -> Self {
        Self {
            font: "Helvetica".to_string(),
            size: 11.0,
            color: [0.95, 0.1, 0.1],
        }
    }
}

impl StampStyle {
    /// Standard 14 base font for the configured family
    pub fn base_font(&self) -> &'static str {
        let lower = self.font.to_lowercase();
        let bold = lower.contains("bold");

        if lower.contains("times") || lower == "serif" {
            if bold {
                "Times-Bold"
            } else {
                "Times-Roman"
            }
        } else if lower.contains("courier") || lower.contains("mono") {
            if bold {
                "Courier-Bold"
            } else {
                "Courier"
            }
        } else if bold {
            "Helvetica-Bold"
        } else {
            "Helvetica"
        }
    }
}

/// One piece of text to draw, with its baseline origin in PDF user space
#[derive(Debug, Clone, PartialEq)]
pub struct TextStamp {
    pub text: String,
    pub position: DocumentPosition,
}

/// Draw `stamps` onto page `page_num` and return the new document bytes.
///
/// The input bytes are not modified.
pub fn stamp_text(
    pdf_bytes: &[u8],
    page_num: u32,
    stamps: &[TextStamp],
    style: &StampStyle,
) -> Result<Vec<u8>, PdfError> {
    let mut pdf = PdfDocument::from_bytes(pdf_bytes.to_vec())?;
    pdf.stamp_page(page_num, stamps, style)?;
    let output = pdf.save_to_bytes()?;

    tracing::debug!(
        page = page_num,
        stamps = stamps.len(),
        bytes = output.len(),
        "stamped text into page"
    );

    Ok(output)
}

/// WinAnsi-compatible bytes; characters outside Latin-1 become '?'
fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}

impl PdfDocument {
    /// Append text stamps to a page, embedding the font they need
    pub fn stamp_page(
        &mut self,
        page_num: u32,
        stamps: &[TextStamp],
        style: &StampStyle,
    ) -> Result<(), PdfError> {
        let page_id = self.page_id(page_num)?;
        if stamps.is_empty() {
            return Ok(());
        }

        let font_id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Object::Name(style.base_font().as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        });
        let font_key = self.register_font(page_id, font_id)?;

        let [r, g, b] = style.color;
        // Close the q opened in front of the original content
        let mut operations = vec![Operation::new("Q", vec![])];
        for stamp in stamps {
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![
                        Object::Name(font_key.as_bytes().to_vec()),
                        Object::Real(style.size as f32),
                    ],
                ),
                Operation::new(
                    "rg",
                    vec![Object::Real(r), Object::Real(g), Object::Real(b)],
                ),
                Operation::new(
                    "Td",
                    vec![
                        Object::Real(stamp.position.x as f32),
                        Object::Real(stamp.position.y as f32),
                    ],
                ),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        encode_text(&stamp.text),
                        StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ]);
        }

        // Leading newline keeps the first operator apart from the previous stream's last token
        let mut encoded = b"\n".to_vec();
        encoded.extend(
            Content { operations }
                .encode()
                .map_err(|e| PdfError::Operation(format!("Failed to encode content: {}", e)))?,
        );

        let guard_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let stamp_id = self.doc.add_object(Stream::new(Dictionary::new(), encoded));

        self.wrap_page_contents(page_id, guard_id, stamp_id)
    }

    /// Add a font to the page's resources and return the resource name used
    fn register_font(&mut self, page_id: ObjectId, font_id: ObjectId) -> Result<String, PdfError> {
        let font_entry = self.resources_mut(page_id)?.get(b"Font").ok().cloned();

        let mut fonts = match font_entry {
            Some(Object::Dictionary(dict)) => dict,
            Some(Object::Reference(id)) => self
                .doc
                .get_object(id)
                .and_then(Object::as_dict)
                .cloned()
                .unwrap_or_else(|_| Dictionary::new()),
            _ => Dictionary::new(),
        };

        let mut index = 1;
        while fonts.has(format!("{}{}", FONT_KEY_PREFIX, index).as_bytes()) {
            index += 1;
        }
        let key = format!("{}{}", FONT_KEY_PREFIX, index);
        fonts.set(key.as_bytes().to_vec(), Object::Reference(font_id));

        self.resources_mut(page_id)?
            .set("Font", Object::Dictionary(fonts));

        Ok(key)
    }

    /// The page's own resource dictionary, copying inherited resources down
    /// to the page when it has none
    fn resources_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary, PdfError> {
        let (has_own, reference) = {
            let page = self
                .doc
                .get_object(page_id)
                .and_then(Object::as_dict)
                .map_err(|e| PdfError::Operation(format!("Failed to get page object: {}", e)))?;
            match page.get(b"Resources") {
                Ok(Object::Reference(id)) => (true, Some(*id)),
                Ok(_) => (true, None),
                Err(_) => (false, None),
            }
        };

        if !has_own {
            let inherited = match self.inherited_attribute(page_id, b"Resources") {
                Some(Object::Dictionary(dict)) => dict.clone(),
                _ => Dictionary::new(),
            };
            self.page_dict_mut(page_id)?
                .set("Resources", Object::Dictionary(inherited));
        }

        let resources = match reference {
            Some(id) => self.doc.get_object_mut(id),
            None => self.page_dict_mut(page_id)?.get_mut(b"Resources"),
        };

        resources
            .and_then(Object::as_dict_mut)
            .map_err(|_| PdfError::Operation("Resources is not a dictionary".to_string()))
    }

    /// Contents becomes [guard, ...original, stamp]
    fn wrap_page_contents(
        &mut self,
        page_id: ObjectId,
        guard_id: ObjectId,
        stamp_id: ObjectId,
    ) -> Result<(), PdfError> {
        let original: Vec<Object> = {
            let page = self
                .doc
                .get_object(page_id)
                .and_then(Object::as_dict)
                .map_err(|e| PdfError::Operation(format!("Failed to get page object: {}", e)))?;
            match page.get(b"Contents") {
                Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                    // A reference to an array of streams
                    Ok(Object::Array(items)) => items.clone(),
                    _ => vec![Object::Reference(*id)],
                },
                Ok(Object::Array(items)) => items.clone(),
                _ => Vec::new(),
            }
        };

        let mut contents = Vec::with_capacity(original.len() + 2);
        contents.push(Object::Reference(guard_id));
        contents.extend(original);
        contents.push(Object::Reference(stamp_id));

        self.page_dict_mut(page_id)?
            .set("Contents", Object::Array(contents));
        Ok(())
    }
}
