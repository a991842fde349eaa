//! Export of final field positions
//!
//! Two outputs are produced from the same placements: a copy of the document
//! with each field's text stamped at its position, and a JSON config manifest
//! listing the positions in PDF user space.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use pop_pdf::{
    stamp_text, to_document_space, DocumentPosition, FieldPosition, PdfError, TextStamp,
    ViewportDescriptor,
};
use serde::{Deserialize, Serialize};

use crate::config::{EditorConfig, TargetPage};
use crate::error::EditorError;
use crate::store::FieldId;

/// A declared field resolved to both coordinate spaces
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlacement {
    pub field_id: FieldId,
    pub pixel: FieldPosition,
    pub document: DocumentPosition,
    /// True when the field had no recorded position and the reference
    /// position was used
    pub fallback: bool,
}

/// Stamped document
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedDocument {
    pub bytes: Vec<u8>,
    pub base64: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
}

/// One entry of the config manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfigNode {
    pub key: FieldId,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub font_size: f64,
    pub position: DocumentPosition,
}

/// Resolve declared fields to placements in declaration order.
///
/// Without a viewport no page has rendered yet and positions pass through
/// unchanged. Fields missing from `positions` fail in strict mode and fall
/// back to the reference position otherwise.
pub fn resolve_placements(
    fields: &[FieldId],
    positions: &HashMap<FieldId, FieldPosition>,
    viewport: Option<&ViewportDescriptor>,
    config: &EditorConfig,
) -> Result<Vec<FieldPlacement>, EditorError> {
    let mut placements = Vec::with_capacity(fields.len());

    for field_id in fields {
        let (pixel, fallback) = match positions.get(field_id) {
            Some(pos) => (*pos, false),
            None if config.strict_export => {
                return Err(EditorError::FieldMissing(field_id.clone()));
            }
            None => {
                tracing::warn!(
                    field = %field_id,
                    "no recorded position, using reference position"
                );
                (config.reference_position, true)
            }
        };

        let document = match viewport {
            Some(vp) => to_document_space(pixel, vp, config.baseline_offset),
            None => DocumentPosition::new(pixel.x, pixel.y),
        };

        placements.push(FieldPlacement {
            field_id: field_id.clone(),
            pixel,
            document,
            fallback,
        });
    }

    Ok(placements)
}

/// Page that receives the stamps
pub fn resolve_target_page(target: TargetPage, current_page: Option<u32>) -> u32 {
    match target {
        TargetPage::First => 1,
        TargetPage::Current => current_page.unwrap_or(1),
        TargetPage::Page(n) => n,
    }
}

/// Stamp every placement onto `page_num` of a copy of `source`
pub fn export_document(
    source: &[u8],
    placements: &[FieldPlacement],
    page_num: u32,
    config: &EditorConfig,
) -> Result<ModifiedDocument, EditorError> {
    let stamps: Vec<TextStamp> = placements
        .iter()
        .map(|p| TextStamp {
            text: config.stamp_text.for_field(&p.field_id).to_string(),
            position: p.document,
        })
        .collect();

    let bytes = stamp_text(source, page_num, &stamps, &config.stamp).map_err(|e| match e {
        PdfError::Operation(msg) => EditorError::Mutation(msg),
        other => other.into(),
    })?;

    tracing::info!(
        page = page_num,
        fields = placements.len(),
        fallbacks = placements.iter().filter(|p| p.fallback).count(),
        bytes = bytes.len(),
        "document exported"
    );

    let base64 = STANDARD.encode(&bytes);
    Ok(ModifiedDocument { bytes, base64 })
}

pub fn config_nodes(placements: &[FieldPlacement], font_size: f64) -> Vec<FieldConfigNode> {
    placements
        .iter()
        .map(|p| FieldConfigNode {
            key: p.field_id.clone(),
            kind: FieldKind::Text,
            font_size,
            position: p.document,
        })
        .collect()
}

pub fn config_json(nodes: &[FieldConfigNode]) -> Result<String, EditorError> {
    serde_json::to_string_pretty(nodes).map_err(|e| EditorError::Serialization(e.to_string()))
}
