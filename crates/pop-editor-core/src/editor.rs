//! Editor facade
//!
//! `PopEditor` wires the render pipeline to the field session and exposes the
//! host-facing inputs (document, fields, zoom, rotation, page), gesture
//! forwarding and the two outputs.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use pop_pdf::{FieldPosition, Rotation, ViewportDescriptor};

use crate::config::EditorConfig;
use crate::drag::{DragEvent, OverlayHost};
use crate::error::EditorError;
use crate::export::{self, FieldConfigNode, FieldPlacement, ModifiedDocument};
use crate::pipeline::{RenderOutcome, RenderPipeline, RenderState};
use crate::render::{DocumentLoader, DocumentSource, PageSource, RenderSurface, ViewSettings};
use crate::session::FieldSession;
use crate::store::FieldId;

pub struct PopEditor<L: DocumentLoader, H: OverlayHost + 'static> {
    config: EditorConfig,
    session: Rc<FieldSession<H>>,
    pipeline: RenderPipeline<L>,
    page: Cell<u32>,
}

impl<L: DocumentLoader, H: OverlayHost + 'static> PopEditor<L, H> {
    pub fn new(
        config: EditorConfig,
        loader: L,
        host: H,
        surface: Box<dyn RenderSurface>,
    ) -> Result<Self, EditorError> {
        config.validate()?;
        let rotation = parse_rotation(config.initial_rotation)?;

        let session = Rc::new(FieldSession::new(
            host,
            config.reset_policy,
            config.reference_position,
        ));
        let pipeline = RenderPipeline::new(loader, surface, session.clone());
        pipeline.set_view(ViewSettings {
            scale: config.clamp_scale(config.initial_scale),
            rotation,
        });

        Ok(Self {
            page: Cell::new(config.initial_page),
            config,
            session,
            pipeline,
        })
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Load a document and render the initial page
    pub async fn load(&self, source: DocumentSource) -> Result<RenderOutcome, EditorError> {
        self.pipeline.load(&source).await?;
        self.page.set(self.config.initial_page);
        self.pipeline.request_page(self.config.initial_page).await
    }

    /// Declare the fields to overlay. Re-renders if a document is loaded.
    pub async fn set_fields<I, S>(&self, ids: I) -> Result<Option<RenderOutcome>, EditorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldId>,
    {
        self.session.set_fields(ids);
        self.rerender().await
    }

    /// Zoom, clamped to the configured bounds
    pub async fn set_scale(&self, scale: f64) -> Result<Option<RenderOutcome>, EditorError> {
        let clamped = self.config.clamp_scale(scale);
        if clamped != scale {
            tracing::debug!(requested = scale, clamped, "scale clamped");
        }
        self.pipeline.set_view(ViewSettings {
            scale: clamped,
            ..self.pipeline.view()
        });
        self.rerender().await
    }

    /// Rotation in degrees; must be a multiple of 90
    pub async fn set_rotation(&self, degrees: i64) -> Result<Option<RenderOutcome>, EditorError> {
        let rotation = parse_rotation(degrees)?;
        self.pipeline.set_view(ViewSettings {
            rotation,
            ..self.pipeline.view()
        });
        self.rerender().await
    }

    /// Switch pages. Before a document is loaded the page is only recorded.
    /// Afterwards the page becomes current once it has rendered; a queued
    /// request is committed by the call that renders it.
    pub async fn set_page(&self, page_num: u32) -> Result<Option<RenderOutcome>, EditorError> {
        if self.pipeline.document().is_none() {
            self.page.set(page_num);
            return Ok(None);
        }
        let outcome = self.pipeline.request_page(page_num).await?;
        if let Some(page) = outcome.last_rendered() {
            self.page.set(page);
        }
        Ok(Some(outcome))
    }

    async fn rerender(&self) -> Result<Option<RenderOutcome>, EditorError> {
        if self.pipeline.document().is_none() {
            return Ok(None);
        }
        let page = self.pipeline.current_page().unwrap_or(self.page.get());
        let outcome = self.pipeline.request_page(page).await?;
        if let Some(page) = outcome.last_rendered() {
            self.page.set(page);
        }
        Ok(Some(outcome))
    }

    /// Forward a gesture event. Returns true when a position changed.
    pub fn drag(&self, event: &DragEvent) -> bool {
        self.session.handle_drag(event)
    }

    pub fn positions(&self) -> HashMap<FieldId, FieldPosition> {
        self.session.snapshot()
    }

    pub fn fields(&self) -> Vec<FieldId> {
        self.session.fields()
    }

    pub fn orphans(&self) -> Vec<FieldId> {
        self.session.orphans()
    }

    pub fn viewport(&self) -> Option<ViewportDescriptor> {
        self.pipeline.viewport()
    }

    pub fn view(&self) -> ViewSettings {
        self.pipeline.view()
    }

    pub fn render_state(&self) -> RenderState {
        self.pipeline.state()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.pipeline.page_count()
    }

    pub fn current_page(&self) -> Option<u32> {
        self.pipeline.current_page()
    }

    pub fn surface_dimensions(&self) -> Option<(u32, u32)> {
        self.pipeline.surface_dimensions()
    }

    /// Run `f` with the host
    pub fn with_host<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        self.session.with_host(f)
    }

    /// Declared fields resolved against the latest viewport
    pub fn placements(&self) -> Result<Vec<FieldPlacement>, EditorError> {
        export::resolve_placements(
            &self.session.fields(),
            &self.session.snapshot(),
            self.pipeline.viewport().as_ref(),
            &self.config,
        )
    }

    /// Stamp every declared field into a copy of the loaded document
    pub fn export_document(&self) -> Result<ModifiedDocument, EditorError> {
        let document = self
            .pipeline
            .document()
            .ok_or_else(|| EditorError::Load("No document loaded".to_string()))?;
        let placements = self.placements()?;
        let page_num =
            export::resolve_target_page(self.config.target_page, self.pipeline.current_page());

        export::export_document(document.bytes(), &placements, page_num, &self.config)
    }

    pub fn generate_config(&self) -> Result<Vec<FieldConfigNode>, EditorError> {
        let placements = self.placements()?;
        Ok(export::config_nodes(&placements, self.config.config_font_size))
    }

    pub fn generate_config_json(&self) -> Result<String, EditorError> {
        export::config_json(&self.generate_config()?)
    }
}

fn parse_rotation(degrees: i64) -> Result<Rotation, EditorError> {
    Rotation::from_degrees(degrees)
        .ok_or_else(|| EditorError::Config(format!("Rotation must be a multiple of 90: {}", degrees)))
}
