//! Render pipeline
//!
//! At most one page render is in flight. A page requested while another
//! renders is remembered as the pending page (last request wins) and is
//! rendered by the call that owns the in-flight render once it completes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pop_pdf::ViewportDescriptor;

use crate::error::EditorError;
use crate::render::{
    DocumentLoader, DocumentSource, PageSource, RenderSurface, RenderablePage, ViewSettings,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    #[default]
    Idle,
    Rendering { page: u32, pending: Option<u32> },
}

/// Result of a page request
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// Pages rendered by this call, in order
    Rendered { pages: Vec<u32> },
    /// Coalesced behind the render already in flight
    Queued { page: u32 },
    /// This call's page rendered, but a page queued behind it failed.
    /// The last rendered page stays current.
    PendingFailed {
        pages: Vec<u32>,
        page: u32,
        error: EditorError,
    },
}

impl RenderOutcome {
    /// Last page this call rendered, if any
    pub fn last_rendered(&self) -> Option<u32> {
        match self {
            RenderOutcome::Rendered { pages } | RenderOutcome::PendingFailed { pages, .. } => {
                pages.last().copied()
            }
            RenderOutcome::Queued { .. } => None,
        }
    }
}

/// Notified synchronously after each successful render, once the surface has
/// been resized and the new viewport recorded
pub trait RenderObserver {
    fn page_rendered(&self, page_num: u32, viewport: &ViewportDescriptor);
}

pub struct RenderPipeline<L: DocumentLoader> {
    loader: L,
    document: RefCell<Option<Rc<L::Document>>>,
    state: Cell<RenderState>,
    view: Cell<ViewSettings>,
    surface: RefCell<Option<Box<dyn RenderSurface>>>,
    viewport: Cell<Option<ViewportDescriptor>>,
    current_page: Cell<Option<u32>>,
    observer: Rc<dyn RenderObserver>,
}

impl<L: DocumentLoader> RenderPipeline<L> {
    pub fn new(loader: L, surface: Box<dyn RenderSurface>, observer: Rc<dyn RenderObserver>) -> Self {
        Self {
            loader,
            document: RefCell::new(None),
            state: Cell::new(RenderState::Idle),
            view: Cell::new(ViewSettings::default()),
            surface: RefCell::new(Some(surface)),
            viewport: Cell::new(None),
            current_page: Cell::new(None),
            observer,
        }
    }

    /// Load a document, replacing the current one. Returns its page count.
    pub async fn load(&self, source: &DocumentSource) -> Result<u32, EditorError> {
        let document = self.loader.load(source).await?;
        let page_count = document.page_count();

        *self.document.borrow_mut() = Some(Rc::new(document));
        self.viewport.set(None);
        self.current_page.set(None);

        tracing::info!(page_count, "document ready");
        Ok(page_count)
    }

    pub fn document(&self) -> Option<Rc<L::Document>> {
        self.document.borrow().clone()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.document.borrow().as_ref().map(|doc| doc.page_count())
    }

    pub fn state(&self) -> RenderState {
        self.state.get()
    }

    pub fn is_idle(&self) -> bool {
        self.state.get() == RenderState::Idle
    }

    pub fn view(&self) -> ViewSettings {
        self.view.get()
    }

    /// Applies from the next render
    pub fn set_view(&self, view: ViewSettings) {
        self.view.set(view);
    }

    /// Viewport of the last completed render
    pub fn viewport(&self) -> Option<ViewportDescriptor> {
        self.viewport.get()
    }

    pub fn current_page(&self) -> Option<u32> {
        self.current_page.get()
    }

    /// `None` while the surface is lent out to an in-flight render
    pub fn surface_dimensions(&self) -> Option<(u32, u32)> {
        self.surface.borrow().as_ref().map(|s| s.dimensions())
    }

    /// Render `page_num`, or queue it behind the render in flight.
    ///
    /// The call that starts rendering keeps going until no page is pending.
    /// On failure the state returns to Idle and any pending page is dropped.
    /// Only a failure of this call's own page is an `Err`; a failed queued
    /// page is reported as `PendingFailed`.
    pub async fn request_page(&self, page_num: u32) -> Result<RenderOutcome, EditorError> {
        if let RenderState::Rendering { page, pending } = self.state.get() {
            if let Some(superseded) = pending {
                tracing::debug!(superseded, requested = page_num, "replacing pending page");
            }
            tracing::debug!(in_flight = page, requested = page_num, "render in flight, queueing");
            self.state.set(RenderState::Rendering {
                page,
                pending: Some(page_num),
            });
            return Ok(RenderOutcome::Queued { page: page_num });
        }

        let mut rendered = Vec::new();
        let mut next = page_num;
        loop {
            self.state.set(RenderState::Rendering {
                page: next,
                pending: None,
            });

            if let Err(e) = self.render(next).await {
                if let RenderState::Rendering {
                    pending: Some(dropped),
                    ..
                } = self.state.get()
                {
                    tracing::warn!(page = dropped, "dropping pending page after failed render");
                }
                self.state.set(RenderState::Idle);
                tracing::error!(page = next, error = %e, "render failed");

                // A queued page failing does not undo the pages this call rendered
                if rendered.is_empty() {
                    return Err(e);
                }
                return Ok(RenderOutcome::PendingFailed {
                    pages: rendered,
                    page: next,
                    error: e,
                });
            }
            rendered.push(next);

            match self.state.get() {
                RenderState::Rendering {
                    pending: Some(pending),
                    ..
                } => next = pending,
                _ => break,
            }
        }

        self.state.set(RenderState::Idle);
        Ok(RenderOutcome::Rendered { pages: rendered })
    }

    async fn render(&self, page_num: u32) -> Result<(), EditorError> {
        let document = self
            .document()
            .ok_or_else(|| EditorError::Load("No document loaded".to_string()))?;

        let page_count = document.page_count();
        if page_num == 0 || page_num > page_count {
            return Err(EditorError::PageRange {
                page: page_num,
                page_count,
            });
        }

        let page = document.page(page_num).await?;
        let viewport = page.viewport(self.view.get());

        let mut surface = self
            .surface
            .borrow_mut()
            .take()
            .ok_or_else(|| EditorError::Render("Render surface unavailable".to_string()))?;
        let (width, height) = viewport.surface_size();
        surface.resize(width, height);

        let result = page.render_into(&mut *surface, &viewport).await;
        *self.surface.borrow_mut() = Some(surface);
        result?;

        self.viewport.set(Some(viewport));
        self.current_page.set(Some(page_num));
        tracing::info!(
            page = page_num,
            width,
            height,
            scale = viewport.scale,
            rotation = viewport.rotation.degrees(),
            "page rendered"
        );

        self.observer.page_rendered(page_num, &viewport);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use pop_pdf::Rotation;
    use pretty_assertions::assert_eq;

    /// Surface that mirrors its size into a shared cell
    #[derive(Default)]
    pub(crate) struct SharedSurface {
        pub size: Rc<Cell<(u32, u32)>>,
    }

    impl RenderSurface for SharedSurface {
        fn resize(&mut self, width: u32, height: u32) {
            self.size.set((width, height));
        }

        fn dimensions(&self) -> (u32, u32) {
            self.size.get()
        }
    }

    /// In-memory document: every page is 300x400 and takes a few scheduler
    /// turns to render
    #[derive(Clone, Default)]
    pub(crate) struct FakeLoader {
        pub pages: u32,
        pub rendered: Rc<RefCell<Vec<u32>>>,
        pub fail_once: Rc<Cell<Option<u32>>>,
    }

    pub(crate) struct FakeDocument {
        loader: FakeLoader,
        bytes: Vec<u8>,
    }

    pub(crate) struct FakePage {
        loader: FakeLoader,
        page_num: u32,
    }

    impl FakeLoader {
        pub fn with_pages(pages: u32) -> Self {
            Self {
                pages,
                ..Default::default()
            }
        }
    }

    #[async_trait(?Send)]
    impl DocumentLoader for FakeLoader {
        type Document = FakeDocument;

        async fn load(&self, source: &DocumentSource) -> Result<FakeDocument, EditorError> {
            match source {
                DocumentSource::Bytes(bytes) => Ok(FakeDocument {
                    loader: self.clone(),
                    bytes: bytes.clone(),
                }),
                DocumentSource::Url(url) => Err(EditorError::Load(url.clone())),
            }
        }
    }

    #[async_trait(?Send)]
    impl PageSource for FakeDocument {
        type Page = FakePage;

        fn page_count(&self) -> u32 {
            self.loader.pages
        }

        fn bytes(&self) -> &[u8] {
            &self.bytes
        }

        async fn page(&self, page_num: u32) -> Result<FakePage, EditorError> {
            Ok(FakePage {
                loader: self.loader.clone(),
                page_num,
            })
        }
    }

    #[async_trait(?Send)]
    impl RenderablePage for FakePage {
        fn viewport(&self, view: ViewSettings) -> ViewportDescriptor {
            ViewportDescriptor::new([0.0, 0.0, 300.0, 400.0], view.scale, view.rotation)
        }

        async fn render_into(
            &self,
            _surface: &mut dyn RenderSurface,
            _viewport: &ViewportDescriptor,
        ) -> Result<(), EditorError> {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            if self.loader.fail_once.get() == Some(self.page_num) {
                self.loader.fail_once.set(None);
                return Err(EditorError::Render(format!("page {} failed", self.page_num)));
            }
            self.loader.rendered.borrow_mut().push(self.page_num);
            Ok(())
        }
    }

    /// Records (page, viewport surface size, actual surface size) per render
    #[derive(Default)]
    struct RecordingObserver {
        surface_size: Rc<Cell<(u32, u32)>>,
        events: RefCell<Vec<(u32, (u32, u32), (u32, u32))>>,
    }

    impl RenderObserver for RecordingObserver {
        fn page_rendered(&self, page_num: u32, viewport: &ViewportDescriptor) {
            self.events.borrow_mut().push((
                page_num,
                viewport.surface_size(),
                self.surface_size.get(),
            ));
        }
    }

    async fn loaded_pipeline(
        loader: FakeLoader,
    ) -> (RenderPipeline<FakeLoader>, Rc<RecordingObserver>) {
        let surface = SharedSurface::default();
        let observer = Rc::new(RecordingObserver {
            surface_size: Rc::clone(&surface.size),
            ..Default::default()
        });
        let pipeline = RenderPipeline::new(loader, Box::new(surface), observer.clone());
        pipeline
            .load(&DocumentSource::Bytes(b"%PDF-1.7".to_vec()))
            .await
            .unwrap();
        (pipeline, observer)
    }

    #[tokio::test]
    async fn test_requests_during_render_coalesce_to_last() {
        let loader = FakeLoader::with_pages(10);
        let rendered = Rc::clone(&loader.rendered);
        let (pipeline, _) = loaded_pipeline(loader).await;

        let (first, queued) = tokio::join!(pipeline.request_page(1), async {
            tokio::task::yield_now().await;
            let mut outcomes = Vec::new();
            for page in [2, 5, 7] {
                outcomes.push(pipeline.request_page(page).await.unwrap());
            }
            outcomes
        });

        assert_eq!(first.unwrap(), RenderOutcome::Rendered { pages: vec![1, 7] });
        assert_eq!(
            queued,
            vec![
                RenderOutcome::Queued { page: 2 },
                RenderOutcome::Queued { page: 5 },
                RenderOutcome::Queued { page: 7 },
            ]
        );
        assert_eq!(*rendered.borrow(), vec![1, 7]);
        assert!(pipeline.is_idle());
        assert_eq!(pipeline.current_page(), Some(7));
    }

    #[tokio::test]
    async fn test_failed_render_returns_to_idle() {
        let loader = FakeLoader::with_pages(5);
        loader.fail_once.set(Some(3));
        let rendered = Rc::clone(&loader.rendered);
        let (pipeline, _) = loaded_pipeline(loader).await;

        let err = pipeline.request_page(3).await.unwrap_err();
        assert_eq!(err, EditorError::Render("page 3 failed".to_string()));
        assert_eq!(pipeline.state(), RenderState::Idle);
        assert_eq!(pipeline.surface_dimensions(), Some((300, 400)));

        let outcome = pipeline.request_page(3).await.unwrap();
        assert_eq!(outcome, RenderOutcome::Rendered { pages: vec![3] });
        assert_eq!(*rendered.borrow(), vec![3]);
    }

    #[tokio::test]
    async fn test_pending_page_dropped_when_render_fails() {
        let loader = FakeLoader::with_pages(5);
        loader.fail_once.set(Some(1));
        let rendered = Rc::clone(&loader.rendered);
        let (pipeline, _) = loaded_pipeline(loader).await;

        let (first, queued) = tokio::join!(pipeline.request_page(1), async {
            tokio::task::yield_now().await;
            pipeline.request_page(4).await
        });

        assert!(first.is_err());
        assert_eq!(queued.unwrap(), RenderOutcome::Queued { page: 4 });
        assert!(rendered.borrow().is_empty());
        assert!(pipeline.is_idle());
    }

    #[tokio::test]
    async fn test_failed_queued_page_keeps_owner_result() {
        let loader = FakeLoader::with_pages(5);
        loader.fail_once.set(Some(4));
        let rendered = Rc::clone(&loader.rendered);
        let (pipeline, _) = loaded_pipeline(loader).await;

        let (first, queued) = tokio::join!(pipeline.request_page(1), async {
            tokio::task::yield_now().await;
            pipeline.request_page(4).await
        });

        assert_eq!(queued.unwrap(), RenderOutcome::Queued { page: 4 });
        assert_eq!(
            first.unwrap(),
            RenderOutcome::PendingFailed {
                pages: vec![1],
                page: 4,
                error: EditorError::Render("page 4 failed".to_string()),
            }
        );
        assert!(pipeline.is_idle());
        assert_eq!(pipeline.current_page(), Some(1));
        assert_eq!(*rendered.borrow(), vec![1]);

        let retry = pipeline.request_page(4).await.unwrap();
        assert_eq!(retry, RenderOutcome::Rendered { pages: vec![4] });
    }

    #[tokio::test]
    async fn test_page_out_of_range_leaves_idle() {
        let (pipeline, observer) = loaded_pipeline(FakeLoader::with_pages(2)).await;

        let err = pipeline.request_page(9).await.unwrap_err();
        assert_eq!(err, EditorError::PageRange { page: 9, page_count: 2 });
        assert!(pipeline.is_idle());

        let err = pipeline.request_page(0).await.unwrap_err();
        assert!(matches!(err, EditorError::PageRange { page: 0, .. }));
        assert!(observer.events.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_request_without_document_is_load_error() {
        let surface = SharedSurface::default();
        let observer = Rc::new(RecordingObserver::default());
        let pipeline = RenderPipeline::new(FakeLoader::with_pages(1), Box::new(surface), observer);

        let err = pipeline.request_page(1).await.unwrap_err();
        assert!(matches!(err, EditorError::Load(_)));
        assert!(pipeline.is_idle());
    }

    #[tokio::test]
    async fn test_observer_sees_resized_surface() {
        let (pipeline, observer) = loaded_pipeline(FakeLoader::with_pages(2)).await;
        pipeline.set_view(ViewSettings {
            scale: 2.0,
            rotation: Rotation::Deg90,
        });

        pipeline.request_page(2).await.unwrap();

        assert_eq!(
            *observer.events.borrow(),
            vec![(2, (800, 600), (800, 600))]
        );
        let viewport = pipeline.viewport().unwrap();
        assert_eq!(viewport.rotation, Rotation::Deg90);
        assert_eq!(viewport.scale, 2.0);
    }

    #[tokio::test]
    async fn test_load_resets_current_page() {
        let (pipeline, _) = loaded_pipeline(FakeLoader::with_pages(2)).await;
        pipeline.request_page(1).await.unwrap();
        assert_eq!(pipeline.current_page(), Some(1));

        let count = pipeline
            .load(&DocumentSource::Bytes(Vec::new()))
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(pipeline.current_page(), None);
        assert!(pipeline.viewport().is_none());
    }

    #[test]
    fn test_last_rendered() {
        assert_eq!(
            RenderOutcome::Rendered { pages: vec![1, 7] }.last_rendered(),
            Some(7)
        );
        assert_eq!(RenderOutcome::Queued { page: 3 }.last_rendered(), None);
        let failed = RenderOutcome::PendingFailed {
            pages: vec![2],
            page: 9,
            error: EditorError::PageRange {
                page: 9,
                page_count: 3,
            },
        };
        assert_eq!(failed.last_rendered(), Some(2));
    }
}
