//! Per-render field attachment
//!
//! A `FieldSession` owns the declared field list, the position store, the
//! drag controller and the host. After every completed render it starts a new
//! binding cycle: each declared field gets its store entry and then its drag
//! binding, in declaration order.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use pop_pdf::{FieldPosition, ViewportDescriptor};

use crate::config::ResetPolicy;
use crate::drag::{translate_css, DragController, DragEvent, OverlayHost};
use crate::pipeline::RenderObserver;
use crate::store::{FieldId, PositionStore};

pub struct FieldSession<H: OverlayHost> {
    fields: RefCell<Vec<FieldId>>,
    store: RefCell<PositionStore>,
    drag: RefCell<DragController>,
    host: RefCell<H>,
    policy: ResetPolicy,
    reference_position: FieldPosition,
}

impl<H: OverlayHost> FieldSession<H> {
    pub fn new(host: H, policy: ResetPolicy, reference_position: FieldPosition) -> Self {
        Self {
            fields: RefCell::new(Vec::new()),
            store: RefCell::new(PositionStore::new()),
            drag: RefCell::new(DragController::new()),
            host: RefCell::new(host),
            policy,
            reference_position,
        }
    }

    /// Replace the declared field list. Duplicate ids keep their first
    /// occurrence. Takes effect at the next render.
    pub fn set_fields<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldId>,
    {
        let mut seen = HashSet::new();
        let fields: Vec<FieldId> = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &FieldId| seen.insert(id.clone()))
            .collect();

        let orphans = self.store.borrow().orphans(&fields);
        if !orphans.is_empty() {
            tracing::debug!(?orphans, "fields no longer declared keep their positions");
        }

        *self.fields.borrow_mut() = fields;
    }

    pub fn fields(&self) -> Vec<FieldId> {
        self.fields.borrow().clone()
    }

    /// Start a new binding cycle for the declared fields
    pub fn attach_fields(&self) {
        let fields = self.fields.borrow();
        let mut store = self.store.borrow_mut();
        let mut drag = self.drag.borrow_mut();
        let mut host = self.host.borrow_mut();

        let cycle = drag.begin_cycle();
        let mut created = 0usize;
        for field_id in fields.iter() {
            match self.policy {
                ResetPolicy::PreserveDragged => {
                    if store.initialize(field_id, self.reference_position) {
                        created += 1;
                    }
                }
                ResetPolicy::ResetOnRender => store.reset(field_id, self.reference_position),
            }

            drag.bind(field_id, &mut *host);

            if let Some(pos) = store.get(field_id) {
                host.set_transform(field_id, &translate_css(pos));
            }
        }

        tracing::debug!(cycle, fields = fields.len(), created, "fields attached");
    }

    /// Forward a gesture event. Returns true when a position changed.
    pub fn handle_drag(&self, event: &DragEvent) -> bool {
        let mut store = self.store.borrow_mut();
        let mut host = self.host.borrow_mut();
        self.drag
            .borrow_mut()
            .handle(event, &mut store, &mut *host)
    }

    pub fn position(&self, field_id: &str) -> Option<FieldPosition> {
        self.store.borrow().get(field_id)
    }

    pub fn snapshot(&self) -> HashMap<FieldId, FieldPosition> {
        self.store.borrow().snapshot()
    }

    pub fn is_bound(&self, field_id: &str) -> bool {
        self.drag.borrow().is_bound(field_id)
    }

    pub fn orphans(&self) -> Vec<FieldId> {
        self.store.borrow().orphans(&self.fields.borrow())
    }

    pub fn reference_position(&self) -> FieldPosition {
        self.reference_position
    }

    /// Run `f` with the host
    pub fn with_host<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(&self.host.borrow())
    }
}

impl<H: OverlayHost> RenderObserver for FieldSession<H> {
    fn page_rendered(&self, page_num: u32, _viewport: &ViewportDescriptor) {
        tracing::debug!(page = page_num, "attaching fields after render");
        self.attach_fields();
    }
}
