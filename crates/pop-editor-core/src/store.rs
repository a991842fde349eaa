//! Field position store
//!
//! Holds the current pixel-space position of every field marker, keyed by
//! field id. Entries are created when a page finishes rendering and are only
//! moved by drag deltas afterwards.

use std::collections::HashMap;

use pop_pdf::FieldPosition;

/// Opaque field identifier, unique within the declared field list
pub type FieldId = String;

#[derive(Debug, Clone, Default)]
pub struct PositionStore {
    positions: HashMap<FieldId, FieldPosition>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the position only if the field has none yet.
    /// Returns true when a new entry was created.
    pub fn initialize(&mut self, field_id: &str, default_pos: FieldPosition) -> bool {
        if self.positions.contains_key(field_id) {
            return false;
        }
        self.positions.insert(field_id.to_string(), default_pos);
        true
    }

    /// Overwrite the position unconditionally
    pub fn reset(&mut self, field_id: &str, pos: FieldPosition) {
        self.positions.insert(field_id.to_string(), pos);
    }

    /// Move a field by a drag delta. Unknown fields are left alone and
    /// `None` is returned.
    pub fn apply_delta(&mut self, field_id: &str, dx: f64, dy: f64) -> Option<FieldPosition> {
        let pos = self.positions.get_mut(field_id)?;
        pos.x += dx;
        pos.y += dy;
        Some(*pos)
    }

    pub fn get(&self, field_id: &str) -> Option<FieldPosition> {
        self.positions.get(field_id).copied()
    }

    pub fn contains(&self, field_id: &str) -> bool {
        self.positions.contains_key(field_id)
    }

    /// Independent copy of every stored position
    pub fn snapshot(&self) -> HashMap<FieldId, FieldPosition> {
        self.positions.clone()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Stored field ids, sorted
    pub fn field_ids(&self) -> Vec<FieldId> {
        let mut ids: Vec<FieldId> = self.positions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Ids with a stored position that are no longer declared.
    /// These are kept, not pruned.
    pub fn orphans(&self, declared: &[FieldId]) -> Vec<FieldId> {
        let mut orphans: Vec<FieldId> = self
            .positions
            .keys()
            .filter(|id| !declared.contains(id))
            .cloned()
            .collect();
        orphans.sort();
        orphans
    }
}
