//! Edit Buffer Store.
//!
//! Sparse map of user edits keyed by [`SlotId`]. A slot with no entry reads as
//! its authored `original_code`, byte for byte. Reset removes the entry rather
//! than writing the original back, so `has_edits` distinguishes "edited back to
//! the original" from "never touched".

use std::collections::BTreeMap;

use crate::slot::{SlotId, SlotSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditBuffers {
    edits: BTreeMap<SlotId, String>,
}

impl EditBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from existing edits (e.g. a hydrated record).
    pub fn from_edits(edits: BTreeMap<SlotId, String>) -> Self {
        Self { edits }
    }

    /// Current text for `id`: the edit if present, else the slot's original.
    ///
    /// Returns `None` only when `id` is not in `slots`.
    pub fn get<'a>(&'a self, slots: &'a SlotSet, id: SlotId) -> Option<&'a str> {
        match self.edits.get(&id) {
            Some(text) => Some(text.as_str()),
            None => slots.get(id).map(|slot| slot.original_code()),
        }
    }

    /// Record an edit. Written even when `text` equals the original.
    pub fn set(&mut self, id: SlotId, text: impl Into<String>) {
        self.edits.insert(id, text.into());
    }

    /// Drop the edit for `id`. Returns whether an edit was present.
    pub fn reset(&mut self, id: SlotId) -> bool {
        self.edits.remove(&id).is_some()
    }

    pub fn has_edits(&self, id: SlotId) -> bool {
        self.edits.contains_key(&id)
    }

    /// Drop every edit.
    pub fn clear(&mut self) {
        self.edits.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn edited_ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.edits.keys().copied()
    }

    pub fn edits(&self) -> &BTreeMap<SlotId, String> {
        &self.edits
    }

    /// Drop edits whose slot is not in `slots`. Returns how many were dropped.
    pub fn retain_known(&mut self, slots: &SlotSet) -> usize {
        let before = self.edits.len();
        self.edits.retain(|id, _| slots.contains(*id));
        before - self.edits.len()
    }
}
