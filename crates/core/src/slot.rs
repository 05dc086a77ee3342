//! Slots: the editable units of a playground.
//!
//! A playground owns an ordered, immutable [`SlotSet`]. Slots are addressed by
//! [`SlotId`], never by their position in the list, so buffers attached to a
//! slot stay attached to it regardless of display order.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier for a slot within one playground.
///
/// Tabs and steps use their authored index; the single-editor variant uses
/// [`SlotId::SINGLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u32);

impl SlotId {
    /// Id of the only slot in a single-editor playground.
    pub const SINGLE: SlotId = SlotId(0);

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SlotId {
    fn from(id: u32) -> Self {
        SlotId(id)
    }
}

/// One editable/previewable unit of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    id: SlotId,
    label: String,
    original_code: String,
}

impl Slot {
    pub fn new(id: SlotId, label: impl Into<String>, original_code: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            original_code: original_code.into(),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Display title (tab caption or step heading).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Authored default code. Never changes after construction.
    pub fn original_code(&self) -> &str {
        &self.original_code
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// A playground needs at least one slot.
    Empty,
    /// Two slots share an id.
    DuplicateId(SlotId),
    /// The variant only allows a fixed number of slots.
    WrongCount { expected: usize, found: usize },
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "playground has no slots"),
            Self::DuplicateId(id) => write!(f, "duplicate slot id {id}"),
            Self::WrongCount { expected, found } => {
                write!(f, "expected {expected} slot(s), found {found}")
            }
        }
    }
}

impl std::error::Error for SlotError {}

/// Ordered, immutable sequence of slots with an id → position index.
///
/// Insertion order is display order. The set cannot be modified after
/// construction, which is what lets callers hold a position across calls.
#[derive(Debug, Clone)]
pub struct SlotSet {
    slots: Vec<Slot>,
    positions: HashMap<SlotId, usize>,
}

impl SlotSet {
    pub fn new(slots: Vec<Slot>) -> Result<Self, SlotError> {
        if slots.is_empty() {
            return Err(SlotError::Empty);
        }
        let mut positions = HashMap::with_capacity(slots.len());
        for (pos, slot) in slots.iter().enumerate() {
            if positions.insert(slot.id, pos).is_some() {
                return Err(SlotError::DuplicateId(slot.id));
            }
        }
        Ok(Self { slots, positions })
    }

    /// Build a set whose ids are the positions of `(label, code)` pairs.
    pub fn indexed<L, C>(items: impl IntoIterator<Item = (L, C)>) -> Result<Self, SlotError>
    where
        L: Into<String>,
        C: Into<String>,
    {
        let slots = items
            .into_iter()
            .enumerate()
            .map(|(i, (label, code))| Slot::new(SlotId(i as u32), label, code))
            .collect();
        Self::new(slots)
    }

    /// A set holding exactly one slot with id [`SlotId::SINGLE`].
    pub fn single(label: impl Into<String>, code: impl Into<String>) -> Self {
        let slot = Slot::new(SlotId::SINGLE, label, code);
        let mut positions = HashMap::with_capacity(1);
        positions.insert(SlotId::SINGLE, 0);
        Self {
            slots: vec![slot],
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    pub fn contains(&self, id: SlotId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn get(&self, id: SlotId) -> Option<&Slot> {
        self.positions.get(&id).map(|&pos| &self.slots[pos])
    }

    pub fn position(&self, id: SlotId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn at(&self, position: usize) -> Option<&Slot> {
        self.slots.get(position)
    }

    pub fn first(&self) -> &Slot {
        &self.slots[0]
    }

    pub fn last(&self) -> &Slot {
        &self.slots[self.slots.len() - 1]
    }
}
