//! `playpen-core`: slot model, edit buffers and persisted records.
//!
//! Pure data crate: no IO, no clocks, no UI.

pub mod buffers;
pub mod record;
pub mod slot;
pub mod variant;

pub use buffers::EditBuffers;
pub use record::{slugify, PersistedRecord, StorageKey};
pub use slot::{Slot, SlotError, SlotId, SlotSet};
pub use variant::Variant;
