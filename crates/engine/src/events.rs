//! Event types for playground change notifications.
//!
//! Front-ends subscribe to redraw or show status text without diffing state.
//! The test suite also uses them to check which transitions actually fired.

use playpen_core::{SlotId, StorageKey};

/// Events emitted by a [`crate::Playground`] after a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaygroundEvent {
    /// State is ready; `restored` is true when it came from persisted storage.
    Hydrated { active: SlotId, restored: bool },

    /// The active slot changed. Buffers are untouched.
    SlotSelected { from: SlotId, to: SlotId },

    /// The active slot's buffer was written.
    BufferEdited { slot: SlotId },

    /// The active slot's edit was dropped, so it reads as the original again.
    BufferReset { slot: SlotId },

    ExpandedToggled { expanded: bool },

    /// Current code went to the clipboard; feedback is visible until it expires.
    Copied { slot: SlotId },

    /// Clipboard refused the write. No feedback is shown.
    CopyFailed { slot: SlotId },

    /// A persistence write was queued.
    PersistQueued { key: StorageKey },
}

/// Callback type for receiving playground events.
pub type EventCallback = Box<dyn FnMut(&PlaygroundEvent) + Send>;

/// Simple event collector for testing.
#[derive(Default)]
pub struct EventCollector {
    events: Vec<PlaygroundEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: PlaygroundEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[PlaygroundEvent] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<PlaygroundEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of queued persistence writes seen.
    pub fn persist_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, PlaygroundEvent::PersistQueued { .. }))
            .count()
    }
}
