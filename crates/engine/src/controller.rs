//! Playground Controller.
//!
//! Single source of truth for one playground instance. All three variants
//! (single editor, tabs, step sequence) run through the same state machine:
//!
//! ```text
//! Idle --hydrate--> Hydrated --any mutation--> Interacting --+
//!                                                  ^         |
//!                                                  +---------+
//! ```
//!
//! Every mutation updates state synchronously, re-renders the preview, and
//! (step sequences only) queues a best-effort persistence write. The slot list
//! is fixed at construction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use playpen_core::{
    EditBuffers, PersistedRecord, Slot, SlotError, SlotId, SlotSet, StorageKey, Variant,
};

use crate::clipboard::Clipboard;
use crate::clock::{Clock, SystemClock};
use crate::events::{EventCallback, PlaygroundEvent};
use crate::persistence::RecordStore;
use crate::preview::{PreviewFrame, PreviewRenderer, SandboxPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, persisted state not consulted yet.
    Idle,
    /// Initialised from a persisted record or the authored defaults.
    Hydrated,
    /// At least one edit, navigation, reset or toggle has happened.
    Interacting,
}

#[derive(Debug, Clone, Copy)]
struct CopyFeedback {
    slot: SlotId,
    until: Instant,
}

struct Persistence {
    key: StorageKey,
    store: Box<dyn RecordStore>,
}

pub struct PlaygroundBuilder {
    title: String,
    variant: Variant,
    slots: SlotSet,
    clock: Option<Arc<dyn Clock>>,
    store: Option<Box<dyn RecordStore>>,
    seed: Option<PersistedRecord>,
    namespace: Option<String>,
    copy_feedback: Option<Duration>,
    policy: SandboxPolicy,
    expanded: bool,
    listener: Option<EventCallback>,
}

impl PlaygroundBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Where step sequences mirror their state. Ignored by other variants.
    pub fn persistence(mut self, store: Box<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Hydrate from `record` instead of the store. Same rules apply: unknown
    /// slots are dropped and only step sequences take it.
    pub fn restore(mut self, record: Option<PersistedRecord>) -> Self {
        self.seed = record;
        self
    }

    /// Scope the storage key beyond the title.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn copy_feedback(mut self, window: Duration) -> Self {
        self.copy_feedback = Some(window);
        self
    }

    pub fn sandbox(mut self, policy: SandboxPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Initial expand state when nothing is persisted.
    pub fn expanded(mut self, expanded: bool) -> Self {
        self.expanded = expanded;
        self
    }

    pub fn on_event(mut self, listener: EventCallback) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn build(self) -> Result<Playground, SlotError> {
        if self.variant == Variant::Single && self.slots.len() != 1 {
            return Err(SlotError::WrongCount {
                expected: 1,
                found: self.slots.len(),
            });
        }

        let persistence = match self.store {
            Some(store) if self.variant.persists() => Some(Persistence {
                key: StorageKey::scoped(self.namespace.as_deref(), &self.title),
                store,
            }),
            Some(_) => {
                log::debug!(
                    "Variant '{}' does not persist; ignoring store for '{}'",
                    self.variant,
                    self.title
                );
                None
            }
            None => None,
        };

        let mut renderer = PreviewRenderer::new(self.policy);
        let first = self.slots.first();
        let frame = renderer.render(first.original_code());
        let active = first.id();

        let mut playground = Playground {
            title: self.title,
            variant: self.variant,
            copy_window: self
                .copy_feedback
                .unwrap_or_else(|| self.variant.default_copy_feedback()),
            slots: self.slots,
            active,
            buffers: EditBuffers::new(),
            expanded: self.variant.has_expand() && self.expanded,
            phase: Phase::Idle,
            copy_feedback: None,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            persistence,
            renderer,
            frame,
            listener: self.listener,
        };
        let seed = self.seed.filter(|_| self.variant.persists());
        playground.hydrate(seed);
        Ok(playground)
    }
}

pub struct Playground {
    title: String,
    variant: Variant,
    slots: SlotSet,
    active: SlotId,
    buffers: EditBuffers,
    expanded: bool,
    phase: Phase,
    copy_window: Duration,
    copy_feedback: Option<CopyFeedback>,
    clock: Arc<dyn Clock>,
    persistence: Option<Persistence>,
    renderer: PreviewRenderer,
    frame: PreviewFrame,
    listener: Option<EventCallback>,
}

impl Playground {
    pub fn builder(title: impl Into<String>, variant: Variant, slots: SlotSet) -> PlaygroundBuilder {
        PlaygroundBuilder {
            title: title.into(),
            variant,
            slots,
            clock: None,
            store: None,
            seed: None,
            namespace: None,
            copy_feedback: None,
            policy: SandboxPolicy::default(),
            expanded: false,
            listener: None,
        }
    }

    fn hydrate(&mut self, seed: Option<PersistedRecord>) {
        let record = seed.or_else(|| {
            self.persistence
                .as_ref()
                .and_then(|p| p.store.load(&p.key))
        });

        let restored = record.is_some();
        if let Some(record) = record {
            let mut buffers = record.buffers();
            let dropped = buffers.retain_known(&self.slots);
            if dropped > 0 {
                log::warn!(
                    "Dropped {} persisted edit(s) for unknown slots in '{}'",
                    dropped,
                    self.title
                );
            }
            self.buffers = buffers;
            self.active = if self.slots.contains(record.active()) {
                record.active()
            } else {
                log::warn!(
                    "Persisted step {} not in '{}'; starting at first slot",
                    record.step,
                    self.title
                );
                self.slots.first().id()
            };
            self.expanded = self.variant.has_expand() && record.expanded;
            log::debug!("Hydrated '{}' from persisted state", self.title);
        }

        self.phase = Phase::Hydrated;
        self.refresh_preview();
        let active = self.active;
        self.emit(PlaygroundEvent::Hydrated { active, restored });
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn slots(&self) -> &SlotSet {
        &self.slots
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn active(&self) -> SlotId {
        self.active
    }

    pub fn active_slot(&self) -> &Slot {
        self.slots.get(self.active).unwrap_or_else(|| self.slots.first())
    }

    /// Zero-based display position of the active slot.
    pub fn active_position(&self) -> usize {
        self.slots.position(self.active).unwrap_or(0)
    }

    pub fn expanded(&self) -> bool {
        self.expanded
    }

    pub fn storage_key(&self) -> Option<&StorageKey> {
        self.persistence.as_ref().map(|p| &p.key)
    }

    /// Buffer of the active slot.
    pub fn current_code(&self) -> &str {
        self.buffers.get(&self.slots, self.active).unwrap_or_default()
    }

    /// Buffer of any slot; `None` for ids not in this playground.
    pub fn code_for(&self, id: SlotId) -> Option<&str> {
        self.buffers.get(&self.slots, id)
    }

    pub fn has_edits(&self, id: SlotId) -> bool {
        self.buffers.has_edits(id)
    }

    /// Whether the reset affordance should be offered.
    pub fn can_reset(&self) -> bool {
        self.buffers.has_edits(self.active)
    }

    pub fn buffers(&self) -> &EditBuffers {
        &self.buffers
    }

    /// Latest sandboxed rendering of the active buffer.
    pub fn preview(&self) -> &PreviewFrame {
        &self.frame
    }

    pub fn sandbox_policy(&self) -> &SandboxPolicy {
        self.renderer.policy()
    }

    /// True while the "Copied!" indicator should show for the active slot.
    pub fn is_copied(&self) -> bool {
        match self.copy_feedback {
            Some(fb) => fb.slot == self.active && self.clock.now() < fb.until,
            None => false,
        }
    }

    pub fn copy_window(&self) -> Duration {
        self.copy_window
    }

    /// State as it would be persisted.
    pub fn snapshot(&self) -> PersistedRecord {
        PersistedRecord::new(self.active, &self.buffers, self.expanded)
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Make `id` active. Unknown ids are ignored and leave the active slot as
    /// it was. Never touches any buffer.
    pub fn select_slot(&mut self, id: SlotId) -> bool {
        if !self.slots.contains(id) {
            log::warn!("Ignoring selection of unknown slot {} in '{}'", id, self.title);
            return false;
        }
        if id == self.active {
            return false;
        }
        let from = self.active;
        self.active = id;
        self.copy_feedback = None;
        self.touch();
        self.refresh_preview();
        self.emit(PlaygroundEvent::SlotSelected { from, to: id });
        self.persist();
        true
    }

    /// Select by display position.
    pub fn select_position(&mut self, position: usize) -> bool {
        match self.slots.at(position).map(|s| s.id()) {
            Some(id) => self.select_slot(id),
            None => false,
        }
    }

    /// Replace the active slot's buffer.
    pub fn edit_active(&mut self, text: impl Into<String>) {
        let slot = self.active;
        self.buffers.set(slot, text);
        self.touch();
        self.refresh_preview();
        self.emit(PlaygroundEvent::BufferEdited { slot });
        self.persist();
    }

    /// Drop the active slot's edit. Returns false when there was nothing to drop.
    pub fn reset_active(&mut self) -> bool {
        let slot = self.active;
        if !self.buffers.reset(slot) {
            return false;
        }
        self.touch();
        self.refresh_preview();
        self.emit(PlaygroundEvent::BufferReset { slot });
        self.persist();
        true
    }

    /// Flip the editor between expanded and collapsed. Step sequences only.
    pub fn toggle_expanded(&mut self) -> bool {
        if !self.variant.has_expand() {
            return false;
        }
        self.expanded = !self.expanded;
        self.touch();
        let expanded = self.expanded;
        self.emit(PlaygroundEvent::ExpandedToggled { expanded });
        self.persist();
        true
    }

    /// Copy the active buffer as plain text.
    ///
    /// On success the copied indicator shows for the configured window. A
    /// clipboard failure shows nothing and is not reported as an error.
    pub fn copy_active(&mut self, clipboard: &mut dyn Clipboard) -> bool {
        let slot = self.active;
        match clipboard.write_text(self.current_code()) {
            Ok(()) => {
                self.copy_feedback = Some(CopyFeedback {
                    slot,
                    until: self.clock.now() + self.copy_window,
                });
                self.emit(PlaygroundEvent::Copied { slot });
                true
            }
            Err(e) => {
                log::debug!("Copy from slot {} failed: {}", slot, e);
                self.copy_feedback = None;
                self.emit(PlaygroundEvent::CopyFailed { slot });
                false
            }
        }
    }

    /// Drop expired copy feedback. Returns true if the indicator just went away.
    pub fn poll_timers(&mut self) -> bool {
        match self.copy_feedback {
            Some(fb) if self.clock.now() >= fb.until => {
                self.copy_feedback = None;
                true
            }
            _ => false,
        }
    }

    /// Move to the following step; no-op at the last one.
    pub fn next(&mut self) -> bool {
        self.step_by(1)
    }

    /// Move to the preceding step; no-op at the first one.
    pub fn previous(&mut self) -> bool {
        self.step_by(-1)
    }

    fn step_by(&mut self, delta: isize) -> bool {
        if !self.variant.navigates() {
            return false;
        }
        let last = self.slots.len() as isize - 1;
        let target = (self.active_position() as isize + delta).clamp(0, last) as usize;
        self.select_position(target)
    }

    /// Wait for queued persistence writes.
    pub fn flush_persistence(&self) {
        if let Some(p) = &self.persistence {
            p.store.flush();
        }
    }

    /// Remove this playground's persisted record. In-memory state is kept.
    pub fn forget_persisted(&self) {
        if let Some(p) = &self.persistence {
            p.store.clear(&p.key);
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn touch(&mut self) {
        self.phase = Phase::Interacting;
    }

    fn refresh_preview(&mut self) {
        let code = self.buffers.get(&self.slots, self.active).unwrap_or_default();
        self.frame = self.renderer.render(code);
    }

    fn persist(&mut self) {
        let Some(p) = &self.persistence else {
            return;
        };
        p.store.save(&p.key, &self.snapshot());
        let key = p.key.clone();
        self.emit(PlaygroundEvent::PersistQueued { key });
    }

    fn emit(&mut self, event: PlaygroundEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for Playground {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playground")
            .field("title", &self.title)
            .field("variant", &self.variant)
            .field("active", &self.active)
            .field("phase", &self.phase)
            .field("expanded", &self.expanded)
            .field("edited", &self.buffers.edited_ids().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::clock::ManualClock;
    use crate::events::EventCollector;
    use crate::persistence::{MemoryStore, PersistenceAdapter};
    use std::sync::Mutex;

    fn steps(codes: &[&str]) -> SlotSet {
        SlotSet::indexed(
            codes
                .iter()
                .enumerate()
                .map(|(i, c)| (format!("Step {}", i + 1), c.to_string())),
        )
        .unwrap()
    }

    fn abc() -> Playground {
        Playground::builder("Three Steps", Variant::Steps, steps(&["A", "B", "C"]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_starts_hydrated_on_first_slot() {
        let pg = abc();
        assert_eq!(pg.phase(), Phase::Hydrated);
        assert_eq!(pg.active(), SlotId(0));
        assert_eq!(pg.current_code(), "A");
        assert!(!pg.expanded());
    }

    #[test]
    fn test_three_step_scenario() {
        let mut pg = abc();
        pg.select_slot(SlotId(1));
        pg.edit_active("B2");
        pg.next();
        assert_eq!(pg.active(), SlotId(2));
        pg.previous();

        assert_eq!(pg.code_for(SlotId(1)), Some("B2"));
        assert_eq!(pg.code_for(SlotId(2)), Some("C"));
        assert!(pg.has_edits(SlotId(1)));
        assert!(!pg.has_edits(SlotId(2)));

        assert!(pg.reset_active());
        assert_eq!(pg.code_for(SlotId(1)), Some("B"));
        assert!(!pg.has_edits(SlotId(1)));
        assert_eq!(pg.phase(), Phase::Interacting);
    }

    #[test]
    fn test_boundary_navigation_is_noop() {
        let mut pg = abc();
        assert!(!pg.previous());
        assert_eq!(pg.active(), SlotId(0));
        pg.next();
        pg.next();
        assert!(!pg.next());
        assert_eq!(pg.active(), SlotId(2));
    }

    #[test]
    fn test_unknown_selection_keeps_active() {
        let mut pg = abc();
        pg.select_slot(SlotId(2));
        assert!(!pg.select_slot(SlotId(42)));
        assert_eq!(pg.active(), SlotId(2));
    }

    #[test]
    fn test_select_does_not_touch_buffers() {
        let mut pg = abc();
        pg.edit_active("A2");
        let before = pg.buffers().clone();
        pg.select_slot(SlotId(2));
        pg.select_slot(SlotId(0));
        assert_eq!(pg.buffers(), &before);
        assert_eq!(pg.current_code(), "A2");
    }

    #[test]
    fn test_reset_without_edits_is_noop() {
        let mut pg = abc();
        assert!(!pg.reset_active());
        assert_eq!(pg.phase(), Phase::Hydrated);
        assert!(!pg.can_reset());
    }

    #[test]
    fn test_tabs_do_not_navigate_or_expand() {
        let mut pg = Playground::builder("Tabs", Variant::Tabs, steps(&["x", "y"]))
            .build()
            .unwrap();
        assert!(!pg.next());
        assert!(!pg.toggle_expanded());
        assert!(pg.select_slot(SlotId(1)));
        assert_eq!(pg.current_code(), "y");
    }

    #[test]
    fn test_single_variant_requires_one_slot() {
        let err = Playground::builder("One", Variant::Single, steps(&["a", "b"]))
            .build()
            .unwrap_err();
        assert_eq!(err, SlotError::WrongCount { expected: 1, found: 2 });
    }

    #[test]
    fn test_copy_feedback_expires_with_clock() {
        let clock = ManualClock::new();
        let mut pg = Playground::builder("Copy", Variant::Single, SlotSet::single("Ex", "<b>hi</b>"))
            .clock(Arc::new(clock.clone()))
            .copy_feedback(Duration::from_millis(2000))
            .build()
            .unwrap();
        let mut clip = MemoryClipboard::new();

        assert!(pg.copy_active(&mut clip));
        assert_eq!(clip.contents().as_deref(), Some("<b>hi</b>"));
        assert!(pg.is_copied());

        clock.advance(Duration::from_millis(1999));
        assert!(pg.is_copied());
        assert!(!pg.poll_timers());

        clock.advance(Duration::from_millis(1));
        assert!(!pg.is_copied());
        assert!(pg.poll_timers());
    }

    #[test]
    fn test_copy_failure_shows_no_feedback() {
        let mut pg = abc();
        let mut clip = MemoryClipboard::denied();
        assert!(!pg.copy_active(&mut clip));
        assert!(!pg.is_copied());
    }

    #[test]
    fn test_switching_slot_clears_copy_feedback() {
        let clock = ManualClock::new();
        let mut pg = Playground::builder("Copy", Variant::Tabs, steps(&["a", "b"]))
            .clock(Arc::new(clock))
            .build()
            .unwrap();
        let mut clip = MemoryClipboard::new();
        pg.copy_active(&mut clip);
        pg.select_slot(SlotId(1));
        assert!(!pg.is_copied());
        pg.select_slot(SlotId(0));
        assert!(!pg.is_copied());
    }

    #[test]
    fn test_every_change_renders_fresh_preview() {
        let mut pg = abc();
        let g0 = pg.preview().generation();
        pg.edit_active("<p>1</p>");
        let g1 = pg.preview().generation();
        pg.edit_active("<p>1</p>");
        let g2 = pg.preview().generation();
        assert!(g0 < g1 && g1 < g2);
        assert!(pg.preview().srcdoc().contains("&lt;p&gt;1"));
    }

    #[test]
    fn test_hydration_prefers_persisted_record() {
        let store = MemoryStore::new();
        let mut edits = EditBuffers::new();
        edits.set(SlotId(2), "C-saved");
        let record = PersistedRecord::new(SlotId(2), &edits, true);
        PersistenceAdapter::new(store.clone()).save(&StorageKey::derive("Three Steps"), &record);

        let pg = Playground::builder("Three Steps", Variant::Steps, steps(&["A", "B", "C"]))
            .persistence(Box::new(PersistenceAdapter::new(store)))
            .build()
            .unwrap();

        assert_eq!(pg.snapshot(), record);
        assert_eq!(pg.current_code(), "C-saved");
        assert!(pg.expanded());
    }

    #[test]
    fn test_hydration_ignores_out_of_range_record() {
        let store = MemoryStore::new();
        store.insert_raw(
            "step-preview-three-steps",
            r#"{"step":9,"code":{"1":"B2","8":"ghost"},"expanded":false}"#,
        );
        let pg = Playground::builder("Three Steps", Variant::Steps, steps(&["A", "B", "C"]))
            .persistence(Box::new(PersistenceAdapter::new(store)))
            .build()
            .unwrap();
        assert_eq!(pg.active(), SlotId(0));
        assert_eq!(pg.code_for(SlotId(1)), Some("B2"));
        assert_eq!(pg.buffers().edited_ids().count(), 1);
    }

    #[test]
    fn test_restore_applies_record_without_store() {
        let mut code = std::collections::BTreeMap::new();
        code.insert(2, "C2".to_string());
        code.insert(7, "ghost".to_string());
        let record = PersistedRecord { step: 2, code, expanded: true };

        let pg = Playground::builder("Three Steps", Variant::Steps, steps(&["A", "B", "C"]))
            .restore(Some(record))
            .build()
            .unwrap();
        assert_eq!(pg.active(), SlotId(2));
        assert_eq!(pg.current_code(), "C2");
        assert!(pg.expanded());
        assert_eq!(pg.buffers().edited_ids().collect::<Vec<_>>(), vec![SlotId(2)]);
        assert!(pg.storage_key().is_none());

        let tabs = Playground::builder("Tabs", Variant::Tabs, steps(&["x", "y"]))
            .restore(Some(PersistedRecord { step: 1, ..PersistedRecord::default() }))
            .build()
            .unwrap();
        assert_eq!(tabs.active(), SlotId(0));
    }

    #[test]
    fn test_tabs_never_persist() {
        let store = MemoryStore::new();
        let mut pg = Playground::builder("Tabs", Variant::Tabs, steps(&["a", "b"]))
            .persistence(Box::new(PersistenceAdapter::new(store.clone())))
            .build()
            .unwrap();
        pg.edit_active("a2");
        assert!(pg.storage_key().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_namespace_scopes_key() {
        let pg = Playground::builder("Grid", Variant::Steps, steps(&["a"]))
            .persistence(Box::new(PersistenceAdapter::new(MemoryStore::new())))
            .namespace("lesson 4")
            .build()
            .unwrap();
        assert_eq!(pg.storage_key().unwrap().as_str(), "step-preview-lesson-4--grid");
    }

    #[test]
    fn test_events_follow_transitions() {
        let events = Arc::new(Mutex::new(EventCollector::new()));
        let sink = Arc::clone(&events);
        let mut pg = Playground::builder("Events", Variant::Steps, steps(&["a", "b"]))
            .persistence(Box::new(PersistenceAdapter::new(MemoryStore::new())))
            .on_event(Box::new(move |e: &PlaygroundEvent| {
                sink.lock().unwrap().push(e.clone())
            }))
            .build()
            .unwrap();

        pg.edit_active("a2");
        pg.next();
        pg.next();
        pg.toggle_expanded();

        let collected = events.lock().unwrap();
        let kinds: Vec<_> = collected
            .events()
            .iter()
            .filter(|e| !matches!(e, PlaygroundEvent::PersistQueued { .. }))
            .cloned()
            .collect();
        assert_eq!(
            kinds,
            vec![
                PlaygroundEvent::Hydrated { active: SlotId(0), restored: false },
                PlaygroundEvent::BufferEdited { slot: SlotId(0) },
                PlaygroundEvent::SlotSelected { from: SlotId(0), to: SlotId(1) },
                PlaygroundEvent::ExpandedToggled { expanded: true },
            ]
        );
        assert_eq!(collected.persist_count(), 3);
    }
}
