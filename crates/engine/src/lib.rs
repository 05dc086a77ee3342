pub mod clipboard;
pub mod clock;
pub mod controller;
pub mod events;
pub mod persistence;
pub mod preview;

pub use clipboard::{Clipboard, ClipboardError, MemoryClipboard};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{Phase, Playground, PlaygroundBuilder};
pub use events::{EventCallback, EventCollector, PlaygroundEvent};
pub use persistence::{
    KvStore, MemoryStore, PersistenceAdapter, PersistenceWriter, RecordStore, StoreError,
};
pub use preview::{PolicyError, PreviewFrame, PreviewRenderer, SandboxCapability, SandboxPolicy};
