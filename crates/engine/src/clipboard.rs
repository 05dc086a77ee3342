//! Clipboard seam.
//!
//! The controller only needs "write this plain text". Platform clipboards live
//! in the front-end; [`MemoryClipboard`] backs tests and headless runs.

use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    /// Clipboard exists but refused the write (permissions, no display, ...).
    Denied(String),
    /// No clipboard backend at all.
    Unavailable,
}

impl fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Denied(msg) => write!(f, "clipboard write denied: {msg}"),
            Self::Unavailable => write!(f, "clipboard unavailable"),
        }
    }
}

impl std::error::Error for ClipboardError {}

pub trait Clipboard {
    /// Write plain text. No rich formats.
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// In-memory clipboard. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    inner: Arc<Mutex<MemoryClipboardState>>,
}

#[derive(Debug, Default)]
struct MemoryClipboardState {
    contents: Option<String>,
    deny: bool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard that rejects every write.
    pub fn denied() -> Self {
        let clip = Self::default();
        clip.set_denied(true);
        clip
    }

    pub fn set_denied(&self, deny: bool) {
        if let Ok(mut state) = self.inner.lock() {
            state.deny = deny;
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|state| state.contents.clone())
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| ClipboardError::Unavailable)?;
        if state.deny {
            return Err(ClipboardError::Denied("permission denied".to_string()));
        }
        state.contents = Some(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_clipboard_round_trip() {
        let mut clip = MemoryClipboard::new();
        let view = clip.clone();
        clip.write_text("<p>hello</p>").unwrap();
        assert_eq!(view.contents().as_deref(), Some("<p>hello</p>"));
    }

    #[test]
    fn test_denied_clipboard_keeps_previous_contents() {
        let mut clip = MemoryClipboard::new();
        clip.write_text("first").unwrap();
        clip.set_denied(true);
        assert!(matches!(clip.write_text("second"), Err(ClipboardError::Denied(_))));
        assert_eq!(clip.contents().as_deref(), Some("first"));
    }
}
