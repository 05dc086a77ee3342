// System clipboard for the terminal shell: arboard first, OSC 52 when no
// native clipboard is reachable (ssh sessions, bare consoles).

use std::io::{self, Write};

use base64::engine::general_purpose::STANDARD as BASE64_STD;
use base64::Engine as _;

use playpen_engine::{Clipboard, ClipboardError};

/// Terminals commonly cap OSC 52 payloads around this size.
const MAX_OSC52_BYTES: usize = 100 * 1024;

pub struct SystemClipboard {
    native: Option<arboard::Clipboard>,
    /// Where OSC 52 sequences go when the native clipboard fails.
    terminal: Box<dyn Write>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        let native = match arboard::Clipboard::new() {
            Ok(clip) => Some(clip),
            Err(e) => {
                log::info!("Native clipboard unavailable ({}); using OSC 52", e);
                None
            }
        };
        Self {
            native,
            terminal: Box::new(io::stdout()),
        }
    }
}

impl Clipboard for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        if let Some(clip) = self.native.as_mut() {
            match clip.set_text(text.to_owned()) {
                Ok(()) => return Ok(()),
                Err(e) => log::debug!("Native clipboard write failed: {}", e),
            }
        }
        osc52_copy(&mut self.terminal, text)
    }
}

/// Emit an OSC 52 "set clipboard" sequence.
///
/// Oversized text is refused rather than truncated so the clipboard never
/// holds a partial copy.
pub fn osc52_copy(out: &mut impl Write, text: &str) -> Result<(), ClipboardError> {
    if text.len() > MAX_OSC52_BYTES {
        return Err(ClipboardError::Denied(format!(
            "{} bytes exceeds the OSC 52 limit",
            text.len()
        )));
    }
    let b64 = BASE64_STD.encode(text.as_bytes());
    let seq = format!("\x1b]52;c;{b64}\x07");
    out.write_all(seq.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|e| ClipboardError::Denied(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_osc52_sequence() {
        let mut out = Vec::new();
        osc52_copy(&mut out, "<p>hi</p>").unwrap();
        let seq = String::from_utf8(out).unwrap();
        assert_eq!(seq, format!("\x1b]52;c;{}\x07", BASE64_STD.encode("<p>hi</p>")));
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_without_native_clipboard_falls_back_to_osc52() {
        let buf = SharedBuf::default();
        let mut clip = SystemClipboard {
            native: None,
            terminal: Box::new(buf.clone()),
        };
        clip.write_text("<p>hi</p>").unwrap();
        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(written.starts_with("\x1b]52;c;"));
        assert!(clip.write_text(&"x".repeat(MAX_OSC52_BYTES + 1)).is_err());
    }

    #[test]
    fn test_osc52_refuses_oversized_text() {
        let mut out = Vec::new();
        let big = "x".repeat(MAX_OSC52_BYTES + 1);
        assert!(matches!(osc52_copy(&mut out, &big), Err(ClipboardError::Denied(_))));
        assert!(out.is_empty());
    }
}
