// Preview export
// Writes the sandboxed host document for a preview frame to disk.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use playpen_core::slugify;
use playpen_engine::PreviewFrame;

#[derive(Debug)]
pub enum ExportError {
    Io(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "preview export failed: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Write the host document to `path`, replacing it atomically.
pub fn write_preview(frame: &PreviewFrame, title: &str, path: &Path) -> Result<(), ExportError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(frame.host_document(title).as_bytes())?;
    tmp.persist(path).map_err(|e| ExportError::Io(e.error.to_string()))?;
    Ok(())
}

/// Write the host document to a new file under the system temp dir.
///
/// Each call creates a distinct file so a browser never reuses a previous
/// generation's document.
pub fn write_preview_temp(frame: &PreviewFrame, title: &str) -> Result<PathBuf, ExportError> {
    let dir = std::env::temp_dir().join("playpen-preview");
    std::fs::create_dir_all(&dir)?;
    let prefix = format!("{}-{}-", file_stem(title), frame.generation());
    let mut file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".html")
        .tempfile_in(&dir)?;
    file.write_all(frame.host_document(title).as_bytes())?;
    let (_, path) = file.keep().map_err(|e| ExportError::Io(e.error.to_string()))?;
    log::debug!("Preview generation {} written to {}", frame.generation(), path.display());
    Ok(path)
}

/// Filename-safe stem for a title: `[a-z0-9_-]` only, at most 48 bytes.
fn file_stem(title: &str) -> String {
    let stem: String = slugify(title.trim())
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '-'
            }
        })
        .take(48)
        .collect();
    if stem.is_empty() {
        "preview".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playpen_engine::PreviewRenderer;

    #[test]
    fn test_write_preview_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.html");
        let mut renderer = PreviewRenderer::default();

        write_preview(&renderer.render("<p>one</p>"), "Demo", &path).unwrap();
        write_preview(&renderer.render("<p>two</p>"), "Demo", &path).unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("&lt;p&gt;two"));
        assert!(!html.contains("&lt;p&gt;one"));
        assert!(html.contains("sandbox=\"allow-scripts\""));
    }

    #[test]
    fn test_temp_previews_are_distinct_files() {
        let mut renderer = PreviewRenderer::default();
        let a = write_preview_temp(&renderer.render("<p>x</p>"), "Temp Demo").unwrap();
        let b = write_preview_temp(&renderer.render("<p>x</p>"), "Temp Demo").unwrap();
        assert_ne!(a, b);
        assert!(a.extension().is_some_and(|e| e == "html"));
        let _ = std::fs::remove_file(a);
        let _ = std::fs::remove_file(b);
    }

    #[test]
    fn test_temp_preview_with_slash_in_title() {
        let mut renderer = PreviewRenderer::default();
        let path = write_preview_temp(&renderer.render("<p>x</p>"), "HTML/CSS Basics").unwrap();
        assert_eq!(path.parent(), Some(std::env::temp_dir().join("playpen-preview").as_path()));
        let name = path.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name.starts_with("html-css-basics-"), "{name}");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_file_stem_is_filename_safe() {
        assert_eq!(file_stem("HTML/CSS Basics"), "html-css-basics");
        assert_eq!(file_stem("..\\x"), "---x");
        assert_eq!(file_stem("   "), "preview");
        assert_eq!(file_stem(""), "preview");
        assert!(file_stem(&"Ü".repeat(200)).len() <= 48);
    }
}
