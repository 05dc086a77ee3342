//! Playground manifests.
//!
//! A manifest names a playground and lists its slots. TOML and JSON are both
//! accepted, chosen by file extension:
//!
//! ```toml
//! title = "Flexbox basics"
//! variant = "steps"
//!
//! [[slots]]
//! label = "Container"
//! code = "<div style='display:flex'>...</div>"
//!
//! [[slots]]
//! label = "Items"
//! file = "items.html"   # relative to the manifest
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use playpen_core::{SlotError, SlotSet, Variant};

#[derive(Debug)]
pub enum ManifestError {
    Io { path: PathBuf, message: String },
    Parse(String),
    UnsupportedFormat(String),
    /// Structurally valid but unusable (empty title, slot with no code, ...).
    Invalid(String),
    Slots(SlotError),
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "{}: {message}", path.display()),
            Self::Parse(msg) => write!(f, "manifest parse error: {msg}"),
            Self::UnsupportedFormat(ext) => {
                write!(f, "unsupported manifest format '{ext}' (expected .toml or .json)")
            }
            Self::Invalid(msg) => write!(f, "invalid manifest: {msg}"),
            Self::Slots(e) => write!(f, "invalid manifest: {e}"),
        }
    }
}

impl std::error::Error for ManifestError {}

impl From<SlotError> for ManifestError {
    fn from(e: SlotError) -> Self {
        Self::Slots(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Toml,
    Json,
}

impl ManifestFormat {
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(ManifestError::UnsupportedFormat(ext)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    title: String,
    #[serde(default)]
    variant: Variant,
    #[serde(default)]
    expanded: bool,
    #[serde(default)]
    slots: Vec<RawSlot>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSlot {
    label: Option<String>,
    code: Option<String>,
    file: Option<PathBuf>,
}

/// A loaded, validated playground definition.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub title: String,
    pub variant: Variant,
    /// Initial expand state for step sequences.
    pub expanded: bool,
    pub slots: SlotSet,
    /// Path the manifest was read from, if any.
    pub source: Option<PathBuf>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let format = ManifestFormat::from_path(path)?;
        let contents = fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut manifest = Self::parse(&contents, format, base)?;
        manifest.source = Some(path.to_path_buf());
        log::debug!(
            "Loaded manifest '{}' ({} slot(s), {})",
            manifest.title,
            manifest.slots.len(),
            manifest.variant
        );
        Ok(manifest)
    }

    /// Parse manifest text. `file` references resolve against `base_dir`.
    pub fn parse(contents: &str, format: ManifestFormat, base_dir: &Path) -> Result<Self, ManifestError> {
        let raw: RawManifest = match format {
            ManifestFormat::Toml => {
                toml::from_str(contents).map_err(|e| ManifestError::Parse(e.to_string()))?
            }
            ManifestFormat::Json => {
                serde_json::from_str(contents).map_err(|e| ManifestError::Parse(e.to_string()))?
            }
        };

        if raw.title.trim().is_empty() {
            return Err(ManifestError::Invalid("title is empty".to_string()));
        }

        let mut items = Vec::with_capacity(raw.slots.len());
        for (i, slot) in raw.slots.into_iter().enumerate() {
            let code = match (slot.code, slot.file) {
                (Some(code), None) => code,
                (None, Some(file)) => {
                    let path = base_dir.join(&file);
                    fs::read_to_string(&path).map_err(|e| ManifestError::Io {
                        path,
                        message: e.to_string(),
                    })?
                }
                (Some(_), Some(_)) => {
                    return Err(ManifestError::Invalid(format!(
                        "slot {} has both `code` and `file`",
                        i + 1
                    )))
                }
                (None, None) => {
                    return Err(ManifestError::Invalid(format!(
                        "slot {} needs `code` or `file`",
                        i + 1
                    )))
                }
            };
            let label = slot
                .label
                .unwrap_or_else(|| default_label(raw.variant, &raw.title, i));
            items.push((label, code));
        }

        let slots = match raw.variant {
            Variant::Single => {
                if items.len() != 1 {
                    return Err(SlotError::WrongCount {
                        expected: 1,
                        found: items.len(),
                    }
                    .into());
                }
                let (label, code) = items.remove(0);
                SlotSet::single(label, code)
            }
            Variant::Tabs | Variant::Steps => SlotSet::indexed(items)?,
        };

        Ok(Self {
            title: raw.title,
            variant: raw.variant,
            expanded: raw.expanded,
            slots,
            source: None,
        })
    }
}

fn default_label(variant: Variant, title: &str, index: usize) -> String {
    match variant {
        Variant::Single => title.to_string(),
        Variant::Tabs => format!("Tab {}", index + 1),
        Variant::Steps => format!("Step {}", index + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playpen_core::SlotId;

    #[test]
    fn test_parse_toml_steps() {
        let m = Manifest::parse(
            r#"
title = "Flex"
variant = "steps"
[[slots]]
code = "A"
[[slots]]
label = "Second"
code = "B"
"#,
            ManifestFormat::Toml,
            Path::new("."),
        )
        .unwrap();
        assert_eq!(m.variant, Variant::Steps);
        assert_eq!(m.slots.len(), 2);
        assert_eq!(m.slots.get(SlotId(0)).unwrap().label(), "Step 1");
        assert_eq!(m.slots.get(SlotId(1)).unwrap().label(), "Second");
    }

    #[test]
    fn test_parse_json_single_defaults() {
        let m = Manifest::parse(
            r#"{"title": "Hello", "slots": [{"code": "<p>hi</p>"}]}"#,
            ManifestFormat::Json,
            Path::new("."),
        )
        .unwrap();
        assert_eq!(m.variant, Variant::Single);
        assert_eq!(m.slots.first().id(), SlotId::SINGLE);
        assert_eq!(m.slots.first().label(), "Hello");
    }

    #[test]
    fn test_code_whitespace_preserved() {
        let m = Manifest::parse(
            "title = \"ws\"\n[[slots]]\ncode = \"\"\"\n  <p>\n\tx</p>\n\"\"\"\n",
            ManifestFormat::Toml,
            Path::new("."),
        )
        .unwrap();
        assert_eq!(m.slots.first().original_code(), "  <p>\n\tx</p>\n");
    }

    #[test]
    fn test_rejects_bad_manifests() {
        let base = Path::new(".");
        let cases = [
            r#"{"title": " ", "slots": [{"code": "x"}]}"#,
            r#"{"title": "t", "slots": []}"#,
            r#"{"title": "t", "variant": "single", "slots": [{"code": "a"}, {"code": "b"}]}"#,
            r#"{"title": "t", "slots": [{"label": "no code"}]}"#,
            r#"{"title": "t", "slots": [{"code": "a", "file": "a.html"}]}"#,
            r#"{"title": "t", "variant": "carousel", "slots": [{"code": "a"}]}"#,
            r#"{"title": "t", "slots": [{"code": "a", "lang": "html"}]}"#,
        ];
        for case in cases {
            assert!(Manifest::parse(case, ManifestFormat::Json, base).is_err(), "{case}");
        }
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            ManifestFormat::from_path(Path::new("lesson.yaml")),
            Err(ManifestError::UnsupportedFormat(_))
        ));
        assert_eq!(ManifestFormat::from_path(Path::new("a.TOML")).unwrap(), ManifestFormat::Toml);
    }
}
