//! Persisted step-sequence state and the storage keys it lives under.
//!
//! Wire format (stable, shared with earlier front-ends):
//!
//! ```json
//! { "step": 1, "code": { "1": "<p>edited</p>" }, "expanded": true }
//! ```
//!
//! stored under `step-preview-<slug>`, where the slug is the playground title
//! lowercased with each whitespace run collapsed to `-`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buffers::EditBuffers;
use crate::slot::SlotId;

pub const KEY_PREFIX: &str = "step-preview-";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Active slot id.
    pub step: u32,
    /// Sparse edits keyed by slot id.
    pub code: BTreeMap<u32, String>,
    #[serde(default)]
    pub expanded: bool,
}

impl PersistedRecord {
    pub fn new(active: SlotId, buffers: &EditBuffers, expanded: bool) -> Self {
        Self {
            step: active.index(),
            code: buffers
                .edits()
                .iter()
                .map(|(id, text)| (id.index(), text.clone()))
                .collect(),
            expanded,
        }
    }

    pub fn active(&self) -> SlotId {
        SlotId(self.step)
    }

    pub fn buffers(&self) -> EditBuffers {
        EditBuffers::from_edits(
            self.code
                .iter()
                .map(|(id, text)| (SlotId(*id), text.clone()))
                .collect(),
        )
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a stored value, treating anything unreadable as absent.
    pub fn decode_lenient(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// Key a playground's record is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    /// `step-preview-<slug(title)>`.
    ///
    /// Two playgrounds with the same title share this key, and therefore
    /// their persisted state. Use [`StorageKey::namespaced`] to scope it.
    pub fn derive(title: &str) -> Self {
        StorageKey(format!("{KEY_PREFIX}{}", slugify(title)))
    }

    /// `step-preview-<slug(namespace)>--<slug(title)>`.
    pub fn namespaced(namespace: &str, title: &str) -> Self {
        StorageKey(format!("{KEY_PREFIX}{}--{}", slugify(namespace), slugify(title)))
    }

    /// Namespaced when `namespace` is set and non-blank, title-only otherwise.
    pub fn scoped(namespace: Option<&str>, title: &str) -> Self {
        match namespace.map(str::trim) {
            Some(ns) if !ns.is_empty() => Self::namespaced(ns, title),
            _ => Self::derive(title),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lowercase and collapse each whitespace run into a single `-`.
///
/// Leading and trailing whitespace also become `-`; nothing else is touched.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut in_space = false;
    for ch in title.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('-');
                in_space = true;
            }
        } else {
            in_space = false;
            out.extend(ch.to_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Flexbox Basics"), "flexbox-basics");
        assert_eq!(slugify("A  \t B"), "a-b");
        assert_eq!(slugify(" Edge "), "-edge-");
        assert_eq!(slugify("Ünïcode Title"), "ünïcode-title");
        assert_eq!(slugify("keep/punct.uation"), "keep/punct.uation");
    }

    #[test]
    fn test_key_derivation() {
        assert_eq!(StorageKey::derive("CSS Grid Steps").as_str(), "step-preview-css-grid-steps");
        assert_eq!(
            StorageKey::namespaced("docs/layout", "CSS Grid").as_str(),
            "step-preview-docs/layout--css-grid"
        );
        assert_eq!(StorageKey::scoped(Some("  "), "X"), StorageKey::derive("X"));
        assert_eq!(StorageKey::scoped(None, "X"), StorageKey::derive("X"));
    }

    #[test]
    fn test_record_wire_format() {
        let mut buffers = EditBuffers::new();
        buffers.set(SlotId(1), "B2");
        let record = PersistedRecord::new(SlotId(1), &buffers, true);
        let json = record.encode().unwrap();
        assert_eq!(json, r#"{"step":1,"code":{"1":"B2"},"expanded":true}"#);
    }

    #[test]
    fn test_decode_reads_numeric_string_keys() {
        let raw = r#"{"step":2,"code":{"0":"A2","2":"C2"},"expanded":false}"#;
        let record = PersistedRecord::decode_lenient(raw).unwrap();
        assert_eq!(record.active(), SlotId(2));
        let buffers = record.buffers();
        assert!(buffers.has_edits(SlotId(0)));
        assert!(buffers.has_edits(SlotId(2)));
        assert!(!buffers.has_edits(SlotId(1)));
    }

    #[test]
    fn test_decode_corrupt_is_none() {
        assert!(PersistedRecord::decode_lenient("{not json").is_none());
        assert!(PersistedRecord::decode_lenient("[]").is_none());
        assert!(PersistedRecord::decode_lenient(r#"{"step":"one","code":{}}"#).is_none());
        assert!(PersistedRecord::decode_lenient(r#"{"step":-1,"code":{}}"#).is_none());
        assert!(PersistedRecord::decode_lenient(r#"{"step":0,"code":{"x":"y"}}"#).is_none());
    }

    #[test]
    fn test_decode_missing_expanded_defaults_false() {
        let record = PersistedRecord::decode_lenient(r#"{"step":0,"code":{}}"#).unwrap();
        assert!(!record.expanded);
    }
}
