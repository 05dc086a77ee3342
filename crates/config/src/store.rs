// On-disk key-value store for persisted playground state.
// One file per key: <dir>/<encoded key>.json
//
// Keys whose encoded form would overflow a filename are stored as
// <dir>/<encoded prefix>~<digest>.json, and the file wraps the value together
// with the full key.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use playpen_engine::{KvStore, StoreError};

/// Longest encoded key used verbatim as a filename.
const MAX_PLAIN_STEM: usize = 150;
/// Readable part kept in front of the digest for long keys.
const LONG_KEY_PREFIX: usize = 64;
const DIGEST_MARK: char = '~';

#[derive(Serialize, Deserialize)]
struct LongKeyEntry {
    key: String,
    value: String,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    /// Reject values larger than this many bytes.
    max_value_bytes: Option<usize>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_value_bytes: None,
        }
    }

    pub fn with_quota(mut self, max_value_bytes: usize) -> Self {
        self.max_value_bytes = Some(max_value_bytes);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a key is stored in
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                let Some(stem) = name.strip_suffix(".json") else { continue };
                if stem.contains(DIGEST_MARK) {
                    match read_long_entry(&entry.path()) {
                        Some(long) => keys.push(long.key),
                        None => log::debug!("Skipping unreadable state file {}", name),
                    }
                } else if let Some(key) = decode_key(stem) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        keys
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let contents = match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        if !is_long_key(key) {
            return Ok(Some(contents));
        }
        let entry: LongKeyEntry =
            serde_json::from_str(&contents).map_err(|e| StoreError::Io(e.to_string()))?;
        // Digest collision: the file belongs to another key
        Ok((entry.key == key).then_some(entry.value))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(max) = self.max_value_bytes {
            if value.len() > max {
                return Err(StoreError::Rejected(format!(
                    "{} bytes exceeds quota of {}",
                    value.len(),
                    max
                )));
            }
        }

        fs::create_dir_all(&self.dir).map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let contents = if is_long_key(key) {
            let entry = LongKeyEntry {
                key: key.to_string(),
                value: value.to_string(),
            };
            serde_json::to_string(&entry).map_err(|e| StoreError::Io(e.to_string()))?
        } else {
            value.to_string()
        };

        // Write-then-rename so a crash never leaves a half-written record
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(|e| StoreError::Io(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StoreError::Io(e.to_string())
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }
}

fn is_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.')
}

/// Percent-encode everything outside `[A-Za-z0-9._-]`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if is_safe(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn is_long_key(key: &str) -> bool {
    encode_key(key).len() > MAX_PLAIN_STEM
}

/// Filename stem for a key, at most `LONG_KEY_PREFIX + 33` bytes for long keys.
fn file_stem(key: &str) -> String {
    let encoded = encode_key(key);
    if encoded.len() <= MAX_PLAIN_STEM {
        return encoded;
    }
    // Never cut inside a %XX escape
    let mut cut = LONG_KEY_PREFIX;
    if let Some(pct) = encoded[..cut].rfind('%') {
        if pct + 3 > cut {
            cut = pct;
        }
    }
    let digest = Sha256::digest(key.as_bytes());
    let hex: String = digest.iter().take(16).map(|b| format!("{:02x}", b)).collect();
    format!("{}{}{}", &encoded[..cut], DIGEST_MARK, hex)
}

fn read_long_entry(path: &Path) -> Option<LongKeyEntry> {
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_encoding_round_trip() {
        for key in ["step-preview-flexbox", "step-preview-docs/a--b c", "step-preview-ünï"] {
            let encoded = encode_key(key);
            assert!(encoded.bytes().all(|b| is_safe(b) || b == b'%'));
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }
    }

    #[test]
    fn test_get_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.get("nope").unwrap(), None);
        assert!(store.remove("nope").is_ok());
    }

    #[test]
    fn test_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state"));
        store.set("step-preview-a/b", "{}").unwrap();
        assert_eq!(store.get("step-preview-a/b").unwrap().as_deref(), Some("{}"));
        assert_eq!(store.keys(), vec!["step-preview-a/b".to_string()]);
        store.remove("step-preview-a/b").unwrap();
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_long_keys_get_bounded_filenames() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let key = format!("step-preview-{}", "вёрстка-".repeat(20));
        assert!(encode_key(&key).len() > MAX_PLAIN_STEM);

        let path = store.path_for(&key);
        let name = path.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name.len() < 120, "{name}");
        assert!(name.starts_with("step-preview-%D0%B2"));

        store.set(&key, "{\"step\":1}").unwrap();
        assert_eq!(store.get(&key).unwrap().as_deref(), Some("{\"step\":1}"));
        assert_eq!(store.keys(), vec![key.clone()]);

        // Same prefix, different key: separate file, no cross-reads
        let sibling = format!("{key}x");
        assert_ne!(store.path_for(&sibling), path);
        assert_eq!(store.get(&sibling).unwrap(), None);

        store.remove(&key).unwrap();
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_quota_rejects_large_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).with_quota(8);
        assert!(matches!(store.set("k", "0123456789"), Err(StoreError::Rejected(_))));
        assert_eq!(store.get("k").unwrap(), None);
    }
}
