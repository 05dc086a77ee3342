// Wiring between manifest, settings and command-line flags.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use playpen_config::{FileStore, Settings};
use playpen_core::{PersistedRecord, StorageKey};
use playpen_engine::{
    KvStore, PersistenceAdapter, PersistenceWriter, Playground, RecordStore, SandboxPolicy,
};
use playpen_io::Manifest;

use crate::exit_codes::{manifest_exit_code, EXIT_MANIFEST_INVALID, EXIT_SANDBOX_POLICY};
use crate::CliError;

/// Global inputs shared by every command.
pub struct Env {
    pub settings: Settings,
    pub state_dir: PathBuf,
}

impl Env {
    pub fn load(config: Option<&Path>, state_dir: Option<PathBuf>) -> Self {
        let settings = match config {
            Some(path) if path.exists() => Settings::load_from(path),
            Some(path) => {
                log::debug!("No settings at {}; using defaults", path.display());
                Settings::default()
            }
            None => Settings::load(),
        };
        let state_dir = state_dir.unwrap_or_else(|| settings.effective_storage_dir());
        Self { settings, state_dir }
    }

    /// `--namespace` wins over `storage.namespace`.
    pub fn namespace(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| self.settings.storage_namespace.clone())
            .filter(|ns| !ns.trim().is_empty())
    }

    pub fn storage_key(&self, title: &str, flag: Option<String>) -> StorageKey {
        StorageKey::scoped(self.namespace(flag).as_deref(), title)
    }

    pub fn file_store(&self) -> FileStore {
        FileStore::new(self.state_dir.clone())
    }

    /// Default policy plus `preview.sandbox` plus `--allow`.
    pub fn sandbox_policy(&self, extra: &[String]) -> Result<SandboxPolicy, CliError> {
        let tokens = self.settings.preview_sandbox.iter().chain(extra.iter());
        SandboxPolicy::with_tokens(tokens).map_err(|e| {
            CliError::new(EXIT_SANDBOX_POLICY, e.to_string())
                .with_hint("allowed: scripts, forms, modals, popups, downloads, pointer-lock")
        })
    }

    /// Read-only view of the persisted record for `key`.
    pub fn load_record(&self, key: &StorageKey) -> Option<PersistedRecord> {
        if !self.settings.storage_enabled {
            return None;
        }
        PersistenceAdapter::new(self.file_store()).load(key)
    }
}

pub fn load_manifest(path: &Path) -> Result<Manifest, CliError> {
    Manifest::load(path).map_err(|e| CliError::new(manifest_exit_code(&e), e.to_string()))
}

pub struct OpenOptions {
    pub namespace: Option<String>,
    pub persist: bool,
    pub allow: Vec<String>,
}

/// Build the interactive playground for `open`.
pub fn build_playground(env: &Env, manifest: Manifest, opts: OpenOptions) -> Result<Playground, CliError> {
    let policy = env.sandbox_policy(&opts.allow)?;
    let mut builder = Playground::builder(manifest.title, manifest.variant, manifest.slots)
        .sandbox(policy)
        .expanded(manifest.expanded);

    if let Some(window) = env.settings.copy_feedback() {
        builder = builder.copy_feedback(window);
    }
    if let Some(ns) = env.namespace(opts.namespace) {
        builder = builder.namespace(ns);
    }
    if opts.persist && env.settings.storage_enabled && manifest.variant.persists() {
        let store: Arc<dyn KvStore> = Arc::new(env.file_store());
        let writer: Box<dyn RecordStore> = Box::new(PersistenceWriter::spawn(store));
        builder = builder.persistence(writer);
        log::info!("Persisting state under {}", env.state_dir.display());
    }

    builder
        .build()
        .map_err(|e| CliError::new(EXIT_MANIFEST_INVALID, e.to_string()))
}

/// Playground as a fresh `open` would show it, hydrated from `record` and
/// detached from storage. Used by the read-only commands.
pub fn restore(manifest: &Manifest, record: Option<PersistedRecord>) -> Result<Playground, CliError> {
    Playground::builder(manifest.title.clone(), manifest.variant, manifest.slots.clone())
        .expanded(manifest.expanded)
        .restore(record)
        .build()
        .map_err(|e| CliError::new(EXIT_MANIFEST_INVALID, e.to_string()))
}
