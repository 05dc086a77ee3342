// Configuration loading and on-disk state

pub mod settings;
pub mod store;

pub use settings::{Settings, SettingsError};
pub use store::FileStore;
