// File I/O operations

pub mod export;
pub mod manifest;

pub use export::{write_preview, write_preview_temp, ExportError};
pub use manifest::{Manifest, ManifestError, ManifestFormat};
