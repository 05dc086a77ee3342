//! CLI Exit Code Registry
//!
//! Single source of truth for `playpen` exit codes. Scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain      | Description                              |
//! |---------|-------------|------------------------------------------|
//! | 0       | Universal   | Success                                  |
//! | 1       | Universal   | General error (unspecified)              |
//! | 2       | Universal   | CLI usage error (bad args, unknown slot) |
//! | 3-9     | manifest    | Reading and validating manifests         |
//! | 10-19   | preview     | Sandbox policy and preview export        |
//! | 20-29   | state       | Persisted playground state               |
//! | 30-39   | terminal    | Interactive shell                        |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, slot out of range.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Manifest (3-9)
// =============================================================================

/// Manifest (or a slot file it references) could not be read.
pub const EXIT_MANIFEST_IO: u8 = 3;

/// Manifest is not valid TOML/JSON or has unknown fields.
pub const EXIT_MANIFEST_PARSE: u8 = 4;

/// Manifest parsed but is unusable (empty title, no slots, bad slot count).
pub const EXIT_MANIFEST_INVALID: u8 = 5;

// =============================================================================
// Preview (10-19)
// =============================================================================

/// Sandbox capability unknown, or the requested set could escape the sandbox.
pub const EXIT_SANDBOX_POLICY: u8 = 10;

/// Preview document could not be written.
pub const EXIT_PREVIEW_WRITE: u8 = 11;

// =============================================================================
// State (20-29)
// =============================================================================

/// No persisted state under the playground's key.
pub const EXIT_STATE_NONE: u8 = 20;

/// Variant never persists (single editor, tabs).
pub const EXIT_STATE_UNSUPPORTED: u8 = 21;

// =============================================================================
// Terminal (30-39)
// =============================================================================

/// Terminal could not be set up or drawn.
pub const EXIT_TERMINAL: u8 = 30;

/// Map a manifest error to its exit code.
pub fn manifest_exit_code(err: &playpen_io::ManifestError) -> u8 {
    use playpen_io::ManifestError;
    match err {
        ManifestError::Io { .. } => EXIT_MANIFEST_IO,
        ManifestError::Parse(_) | ManifestError::UnsupportedFormat(_) => EXIT_MANIFEST_PARSE,
        ManifestError::Invalid(_) | ManifestError::Slots(_) => EXIT_MANIFEST_INVALID,
    }
}
