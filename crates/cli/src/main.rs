// playpen CLI - interactive code playground in the terminal

mod clipboard;
mod exit_codes;
mod launch;
mod tui;
mod util;

use std::fs::OpenOptions;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use playpen_config::Settings;
use playpen_core::SlotId;
use playpen_engine::{KvStore, PreviewRenderer};

use exit_codes::{
    EXIT_ERROR, EXIT_PREVIEW_WRITE, EXIT_STATE_NONE, EXIT_STATE_UNSUPPORTED, EXIT_SUCCESS,
    EXIT_TERMINAL, EXIT_USAGE,
};
use launch::{Env, OpenOptions as LaunchOptions};

#[derive(Parser)]
#[command(name = "playpen")]
#[command(about = "Edit code samples in the terminal and preview them in a sandboxed frame")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file [default: <config dir>/playpen/settings.json]
    #[arg(long, global = true, env = "PLAYPEN_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding persisted step state (overrides storage.dir)
    #[arg(long, global = true, env = "PLAYPEN_STATE_DIR", value_name = "DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a playground manifest in the interactive editor
    #[command(after_help = "\
Examples:
  playpen open lessons/flexbox.toml
  playpen open lessons/flexbox.toml --namespace css-course
  playpen open demo.json --no-persist --allow forms")]
    Open {
        /// Manifest file (.toml or .json)
        manifest: PathBuf,

        /// Scope persisted state beyond the title (overrides storage.namespace)
        #[arg(long)]
        namespace: Option<String>,

        /// Do not read or write persisted state
        #[arg(long)]
        no_persist: bool,

        /// Extra sandbox capability for the preview. Repeatable.
        #[arg(long = "allow", value_name = "TOKEN")]
        allow: Vec<String>,
    },

    /// Write the sandboxed preview document for one slot
    #[command(after_help = "\
Examples:
  playpen preview lessons/flexbox.toml -o flexbox.html
  playpen preview lessons/flexbox.toml --slot 2 > step3.html")]
    Preview {
        /// Manifest file (.toml or .json)
        manifest: PathBuf,

        /// Slot id (defaults to the saved active step, else the first slot)
        #[arg(long)]
        slot: Option<u32>,

        /// Output file (omit for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Extra sandbox capability. Repeatable.
        #[arg(long = "allow", value_name = "TOKEN")]
        allow: Vec<String>,

        #[arg(long)]
        namespace: Option<String>,
    },

    /// List a manifest's slots and which of them carry saved edits
    Slots {
        /// Manifest file (.toml or .json)
        manifest: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[arg(long)]
        namespace: Option<String>,
    },

    /// Print the storage key a playground title maps to
    Key {
        title: String,

        #[arg(long)]
        namespace: Option<String>,
    },

    /// Inspect or remove persisted step state
    #[command(subcommand)]
    State(StateCommands),

    /// Settings file helpers
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum StateCommands {
    /// Print the saved record for a manifest
    Show {
        manifest: PathBuf,

        #[arg(long)]
        namespace: Option<String>,
    },

    /// Delete the saved record for a manifest
    Clear {
        manifest: PathBuf,

        #[arg(long)]
        namespace: Option<String>,
    },

    /// List every stored key
    List,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the settings file path
    Path,

    /// Write a commented default settings file
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective settings as JSON
    Show,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let interactive = matches!(cli.command, Some(Commands::Open { .. }));
    init_logging(interactive);

    // Loaded per command so `config path` and `config init` never touch the settings file.
    let env = || Env::load(cli.config.as_deref(), cli.state_dir.clone());

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: playpen <command> [options]");
            eprintln!("       playpen --help for more information");
            Ok(())
        }
        Some(Commands::Open {
            manifest,
            namespace,
            no_persist,
            allow,
        }) => cmd_open(&env(), &manifest, namespace, no_persist, allow),
        Some(Commands::Preview {
            manifest,
            slot,
            output,
            allow,
            namespace,
        }) => cmd_preview(&env(), &manifest, slot, output, allow, namespace),
        Some(Commands::Slots {
            manifest,
            json,
            namespace,
        }) => cmd_slots(&env(), &manifest, json, namespace),
        Some(Commands::Key { title, namespace }) => {
            println!("{}", env().storage_key(&title, namespace));
            Ok(())
        }
        Some(Commands::State(state_cmd)) => match state_cmd {
            StateCommands::Show { manifest, namespace } => {
                cmd_state_show(&env(), &manifest, namespace)
            }
            StateCommands::Clear { manifest, namespace } => {
                cmd_state_clear(&env(), &manifest, namespace)
            }
            StateCommands::List => cmd_state_list(&env()),
        },
        Some(Commands::Config(config_cmd)) => match config_cmd {
            ConfigCommands::Path => {
                println!("{}", config_path(cli.config.as_deref()).display());
                Ok(())
            }
            ConfigCommands::Init { force } => cmd_config_init(cli.config.as_deref(), force),
            ConfigCommands::Show => cmd_config_show(&env()),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// `PLAYPEN_LOG` (falling back to `RUST_LOG`) picks the filter. The TUI owns
/// the terminal, so `open` logs to a file next to the state directory.
fn init_logging(interactive: bool) {
    let var = if std::env::var_os("PLAYPEN_LOG").is_some() {
        "PLAYPEN_LOG"
    } else {
        "RUST_LOG"
    };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::new().filter_or(var, "warn"));

    if interactive {
        let path = Settings::default_storage_dir().with_file_name("playpen.log");
        let file = path
            .parent()
            .map(std::fs::create_dir_all)
            .transpose()
            .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));
        match file {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(_) => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }

    let _ = builder.try_init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// open
// ============================================================================

fn cmd_open(
    env: &Env,
    manifest_path: &Path,
    namespace: Option<String>,
    no_persist: bool,
    allow: Vec<String>,
) -> Result<(), CliError> {
    if !io::stdout().is_terminal() {
        return Err(CliError::args("open needs an interactive terminal")
            .with_hint("use `playpen preview` to render a slot without the editor"));
    }

    let manifest = launch::load_manifest(manifest_path)?;
    let playground = launch::build_playground(
        env,
        manifest,
        LaunchOptions {
            namespace,
            persist: !no_persist,
            allow,
        },
    )?;

    let clipboard = Box::new(clipboard::SystemClipboard::new());
    tui::run(playground, clipboard, env.settings.tab_width)
        .map_err(|e| CliError::new(EXIT_TERMINAL, e))
}

// ============================================================================
// preview
// ============================================================================

fn cmd_preview(
    env: &Env,
    manifest_path: &Path,
    slot: Option<u32>,
    output: Option<PathBuf>,
    allow: Vec<String>,
    namespace: Option<String>,
) -> Result<(), CliError> {
    let policy = env.sandbox_policy(&allow)?;
    let manifest = launch::load_manifest(manifest_path)?;
    let record = if manifest.variant.persists() {
        env.load_record(&env.storage_key(&manifest.title, namespace))
    } else {
        None
    };
    let playground = launch::restore(&manifest, record)?;

    let id = slot.map(SlotId).unwrap_or(playground.active());
    let code = playground.code_for(id).ok_or_else(|| {
        CliError::args(format!("no slot {} in '{}'", id, manifest.title)).with_hint(format!(
            "slots are numbered 0..{}",
            manifest.slots.len() - 1
        ))
    })?;

    let frame = PreviewRenderer::new(policy).render(code);
    match output {
        Some(path) => playpen_io::write_preview(&frame, &manifest.title, &path)
            .map_err(|e| CliError::new(EXIT_PREVIEW_WRITE, e.to_string())),
        None => {
            let mut out = io::stdout().lock();
            out.write_all(frame.host_document(&manifest.title).as_bytes())
                .map_err(|e| CliError::io(e.to_string()))
        }
    }
}

// ============================================================================
// slots
// ============================================================================

#[derive(Serialize)]
struct SlotRow<'a> {
    id: u32,
    label: &'a str,
    active: bool,
    edited: bool,
    bytes: usize,
}

fn cmd_slots(env: &Env, manifest_path: &Path, json: bool, namespace: Option<String>) -> Result<(), CliError> {
    let manifest = launch::load_manifest(manifest_path)?;
    let record = if manifest.variant.persists() {
        env.load_record(&env.storage_key(&manifest.title, namespace))
    } else {
        None
    };
    let playground = launch::restore(&manifest, record)?;

    let rows: Vec<SlotRow> = playground
        .slots()
        .iter()
        .map(|slot| SlotRow {
            id: slot.id().index(),
            label: slot.label(),
            active: slot.id() == playground.active(),
            edited: playground.has_edits(slot.id()),
            bytes: playground.code_for(slot.id()).map(str::len).unwrap_or_default(),
        })
        .collect();

    let mut out = io::stdout().lock();
    if json {
        let text = serde_json::to_string_pretty(&rows).map_err(|e| CliError::io(e.to_string()))?;
        writeln!(out, "{}", text).map_err(|e| CliError::io(e.to_string()))?;
        return Ok(());
    }

    let label_width = rows
        .iter()
        .map(|r| util::display_width(r.label))
        .max()
        .unwrap_or(5)
        .clamp(5, 40);
    writeln!(out, "   ID  {}  EDITED  BYTES", util::pad_right("LABEL", label_width))
        .map_err(|e| CliError::io(e.to_string()))?;
    for row in &rows {
        writeln!(
            out,
            "{} {:>3}  {}  {:<6}  {}",
            if row.active { ">" } else { " " },
            row.id,
            util::pad_right(row.label, label_width),
            if row.edited { "yes" } else { "-" },
            row.bytes
        )
        .map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// state
// ============================================================================

fn persisting_manifest(manifest_path: &Path) -> Result<playpen_io::Manifest, CliError> {
    let manifest = launch::load_manifest(manifest_path)?;
    if !manifest.variant.persists() {
        return Err(CliError::new(
            EXIT_STATE_UNSUPPORTED,
            format!("'{}' is a {} playground; only steps persist state", manifest.title, manifest.variant),
        ));
    }
    Ok(manifest)
}

fn cmd_state_show(env: &Env, manifest_path: &Path, namespace: Option<String>) -> Result<(), CliError> {
    let manifest = persisting_manifest(manifest_path)?;
    let key = env.storage_key(&manifest.title, namespace);
    let record = env.load_record(&key).ok_or_else(|| {
        CliError::new(EXIT_STATE_NONE, format!("no saved state under {}", key))
            .with_hint(format!("state dir: {}", env.state_dir.display()))
    })?;
    let text = serde_json::to_string_pretty(&record).map_err(|e| CliError::io(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn cmd_state_clear(env: &Env, manifest_path: &Path, namespace: Option<String>) -> Result<(), CliError> {
    let manifest = persisting_manifest(manifest_path)?;
    let key = env.storage_key(&manifest.title, namespace);
    let store = env.file_store();
    let existed = store
        .get(key.as_str())
        .map_err(|e| CliError::io(e.to_string()))?
        .is_some();
    if !existed {
        eprintln!("nothing saved under {}", key);
        return Ok(());
    }
    store
        .remove(key.as_str())
        .map_err(|e| CliError::io(e.to_string()))?;
    eprintln!("cleared {}", key);
    Ok(())
}

fn cmd_state_list(env: &Env) -> Result<(), CliError> {
    let mut out = io::stdout().lock();
    for key in env.file_store().keys() {
        writeln!(out, "{}", key).map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// config
// ============================================================================

fn config_path(flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf).unwrap_or_else(Settings::config_path)
}

fn cmd_config_init(flag: Option<&Path>, force: bool) -> Result<(), CliError> {
    let path = config_path(flag);
    if path.exists() && !force {
        return Err(CliError::args(format!("{} already exists", path.display()))
            .with_hint("pass --force to overwrite"));
    }
    Settings::write_default_file(&path).map_err(|e| CliError::io(e.to_string()))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_config_show(env: &Env) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(&env.settings).map_err(|e| CliError::io(e.to_string()))?;
    println!("{}", text);
    Ok(())
}
