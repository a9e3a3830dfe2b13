//! docker-credential-credvault - Docker credential helper
//!
//! Commands:
//! - store: Save the credential read from stdin (JSON)
//! - get: Print the credential for the server URL read from stdin
//! - erase: Delete the credential for the server URL read from stdin
//! - list: Print all server URLs with their usernames
//! - version: Print the helper version
//! - init: Generate the age identity for the default backend

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use credvault::backend::{self, AgeBackend};
use credvault::protocol::{self, Action};
use credvault::{EntryStore, PathCodec};
use credvault_core::{BackendKind, Config, Paths};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docker-credential-credvault")]
#[command(about = "Docker credential helper - stores each credential as an encrypted file")]
#[command(version)]
#[command(after_help = r#"BACKENDS:
    age   Files under ~/.local/share/credvault, encrypted with a local
          X25519 identity (run 'init' once)
    pass  Entries under ~/.password-store/docker-credential-helpers,
          encrypted by pass/gpg

CONFIG:
    ~/.config/credvault/config.json or $CREDVAULT_CONFIG
    {"backend": "age", "store_dir": "...", "pass_prefix": "...", "max_segment_len": 120}"#)]
struct Cli {
    /// Config file to use instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the credential given as JSON on stdin
    Store,

    /// Print the credential for the server URL on stdin
    Get,

    /// Delete the credential for the server URL on stdin
    Erase,

    /// Print stored server URLs and usernames as JSON
    List,

    /// Print the helper version
    Version,

    /// Create the age identity used to encrypt entries
    Init,
}

fn main() -> ExitCode {
    // stdout belongs to the protocol; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Docker reads helper errors from stdout
            println!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let paths = Paths::new();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    match cli.command {
        Commands::Store => cmd_serve(&config, &paths, Action::Store),
        Commands::Get => cmd_serve(&config, &paths, Action::Get),
        Commands::Erase => cmd_serve(&config, &paths, Action::Erase),
        Commands::List => cmd_serve(&config, &paths, Action::List),
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Init => cmd_init(&config, &paths),
    }
}

/// Run one protocol action over stdin/stdout
fn cmd_serve(config: &Config, paths: &Paths, action: Action) -> Result<()> {
    let store = EntryStore::with_codec(
        backend::from_config(config, paths),
        PathCodec::new(config.max_segment_len),
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    protocol::serve(&store, action, stdin.lock(), stdout.lock())?;
    Ok(())
}

/// Initialize the age backend
fn cmd_init(config: &Config, paths: &Paths) -> Result<()> {
    if config.backend == BackendKind::Pass {
        bail!("The pass backend is initialized with 'pass init <gpg-id>'");
    }

    let backend = AgeBackend::new(&config.store_dir(paths));
    if backend.is_initialized() {
        println!("warning: Store already initialized");
        println!("Public key: {}", backend.public_key()?);
        return Ok(());
    }

    let pubkey = backend.init()?;
    println!("success: Store initialized at {}", backend.root().display());
    println!("Public key: {}", pubkey);

    Ok(())
}
