//! Rollcall binary entry point.
//!
//! Parses the CLI, initializes tracing, and dispatches to the command
//! functions in `cli` or to the HTTP server in `api`.

use clap::{Parser, Subcommand};
use rollcall::api::{ServeConfig, StoreBackend, serve};
use rollcall::cli::{
    CliError, cmd_enroll, cmd_export, cmd_import, cmd_init, cmd_seed_districts, cmd_status,
    load_or_create_roster,
};
use rollcall::clock;
use rollcall_core::roster::Roster;
use rollcall_core::storage::RedbStore;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rollcall", version, about = "K-12 enrollment server and CLI")]
struct Cli {
    /// Roster database path.
    #[arg(long, global = true, default_value = "rollcall.db")]
    db: PathBuf,

    /// Storage backend: `file` (snapshot) or `redb` (embedded database).
    #[arg(long, global = true, default_value = "file")]
    backend: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an empty roster database.
    Init {
        /// Overwrite an existing database.
        #[arg(long)]
        force: bool,
    },
    /// Merge the built-in district directory and provision seat pools.
    SeedDistricts,
    /// Print roster statistics.
    Status {
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Batch-enroll students from a file.
    Enroll {
        /// Input file.
        input: PathBuf,
        /// Input format: `json` or `text`.
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Export the roster.
    Export {
        /// Output file.
        output: PathBuf,
        /// Output format: `canonical` or `json`.
        #[arg(long, default_value = "canonical")]
        format: String,
    },
    /// Import a canonical snapshot, replacing the database contents.
    Import {
        /// Snapshot file.
        input: PathBuf,
    },
    /// Run the HTTP server.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Require this bearer token on mutating routes.
        #[arg(long)]
        api_key: Option<String>,

        /// Serve from memory only (ignores --db); starts with the built-in
        /// district directory.
        #[arg(long)]
        ephemeral: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Init { force } => cmd_init(&cli.db, &cli.backend, force),
        Command::SeedDistricts => cmd_seed_districts(&cli.db, &cli.backend),
        Command::Status { json } => cmd_status(&cli.db, &cli.backend, json),
        Command::Enroll { input, format } => {
            cmd_enroll(&cli.db, &cli.backend, &input, &format, clock::today())
        }
        Command::Export { output, format } => cmd_export(&cli.db, &cli.backend, &output, &format),
        Command::Import { input } => cmd_import(&cli.db, &cli.backend, &input),
        Command::Serve {
            host,
            port,
            api_key,
            ephemeral,
        } => run_server(&cli.db, &cli.backend, host, port, api_key, ephemeral),
    }
}

fn run_server(
    db: &std::path::Path,
    backend: &str,
    host: String,
    port: u16,
    api_key: Option<String>,
    ephemeral: bool,
) -> Result<(), CliError> {
    let (roster, store_backend) = if ephemeral {
        (Roster::with_builtin_directory(), StoreBackend::Memory)
    } else {
        let roster = load_or_create_roster(db, backend)?;
        let store_backend = match backend {
            "file" => StoreBackend::File(db.to_path_buf()),
            "redb" => {
                let store = if db.exists() {
                    RedbStore::open(db)?
                } else {
                    RedbStore::create(db)?
                };
                StoreBackend::Redb(store)
            }
            other => {
                return Err(CliError::Usage(format!("unknown backend {other:?}")));
            }
        };
        (roster, store_backend)
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(ServeConfig {
        host,
        port,
        roster,
        backend: store_backend,
        api_key,
    }))?;
    Ok(())
}
