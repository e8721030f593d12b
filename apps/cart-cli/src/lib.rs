//! # GoMarket Cart CLI
//!
//! Command-line shell over `gomarket-cart`.
//!
//! ## Module Organization
//! ```text
//! gomarket_cli/
//! ├── lib.rs          ◄─── You are here (argument parsing, run loop)
//! ├── commands/
//! │   └── cart.rs     ◄─── add / increment / decrement / list / totals
//! └── error.rs        ◄─── CliError for failed commands
//! ```
//!
//! ## Invocation Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Initialize Logging                                                 │
//! │     • tracing-subscriber to stderr, RUST_LOG overrides the default     │
//! │                                                                         │
//! │  2. Load Configuration                                                 │
//! │     • --config PATH or the platform config dir, then env overrides     │
//! │                                                                         │
//! │  3. Open the Cart                                                      │
//! │     • open the configured backend, load the stored cart                │
//! │                                                                         │
//! │  4. Run the Command through a CartHandle                               │
//! │                                                                         │
//! │  5. Close the Store                                                    │
//! │     • pending write reaches storage before the process exits           │
//! │                                                                         │
//! │  6. Print the cart (table, or JSON with --json)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use gomarket_cart::{CartConfig, CartStore};

use commands::cart::{self, AddArgs};
use error::{CliError, CliResult};

/// GoMarket cart - inspect and change the locally persisted shopping cart
#[derive(Debug, Parser)]
#[command(name = "gomarket-cli")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Use JSON output format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Add one unit of a product
    Add(AddArgs),

    /// Add one unit to a product already in the cart
    Increment {
        /// Product id
        id: String,
    },

    /// Remove one unit of a product (the line goes away at zero)
    Decrement {
        /// Product id
        id: String,
    },

    /// Show the cart
    List,

    /// Show item count and subtotal
    Totals,
}

impl Command {
    fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::Add(_) | Command::Increment { .. } | Command::Decrement { .. }
        )
    }
}

/// Parses the command line and runs it.
pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match execute(&cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            if cli.json {
                println!("{}", err.to_json());
            } else {
                eprintln!("error: {}", err);
            }
            ExitCode::FAILURE
        }
    }
}

/// Runs one command against the configured cart and returns what to print.
pub async fn execute(cli: &Cli) -> CliResult<String> {
    let config = CartConfig::load(cli.config.clone())?;
    info!(
        backend = %config.storage.backend,
        key = %config.storage_key(),
        "Opening cart"
    );

    let store = CartStore::open(&config).await?;
    let handle = store.handle();

    let outcome = apply(&cli.command, &handle);
    let response = cart::get_cart(&handle);

    store.flush().await;
    let status = store.persist_status();
    store.close().await;

    outcome?;
    let response = response?;

    if cli.command.is_mutation() {
        if let Some(err) = status.last_error {
            warn!(error = %err, "Cart change was not saved");
            return Err(CliError::storage(format!("cart change was not saved: {}", err)));
        }
    }

    match (&cli.command, cli.json) {
        (Command::Totals, true) => Ok(serde_json::to_string_pretty(&response.totals)?),
        (Command::Totals, false) => Ok(cart::render_totals(&response.totals)),
        (_, true) => Ok(serde_json::to_string_pretty(&response)?),
        (_, false) => Ok(cart::render_cart(&response)),
    }
}

fn apply(command: &Command, handle: &gomarket_cart::CartHandle) -> CliResult<()> {
    match command {
        Command::Add(args) => cart::add_to_cart(handle, args.clone()),
        Command::Increment { id } => cart::increment(handle, id),
        Command::Decrement { id } => cart::decrement(handle, id),
        Command::List | Command::Totals => Ok(()),
    }
}

/// Initializes the tracing subscriber for logging.
///
/// ## Log Levels
/// - ERROR: Writes given up on
/// - WARN: Recovered problems (malformed stored cart, failed write attempts)
/// - INFO: Lifecycle (storage opened, store closed)
/// - DEBUG: Each cart operation
///
/// ## Environment Variable
/// Set `RUST_LOG` to control log level:
/// ```bash
/// RUST_LOG=debug gomarket-cli list
/// RUST_LOG=gomarket_cart=trace gomarket-cli add ...
/// ```
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gomarket=debug,sqlx=warn"));

    // stdout carries command output; logs go to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .with_writer(std::io::stderr)
        .try_init();
}
