//! # Folio CLI (`folio`)
//!
//! Runs the portfolio chat backend and its maintenance jobs.
//!
//! ## Usage
//!
//! ```bash
//! folio --config ./config/folio.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `folio serve` | Start the chat HTTP server |
//! | `folio seed` | Rebuild the knowledge base from the profile and notes |
//! | `folio verify` | Print the stored chunk count and a few samples |
//! | `folio ask [MESSAGE]` | Chat with a running server from the terminal |
//!
//! Provider credentials are read from `GEMINI_API_KEY`, `SUPABASE_URL`, and
//! `SUPABASE_SERVICE_ROLE_KEY`.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use folio_chat::config::{self, Config};
use folio_chat::{logging, seed, server, session, verify};

const DEFAULT_CONFIG: &str = "./config/folio.toml";

/// Folio: a retrieval-augmented chat assistant for a portfolio site.
#[derive(Parser)]
#[command(name = "folio", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/folio.toml`; built-in defaults are used when
    /// that file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat HTTP server.
    ///
    /// Serves `POST /api/chat` (streamed answers) and `GET /health` on
    /// `[server].bind`.
    Serve,

    /// Rebuild the knowledge base.
    ///
    /// Embeds every profile block and notes section, clears the store, and
    /// inserts the new chunks.
    Seed,

    /// Show what the knowledge base holds.
    Verify {
        /// Number of sample chunks to print.
        #[arg(long, default_value_t = 3)]
        limit: usize,
    },

    /// Ask the assistant a question from the terminal.
    ///
    /// Without a message, starts an interactive session.
    Ask {
        /// Question to ask once.
        message: Option<String>,
    },
}

fn resolve_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            if default.exists() {
                config::load_config(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let cfg = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Seed => {
            seed::run_seed(&cfg).await?;
        }
        Commands::Verify { limit } => {
            verify::run_verify(&cfg, limit).await?;
        }
        Commands::Ask { message } => {
            session::run_ask(&cfg, message).await?;
        }
    }

    Ok(())
}
