//! # Raggate CLI (`raggate`)
//!
//! The `raggate` binary drives the chat backend: database setup, corpus
//! ingestion, user management, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! raggate --config ./config/raggate.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `raggate init` | Create the SQLite database and run schema migrations |
//! | `raggate ingest` | Scan, chunk, embed, and index the document corpus |
//! | `raggate serve` | Start the HTTP API server |
//! | `raggate user add <name> <password> <role>` | Create an account |
//! | `raggate user remove <name>` | Delete an account |
//! | `raggate user list` | List accounts (without credentials) |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use raggate::{config, db, ingest, migrate, server, users};

/// Raggate, a retrieval-augmented chat backend with role-based access
/// control.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/raggate.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "raggate",
    about = "Raggate, a retrieval-augmented chat backend with role-based access control",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/raggate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the records and users tables.
    /// This command is idempotent.
    Init,

    /// Ingest the document corpus.
    ///
    /// Scans the corpus root, chunks and embeds every readable file, and
    /// upserts the results into the vector index. Re-running over an
    /// unchanged corpus overwrites prior records instead of duplicating
    /// them.
    Ingest,

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// chat, ingestion, and user management endpoints.
    Serve,

    /// Manage user accounts.
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

/// User management subcommands.
#[derive(Subcommand)]
enum UserAction {
    /// Create an account.
    Add {
        username: String,
        password: String,
        /// Access role; also the corpus subdirectory this user can read.
        role: String,
    },
    /// Delete an account.
    Remove { username: String },
    /// List accounts (usernames and roles only).
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest => {
            ingest::run_ingest_command(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::User { action } => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            let store = users::UserStore::new(pool.clone());

            match action {
                UserAction::Add {
                    username,
                    password,
                    role,
                } => {
                    store.add_user(&username, &password, &role).await?;
                    println!("user '{}' created with role '{}'", username, role);
                }
                UserAction::Remove { username } => {
                    store.delete_user(&username).await?;
                    println!("user '{}' deleted", username);
                }
                UserAction::List => {
                    let all = store.list_users().await?;
                    if all.is_empty() {
                        println!("no users");
                    }
                    for user in all {
                        println!("{}  {}", user.username, user.role);
                    }
                }
            }

            pool.close().await;
        }
    }

    Ok(())
}
