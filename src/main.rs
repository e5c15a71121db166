//! # Roster CLI (`roster`)
//!
//! The `roster` binary manages the local attendee collection, runs AI
//! searches against the ranking proxy and serves the JSON API.
//!
//! ## Usage
//!
//! ```bash
//! roster --config ./config/roster.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `roster init` | Create the SQLite database |
//! | `roster add [FILE]` | Add one profile (stdin when FILE is omitted) |
//! | `roster list` | Filtered, sorted listing |
//! | `roster show <id>` | Full profile card |
//! | `roster remove <id>` | Delete one profile |
//! | `roster import <file>` | Merge a JSON array of profiles |
//! | `roster export` | Write the collection to a JSON file |
//! | `roster clear --yes` | Delete every profile |
//! | `roster schools` | Distinct schools |
//! | `roster stats` | Collection summary |
//! | `roster model [id]` | Show or set the ranking model |
//! | `roster search "<query>"` | AI search |
//! | `roster sync` | Batched backup to the sync endpoint |
//! | `roster serve` | Start the HTTP API |
//!
//! Logs go to stderr; set `RUST_LOG=roster=debug` for more detail.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roster::filter::{ListQuery, SortKey};
use roster::search::OutputFormat;
use roster::{attendees, config, export, migrate, search, server, stats, sync};

/// Roster CLI — a local-first attendee profile store with AI search.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/roster.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "roster",
    about = "Roster — a local-first attendee profile store with AI search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/roster.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it again keeps existing data.
    Init,

    /// Add one profile from a JSON file or stdin.
    ///
    /// Rejected when a stored profile has the same `url`.
    Add {
        /// Profile JSON file. Reads stdin when omitted.
        file: Option<PathBuf>,

        /// School/category; replaces any value in the JSON.
        #[arg(long)]
        school: Option<String>,

        /// Profile image URL; used only when the JSON has none.
        #[arg(long)]
        image: Option<String>,
    },

    /// List profiles.
    List {
        /// Case-insensitive text filter over name, headline, school and
        /// experience.
        #[arg(long, short)]
        query: Option<String>,

        /// Exact school filter.
        #[arg(long)]
        school: Option<String>,

        /// Sort order: name, school, or recent.
        #[arg(long, default_value = "name")]
        sort: String,

        /// Print card markup instead of one line per profile.
        #[arg(long)]
        html: bool,
    },

    /// Show one profile in full.
    Show {
        id: String,

        #[arg(long)]
        html: bool,
    },

    /// Remove one profile. Unknown ids are not an error.
    Remove { id: String },

    /// Merge profiles from a JSON array file, skipping known URLs.
    Import { file: PathBuf },

    /// Write the collection as pretty-printed JSON.
    Export {
        /// Output path. Defaults to `attendees-database-YYYY-MM-DD.json`.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Delete every profile.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },

    /// List distinct schools.
    Schools,

    /// Show collection statistics.
    Stats,

    /// Show the selected ranking model, or select a new one.
    Model { id: Option<String> },

    /// Ask the ranking model a free-text question about the collection.
    Search {
        query: String,

        /// Model for this search only; the stored selection is unchanged.
        #[arg(long)]
        model: Option<String>,

        /// Print the outcome as JSON.
        #[arg(long, conflicts_with = "html")]
        json: bool,

        /// Print result cards as HTML.
        #[arg(long)]
        html: bool,
    },

    /// Post the collection to the configured sync endpoint in batches.
    Sync,

    /// Start the HTTP API on `[server] bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add { file, school, image } => {
            attendees::run_add(&cfg, file.as_deref(), school.as_deref(), image.as_deref()).await?;
        }
        Commands::List {
            query,
            school,
            sort,
            html,
        } => {
            let query = ListQuery {
                text: query.unwrap_or_default(),
                school: school.unwrap_or_default(),
                sort: SortKey::parse(&sort),
            };
            attendees::run_list(&cfg, &query, html).await?;
        }
        Commands::Show { id, html } => {
            attendees::run_show(&cfg, &id, html).await?;
        }
        Commands::Remove { id } => {
            attendees::run_remove(&cfg, &id).await?;
        }
        Commands::Import { file } => {
            export::run_import(&cfg, &file).await?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref()).await?;
        }
        Commands::Clear { yes } => {
            attendees::run_clear(&cfg, yes).await?;
        }
        Commands::Schools => {
            attendees::run_schools(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Model { id } => {
            search::run_model(&cfg, id.as_deref()).await?;
        }
        Commands::Search {
            query,
            model,
            json,
            html,
        } => {
            let format = if json {
                OutputFormat::Json
            } else if html {
                OutputFormat::Html
            } else {
                OutputFormat::Text
            };
            search::run_search(&cfg, &query, model.as_deref(), format).await?;
        }
        Commands::Sync => {
            sync::run_sync(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
