//! # Briefwork CLI (`briefd`)
//!
//! The `briefd` binary is the primary interface for Briefwork. It provides
//! commands for database initialization, one-shot file analysis, document
//! drafting, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! briefd --config ./config/briefwork.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `briefd init` | Create the SQLite database and run schema migrations |
//! | `briefd analyze <file>` | Analyze a local file without persisting anything |
//! | `briefd draft <transcript>` | Draft a legal document from a transcript file |
//! | `briefd serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! briefd init --config ./config/briefwork.toml
//!
//! # Extract clauses from a contract
//! briefd analyze msa.pdf --kind clause_extraction
//!
//! # Ask a question about a document
//! briefd analyze lease.pdf --kind document_qa --question "When does the term end?"
//!
//! # Draft an engagement letter from a dictation transcript
//! briefd draft dictation.txt --document-type engagement_letter --title "Acme Engagement"
//!
//! # Start the HTTP server
//! briefd serve --config ./config/briefwork.toml
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use briefwork::completion::OpenAiClient;
use briefwork::config::{self, Config};
use briefwork::extract::extract;
use briefwork::fetch::Fetcher;
use briefwork::models::{AnalysisKind, SourceDocument};
use briefwork::pipeline::{DraftRequest, Pipeline};
use briefwork::store::MemoryStore;
use briefwork::store_sqlite::SqliteStore;
use briefwork::{migrate, server};

/// Briefwork CLI — AI-assisted legal document analysis.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/briefwork.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "briefd",
    about = "Briefwork — AI-assisted legal document analysis",
    version,
    long_about = "Briefwork fetches stored legal documents, extracts their text, runs them \
    through a completion API with per-kind prompts, and persists structured analysis results \
    (clauses, risks, compliance findings, summaries, answers) per document and analysis kind."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/briefwork.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents / analyses
    /// tables. This command is idempotent.
    Init,

    /// Analyze a local file without persisting anything.
    ///
    /// Extracts text from the file, runs the requested analysis, and
    /// prints the structured result as JSON.
    Analyze {
        /// Path to the document (PDF, txt, md).
        file: PathBuf,

        /// Analysis kind.
        #[arg(long, value_enum, default_value = "comprehensive")]
        kind: AnalysisKind,

        /// Question to answer (required for `document_qa`).
        #[arg(long)]
        question: Option<String>,
    },

    /// Draft a legal document from a dictation transcript.
    ///
    /// Reads the transcript file, drafts the document, stores it as a new
    /// inline-text document, and prints the draft.
    Draft {
        /// Path to the transcript text file.
        transcript: PathBuf,

        /// Document type: engagement_letter, nda, demand_letter, contract,
        /// memo, or custom.
        #[arg(long)]
        document_type: Option<String>,

        /// Title for the drafted document.
        #[arg(long)]
        title: Option<String>,
    },

    /// Start the JSON HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// analysis API endpoints.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let cfg = config::load_config(&cli.config)?;
            let store = SqliteStore::connect(&cfg.db).await?;
            migrate::run_migrations(store.pool()).await?;
            println!("Database initialized successfully.");
        }
        Commands::Analyze {
            file,
            kind,
            question,
        } => {
            // One-shot runs work without a config file.
            let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
            let pipeline = ephemeral_pipeline(&cfg)?;

            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let doc = SourceDocument {
                id: "cli".to_string(),
                storage: None,
                mime_type: "application/octet-stream".to_string(),
                original_name: name.clone(),
                byte_size: bytes.len() as i64,
                text_content: None,
            };
            let content = extract(&doc, &bytes);

            let result = pipeline
                .analyze_text(kind, &content.text, question.as_deref(), &name)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Draft {
            transcript,
            document_type,
            title,
        } => {
            let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
            let pipeline = ephemeral_pipeline(&cfg)?;

            let text = std::fs::read_to_string(&transcript)
                .with_context(|| format!("failed to read {}", transcript.display()))?;
            let outcome = pipeline
                .draft(DraftRequest {
                    transcript: text,
                    document_type,
                    title,
                })
                .await?;
            println!("# {}\n\n{}", outcome.title, outcome.content);
        }
        Commands::Serve => {
            let cfg = config::load_config(&cli.config)?;
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

/// Pipeline over an in-memory store, for commands that never touch SQLite.
fn ephemeral_pipeline(cfg: &Config) -> anyhow::Result<Pipeline> {
    let fetcher = Fetcher::new(
        &cfg.storage,
        Duration::from_secs(cfg.analysis.fetch_timeout_secs),
    );
    let llm = Arc::new(OpenAiClient::new(&cfg.completion)?);
    Ok(Pipeline::new(
        Arc::new(MemoryStore::new()),
        fetcher,
        llm,
        cfg.completion.clone(),
        cfg.analysis.clone(),
    ))
}
