use std::path::PathBuf;

use casework_core::Domain;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "casework")]
#[command(about = "Queue case artifacts offline and sync them when the network allows")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local store file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue a new artifact for a victim (works offline)
    Enqueue {
        #[command(subcommand)]
        artifact: EnqueueCommands,
    },
    /// List queued artifacts
    #[command(alias = "ls")]
    Pending {
        /// Only show one domain
        #[arg(long)]
        domain: Option<Domain>,
        /// Only show artifacts for this victim
        #[arg(long, value_name = "ID")]
        victim: Option<String>,
        /// Include artifacts that already synced
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a queued artifact
    Cancel {
        /// Artifact domain (contracts, photos, documents, surveys)
        domain: Domain,
        /// Local artifact ID
        id: i64,
    },
    /// Drain every domain once
    Sync {
        /// Treat the network as unavailable
        #[arg(long)]
        offline: bool,
    },
    /// Keep syncing in the background until interrupted
    Watch {
        /// Override the sync interval in seconds
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Read a remote resource through the local cache
    Fetch {
        /// Resource path, e.g. `victime`
        resource: String,
        /// Fetch a single item by ID
        #[arg(long)]
        id: Option<String>,
        /// Maximum age in minutes before an entry counts as stale
        #[arg(long, default_value = "5", value_name = "MINUTES")]
        max_age: u64,
        /// Serve a fresh cache entry without fetching
        #[arg(long)]
        cache_first: bool,
        /// Treat the network as unavailable
        #[arg(long)]
        offline: bool,
    },
    /// Manage cached remote reads
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Show pending counts and last sync per domain
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum EnqueueCommands {
    /// Signed contract with its payment schedule
    Contract {
        /// Victim ID
        #[arg(long, value_name = "ID")]
        victim: String,
        /// Payment tranche, repeatable
        #[arg(long = "tranche", value_name = "LABEL:AMOUNT_CENTS:YYYY-MM-DD")]
        tranches: Vec<String>,
        /// Victim accepted the terms
        #[arg(long)]
        consent_terms: bool,
        /// Victim accepted data sharing
        #[arg(long)]
        consent_data_sharing: bool,
        /// Signature image
        #[arg(long, value_name = "PATH")]
        signature: Option<PathBuf>,
        /// Extra form field forwarded as-is, repeatable
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Profile photo for a victim
    Photo {
        /// Victim ID
        #[arg(long, value_name = "ID")]
        victim: String,
        /// Image file
        path: PathBuf,
    },
    /// Document added to a victim's file
    Document {
        /// Victim ID
        #[arg(long, value_name = "ID")]
        victim: String,
        /// Document label
        #[arg(long)]
        label: String,
        /// ID of the user capturing the document
        #[arg(long, value_name = "ID")]
        user: String,
        /// Document file
        path: PathBuf,
    },
    /// Questionnaire answers
    Survey {
        /// Victim ID
        #[arg(long, value_name = "ID")]
        victim: String,
        /// Questionnaire ID
        #[arg(long, value_name = "ID")]
        questionnaire: String,
        /// Answers as JSON, or @PATH to read them from a file
        #[arg(long, value_name = "JSON")]
        answers: String,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Remove one cached entry, or all of them
    Clear {
        /// Cache key (resource path); clears everything when omitted
        key: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
