use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "till")]
#[command(about = "Scan, sell and keep stock in sync, online or not")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOptions,
}

#[derive(Args, Clone, Debug, Default)]
pub struct GlobalOptions {
    /// Path to the local store (defaults to TILL_DB_PATH or the data dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Backend base URL (defaults to TILL_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Work from the local store only and queue writes
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Browse and edit products
    Products {
        #[command(subcommand)]
        command: ProductCommands,
    },
    /// Record and list sales
    Sales {
        #[command(subcommand)]
        command: SalesCommands,
    },
    /// Show the backend's inventory change log
    Changes {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay queued writes against the backend
    Sync,
    /// Stay running: probe the backend and replay whenever it comes back
    Watch,
    /// List writes waiting to be replayed
    Queue {
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
pub enum ProductCommands {
    /// List products, optionally filtered by name
    List {
        /// Case-insensitive name filter
        #[arg(short, long)]
        query: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Look up one product by barcode
    Get {
        barcode: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create or update a product
    Upsert {
        #[arg(long)]
        barcode: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        price: f64,
        #[arg(long, default_value = "0")]
        stock: u32,
    },
}

#[derive(Subcommand)]
pub enum SalesCommands {
    /// List recent sales
    List {
        /// Number of sales to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check out scanned items: --item BARCODE[:QTY] (repeatable)
    Record {
        #[arg(long = "item", value_name = "BARCODE[:QTY]", required = true)]
        items: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}
