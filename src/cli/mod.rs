pub mod accounts;
pub mod import;
pub mod init;
pub mod status;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "downline",
    about = "Referral-network spreadsheet importer for multi-level sales organizations."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up downline: choose a data directory and initialize the database.
    Init {
        /// Path for downline data (default: ~/Documents/downline)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Import a network spreadsheet (XLSX/CSV) and resolve sponsor links.
    Import {
        /// Path to the spreadsheet (default: the configured import_file)
        file: Option<String>,
        /// Delete all imported network data before importing
        #[arg(long)]
        reset: bool,
    },
    /// Manage imported accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Show current database and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// List all accounts with their sponsor links.
    List,
}
