mod cli;
mod db;
mod error;
mod lookup;
mod models;
mod resolver;
mod settings;
mod sheet;
mod store;

use clap::Parser;

use cli::{AccountsCommands, Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Import { file, reset } => cli::import::run(file.as_deref(), reset),
        Commands::Accounts { command } => match command {
            AccountsCommands::List => cli::accounts::list(),
        },
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
