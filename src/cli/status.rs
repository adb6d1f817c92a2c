use rusqlite::OptionalExtension;

use crate::db::get_connection;
use crate::error::Result;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join("downline.db");

    println!("Data dir:    {}", data_dir.display());
    println!("Database:    {}", db_path.display());
    println!(
        "Import file: {}",
        if settings.import_file.is_empty() { "(not set)" } else { &settings.import_file }
    );

    if db_path.exists() {
        let conn = get_connection(&db_path)?;
        let accounts: i64 = conn.query_row("SELECT count(*) FROM accounts", [], |r| r.get(0))?;
        let wallets: i64 = conn.query_row("SELECT count(*) FROM wallets", [], |r| r.get(0))?;
        let without_sponsor: i64 = conn.query_row(
            "SELECT count(*) FROM accounts WHERE sponsor_id IS NULL",
            [],
            |r| r.get(0),
        )?;
        let imports: i64 = conn.query_row("SELECT count(*) FROM imports", [], |r| r.get(0))?;
        let last_import: Option<String> = conn
            .query_row(
                "SELECT import_date FROM imports ORDER BY id DESC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .optional()?;

        println!();
        println!("Accounts:        {accounts}");
        println!("Wallets:         {wallets}");
        println!("Without sponsor: {without_sponsor}");
        println!("Imports:         {imports}");
        if let Some(date) = last_import {
            println!("Last import:     {date}");
        }
    } else {
        println!();
        println!("Database not found. Run `downline init` to set up.");
    }

    Ok(())
}
