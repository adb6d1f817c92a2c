use std::path::PathBuf;

use colored::Colorize;

use crate::db::{get_connection, init_db, reset_network};
use crate::error::{DownlineError, Result};
use crate::resolver::run_import;
use crate::settings::{get_data_dir, load_settings};
use crate::sheet::read_rows;
use crate::store::{compute_checksum, record_import};

pub fn run(file: Option<&str>, reset: bool) -> Result<()> {
    let settings = load_settings();
    let file = match file {
        Some(f) => f.to_string(),
        None if !settings.import_file.is_empty() => settings.import_file.clone(),
        None => {
            return Err(DownlineError::Settings(
                "no file given and no import_file configured".to_string(),
            ))
        }
    };
    let file_path = PathBuf::from(&file);
    if !file_path.exists() {
        return Err(DownlineError::MissingFile(file));
    }

    let conn = get_connection(&get_data_dir().join("downline.db"))?;
    init_db(&conn)?;

    if reset {
        reset_network(&conn)?;
        println!("Existing network data cleared.");
    }

    let rows = read_rows(&file_path)?;
    println!("Read {} rows from {}", rows.len(), file_path.display());

    let report = run_import(&conn, &rows)?;

    let checksum = compute_checksum(&file_path)?;
    record_import(
        &conn,
        file_path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
        report.total,
        report.created,
        report.updated,
        &checksum,
    )?;

    println!("\n{}", "Import report".bold());
    println!("Total rows: {}", report.total);
    println!("Created:    {}", report.created.to_string().green());
    println!("Updated:    {}", report.updated);
    println!("Skipped:    {}", report.skipped);
    if report.errors > 0 {
        println!("Errors:     {}", report.errors.to_string().red());
    } else {
        println!("Errors:     0");
    }
    if !report.details.is_empty() {
        println!("\n{}", "Details".bold());
        for detail in &report.details {
            println!("  {}", detail.yellow());
        }
    }
    Ok(())
}
