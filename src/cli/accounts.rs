use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::settings::get_data_dir;

pub fn list() -> Result<()> {
    let conn = get_connection(&get_data_dir().join("downline.db"))?;
    let mut stmt = conn.prepare(
        "SELECT a.code, a.name, a.username, a.email, s.name, a.status \
         FROM accounts a LEFT JOIN accounts s ON a.sponsor_id = s.id \
         ORDER BY a.created_at, a.rowid",
    )?;
    let rows: Vec<(Option<String>, String, Option<String>, String, Option<String>, String)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["Code", "Name", "Username", "Email", "Sponsor", "Status"]);
    for (code, name, username, email, sponsor, status) in rows {
        table.add_row(vec![
            Cell::new(code.unwrap_or_default()),
            Cell::new(name),
            Cell::new(username.unwrap_or_default()),
            Cell::new(email),
            Cell::new(sponsor.unwrap_or_default()),
            Cell::new(status),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}
