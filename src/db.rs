use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    tax_id TEXT,
    code TEXT UNIQUE,
    username TEXT UNIQUE,
    phone TEXT,
    sponsor_id TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (sponsor_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS wallets (
    id INTEGER PRIMARY KEY,
    account_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    balance REAL NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    created_count INTEGER,
    updated_count INTEGER,
    checksum TEXT
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Delete every imported row from the network tables. Wallets go first so
/// the foreign key on accounts holds during the wipe.
pub fn reset_network(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM wallets", [])?;
    conn.execute("DELETE FROM imports", [])?;
    conn.execute("UPDATE accounts SET sponsor_id = NULL", [])?;
    conn.execute("DELETE FROM accounts", [])?;
    Ok(())
}
