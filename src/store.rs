use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{DownlineError, Result};
use crate::models::{Account, NewAccount};

const ACCOUNT_COLUMNS: &str = "id, name, email, tax_id, code, username, phone, sponsor_id, status";

fn account_from_row(row: &rusqlite::Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        tax_id: row.get(3)?,
        code: row.get(4)?,
        username: row.get(5)?,
        phone: row.get(6)?,
        sponsor_id: row.get(7)?,
        status: row.get(8)?,
    })
}

fn find_by(conn: &Connection, where_clause: &str, param: &str) -> Result<Option<Account>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {where_clause}");
    Ok(conn.query_row(&sql, [param], account_from_row).optional()?)
}

pub fn find_by_code(conn: &Connection, code: &str) -> Result<Option<Account>> {
    find_by(conn, "code = ?1", code)
}

pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<Account>> {
    find_by(conn, "username = ?1", username)
}

/// Emails are stored lowercased, so lookups fold case first.
pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<Account>> {
    find_by(conn, "email = ?1", &email.trim().to_lowercase())
}

#[allow(dead_code)]
pub fn get_account(conn: &Connection, id: &str) -> Result<Option<Account>> {
    find_by(conn, "id = ?1", id)
}

pub fn sponsor_of(conn: &Connection, id: &str) -> Result<Option<String>> {
    let sponsor: Option<Option<String>> = conn
        .query_row("SELECT sponsor_id FROM accounts WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(sponsor.flatten())
}

/// Insert a new account under a fresh v4 id. A unique-constraint hit on
/// email, code, or username surfaces as `DuplicateKey` so callers can treat
/// it as a row-local failure rather than a database fault.
pub fn create_account(conn: &Connection, new: &NewAccount) -> Result<Account> {
    let id = Uuid::new_v4().to_string();
    let email = new.email.trim().to_lowercase();
    let result = conn.execute(
        "INSERT INTO accounts (id, name, email, tax_id, code, username, phone, sponsor_id, status) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            id,
            new.name,
            email,
            new.tax_id,
            new.code,
            new.username,
            new.phone,
            new.sponsor_id,
            new.status,
        ],
    );
    match result {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(DownlineError::DuplicateKey(msg.unwrap_or(email)));
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Account {
        id,
        name: new.name.clone(),
        email,
        tax_id: new.tax_id.clone(),
        code: new.code.clone(),
        username: new.username.clone(),
        phone: new.phone.clone(),
        sponsor_id: new.sponsor_id.clone(),
        status: new.status.clone(),
    })
}

pub fn set_sponsor(conn: &Connection, id: &str, sponsor_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET sponsor_id = ?1 WHERE id = ?2",
        rusqlite::params![sponsor_id, id],
    )?;
    Ok(())
}

/// Back-fill the well-known code/username onto an account that predates them.
pub fn set_well_known_identity(conn: &Connection, id: &str, code: &str, username: &str) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET code = ?1, username = ?2 WHERE id = ?3",
        rusqlite::params![code, username, id],
    )?;
    Ok(())
}

pub fn create_wallet(conn: &Connection, account_id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO wallets (account_id, status, balance) VALUES (?1, 'active', 0)",
        [account_id],
    )?;
    Ok(())
}

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Audit record for one import run. Never consulted to block a re-run; the
/// resolver is idempotent on its own.
pub fn record_import(
    conn: &Connection,
    filename: &str,
    record_count: usize,
    created: usize,
    updated: usize,
    checksum: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO imports (filename, record_count, created_count, updated_count, checksum) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            filename,
            record_count as i64,
            created as i64,
            updated as i64,
            checksum,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn new_account(name: &str, email: &str) -> NewAccount {
        NewAccount {
            name: name.to_string(),
            email: email.to_string(),
            tax_id: None,
            code: None,
            username: None,
            phone: None,
            sponsor_id: None,
            status: "active".to_string(),
        }
    }

    #[test]
    fn test_create_account_assigns_uuid() {
        let (_dir, conn) = test_db();
        let account = create_account(&conn, &new_account("Ana", "ana@x.com")).unwrap();
        assert!(uuid::Uuid::parse_str(&account.id).is_ok());
        let found = find_by_email(&conn, "ana@x.com").unwrap().unwrap();
        assert_eq!(found.id, account.id);
    }

    #[test]
    fn test_create_account_lowercases_email() {
        let (_dir, conn) = test_db();
        let account = create_account(&conn, &new_account("Ana", "ANA@X.com")).unwrap();
        assert_eq!(account.email, "ana@x.com");
        assert!(find_by_email(&conn, "Ana@X.COM").unwrap().is_some());
    }

    #[test]
    fn test_duplicate_email_is_duplicate_key() {
        let (_dir, conn) = test_db();
        create_account(&conn, &new_account("Ana", "ana@x.com")).unwrap();
        let err = create_account(&conn, &new_account("Other", "ana@x.com")).unwrap_err();
        assert!(matches!(err, DownlineError::DuplicateKey(_)), "got: {err}");
    }

    #[test]
    fn test_duplicate_username_is_duplicate_key() {
        let (_dir, conn) = test_db();
        let mut a = new_account("Ana", "ana@x.com");
        a.username = Some("ana".to_string());
        create_account(&conn, &a).unwrap();
        let mut b = new_account("Another", "other@x.com");
        b.username = Some("ana".to_string());
        let err = create_account(&conn, &b).unwrap_err();
        assert!(matches!(err, DownlineError::DuplicateKey(_)));
    }

    #[test]
    fn test_find_by_code_and_username() {
        let (_dir, conn) = test_db();
        let mut a = new_account("Ana", "ana@x.com");
        a.code = Some("1001".to_string());
        a.username = Some("alima".to_string());
        let created = create_account(&conn, &a).unwrap();
        assert_eq!(find_by_code(&conn, "1001").unwrap().unwrap().id, created.id);
        assert_eq!(find_by_username(&conn, "alima").unwrap().unwrap().id, created.id);
        assert!(find_by_code(&conn, "9999").unwrap().is_none());
    }

    #[test]
    fn test_set_sponsor_and_sponsor_of() {
        let (_dir, conn) = test_db();
        let root = create_account(&conn, &new_account("Root", "root@x.com")).unwrap();
        let child = create_account(&conn, &new_account("Child", "child@x.com")).unwrap();
        assert_eq!(sponsor_of(&conn, &child.id).unwrap(), None);
        set_sponsor(&conn, &child.id, &root.id).unwrap();
        assert_eq!(sponsor_of(&conn, &child.id).unwrap(), Some(root.id));
        assert_eq!(sponsor_of(&conn, "missing").unwrap(), None);
    }

    #[test]
    fn test_set_well_known_identity() {
        let (_dir, conn) = test_db();
        let account = create_account(&conn, &new_account("Root", "root@x.com")).unwrap();
        set_well_known_identity(&conn, &account.id, "7777", "root").unwrap();
        let found = find_by_code(&conn, "7777").unwrap().unwrap();
        assert_eq!(found.username.as_deref(), Some("root"));
    }

    #[test]
    fn test_create_wallet() {
        let (_dir, conn) = test_db();
        let account = create_account(&conn, &new_account("Ana", "ana@x.com")).unwrap();
        create_wallet(&conn, &account.id).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM wallets WHERE account_id = ?1",
                [&account.id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_record_import() {
        let (_dir, conn) = test_db();
        record_import(&conn, "rede.xlsx", 10, 7, 3, "abc123").unwrap();
        let (filename, records): (String, i64) = conn
            .query_row("SELECT filename, record_count FROM imports", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(filename, "rede.xlsx");
        assert_eq!(records, 10);
    }

    #[test]
    fn test_compute_checksum_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.csv");
        std::fs::write(&path, "Nome\nAna\n").unwrap();
        let a = compute_checksum(&path).unwrap();
        let b = compute_checksum(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
