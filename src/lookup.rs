use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::Result;

/// One way of matching an arbitrary identifier string against the accounts
/// table. Strategies are pure reads and independently testable; resolution
/// applies them in `STRATEGY_ORDER` and takes the first hit, no scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LookupStrategy {
    ById,
    ByEmail,
    ByTaxId,
    ByName,
    ByUsername,
    ByEmailPrefix,
}

pub const STRATEGY_ORDER: &[LookupStrategy] = &[
    LookupStrategy::ById,
    LookupStrategy::ByEmail,
    LookupStrategy::ByTaxId,
    LookupStrategy::ByName,
    LookupStrategy::ByUsername,
    LookupStrategy::ByEmailPrefix,
];

impl LookupStrategy {
    pub fn apply(&self, conn: &Connection, identifier: &str) -> Result<Option<String>> {
        match self {
            Self::ById => {
                // Only UUID-shaped identifiers can be ids.
                if Uuid::parse_str(identifier).is_err() {
                    return Ok(None);
                }
                query_id(conn, "SELECT id FROM accounts WHERE id = ?1", identifier)
            }
            Self::ByEmail => query_id(
                conn,
                "SELECT id FROM accounts WHERE email = ?1",
                &identifier.to_lowercase(),
            ),
            Self::ByTaxId => {
                let digits: String =
                    identifier.chars().filter(|c| c.is_ascii_digit()).collect();
                if digits.len() != 11 {
                    return Ok(None);
                }
                query_id(conn, "SELECT id FROM accounts WHERE tax_id = ?1", &digits)
            }
            Self::ByName => query_id(
                conn,
                "SELECT id FROM accounts WHERE name = ?1 COLLATE NOCASE",
                identifier,
            ),
            Self::ByUsername => {
                query_id(conn, "SELECT id FROM accounts WHERE username = ?1", identifier)
            }
            Self::ByEmailPrefix => query_id(
                conn,
                "SELECT id FROM accounts WHERE email LIKE ?1",
                &format!("{}%", identifier.to_lowercase()),
            ),
        }
    }
}

fn query_id(conn: &Connection, sql: &str, param: &str) -> Result<Option<String>> {
    Ok(conn.query_row(sql, [param], |row| row.get(0)).optional()?)
}

/// Find an account by an identifier of unknown type (id, email, tax id,
/// name, or username).
pub fn find_by_identifier(conn: &Connection, identifier: &str) -> Result<Option<String>> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Ok(None);
    }
    for strategy in STRATEGY_ORDER {
        if let Some(id) = strategy.apply(conn, identifier)? {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::models::NewAccount;
    use crate::store::create_account;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn add_account(
        conn: &Connection,
        name: &str,
        email: &str,
        tax_id: Option<&str>,
        username: Option<&str>,
    ) -> String {
        create_account(
            conn,
            &NewAccount {
                name: name.to_string(),
                email: email.to_string(),
                tax_id: tax_id.map(str::to_string),
                code: None,
                username: username.map(str::to_string),
                phone: None,
                sponsor_id: None,
                status: "active".to_string(),
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_by_id_requires_uuid_shape() {
        let (_dir, conn) = test_db();
        let id = add_account(&conn, "Ana", "ana@x.com", None, None);
        assert_eq!(LookupStrategy::ById.apply(&conn, &id).unwrap(), Some(id));
        assert_eq!(LookupStrategy::ById.apply(&conn, "Ana").unwrap(), None);
    }

    #[test]
    fn test_by_email_is_case_insensitive() {
        let (_dir, conn) = test_db();
        let id = add_account(&conn, "Ana", "ana@x.com", None, None);
        assert_eq!(
            LookupStrategy::ByEmail.apply(&conn, "ANA@X.COM").unwrap(),
            Some(id)
        );
    }

    #[test]
    fn test_by_tax_id_requires_eleven_digits() {
        let (_dir, conn) = test_db();
        let id = add_account(&conn, "Ana", "ana@x.com", Some("12345678901"), None);
        // Punctuation is stripped before matching.
        assert_eq!(
            LookupStrategy::ByTaxId.apply(&conn, "123.456.789-01").unwrap(),
            Some(id)
        );
        assert_eq!(LookupStrategy::ByTaxId.apply(&conn, "12345").unwrap(), None);
    }

    #[test]
    fn test_by_name_is_case_insensitive() {
        let (_dir, conn) = test_db();
        let id = add_account(&conn, "Ana Lima", "ana@x.com", None, None);
        assert_eq!(
            LookupStrategy::ByName.apply(&conn, "ana lima").unwrap(),
            Some(id)
        );
    }

    #[test]
    fn test_by_username_is_exact() {
        let (_dir, conn) = test_db();
        let id = add_account(&conn, "Ana", "ana@x.com", None, Some("alima"));
        assert_eq!(
            LookupStrategy::ByUsername.apply(&conn, "alima").unwrap(),
            Some(id)
        );
        assert_eq!(LookupStrategy::ByUsername.apply(&conn, "ALIMA").unwrap(), None);
    }

    #[test]
    fn test_by_email_prefix() {
        let (_dir, conn) = test_db();
        let id = add_account(&conn, "Ana", "alima@exemplo.com", None, None);
        assert_eq!(
            LookupStrategy::ByEmailPrefix.apply(&conn, "alima").unwrap(),
            Some(id)
        );
    }

    #[test]
    fn test_find_by_identifier_priority() {
        let (_dir, conn) = test_db();
        // "bruno" is one account's name and another's email prefix; the
        // name match comes first in strategy order.
        let by_name = add_account(&conn, "bruno", "outro@x.com", None, None);
        add_account(&conn, "Outra Pessoa", "bruno@x.com", None, None);
        assert_eq!(find_by_identifier(&conn, "bruno").unwrap(), Some(by_name));
    }

    #[test]
    fn test_find_by_identifier_empty_and_missing() {
        let (_dir, conn) = test_db();
        assert_eq!(find_by_identifier(&conn, "  ").unwrap(), None);
        assert_eq!(find_by_identifier(&conn, "ninguem").unwrap(), None);
    }
}
