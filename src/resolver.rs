use std::collections::{HashMap, HashSet};

use rusqlite::Connection;

use crate::error::{DownlineError, Result};
use crate::lookup::find_by_identifier;
use crate::models::{ImportRow, NewAccount};
use crate::store;

// Well-known identity of the top-of-hierarchy account. Every unresolvable
// or circular sponsor reference falls back to this account.
const ROOT_CODE: &str = "7838667";
const ROOT_USERNAME: &str = "rsprolipsi";
const ROOT_EMAIL: &str = "rsprolipsioficial@gmail.com";
const ROOT_NAME: &str = "RS Prólipsi";

/// Domain for emails synthesized when a row has none.
const PLACEHOLDER_EMAIL_DOMAIN: &str = "prolipsi.temp";

#[derive(Debug, Default)]
pub struct ImportReport {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub details: Vec<String>,
}

/// Transient state for one import run.
///
/// `processed` memoizes rows already resolved, `in_progress` is the
/// recursion stack that detects circular sponsor chains, and
/// `created_by_key` remembers which accounts this run created so the fix-up
/// pass can re-resolve their sponsor links.
pub struct ImportSession<'a> {
    conn: &'a Connection,
    root_id: String,
    /// Every identifying value (email, name, code, username, lowercased)
    /// of every input row, so a sponsor reference can point at a row of the
    /// same file that is not in the store yet.
    row_by_ident: HashMap<String, usize>,
    processed: HashSet<String>,
    in_progress: HashSet<String>,
    created_by_key: HashMap<String, String>,
    /// Synthesized emails, cached per row index so a row keeps the same
    /// resolution key across recursive and top-level visits.
    placeholder_emails: HashMap<usize, String>,
    report: ImportReport,
}

/// Resolve every row against the store: create missing accounts (sponsors
/// first, depth-first), match existing ones, then run the fix-up pass over
/// newly created accounts. Row-local failures are counted and reported;
/// only a missing root aborts the run.
pub fn run_import(conn: &Connection, rows: &[ImportRow]) -> Result<ImportReport> {
    let root_id = ensure_root(conn)?;
    let mut session = ImportSession::new(conn, root_id, rows);
    session.report.total = rows.len();

    for idx in 0..rows.len() {
        if !rows[idx].has_name() {
            session.report.skipped += 1;
            continue;
        }
        session.resolve(rows, idx);
    }

    session.fix_up(rows);
    Ok(session.report)
}

/// Locate the root account by its well-known code, falling back to its
/// email (back-filling code/username), and finally creating it. Everything
/// downstream depends on the root existing, so failure here is fatal.
fn ensure_root(conn: &Connection) -> Result<String> {
    if let Some(account) = store::find_by_code(conn, ROOT_CODE)? {
        return Ok(account.id);
    }
    if let Some(account) = store::find_by_email(conn, ROOT_EMAIL)? {
        store::set_well_known_identity(conn, &account.id, ROOT_CODE, ROOT_USERNAME)?;
        return Ok(account.id);
    }
    let root = store::create_account(
        conn,
        &NewAccount {
            name: ROOT_NAME.to_string(),
            email: ROOT_EMAIL.to_string(),
            tax_id: Some(placeholder_tax_id()),
            code: Some(ROOT_CODE.to_string()),
            username: Some(ROOT_USERNAME.to_string()),
            phone: None,
            sponsor_id: None,
            status: "active".to_string(),
        },
    )
    .map_err(|_| DownlineError::RootUnavailable)?;
    if let Err(e) = store::create_wallet(conn, &root.id) {
        eprintln!("Wallet creation failed for root account: {e}");
    }
    Ok(root.id)
}

impl<'a> ImportSession<'a> {
    fn new(conn: &'a Connection, root_id: String, rows: &[ImportRow]) -> Self {
        let mut row_by_ident = HashMap::new();
        for (idx, row) in rows.iter().enumerate() {
            for ident in [&row.email, &row.name, &row.code, &row.username] {
                if let Some(value) = ident.as_deref() {
                    let value = value.trim().to_lowercase();
                    if !value.is_empty() {
                        row_by_ident.insert(value, idx);
                    }
                }
            }
        }
        Self {
            conn,
            root_id,
            row_by_ident,
            processed: HashSet::new(),
            in_progress: HashSet::new(),
            created_by_key: HashMap::new(),
            placeholder_emails: HashMap::new(),
            report: ImportReport::default(),
        }
    }

    /// Resolve one row to its account id, creating the account if needed.
    /// Recurses into sponsor rows of the same file before creating the
    /// child, so upline chains come out in dependency order.
    fn resolve(&mut self, rows: &[ImportRow], idx: usize) -> Option<String> {
        let row = &rows[idx];
        let Some(name) = row.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
            return None;
        };
        let email = self.row_email(row, idx);
        let key = self.row_key(row, idx);

        if self.processed.contains(&key) {
            return match store::find_by_email(self.conn, &email) {
                Ok(Some(account)) => Some(account.id),
                _ => None,
            };
        }
        if self.in_progress.contains(&key) {
            eprintln!("Circular sponsor reference at '{key}'; linking to root.");
            self.report
                .details
                .push(format!("Circular sponsor reference at '{key}'; linked to root"));
            return Some(self.root_id.clone());
        }
        self.in_progress.insert(key.clone());

        // An account already in the store wins over creation: by code,
        // then username, then email.
        match self.find_existing(row, &email) {
            Ok(Some(id)) => {
                self.report.updated += 1;
                self.finish(&key);
                return Some(id);
            }
            Ok(None) => {}
            Err(e) => {
                self.fail(&key, format!("Lookup failed for {email}: {e}"));
                return None;
            }
        }

        let sponsor_id = match self.resolve_sponsor(rows, row, &email) {
            Ok(id) => id,
            Err(e) => {
                self.fail(&key, format!("Sponsor lookup failed for {email}: {e}"));
                return None;
            }
        };

        let new = NewAccount {
            name: name.to_string(),
            email: email.clone(),
            tax_id: Some(clean_tax_id(row.tax_id.as_deref())),
            code: row.code.clone(),
            username: row.username.clone(),
            phone: row.phone.as_deref().map(digits_only).filter(|p| !p.is_empty()),
            sponsor_id: Some(sponsor_id),
            status: "active".to_string(),
        };
        match store::create_account(self.conn, &new) {
            Ok(account) => {
                if let Err(e) = store::create_wallet(self.conn, &account.id) {
                    eprintln!("Wallet creation failed for {email}: {e}");
                }
                self.created_by_key.insert(key.clone(), account.id.clone());
                self.report.created += 1;
                self.finish(&key);
                Some(account.id)
            }
            Err(e) => {
                self.fail(&key, format!("Could not create account for {email}: {e}"));
                None
            }
        }
    }

    /// Second chance for sponsor links: a sponsor appearing later in the
    /// file exists by now, so re-resolve every account created in this run
    /// and update its link when a match is found, unless that link would
    /// close a sponsor cycle.
    fn fix_up(&mut self, rows: &[ImportRow]) {
        for (idx, row) in rows.iter().enumerate() {
            if !row.has_name() {
                continue;
            }
            let key = self.row_key(row, idx);
            let Some(account_id) = self.created_by_key.get(&key).cloned() else {
                continue;
            };
            let email = self.row_email(row, idx);
            if let Err(e) = self.fix_row(row, &account_id, &email) {
                self.report.errors += 1;
                self.report
                    .details
                    .push(format!("Sponsor fix-up failed for {email}: {e}"));
            }
        }
    }

    fn fix_row(&mut self, row: &ImportRow, account_id: &str, email: &str) -> Result<()> {
        let mut sponsor_id = self.root_id.clone();
        if let Some(reference) = row.sponsor_reference() {
            let found = match find_by_identifier(self.conn, reference)? {
                Some(id) => Some(id),
                None => match store::find_by_code(self.conn, reference)? {
                    Some(account) => Some(account.id),
                    None => self
                        .created_by_key
                        .get(reference)
                        .or_else(|| self.created_by_key.get(&reference.to_lowercase()))
                        .cloned(),
                },
            };
            if let Some(id) = found {
                if self.would_create_cycle(account_id, &id)? {
                    self.report.details.push(format!(
                        "Sponsor fix-up for {email} skipped; would close a sponsor cycle"
                    ));
                    return Ok(());
                }
                sponsor_id = id;
            }
        }
        store::set_sponsor(self.conn, account_id, &sponsor_id)
    }

    /// Walk the candidate's sponsor chain; if it reaches the account being
    /// re-linked, attaching the candidate would make the chain circular.
    fn would_create_cycle(&self, account_id: &str, candidate: &str) -> Result<bool> {
        let mut visited = HashSet::new();
        let mut current = Some(candidate.to_string());
        while let Some(id) = current {
            if id == account_id {
                return Ok(true);
            }
            if id == self.root_id || !visited.insert(id.clone()) {
                return Ok(false);
            }
            current = store::sponsor_of(self.conn, &id)?;
        }
        Ok(false)
    }

    fn find_existing(&self, row: &ImportRow, email: &str) -> Result<Option<String>> {
        if let Some(code) = row.code.as_deref() {
            if let Some(account) = store::find_by_code(self.conn, code)? {
                return Ok(Some(account.id));
            }
        }
        if let Some(username) = row.username.as_deref() {
            if let Some(account) = store::find_by_username(self.conn, username)? {
                return Ok(Some(account.id));
            }
        }
        Ok(store::find_by_email(self.conn, email)?.map(|a| a.id))
    }

    /// Resolve the row's sponsor reference to an account id: first the
    /// store (all identifier types), then other rows of this same import,
    /// recursively. Unresolvable references fall back to root with a
    /// diagnostic.
    fn resolve_sponsor(&mut self, rows: &[ImportRow], row: &ImportRow, email: &str) -> Result<String> {
        let Some(reference) = row.sponsor_reference() else {
            return Ok(self.root_id.clone());
        };
        if let Some(id) = self.find_sponsor(rows, reference)? {
            return Ok(id);
        }
        self.report
            .details
            .push(format!("Sponsor '{reference}' not found for {email}; linked to root"));
        Ok(self.root_id.clone())
    }

    fn find_sponsor(&mut self, rows: &[ImportRow], reference: &str) -> Result<Option<String>> {
        if let Some(id) = find_by_identifier(self.conn, reference)? {
            return Ok(Some(id));
        }
        if let Some(account) = store::find_by_code(self.conn, reference)? {
            return Ok(Some(account.id));
        }
        if let Some(&idx) = self.row_by_ident.get(&reference.to_lowercase()) {
            return Ok(self.resolve(rows, idx));
        }
        Ok(None)
    }

    fn row_email(&mut self, row: &ImportRow, idx: usize) -> String {
        if let Some(email) = row.email.as_deref() {
            let email = email.trim().to_lowercase();
            if !email.is_empty() {
                return email;
            }
        }
        let name = row.name.as_deref().unwrap_or("");
        self.placeholder_emails
            .entry(idx)
            .or_insert_with(|| placeholder_email(name))
            .clone()
    }

    /// Resolution key for deduplication and cycle detection: code wins over
    /// username, which wins over the (possibly synthesized) email.
    fn row_key(&mut self, row: &ImportRow, idx: usize) -> String {
        if let Some(code) = row.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            return code.to_string();
        }
        if let Some(username) = row.username.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            return username.to_string();
        }
        self.row_email(row, idx)
    }

    fn finish(&mut self, key: &str) {
        self.processed.insert(key.to_string());
        self.in_progress.remove(key);
    }

    fn fail(&mut self, key: &str, detail: String) {
        self.report.errors += 1;
        self.report.details.push(detail);
        self.in_progress.remove(key);
    }
}

fn placeholder_email(name: &str) -> String {
    let clean: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    format!(
        "{clean}.{}@{PLACEHOLDER_EMAIL_DOMAIN}",
        chrono::Utc::now().timestamp_millis()
    )
}

fn placeholder_tax_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..11).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect()
}

fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Tax ids keep their first 11 digits; rows with no usable digits get a
/// synthesized one so the import never fails on a missing document.
fn clean_tax_id(raw: Option<&str>) -> String {
    let digits = digits_only(raw.unwrap_or(""));
    if digits.is_empty() {
        return placeholder_tax_id();
    }
    if digits.len() > 11 {
        digits[..11].to_string()
    } else {
        digits
    }
}
