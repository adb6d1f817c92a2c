#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    pub tax_id: Option<String>,
    pub code: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub sponsor_id: Option<String>,
    pub status: String,
}

/// Field values for an account that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub tax_id: Option<String>,
    pub code: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub sponsor_id: Option<String>,
    pub status: String,
}

/// Intermediate representation from a sheet parser, after header
/// normalization but before sponsor resolution. Empty cells become `None`.
#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct ImportRow {
    pub origin: Option<String>,
    pub code: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub sponsor_name: Option<String>,
    pub sponsor_username: Option<String>,
    pub email: Option<String>,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
}

impl ImportRow {
    /// The upline reference for this row. Username references are preferred
    /// over name references since usernames are unique in the store.
    pub fn sponsor_reference(&self) -> Option<&str> {
        self.sponsor_username
            .as_deref()
            .or(self.sponsor_name.as_deref())
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}
