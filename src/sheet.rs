use std::path::Path;

use calamine::{Data, Reader};
use regex::Regex;

use crate::error::{DownlineError, Result};
use crate::models::ImportRow;

// ---------------------------------------------------------------------------
// Header mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Origin,
    Code,
    Name,
    Username,
    SponsorName,
    SponsorUsername,
    Email,
    TaxId,
    Phone,
}

/// Canonical field -> ordered regex candidates, matched against normalized
/// headers. Candidates are tried in order; the first header matching the
/// earliest candidate claims the column. Anchored variants come first so a
/// member column is never shadowed by its sponsor counterpart.
const HEADER_PATTERNS: &[(Field, &[&str])] = &[
    (Field::Origin, &[r"^origem$", r"origem|origin"]),
    (Field::Code, &[r"^id$", r"id_num|id_numerico|codigo", r"^code$|external_code"]),
    (Field::Name, &[r"^nome$", r"^name$", r"nome_completo|full_name"]),
    (
        Field::SponsorUsername,
        &[
            r"id_em_claro_do_indicador|login_indicador|username_indicador",
            r"sponsor_username|sponsor_login",
        ],
    ),
    (
        Field::SponsorName,
        &[r"^indicador$", r"nome_do_indicador|sponsor_name", r"indicador|sponsor|referrer"],
    ),
    (
        Field::Username,
        &[r"^login$|^username$|^usuario$", r"id_em_claro|login|username|usuario"],
    ),
    (Field::Email, &[r"email|e-mail|e_mail"]),
    (Field::TaxId, &[r"cpf|cnpj|documento|tax_id"]),
    (Field::Phone, &[r"celular|telefone|phone|whatsapp"]),
];

/// Lowercase, trim, collapse whitespace runs to `_`, fold Latin accents.
/// "Código do Indicador" becomes "codigo_do_indicador".
fn normalize_header(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    let mut last_was_space = false;
    for c in header.trim().to_lowercase().chars() {
        let c = fold_accent(c);
        if c.is_whitespace() {
            if !last_was_space {
                out.push('_');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        _ => c,
    }
}

#[derive(Debug, Default)]
struct ColumnMap {
    origin: Option<usize>,
    code: Option<usize>,
    name: Option<usize>,
    username: Option<usize>,
    sponsor_name: Option<usize>,
    sponsor_username: Option<usize>,
    email: Option<usize>,
    tax_id: Option<usize>,
    phone: Option<usize>,
}

fn find_column(headers: &[String], patterns: &[&str]) -> Option<usize> {
    for pattern in patterns {
        let Ok(re) = Regex::new(pattern) else { continue };
        if let Some(idx) = headers.iter().position(|h| re.is_match(h)) {
            return Some(idx);
        }
    }
    None
}

fn resolve_columns(headers: &[String]) -> ColumnMap {
    let mut map = ColumnMap::default();
    for (field, patterns) in HEADER_PATTERNS {
        let idx = find_column(headers, patterns);
        match field {
            Field::Origin => map.origin = idx,
            Field::Code => map.code = idx,
            Field::Name => map.name = idx,
            Field::Username => map.username = idx,
            Field::SponsorName => map.sponsor_name = idx,
            Field::SponsorUsername => map.sponsor_username = idx,
            Field::Email => map.email = idx,
            Field::TaxId => map.tax_id = idx,
            Field::Phone => map.phone = idx,
        }
    }
    map
}

fn build_row(map: &ColumnMap, cells: &[Option<String>]) -> ImportRow {
    let get = |idx: Option<usize>| idx.and_then(|i| cells.get(i).cloned().flatten());
    ImportRow {
        origin: get(map.origin),
        code: get(map.code),
        name: get(map.name),
        username: get(map.username),
        sponsor_name: get(map.sponsor_name),
        sponsor_username: get(map.sponsor_username),
        email: get(map.email).map(|e| e.to_lowercase()),
        tax_id: get(map.tax_id),
        phone: get(map.phone),
    }
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

/// Read a network spreadsheet into normalized rows. XLSX-family files go
/// through calamine (first sheet only); anything else is treated as CSV.
pub fn read_rows(path: &Path) -> Result<Vec<ImportRow>> {
    let is_workbook = path.extension().is_some_and(|e| {
        e.eq_ignore_ascii_case("xlsx")
            || e.eq_ignore_ascii_case("xlsm")
            || e.eq_ignore_ascii_case("xls")
            || e.eq_ignore_ascii_case("ods")
    });
    if is_workbook {
        read_workbook(path)
    } else {
        read_csv(path)
    }
}

fn cell_to_string(cell: &Data) -> Option<String> {
    let s = match cell {
        Data::String(s) => s.trim().to_string(),
        // Numeric codes come back as floats; render whole numbers without
        // the trailing ".0" so they compare equal to their text form.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn read_workbook(path: &Path) -> Result<Vec<ImportRow>> {
    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| DownlineError::Sheet(format!("Failed to open workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DownlineError::Sheet("workbook has no sheets".to_string()))?
        .map_err(|e| DownlineError::Sheet(format!("Failed to read sheet: {e}")))?;

    let mut rows = range.rows();
    let Some(header_cells) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_cells
        .iter()
        .map(|c| normalize_header(&cell_to_string(c).unwrap_or_default()))
        .collect();
    let map = resolve_columns(&headers);

    let mut out = Vec::new();
    for cells in rows {
        let values: Vec<Option<String>> = cells.iter().map(cell_to_string).collect();
        if values.iter().all(Option::is_none) {
            continue;
        }
        out.push(build_row(&map, &values));
    }
    Ok(out)
}

fn read_csv(path: &Path) -> Result<Vec<ImportRow>> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));

    let headers: Vec<String> = rdr.headers()?.iter().map(normalize_header).collect();
    let map = resolve_columns(&headers);

    let mut out = Vec::new();
    for result in rdr.records() {
        let Ok(record) = result else { continue };
        let values: Vec<Option<String>> = record
            .iter()
            .map(|f| {
                let f = f.trim();
                if f.is_empty() {
                    None
                } else {
                    Some(f.to_string())
                }
            })
            .collect();
        if values.iter().all(Option::is_none) {
            continue;
        }
        out.push(build_row(&map, &values));
    }
    Ok(out)
}
