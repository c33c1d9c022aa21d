//! Database-safe identifiers for columns and tables

use chrono::Local;
use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// PostgreSQL identifier length limit
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

static FORBIDDEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_\s]").expect("Hardcode regex pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Hardcode regex pattern"));

/// Lowercases, strips everything but ASCII word characters and whitespace, joins whitespace
/// runs with `_`, prefixes digit-leading names with `col_` and truncates to 63 characters.
///
/// Empty or punctuation-only input yields an empty string.
pub fn sanitize_identifier(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let stripped = FORBIDDEN.replace_all(&lowered, "");
    let mut name = WHITESPACE.replace_all(&stripped, "_").into_owned();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "col_");
    }
    name.truncate(MAX_IDENTIFIER_LENGTH);
    name
}

/// `{sanitized base}_{YYYYMMDD_HHMMSS}` on the local clock.
///
/// Two calls within the same second with the same base return the same name.
pub fn generate_table_name(base: &str) -> String {
    generate_table_name_at(base, Local::now().naive_local())
}

pub fn generate_table_name_at(base: &str, timestamp: NaiveDateTime) -> String {
    format!("{}_{}", sanitize_identifier(base), timestamp.format("%Y%m%d_%H%M%S"))
}

/// Sanitizes headers positionally into distinct record keys.
/// An empty result becomes `column_{n}` (1-based); repeats get a `_{k}` suffix.
pub fn unique_column_names<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    let mut seen = HashSet::<String>::new();
    let mut names = Vec::with_capacity(headers.len());
    for (index, header) in headers.iter().enumerate() {
        let mut name = sanitize_identifier(header.as_ref());
        if name.is_empty() {
            name = format!("column_{}", index + 1);
        }
        if seen.contains(&name) {
            let mut suffix = 2usize;
            while seen.contains(&format!("{name}_{suffix}")) {
                suffix += 1;
            }
            name = format!("{name}_{suffix}");
        }
        seen.insert(name.to_owned());
        names.push(name);
    }
    names
}
