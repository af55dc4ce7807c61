//! Canonical forms of the parents' names, so that spelling conventions do
//! not read as disagreement between siblings' records.
use std::sync::LazyLock;

use regex::Regex;

use crate::utils::record::{is_missing, Record};

/// Father forename, mother forename, father surname, mother maiden surname.
pub type Identity = [String; 4];

pub const FATHER_FORENAME: usize = 0;
pub const MOTHER_FORENAME: usize = 1;
pub const FATHER_SURNAME: usize = 2;
pub const MOTHER_MAIDEN_SURNAME: usize = 3;

static DOTTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"D[.:ORT]").unwrap());
static DOTTER_TAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"D[.:RT]").unwrap());
static SON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"S\.").unwrap());
static INITIALS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]*\.$").unwrap());
static PARENTHETICAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([^)]+)\)").unwrap());

pub fn identity_of(record: &Record) -> Identity {
    record
        .kind()
        .identity_fields()
        .map(|f| record.field(f).unwrap_or("").trim().to_string())
}

/// Abbreviated daughter-of suffixes (`D.`, `D:`, `DR`, `DT`, `DO...`) become
/// `DOTTER`. Only the last abbreviation in the name is expanded.
pub fn normalise_dotter(value: &str) -> String {
    let found = DOTTER
        .find_iter(value)
        .find(|m| !DOTTER_TAIL.is_match(&value[m.end()..]));
    match found {
        Some(m) => format!("{}DOTTER", &value[..m.start()]),
        None => value.to_string(),
    }
}

/// An abbreviated son-of suffix `S.` becomes `SON`.
pub fn normalise_son(value: &str) -> String {
    match SON.find(value) {
        Some(m) => format!("{}SON", &value[..m.start()]),
        None => value.to_string(),
    }
}

/// Drops a trailing `(...)` annotation, unless the value is nothing but one.
pub fn strip_parenthetical(value: &str) -> String {
    match PARENTHETICAL.find(value) {
        Some(m) if m.start() > 0 => value[..m.start()].trim().to_string(),
        _ => value.to_string(),
    }
}

/// Rewrites a group of identities that are expected to name the same parents.
///
/// Initials are expanded only when at least three records agree on them,
/// which means every record's value starts with the initials.
pub fn canonicalise(group: &mut [Identity]) {
    for identity in group.iter_mut() {
        identity[MOTHER_MAIDEN_SURNAME] = normalise_dotter(&identity[MOTHER_MAIDEN_SURNAME]);
        identity[FATHER_SURNAME] = normalise_son(&identity[FATHER_SURNAME]);
    }

    if group.len() >= 3 {
        for field in [FATHER_FORENAME, MOTHER_FORENAME] {
            reconcile_initials(group, field);
        }
    }

    for field in [FATHER_FORENAME, MOTHER_FORENAME, FATHER_SURNAME] {
        reconcile_middle_names(group, field);
        for identity in group.iter_mut() {
            identity[field] = strip_parenthetical(&identity[field]);
        }
    }
}

fn reconcile_initials(group: &mut [Identity], field: usize) {
    let Some(prefix) = group
        .iter()
        .map(|identity| identity[field].as_str())
        .find(|value| INITIALS.is_match(value))
        .map(|value| value.trim_end_matches('.').to_string())
    else {
        return;
    };
    if prefix.is_empty() {
        return;
    }
    if group.iter().all(|identity| identity[field].starts_with(&prefix)) {
        for identity in group.iter_mut() {
            identity[field] = prefix.clone();
        }
    }
}

/// A multi-part name is cut down to the part another record uses on its own.
fn reconcile_middle_names(group: &mut [Identity], field: usize) {
    let singles: Vec<String> = group
        .iter()
        .map(|identity| identity[field].clone())
        .filter(|value| !is_missing(value) && !value.contains(char::is_whitespace))
        .collect();

    for identity in group.iter_mut() {
        if !identity[field].contains(char::is_whitespace) {
            continue;
        }
        let matched = identity[field]
            .split_whitespace()
            .find(|part| singles.iter().any(|s| s == part))
            .map(str::to_string);
        if let Some(part) = matched {
            identity[field] = part;
        }
    }
}
