//! Semantic submission keys and their template field identifiers.

use std::collections::HashMap;
use std::sync::OnceLock;

pub const FILING_STATUS: &str = "filingStatus";
pub const FIRST_NAME: &str = "firstName";
pub const LAST_NAME: &str = "lastName";
pub const SSN: &str = "ssn";
pub const WAGES: &str = "wages";

const KEY_TO_FIELD: &[(&str, &str)] = &[
    (FIRST_NAME, "topmostSubform[0].Page1[0].f1_04[0]"),
    (LAST_NAME, "topmostSubform[0].Page1[0].f1_05[0]"),
    (SSN, "topmostSubform[0].Page1[0].f1_06[0]"),
    (WAGES, "topmostSubform[0].Page1[0].f1_31[0]"),
];

static FIELD_MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

fn field_map() -> &'static HashMap<&'static str, &'static str> {
    FIELD_MAP.get_or_init(|| KEY_TO_FIELD.iter().copied().collect())
}

/// Resolve a semantic key to the template field it fills.
///
/// Unknown keys come back unchanged; callers treat a missing field in the
/// template as "field not found" rather than an error.
pub fn resolve(semantic_key: &str) -> &str {
    field_map()
        .get(semantic_key)
        .copied()
        .unwrap_or(semantic_key)
}

/// Semantic keys understood by the intake form, in form order.
pub fn known_keys() -> impl Iterator<Item = &'static str> {
    std::iter::once(FILING_STATUS).chain(KEY_TO_FIELD.iter().map(|(key, _)| *key))
}
