//! Symbol scoring formula (spec §4.2 step 3).

use codectx_core::{Symbol, SymbolKind};

/// Tiered comparison of a lowercased symbol name against the lowercased
/// query and its extracted terms: exact query match = 1.0, exact match to
/// any term = 0.95, mutual prefix = 0.80, mutual contains = 0.60, else 0.0.
#[must_use]
pub fn query_similarity(symbol_name: &str, query: &str, terms: &[String]) -> f64 {
    let name = symbol_name.to_lowercase();
    let query = query.to_lowercase();

    if name == query {
        return 1.0;
    }
    if terms.iter().any(|t| t.to_lowercase() == name) {
        return 0.95;
    }
    if name.starts_with(query.as_str()) || query.starts_with(name.as_str()) {
        return 0.80;
    }
    if terms
        .iter()
        .any(|t| name.starts_with(t.to_lowercase().as_str()) || t.to_lowercase().starts_with(name.as_str()))
    {
        return 0.80;
    }
    if name.contains(query.as_str()) || query.contains(name.as_str()) {
        return 0.60;
    }
    if terms
        .iter()
        .any(|t| name.contains(t.to_lowercase().as_str()) || t.to_lowercase().contains(name.as_str()))
    {
        return 0.60;
    }
    0.0
}

/// The assembler's scoring formula: `0.4*querySim + 0.3*(1/(depth+1)) + 0.3*importance(kind)`.
#[must_use]
pub fn score_symbol(symbol: &Symbol, depth: u32, query: &str, terms: &[String]) -> f64 {
    let sim = query_similarity(&symbol.name, query, terms);
    let depth_term = 1.0 / f64::from(depth + 1);
    let importance = symbol.kind.importance();
    0.4 * sim + 0.3 * depth_term + 0.3 * importance
}

/// The closed importance table keyed by [`SymbolKind`] (spec §4.2 step 3).
#[must_use]
pub fn importance(kind: SymbolKind) -> f64 {
    kind.importance()
}
