//! Query tokenization and entry-point discovery (spec §4.2 step 1).

use std::collections::HashSet;

use codectx_core::{Symbol, SymbolIndex};

/// Characters replaced with whitespace before splitting, per spec §4.2.
const PUNCTUATION: [char; 6] = ['.', ',', '(', ')', '"', '\''];

/// Closed set of common English/verb stopwords the spec names explicitly.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "to", "for", "in", "on", "at", "by", "with", "add", "remove", "update",
    "fix", "implement", "create", "delete", "change", "modify", "function", "method", "type",
    "struct", "how", "what", "where", "when", "why",
];

/// Split a query into candidate identifier terms: punctuation becomes
/// whitespace, tokens shorter than 3 characters are dropped, and the closed
/// stopword set is filtered out.
#[must_use]
pub fn tokenize_query(query: &str) -> Vec<String> {
    let mut cleaned = query.to_string();
    for ch in PUNCTUATION {
        cleaned = cleaned.replace(ch, " ");
    }
    cleaned
        .split_whitespace()
        .filter(|t| t.len() >= 3)
        .filter(|t| !STOPWORDS.contains(&t.to_lowercase().as_str()))
        .map(str::to_string)
        .collect()
}

/// Search the symbol index for each extracted term and accumulate unique
/// hits by symbol id, up to 10 results per term (spec §4.2 step 1).
pub async fn find_entry_points(index: &dyn SymbolIndex, query: &str) -> Vec<Symbol> {
    let terms = tokenize_query(query);
    let mut seen = HashSet::new();
    let mut entry_points = Vec::new();
    for term in &terms {
        for symbol in index.search(term, 10).await {
            if seen.insert(symbol.id.clone()) {
                entry_points.push(symbol);
            }
        }
    }
    entry_points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_punctuation_and_drops_short_stopwords() {
        let terms = tokenize_query("How do I fix the HandleUser.Login('foo') function");
        assert!(terms.contains(&"HandleUser".to_string()));
        assert!(terms.contains(&"Login".to_string()));
        assert!(!terms.iter().any(|t| t.eq_ignore_ascii_case("fix")));
        assert!(!terms.iter().any(|t| t.eq_ignore_ascii_case("the")));
        assert!(!terms.iter().any(|t| t.eq_ignore_ascii_case("function")));
    }

    #[test]
    fn drops_tokens_shorter_than_three_chars() {
        let terms = tokenize_query("Go to it ok");
        assert!(terms.is_empty());
    }
}
