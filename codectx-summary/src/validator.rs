//! Rejects generated summaries that look like LLM refusals or otherwise
//! fail structural checks (spec §4.3.5).

use std::collections::HashSet;

use codectx_core::SummaryLevel;

/// Substrings (checked case-insensitively) that mark a response as a
/// refusal or error rather than a usable summary.
const REFUSAL_SUBSTRINGS: &[&str] = &[
    "i cannot",
    "i can't",
    "as an ai",
    "as a language model",
    "i'm not able to",
    "i am not able to",
    "error:",
    "i apologize, but",
    "sorry, i cannot",
];

/// Keywords that are allowed even when they don't name a known symbol,
/// because they're common vocabulary rather than claims about the code.
const COMMON_PROGRAMMING_TERMS: &[&str] = &[
    "function", "method", "struct", "class", "interface", "module", "package", "error",
    "handler", "config", "client", "server", "request", "response", "cache", "retry",
    "async", "sync", "thread", "test", "validation", "auth", "token", "query", "database",
    "connection", "worker", "pool", "queue", "middleware", "route", "service", "api",
];

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub min_summary_length: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_summary_length: 20,
        }
    }
}

/// One specific reason a summary was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    TooShort { len: usize, min: usize },
    Refusal { matched: String },
    LevelMismatch { expected: SummaryLevel, actual: SummaryLevel },
    UnknownKeyword { keyword: String },
    ParentMismatch { expected: String, actual: String },
}

/// Outcome of validating a candidate summary.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

pub struct SummaryValidator {
    config: ValidatorConfig,
}

impl SummaryValidator {
    #[must_use]
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Checks content length and refusal substrings, the level against
    /// the hierarchy-derived level, declared keywords against known
    /// symbol names, and `parentId` against the expected parent.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn validate(
        &self,
        content: &str,
        keywords: &[String],
        level: SummaryLevel,
        expected_level: SummaryLevel,
        parent_id: &str,
        expected_parent_id: &str,
        known_symbol_names: &HashSet<String>,
    ) -> ValidationResult {
        let mut issues = Vec::new();

        if content.len() < self.config.min_summary_length {
            issues.push(ValidationIssue::TooShort {
                len: content.len(),
                min: self.config.min_summary_length,
            });
        }

        let lowered = content.to_lowercase();
        if let Some(matched) = REFUSAL_SUBSTRINGS
            .iter()
            .find(|pat| lowered.contains(*pat))
        {
            issues.push(ValidationIssue::Refusal {
                matched: (*matched).to_string(),
            });
        }

        if level != expected_level {
            issues.push(ValidationIssue::LevelMismatch {
                expected: expected_level,
                actual: level,
            });
        }

        if parent_id != expected_parent_id {
            issues.push(ValidationIssue::ParentMismatch {
                expected: expected_parent_id.to_string(),
                actual: parent_id.to_string(),
            });
        }

        for keyword in keywords {
            if !self.keyword_is_known(keyword, known_symbol_names) {
                issues.push(ValidationIssue::UnknownKeyword {
                    keyword: keyword.clone(),
                });
            }
        }

        ValidationResult { issues }
    }

    fn keyword_is_known(&self, keyword: &str, known_symbol_names: &HashSet<String>) -> bool {
        let lowered = keyword.to_lowercase();
        if COMMON_PROGRAMMING_TERMS.contains(&lowered.as_str()) {
            return true;
        }
        known_symbol_names.iter().any(|symbol| {
            let symbol_lower = symbol.to_lowercase();
            symbol_lower == lowered || symbol_lower.contains(&lowered)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn rejects_too_short_content() {
        let validator = SummaryValidator::new(ValidatorConfig::default());
        let result = validator.validate(
            "tiny",
            &[],
            SummaryLevel::File,
            SummaryLevel::File,
            "pkg/auth",
            "pkg/auth",
            &symbols(&[]),
        );
        assert!(!result.is_valid());
        assert!(matches!(
            result.issues[0],
            ValidationIssue::TooShort { .. }
        ));
    }

    #[test]
    fn rejects_refusal_text() {
        let validator = SummaryValidator::new(ValidatorConfig::default());
        let result = validator.validate(
            "I cannot summarize this file without more context about its purpose.",
            &[],
            SummaryLevel::File,
            SummaryLevel::File,
            "pkg/auth",
            "pkg/auth",
            &symbols(&[]),
        );
        assert!(result
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::Refusal { .. })));
    }

    #[test]
    fn rejects_level_and_parent_mismatch() {
        let validator = SummaryValidator::new(ValidatorConfig::default());
        let result = validator.validate(
            "Handles user authentication token validation and refresh flows.",
            &[],
            SummaryLevel::Package,
            SummaryLevel::File,
            "pkg/wrong",
            "pkg/auth",
            &symbols(&[]),
        );
        assert!(result
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::LevelMismatch { .. })));
        assert!(result
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::ParentMismatch { .. })));
    }

    #[test]
    fn accepts_known_symbol_and_common_term_keywords() {
        let validator = SummaryValidator::new(ValidatorConfig::default());
        let result = validator.validate(
            "Validates authentication tokens and refreshes expired sessions for users.",
            &["ValidateToken".to_string(), "handler".to_string()],
            SummaryLevel::File,
            SummaryLevel::File,
            "pkg/auth",
            "pkg/auth",
            &symbols(&["ValidateToken", "RefreshSession"]),
        );
        assert!(result.is_valid());
    }

    #[test]
    fn rejects_unknown_keyword() {
        let validator = SummaryValidator::new(ValidatorConfig::default());
        let result = validator.validate(
            "Validates authentication tokens and refreshes expired sessions for users.",
            &["QuantumFlux".to_string()],
            SummaryLevel::File,
            SummaryLevel::File,
            "pkg/auth",
            "pkg/auth",
            &symbols(&["ValidateToken"]),
        );
        assert!(result
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::UnknownKeyword { .. })));
    }
}
