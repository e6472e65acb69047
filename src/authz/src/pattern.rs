//! Wildcard matching of operation strings against permission patterns
//!
//! Patterns follow the cloud IAM convention used in role definitions:
//!
//! - `*` matches any run of characters, including `/`, so
//!   `Microsoft.Storage/storageAccounts/*` matches every operation under
//!   `storageAccounts`
//! - comparison is case-insensitive
//! - a pattern without `*` must equal the operation
//!
//! Matching is total: a pattern that cannot be compiled never matches.

use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

/// Decides whether an operation satisfies a permission pattern
pub trait PatternMatcher: Send + Sync {
    fn matches(&self, operation: &str, pattern: &str) -> bool;

    /// True if any pattern in `patterns` matches
    fn matches_any(&self, operation: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|p| self.matches(operation, p))
    }
}

/// Compile a wildcard pattern into an anchored, case-insensitive regex
fn compile(pattern: &str) -> Option<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Match an operation against a pattern without caching
pub fn matches(operation: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if !pattern.contains('*') {
        return operation.eq_ignore_ascii_case(pattern);
    }
    compile(pattern).is_some_and(|re| re.is_match(operation))
}

/// Default matcher, caching compiled wildcard patterns
#[derive(Clone, Default)]
pub struct WildcardMatcher {
    compiled: Arc<DashMap<String, Option<Regex>>>,
}

impl WildcardMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct wildcard patterns compiled so far
    pub fn compiled_patterns(&self) -> usize {
        self.compiled.len()
    }
}

impl PatternMatcher for WildcardMatcher {
    fn matches(&self, operation: &str, pattern: &str) -> bool {
        if pattern == "*" {
            return true;
        }
        if !pattern.contains('*') {
            return operation.eq_ignore_ascii_case(pattern);
        }

        if let Some(entry) = self.compiled.get(pattern) {
            return entry.as_ref().is_some_and(|re| re.is_match(operation));
        }

        let compiled = compile(pattern);
        let result = compiled.as_ref().is_some_and(|re| re.is_match(operation));
        self.compiled.insert(pattern.to_string(), compiled);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTKEYS: &str = "Microsoft.Storage/storageAccounts/listkeys/action";

    #[test]
    fn test_full_wildcard() {
        assert!(matches(LISTKEYS, "*"));
        assert!(matches("", "*"));
    }

    #[test]
    fn test_suffix_wildcard() {
        assert!(matches(LISTKEYS, "Microsoft.Storage/storageAccounts/*"));
        assert!(matches(LISTKEYS, "Microsoft.Storage/*"));
        assert!(!matches(LISTKEYS, "Microsoft.Compute/*"));
        // `*` must not swallow a missing separator
        assert!(!matches("Microsoft.StorageSync/read", "Microsoft.Storage/*"));
    }

    #[test]
    fn test_inner_wildcard() {
        assert!(matches(LISTKEYS, "Microsoft.Storage/*/action"));
        assert!(matches(
            "Microsoft.Storage/storageAccounts/fileServices/fileshares/files/read",
            "Microsoft.Storage/*/read"
        ));
        assert!(!matches(LISTKEYS, "Microsoft.Storage/*/read"));
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        assert!(matches(LISTKEYS, "microsoft.storage/storageaccounts/listKeys/action"));
        assert!(matches(LISTKEYS, "MICROSOFT.STORAGE/*"));
        assert!(!matches(LISTKEYS, "Microsoft.Storage/storageAccounts/listkeys"));
        assert!(!matches("Microsoft.Storage/storageAccounts/read", "Microsoft.Storage/storageAccounts"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(!matches("MicrosoftXStorage/read", "Microsoft.Storage/*"));
        assert!(matches("a+b/(c)", "a+b/*"));
        assert!(!matches("aab/c", "a+b/*"));
    }

    #[test]
    fn test_empty_pattern_only_matches_empty() {
        assert!(!matches(LISTKEYS, ""));
        assert!(matches("", ""));
    }

    #[test]
    fn test_cached_matcher_agrees_with_uncached() {
        let matcher = WildcardMatcher::new();
        let cases = [
            (LISTKEYS, "Microsoft.Storage/*"),
            (LISTKEYS, "Microsoft.Storage/*/read"),
            (LISTKEYS, "*/listkeys/*"),
            (LISTKEYS, LISTKEYS),
        ];

        for (operation, pattern) in cases {
            assert_eq!(matcher.matches(operation, pattern), matches(operation, pattern));
            // second call is served from the compiled cache
            assert_eq!(matcher.matches(operation, pattern), matches(operation, pattern));
        }

        assert_eq!(matcher.compiled_patterns(), 3);
    }

    #[test]
    fn test_matches_any() {
        let matcher = WildcardMatcher::new();
        let patterns = vec![
            "Microsoft.Compute/*".to_string(),
            "Microsoft.Storage/storageAccounts/*".to_string(),
        ];
        assert!(matcher.matches_any(LISTKEYS, &patterns));
        assert!(!matcher.matches_any(LISTKEYS, &[]));
    }
}
