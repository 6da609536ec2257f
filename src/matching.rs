//! Case-insensitive string comparisons shared by the fakes' lookups.

/// Exact match ignoring case.
pub(crate) fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

/// Prefix match ignoring case.
pub(crate) fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    if value.is_ascii() && prefix.is_ascii() {
        return value.len() >= prefix.len()
            && value.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes());
    }
    value.to_lowercase().starts_with(&prefix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_ignore_case() {
        assert!(eq_ignore_case("Alice@Example.com", "alice@example.COM"));
        assert!(eq_ignore_case("ÉTÉ", "été"));
        assert!(!eq_ignore_case("alice", "alice "));
    }

    #[test]
    fn test_starts_with_ignore_case() {
        assert!(starts_with_ignore_case("Reports/2024.csv", "reports/"));
        assert!(starts_with_ignore_case("anything", ""));
        assert!(!starts_with_ignore_case("re", "reports"));
        assert!(starts_with_ignore_case("Éclair", "éc"));
    }
}
