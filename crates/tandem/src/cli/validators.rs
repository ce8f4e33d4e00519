//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time, providing immediate feedback for invalid values.

use crate::domain::FeatureId;

/// Maximum length of a skip reason or blocker description
pub const MAX_REASON_LENGTH: usize = 500;

/// Maximum length of a worker identifier
pub const MAX_WORKER_LENGTH: usize = 64;

/// Parse a feature ID, accepting `42` or `#42`.
pub fn validate_feature_id(s: &str) -> Result<FeatureId, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Feature ID cannot be empty".to_string());
    }
    s.parse::<FeatureId>()
        .map_err(|_| format!("Invalid feature ID '{s}'. Expected a number such as 42 or #42"))
}

/// Validate a worker identifier.
///
/// Workers name themselves; the name shows up in `claimed_by`, so it must be
/// non-empty, short and free of whitespace.
pub fn validate_worker(s: &str) -> Result<String, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Worker ID cannot be empty".to_string());
    }

    if s.len() > MAX_WORKER_LENGTH {
        return Err(format!(
            "Worker ID cannot exceed {MAX_WORKER_LENGTH} characters (got {})",
            s.len()
        ));
    }

    if s.chars().any(char::is_whitespace) {
        return Err("Worker ID cannot contain whitespace".to_string());
    }

    Ok(s.to_string())
}

/// Validate a skip reason or blocker description.
pub fn validate_reason(s: &str) -> Result<String, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Reason cannot be empty".to_string());
    }

    let len = s.chars().count();
    if len > MAX_REASON_LENGTH {
        return Err(format!(
            "Reason cannot exceed {MAX_REASON_LENGTH} characters (got {len})"
        ));
    }

    Ok(s.to_string())
}

/// Validate an impact traversal depth.
pub fn validate_depth(s: &str) -> Result<usize, String> {
    let depth: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid depth '{s}'. Expected a positive integer"))?;
    if depth == 0 {
        return Err("Depth must be at least 1".to_string());
    }
    Ok(depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("42", 42)]
    #[case("#7", 7)]
    #[case("  3 ", 3)]
    fn test_validate_feature_id_valid(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(validate_feature_id(input).unwrap(), FeatureId(expected));
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("-1")]
    #[case("#")]
    fn test_validate_feature_id_invalid(#[case] input: &str) {
        assert!(validate_feature_id(input).is_err());
    }

    #[test]
    fn test_validate_worker() {
        assert_eq!(validate_worker(" agent-1 ").unwrap(), "agent-1");
        assert!(validate_worker("").is_err());
        assert!(validate_worker("two words").is_err());
        assert!(validate_worker(&"w".repeat(MAX_WORKER_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_reason() {
        assert_eq!(validate_reason("  needs API key ").unwrap(), "needs API key");
        assert!(validate_reason("   ").is_err());
        assert!(validate_reason(&"x".repeat(MAX_REASON_LENGTH)).is_ok());
        assert!(validate_reason(&"x".repeat(MAX_REASON_LENGTH + 1)).is_err());
    }

    #[rstest]
    #[case("1", Ok(1))]
    #[case("5", Ok(5))]
    #[case("0", Err(()))]
    #[case("deep", Err(()))]
    fn test_validate_depth(#[case] input: &str, #[case] expected: Result<usize, ()>) {
        assert_eq!(validate_depth(input).map_err(|_| ()), expected);
    }
}
