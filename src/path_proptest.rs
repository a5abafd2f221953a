//! Property-based tests for path manipulation functions.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::path::{glob_match, normalize_output_path};
    use proptest::prelude::*;

    // ============================================================================
    // normalize_output_path property tests
    // ============================================================================

    proptest! {
        /// Property: a normalized path never escapes the managed root
        #[test]
        fn normalized_paths_stay_relative(input in "[a-z./\\\\]{0,30}") {
            if let Ok(normalized) = normalize_output_path(&input) {
                prop_assert!(!normalized.starts_with('/'));
                prop_assert!(!normalized.split('/').any(|s| s == ".." || s == "." || s.is_empty()));
            }
        }

        /// Property: normalization is idempotent
        #[test]
        fn normalize_is_idempotent(segments in prop::collection::vec("[a-zA-Z0-9_-]{1,8}", 1..6)) {
            let path = segments.join("/./");
            let once = normalize_output_path(&path).unwrap();
            let twice = normalize_output_path(&once).unwrap();
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(once, segments.join("/"));
        }

        /// Property: any path containing a parent segment is rejected
        #[test]
        fn parent_segments_are_rejected(
            prefix in "[a-z]{1,5}",
            suffix in "[a-z]{1,5}",
        ) {
            let path = format!("{}/../{}", prefix, suffix);
            prop_assert!(normalize_output_path(&path).is_err());
        }
    }

    // ============================================================================
    // glob_match property tests
    // ============================================================================

    proptest! {
        /// Property: exact pattern matches only identical path
        #[test]
        fn glob_exact_match_works(path in "[a-zA-Z0-9_]{1,20}") {
            let result = glob_match(&path, &path);
            prop_assert!(result.is_ok());
            prop_assert!(result.unwrap(), "Exact pattern '{}' should match itself", path);
        }

        /// Property: pattern "**" matches any path
        #[test]
        fn glob_double_star_matches_all(path in "[a-zA-Z0-9_./]+") {
            let result = glob_match("**", &path);
            prop_assert!(result.is_ok());
            prop_assert!(result.unwrap(), "Pattern '**' should match '{}'", path);
        }
    }
}
