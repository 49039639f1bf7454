//! Property-based tests for the tag and identifier sanitizers.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::path::{condense, sanitize_id, tag_safe, MAX_TAG_LEN};
    use proptest::prelude::*;

    // ============================================================================
    // tag_safe property tests
    // ============================================================================

    proptest! {
        /// Property: tag_safe only produces the allowed tag character set
        #[test]
        fn tag_safe_only_allowed_chars(input in ".*") {
            let result = tag_safe(&input);
            for ch in result.chars() {
                prop_assert!(
                    ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '-' | '_' | '.'),
                    "tag_safe produced '{}' from input '{}'",
                    ch,
                    input
                );
            }
        }

        /// Property: tag_safe is idempotent under re-sanitization
        #[test]
        fn tag_safe_is_idempotent(input in ".*") {
            let once = tag_safe(&input);
            let twice = tag_safe(&once);
            prop_assert_eq!(once, twice);
        }

        /// Property: tags never exceed the registry limit
        #[test]
        fn tag_safe_respects_max_len(input in ".{0,400}") {
            prop_assert!(tag_safe(&input).chars().count() <= MAX_TAG_LEN);
        }

        /// Property: tags never start with a separator
        #[test]
        fn tag_safe_never_starts_with_separator(input in ".+") {
            let result = tag_safe(&input);
            prop_assert!(!result.starts_with('-') && !result.starts_with('.'));
        }

        /// Property: already-valid simple tags pass through unchanged
        #[test]
        fn tag_safe_preserves_simple_tags(input in "[a-z0-9][a-z0-9_.]{0,40}") {
            prop_assert_eq!(tag_safe(&input), input);
        }
    }

    // ============================================================================
    // identifier property tests
    // ============================================================================

    proptest! {
        /// Property: sanitize_id removes every path-unsafe character
        #[test]
        fn sanitize_id_removes_unsafe_chars(input in ".*") {
            let result = sanitize_id(&input);
            prop_assert!(!result.contains('.'));
            prop_assert!(!result.contains('+'));
            prop_assert!(!result.contains('/'));
        }

        /// Property: sanitize_id replaces characters one for one
        #[test]
        fn sanitize_id_preserves_char_count(input in ".*") {
            prop_assert_eq!(sanitize_id(&input).chars().count(), input.chars().count());
        }

        /// Property: condense output never contains separators
        #[test]
        fn condense_removes_separators(input in "[a-zA-Z0-9 .-]*") {
            let result = condense(&input);
            prop_assert!(!result.contains(' ') && !result.contains('-') && !result.contains('.'));
            prop_assert_eq!(condense(&result), result);
        }
    }
}
