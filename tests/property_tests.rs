//! Property-based tests for notesync
//!
//! These tests verify invariants that must hold for all inputs:
//! - The merge rule picks the larger timestamp and is order-insensitive
//! - Wire decoding never panics and never yields a partial note
//! - Stamps only move forward
//!
//! Run with: cargo test --test property_tests

use proptest::prelude::*;

use notesync::Note;

fn arb_note() -> impl Strategy<Value = Note> {
    ("[A-Za-z0-9 ]{0,20}[A-Za-z0-9]", "\\PC{0,64}", 0i64..i64::MAX / 2)
        .prop_map(|(title, content, updated_at)| Note::at(title, content, updated_at).unwrap())
}

// ============================================================================
// MERGE RULE
// ============================================================================

mod merge_tests {
    use super::*;

    proptest! {
        /// Invariant: the result is one of the inputs and carries the max timestamp
        #[test]
        fn newer_returns_max(a in arb_note(), b in arb_note()) {
            let winner = Note::newer(&a, &b);
            prop_assert!(winner == &a || winner == &b);
            prop_assert_eq!(winner.updated_at(), a.updated_at().max(b.updated_at()));
        }

        /// Invariant: swapping arguments only matters on ties
        #[test]
        fn newer_is_symmetric_without_ties(a in arb_note(), b in arb_note()) {
            prop_assume!(a.updated_at() != b.updated_at());
            prop_assert_eq!(Note::newer(&a, &b), Note::newer(&b, &a));
        }

        /// Invariant: ties keep the first argument
        #[test]
        fn ties_keep_first(a in arb_note(), content in "\\PC{0,16}") {
            let b = a.with_content(content);
            prop_assert!(std::ptr::eq(Note::newer(&a, &b), &a));
            prop_assert!(!b.is_newer_than(&a));
        }

        /// Invariant: is_newer_than agrees with newer
        #[test]
        fn strictly_newer_consistent(a in arb_note(), b in arb_note()) {
            if b.is_newer_than(&a) {
                prop_assert!(std::ptr::eq(Note::newer(&a, &b), &b));
            } else {
                prop_assert!(std::ptr::eq(Note::newer(&a, &b), &a));
            }
        }
    }
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

mod wire_tests {
    use super::*;

    proptest! {
        /// Invariant: decoding arbitrary text never panics
        #[test]
        fn from_json_never_panics(s in ".*") {
            let _ = Note::from_json(&s);
        }

        /// Invariant: encoding then decoding preserves every field
        #[test]
        fn json_preserves_note(note in arb_note()) {
            let json = note.to_json().unwrap();
            prop_assert_eq!(Note::from_json(&json).unwrap(), note);
        }

        /// Invariant: a body missing the timestamp is rejected
        #[test]
        fn missing_timestamp_rejected(title in "[a-z]{1,10}", content in "[a-z ]{0,20}") {
            let json = serde_json::json!({ "title": title, "content": content }).to_string();
            prop_assert!(Note::from_json(&json).is_err());
        }
    }
}

// ============================================================================
// STAMPING
// ============================================================================

mod stamp_tests {
    use super::*;

    proptest! {
        /// Invariant: stamping keeps title and content and moves time forward
        #[test]
        fn stamp_keeps_identity(note in arb_note()) {
            let first = note.stamp();
            let second = note.stamp();
            prop_assert_eq!(first.title(), note.title());
            prop_assert_eq!(first.content(), note.content());
            prop_assert!(second.updated_at() > first.updated_at());
        }
    }
}
