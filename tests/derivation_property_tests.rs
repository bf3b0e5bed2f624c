//! Property tests over key derivation and brain-key normalization.

use proptest::prelude::*;
use quorum_wallet::crypto::derivation::{derive_private_key, normalize_brain_key};

proptest! {
    #[test]
    fn derivation_is_pure(seed in "[a-zA-Z0-9 ]{1,64}", index in 0u32..1000) {
        let a = derive_private_key(&seed, index);
        let b = derive_private_key(&seed, index);
        prop_assert_eq!(a.to_wif(), b.to_wif());
    }

    #[test]
    fn adjacent_indices_diverge(seed in "[a-zA-Z0-9]{1,32}", index in 0u32..1000) {
        let a = derive_private_key(&seed, index);
        let b = derive_private_key(&seed, index + 1);
        prop_assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn normalization_is_idempotent(phrase in "[a-zA-Z \t]{0,80}") {
        let once = normalize_brain_key(&phrase);
        prop_assert_eq!(normalize_brain_key(&once), once.clone());
        // Canonical form has no edge whitespace and no doubled spaces.
        prop_assert!(!once.starts_with(' '));
        prop_assert!(!once.ends_with(' '));
        prop_assert!(!once.contains("  "));
    }

    #[test]
    fn normalization_preserves_words(phrase in "[a-z]{1,10}( [a-z]{1,10}){0,5}") {
        let normalized = normalize_brain_key(&phrase);
        prop_assert_eq!(normalized, phrase.to_ascii_uppercase());
    }
}
