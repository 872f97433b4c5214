//! Text normalization and content hashing.
//!
//! Cache keys use SHA-256 so they stay stable across implementations; artifact
//! fingerprints compared by the determinism harness use BLAKE3.

use sha2::{Digest, Sha256};

/// Trims, case-folds and collapses internal whitespace to single spaces.
///
/// Idempotent: `normalize_text(normalize_text(s)) == normalize_text(s)`.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&word.to_lowercase());
    }
    out
}

/// SHA-256 of already-normalized text.
#[inline]
pub fn text_digest(normalized: &str) -> [u8; 32] {
    Sha256::digest(normalized.as_bytes()).into()
}

/// Hex cache key for `(model_id, text_digest)`.
///
/// The separator keeps `("ab", d)` and `("a", "b" ++ d)` apart.
pub fn cache_key_hex(model_id: &str, text_digest: &[u8; 32]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update(b"|");
    hasher.update(text_digest);
    hex::encode(hasher.finalize())
}

/// Short stable identifier for a query (first 16 hex chars of its normalized digest).
pub fn derive_query_id(query: &str) -> String {
    let digest = text_digest(&normalize_text(query));
    hex::encode(&digest[..8])
}

/// BLAKE3 fingerprint of a serialized artifact, hex encoded.
#[inline]
pub fn hash_artifact(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_normalize_trims_and_collapses() {
        assert_eq!(normalize_text("  Climate   Risk\t\nDisclosure "), "climate risk disclosure");
    }

    #[test]
    fn test_normalize_empty_and_whitespace() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text(" \t\n "), "");
    }

    #[test]
    fn test_normalize_unicode_case_fold() {
        assert_eq!(normalize_text("ÉMISSIONS Scope 3"), "émissions scope 3");
    }

    #[test]
    fn test_text_digest_determinism() {
        let a = text_digest("climate risk");
        let b = text_digest("climate risk");
        assert_eq!(a, b);
        assert_ne!(a, text_digest("climate  risk"));
    }

    #[test]
    fn test_cache_key_hex_shape() {
        let key = cache_key_hex("model-a", &text_digest("x"));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_cache_key_model_sensitivity() {
        let digest = text_digest("climate risk");
        assert_ne!(cache_key_hex("model-a", &digest), cache_key_hex("model-b", &digest));
    }

    #[test]
    fn test_cache_key_separator_prevents_ambiguity() {
        let d1 = text_digest("x");
        let keys: HashSet<_> = [
            cache_key_hex("ab", &d1),
            cache_key_hex("a", &d1),
            cache_key_hex("abc", &d1),
        ]
        .into_iter()
        .collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_derive_query_id_ignores_formatting() {
        assert_eq!(derive_query_id("Climate Risk"), derive_query_id("  climate   risk "));
        assert_eq!(derive_query_id("climate risk").len(), 16);
    }

    #[test]
    fn test_hash_artifact_determinism() {
        let a = hash_artifact(br#"{"k":1}"#);
        assert_eq!(a, hash_artifact(br#"{"k":1}"#));
        assert_ne!(a, hash_artifact(br#"{"k":2}"#));
        assert_eq!(a.len(), 64);
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent(text in "[a-zA-Z0-9 \t\nÀ-ÖØ-öø-ÿ]{0,64}") {
            let once = normalize_text(&text);
            prop_assert_eq!(normalize_text(&once), once);
        }

        #[test]
        fn prop_equal_normalization_equal_key(
            words in proptest::collection::vec("[a-zA-Z]{1,8}", 1..6),
            pad in "[ \t]{0,3}",
        ) {
            let plain = words.join(" ");
            let noisy = format!("{pad}{}{pad}", words.join(&format!(" {pad}")).to_uppercase());
            prop_assert_eq!(normalize_text(&plain), normalize_text(&noisy));
            let k1 = cache_key_hex("m", &text_digest(&normalize_text(&plain)));
            let k2 = cache_key_hex("m", &text_digest(&normalize_text(&noisy)));
            prop_assert_eq!(k1, k2);
        }
    }
}
