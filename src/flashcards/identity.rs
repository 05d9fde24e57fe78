//! Content-derived card identity
//!
//! A card's id is a pure function of `(front, src, dst)` so that adding the
//! same pair twice collides instead of creating a duplicate. The front is
//! bounded to a prefix before hashing to keep the key short for long
//! sentences.
//!
//! Known limitation: raw input that is not valid UTF-8 gets a random id
//! (see [`make_id_from_bytes`]); such cards are never deduplicated.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use super::models::CardId;

/// Number of characters of the front that take part in the identity
pub const FRONT_PREFIX_CHARS: usize = 160;

const ID_PREFIX: &str = "id_";
const RANDOM_ID_PREFIX: &str = "id_r";
const FIELD_SEPARATOR: char = '\u{1f}';

/// Derive the id for a card.
pub fn make_id(front: &str, src: &str, dst: &str) -> CardId {
    let key = identity_key(front, src, dst);
    let digest = Sha256::digest(key.as_bytes());
    CardId::new(format!("{}{}", ID_PREFIX, URL_SAFE_NO_PAD.encode(digest)))
}

/// Derive the id from raw bytes, falling back to a random id when the front
/// is not valid UTF-8.
pub fn make_id_from_bytes(front: &[u8], src: &str, dst: &str) -> CardId {
    match std::str::from_utf8(front) {
        Ok(front) => make_id(front, src, dst),
        Err(e) => {
            log::warn!(
                "Card front is not valid UTF-8 ({}); using a random id, dedup disabled for this card",
                e
            );
            random_id()
        }
    }
}

/// Random id used when content-derived identity is unavailable.
pub fn random_id() -> CardId {
    CardId::new(format!("{}{}", RANDOM_ID_PREFIX, Uuid::new_v4().simple()))
}

/// Whether an id came from the random fallback
pub fn is_random_id(id: &CardId) -> bool {
    let s = id.as_str();
    s.starts_with(RANDOM_ID_PREFIX) && s.len() == RANDOM_ID_PREFIX.len() + 32
}

fn identity_key(front: &str, src: &str, dst: &str) -> String {
    let front: String = front
        .trim()
        .nfc()
        .take(FRONT_PREFIX_CHARS)
        .collect();

    let mut key = String::with_capacity(front.len() + src.len() + dst.len() + 2);
    key.push_str(&front);
    key.push(FIELD_SEPARATOR);
    key.push_str(&src.trim().to_lowercase());
    key.push(FIELD_SEPARATOR);
    key.push_str(&dst.trim().to_lowercase());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_input_same_id() {
        let a = make_id("casa", "pt", "en");
        let b = make_id("casa", "pt", "en");
        assert_eq!(a, b);
    }

    #[test]
    fn test_id_is_key_safe() {
        let id = make_id("Olá, tudo bem? Você está aí?", "pt", "nl");
        assert!(id.as_str().starts_with("id_"));
        assert_eq!(id.as_str().len(), 3 + 43);
        assert!(!id.as_str().contains('='));
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_languages_are_part_of_identity() {
        assert_ne!(make_id("casa", "pt", "en"), make_id("casa", "pt", "nl"));
        assert_ne!(make_id("casa", "pt", "en"), make_id("casa", "es", "en"));
        assert_eq!(make_id("casa", "PT", "en "), make_id("casa", "pt", "en"));
    }

    #[test]
    fn test_field_boundaries_do_not_collide() {
        assert_ne!(make_id("casap", "t", "en"), make_id("casa", "pt", "en"));
    }

    #[test]
    fn test_front_is_bounded_to_prefix() {
        let base = "a".repeat(FRONT_PREFIX_CHARS);
        let a = make_id(&format!("{}xyz", base), "en", "pt");
        let b = make_id(&format!("{}abc", base), "en", "pt");
        assert_eq!(a, b);

        let shorter = "a".repeat(FRONT_PREFIX_CHARS - 1);
        assert_ne!(make_id(&shorter, "en", "pt"), make_id(&base, "en", "pt"));
    }

    #[test]
    fn test_composed_and_decomposed_fronts_match() {
        // "café" precomposed vs. e + combining acute
        assert_eq!(
            make_id("caf\u{e9}", "pt", "en"),
            make_id("cafe\u{301}", "pt", "en")
        );
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_random() {
        let a = make_id_from_bytes(&[0x63, 0xff, 0x61], "pt", "en");
        let b = make_id_from_bytes(&[0x63, 0xff, 0x61], "pt", "en");
        assert!(is_random_id(&a));
        assert_ne!(a, b);

        let ok = make_id_from_bytes("casa".as_bytes(), "pt", "en");
        assert_eq!(ok, make_id("casa", "pt", "en"));
        assert!(!is_random_id(&ok));
    }
}
