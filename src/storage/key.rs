//! Bounded index key for sentence text.
//!
//! SQLite has no hard key ceiling, but the uniqueness contract is shared with
//! document stores that reject index entries past ~1024 bytes. Keys keep the
//! first [`TEXT_KEY_MAX_CHARS`] characters, leaving headroom for multi-byte
//! encodings. Sentences that only differ after that prefix share a key.

/// Maximum number of characters kept in a text key.
pub const TEXT_KEY_MAX_CHARS: usize = 512;

/// Uniqueness key for `text`: the text itself, or its first 512 characters.
pub fn text_key(text: &str) -> &str {
    match text.char_indices().nth(TEXT_KEY_MAX_CHARS) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
