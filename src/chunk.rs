//! Fixed-budget text chunker.
//!
//! Splits long text into contiguous, non-overlapping windows of at most
//! `max_chars` characters each, in order, so that concatenating the chunks
//! reproduces the original text exactly. The budget is a conservative
//! character proxy for a completion model's context window (~4 chars per
//! token); it is not token-aware.

/// Default chunk budget: ~3,000 tokens' worth of characters.
pub const DEFAULT_CHUNK_CHARS: usize = 12_000;

/// Split `text` into ordered chunks of at most `max_chars` characters.
///
/// Every chunk except possibly the last has exactly `max_chars` characters.
/// Text at or under the budget (including the empty string) yields exactly
/// one chunk. Splits are made on `char` boundaries.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    assert!(max_chars > 0, "chunk budget must be > 0");

    let mut chunks = Vec::new();
    let mut rest = text;
    loop {
        match rest.char_indices().nth(max_chars) {
            Some((split, _)) => {
                chunks.push(rest[..split].to_string());
                rest = &rest[split..];
            }
            None => {
                chunks.push(rest.to_string());
                break;
            }
        }
    }
    chunks
}
