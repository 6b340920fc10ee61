//! Text normalization shared by every matcher in the engine
//!
//! Alias lookup, fuzzy matching, phrase detection and telemetry all run on
//! the output of this one transform. If two call sites normalized
//! differently, their matches would silently diverge, so nothing else in the
//! crate lowercases or strips punctuation on its own.

/// Normalize free text for matching: lowercase, replace every character
/// outside `[a-z0-9 ]` with a space, collapse whitespace runs, trim.
///
/// Total function; empty input yields empty output.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            // Anything outside [a-z0-9], non-ASCII letters included,
            // becomes a separator. Unicode lowercasing can expand a char
            // into a sequence the strip pass would then remove, which
            // would break idempotence.
            pending_space = true;
        }
    }
    out
}

/// Tokenize already-normalized text into its words.
pub fn tokens(normalized: &str) -> Vec<&str> {
    normalized.split_whitespace().collect()
}

/// Check whether any of `targets` appears as a whole word in the token list.
pub fn contains_any(words: &[&str], targets: &[&str]) -> bool {
    words.iter().any(|w| targets.contains(w))
}

/// Check whether `phrase` (already normalized) occurs inside `normalized`
/// on word boundaries.
pub fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let haystack = format!(" {} ", normalized);
    let needle = format!(" {} ", phrase);
    haystack.contains(&needle)
}
