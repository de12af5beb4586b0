//! Shared text statistics.
//!
//! Every parser counts words and characters through these helpers so the
//! numbers stay comparable across source formats. Words are whitespace
//! tokens; characters are Unicode scalar values, not bytes.

pub fn word_count(text: &str) -> i64 {
    text.split_whitespace().count() as i64
}

pub fn char_count(text: &str) -> i64 {
    text.chars().count() as i64
}
