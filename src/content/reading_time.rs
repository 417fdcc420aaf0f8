//! Reading time estimation

use super::ContentBlock;

/// Assumed reading speed
pub const WORDS_PER_MINUTE: usize = 200;

/// Words in a string, counted as pieces between single spaces
///
/// Consecutive spaces and the empty string still produce (empty) pieces, so
/// `""` counts as one word and `"a  b"` as three.
fn words(text: &str) -> usize {
    text.split(' ').count()
}

/// Total words across headings and body spans of every block
pub fn word_count(content: &[ContentBlock]) -> usize {
    content
        .iter()
        .map(|block| {
            words(&block.heading) + block.body.iter().map(|span| words(&span.text)).sum::<usize>()
        })
        .sum()
}

/// Estimated reading time in whole minutes, rounded up
pub fn reading_time(content: &[ContentBlock]) -> usize {
    word_count(content).div_ceil(WORDS_PER_MINUTE)
}
