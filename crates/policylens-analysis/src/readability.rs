//! Flesch reading-ease approximation.
//!
//! Syllables are estimated by counting runs of vowels across the whole text
//! rather than with a dictionary, so scores are only comparable between
//! documents scored by this module.

/// Count whitespace-separated tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Count non-blank fragments between `.`, `!` and `?`.
pub fn sentence_count(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
}

/// Approximate syllables as maximal runs of `aeiouy`.
pub fn syllable_count(text: &str) -> usize {
    let mut count = 0;
    let mut in_run = false;
    for c in text.chars() {
        let vowel = matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if vowel && !in_run {
            count += 1;
        }
        in_run = vowel;
    }
    count
}

/// Reading-ease score clamped to `[0, 100]`.
///
/// `206.835 - 1.015 * (words / sentences) - 84.6 * (syllables / words)`, with
/// each count floored at 1 so empty or unpunctuated text still scores.
pub fn readability_score(text: &str) -> f64 {
    let words = word_count(text).max(1) as f64;
    let sentences = sentence_count(text).max(1) as f64;
    let syllables = syllable_count(text).max(1) as f64;

    let score = 206.835 - 1.015 * (words / sentences) - 84.6 * (syllables / words);
    score.clamp(0.0, 100.0)
}
