//! Word classifier
//!
//! Three layers of increasing strictness decide whether an OCR token is a
//! usable vocabulary word:
//! - [`is_valid_word_pattern`]: shape of the string alone
//! - [`is_plausible_word`]: letter patterns OCR noise tends to produce, with a
//!   confidence floor for uncommon-looking tokens
//! - [`QualityFilter`]: the final gate, confidence thresholds and blacklist

use crate::analysis::lexicon::{BLACKLIST, COMMON_WORDS, NO_VOWEL_WORDS, RARE_START_WORDS};
use crate::config::QualityThresholds;

const MIN_WORD_LEN: usize = 2;
const MAX_PATTERN_LEN: usize = 20;
const MAX_PLAUSIBLE_LEN: usize = 30;
const MAX_COMMON_LEN: usize = 15;

/// Below this confidence a plausible word must also look common
const LOW_CONFIDENCE: f32 = 60.0;
const LOW_CONFIDENCE_FLOOR: f32 = 50.0;

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

fn is_consonant(c: char) -> bool {
    c.is_ascii_alphabetic() && !is_vowel(c)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '\'' || c == '-'
}

fn has_vowel(word: &str) -> bool {
    word.chars().any(is_vowel)
}

/// Leading/trailing apostrophe or hyphen, or a doubled one
fn has_bad_punctuation(word: &str) -> bool {
    word.starts_with(['\'', '-'])
        || word.ends_with(['\'', '-'])
        || word.contains("--")
        || word.contains("''")
}

/// Any character repeated three or more times in a row
fn has_triple_run(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

/// Whether a string has the shape of an English word
///
/// ASCII letters, apostrophes and hyphens only, 2-20 characters, no dangling
/// or doubled punctuation, no triple runs, and at least one vowel unless it is
/// one of the known vowel-less words ("sky", "try", ...).
pub fn is_valid_word_pattern(word: &str) -> bool {
    let word = word.trim();
    let len = word.chars().count();

    if !(MIN_WORD_LEN..=MAX_PATTERN_LEN).contains(&len) {
        return false;
    }
    if !word.chars().all(is_word_char) {
        return false;
    }
    if has_bad_punctuation(word) {
        return false;
    }
    if !has_vowel(word) && !NO_VOWEL_WORDS.contains(word.to_ascii_lowercase().as_str()) {
        return false;
    }
    !has_triple_run(word)
}

/// Whether a word is frequent English or at least looks like ordinary English
pub fn is_common_word(word: &str) -> bool {
    let lower = word.trim().to_ascii_lowercase();

    if COMMON_WORDS.contains(lower.as_str()) {
        return true;
    }
    if !has_vowel(&lower) {
        return NO_VOWEL_WORDS.contains(lower.as_str());
    }
    (MIN_WORD_LEN..=MAX_COMMON_LEN).contains(&lower.chars().count())
}

/// Letter combinations that are almost always misrecognitions
fn is_implausible_pattern(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    if RARE_START_WORDS.contains(lower.as_str()) {
        return false;
    }

    let letters: Vec<char> = lower.chars().collect();
    let len = letters.len();

    if len >= 3 && letters.iter().all(|&c| is_consonant(c)) && !NO_VOWEL_WORDS.contains(lower.as_str()) {
        return true;
    }
    if len >= 3 && letters.iter().all(|&c| is_vowel(c)) {
        return true;
    }
    if letters.first() == Some(&'q') && letters.get(1) != Some(&'u') {
        return true;
    }
    if len == 2 && matches!(letters[0], 'j' | 'q' | 'x' | 'z') {
        return true;
    }

    letters
        .windows(3)
        .any(|w| w.iter().all(|c| matches!(c, 'x' | 'y' | 'z')))
}

/// Whether a recognized token is believable as a word at the given confidence
pub fn is_plausible_word(word: &str, confidence: f32) -> bool {
    let word = word.trim();
    let len = word.chars().count();

    if !(MIN_WORD_LEN..=MAX_PLAUSIBLE_LEN).contains(&len) {
        return false;
    }
    if !word.chars().all(is_word_char) || has_bad_punctuation(word) || has_triple_run(word) {
        return false;
    }
    if is_implausible_pattern(word) {
        return false;
    }

    if confidence < LOW_CONFIDENCE {
        return is_common_word(word) && confidence >= LOW_CONFIDENCE_FLOOR;
    }
    true
}

/// Final acceptance gate for word candidates
#[derive(Debug, Clone, Default)]
pub struct QualityFilter {
    thresholds: QualityThresholds,
}

impl QualityFilter {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Whether a word at the given confidence may appear in the output
    pub fn passes(&self, word: &str, confidence: f32) -> bool {
        let t = &self.thresholds;

        if !is_valid_word_pattern(word) || confidence < t.min_confidence {
            return false;
        }

        // Short tokens are the most common misreads
        if word.chars().count() <= t.short_word_length && confidence < t.short_word_confidence {
            return false;
        }

        if !is_common_word(word) && confidence < t.uncommon_word_confidence {
            return false;
        }

        !BLACKLIST.contains(word.to_ascii_lowercase().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_no_vowel_exception() {
        assert!(is_valid_word_pattern("sky"));
        assert!(is_valid_word_pattern("Why"));
        assert!(!is_valid_word_pattern("xyz"));
    }

    #[test]
    fn test_pattern_length_limits() {
        assert!(!is_valid_word_pattern("a"));
        assert!(is_valid_word_pattern("an"));
        assert!(is_valid_word_pattern("abcdefghijabcdefghij"));
        assert!(!is_valid_word_pattern("abcdefghijabcdefghija"));
    }

    #[test]
    fn test_pattern_punctuation() {
        assert!(!is_valid_word_pattern("try-"));
        assert!(!is_valid_word_pattern("'tis"));
        assert!(!is_valid_word_pattern("well--known"));
        assert!(!is_valid_word_pattern("rock''n"));
        assert!(is_valid_word_pattern("well-known"));
        assert!(is_valid_word_pattern("don't"));
        assert!(!is_valid_word_pattern("hello!"));
        assert!(!is_valid_word_pattern("caf\u{e9}"));
    }

    #[test]
    fn test_pattern_triple_run() {
        assert!(!is_valid_word_pattern("aaab"));
        assert!(is_valid_word_pattern("aab"));
        assert!(is_valid_word_pattern("bookkeeper"));
    }

    #[test]
    fn test_common_word() {
        assert!(is_common_word("the"));
        assert!(is_common_word("Apple"));
        assert!(is_common_word("fly"));
        assert!(!is_common_word("brr"));
        assert!(!is_common_word("internationalization"));
    }

    #[test]
    fn test_plausible_word_patterns() {
        assert!(is_plausible_word("apple", 90.0));
        assert!(is_plausible_word("sky", 90.0));
        assert!(is_plausible_word("queen", 90.0));
        assert!(is_plausible_word("jump", 90.0));
        assert!(is_plausible_word("qi", 90.0));
        assert!(!is_plausible_word("rtl", 90.0));
        assert!(!is_plausible_word("eau", 90.0));
        assert!(!is_plausible_word("qat", 90.0));
        assert!(!is_plausible_word("jx", 90.0));
        assert!(!is_plausible_word("bxyz", 90.0));
    }

    #[test]
    fn test_plausible_low_confidence() {
        // Uncommon-looking words need at least 60
        assert!(!is_plausible_word("internationalization", 55.0));
        assert!(is_plausible_word("internationalization", 60.0));
        // Common words are accepted down to 50
        assert!(is_plausible_word("water", 50.0));
        assert!(!is_plausible_word("water", 49.0));
    }

    #[test]
    fn test_quality_short_word_threshold() {
        let filter = QualityFilter::default();
        assert!(!filter.passes("go", 65.0));
        assert!(filter.passes("go", 75.0));
        assert!(is_plausible_word("go", 75.0));
    }

    #[test]
    fn test_quality_minimum_confidence() {
        let filter = QualityFilter::default();
        assert!(!filter.passes("water", 39.0));
        assert!(filter.passes("water", 40.0));
    }

    #[test]
    fn test_quality_uncommon_word() {
        let filter = QualityFilter::default();
        // No vowel and not excepted never passes the pattern test
        assert!(!filter.passes("brr", 99.0));
        // Long words are not "common" and need 65
        assert!(!filter.passes("internationalization", 60.0));
        assert!(filter.passes("internationalization", 65.0));
    }

    #[test]
    fn test_quality_blacklist() {
        let filter = QualityFilter::default();
        assert!(!filter.passes("ee", 99.0));
        assert!(!filter.passes("lol", 99.0));
        assert!(!filter.passes("VII", 99.0));
        assert!(filter.passes("eel", 99.0));
    }

    #[test]
    fn test_quality_custom_thresholds() {
        let filter = QualityFilter::new(QualityThresholds {
            short_word_confidence: 50.0,
            ..Default::default()
        });
        assert!(filter.passes("go", 55.0));
    }
}
