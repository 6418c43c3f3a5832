//! Word extraction from a recognition result
//!
//! Vocabulary sheets usually put the English word first on each line followed
//! by translations, notes or example sentences. Extraction therefore takes at
//! most one word per line: the leftmost one that is not inside brackets or
//! quotes and does not follow CJK/Hangul text.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

use crate::analysis::words::{is_plausible_word, is_valid_word_pattern, QualityFilter};
use crate::vision::ocr::{BBox, OcrWord};
use crate::vision::orchestrator::RecognitionResult;

/// Where a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// A boxed engine word, leftmost on its line
    LineBased,
    /// Parsed out of the line text when no boxed word qualified
    Fallback,
    /// Taken from the flat word list because no line produced anything
    FlatList,
}

/// A vocabulary word proposed from the image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCandidate {
    /// Lowercase word
    pub word: String,
    /// Engine confidence (0 - 100)
    pub confidence: f32,
    pub bbox: Option<BBox>,
    /// Text of the line the word was found on
    pub line: Option<String>,
    pub source: CandidateSource,
}

/// Which structure of the result a line was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOrigin {
    EngineLines,
    Paragraphs,
    TextSplit,
}

/// One line of recognized text
#[derive(Debug, Clone)]
pub struct TextLine {
    pub text: String,
    pub bbox: Option<BBox>,
    pub words: Vec<OcrWord>,
    pub origin: LineOrigin,
}

/// Word found on a single line, before the quality gate
#[derive(Debug, Clone, PartialEq)]
pub struct LineWord {
    pub text: String,
    pub confidence: f32,
    pub bbox: Option<BBox>,
    pub source: CandidateSource,
}

/// Build the ordered line list: engine lines, then paragraph lines, then the
/// raw text split on newlines
pub fn collect_lines(result: &RecognitionResult) -> Vec<TextLine> {
    if !result.lines.is_empty() {
        return result
            .lines
            .iter()
            .filter(|line| !line.text.trim().is_empty())
            .map(|line| TextLine {
                text: line.text.clone(),
                bbox: line.bbox,
                words: line.words.clone(),
                origin: LineOrigin::EngineLines,
            })
            .collect();
    }

    if !result.paragraphs.is_empty() {
        return result
            .paragraphs
            .iter()
            .flat_map(|paragraph| paragraph.lines.iter())
            .filter(|line| !line.text.trim().is_empty())
            .map(|line| TextLine {
                text: line.text.clone(),
                bbox: line.bbox,
                words: line.words.clone(),
                origin: LineOrigin::Paragraphs,
            })
            .collect();
    }

    result
        .text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| TextLine {
            text: line.to_string(),
            bbox: None,
            words: Vec::new(),
            origin: LineOrigin::TextSplit,
        })
        .collect()
}

/// Hangul, kana and CJK ideographs
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{1100}'..='\u{11FF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{3131}'..='\u{3163}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7A3}'
        | '\u{F900}'..='\u{FAFF}')
}

/// Whether `word` may start a vocabulary entry on `line_text`
fn is_valid_word_start(word: &str, line_text: &str) -> bool {
    if !is_valid_word_pattern(word) {
        return false;
    }

    let Some(index) = line_text.find(word) else {
        return true;
    };
    let before = &line_text[..index];

    let opened = before.chars().filter(|c| matches!(c, '[' | '(' | '{' | '<')).count();
    let closed = before.chars().filter(|c| matches!(c, ']' | ')' | '}' | '>')).count();
    if opened > closed {
        return false;
    }

    let straight_quotes = before.chars().filter(|&c| c == '"').count();
    let curly_open = before.chars().filter(|&c| c == '\u{201C}').count();
    let curly_close = before.chars().filter(|&c| c == '\u{201D}').count();
    if straight_quotes % 2 == 1 || curly_open > curly_close {
        return false;
    }

    !before.trim_end().chars().last().is_some_and(is_cjk)
}

fn closing_for(c: char) -> Option<char> {
    match c {
        '[' => Some(']'),
        '(' => Some(')'),
        '{' => Some('}'),
        '<' => Some('>'),
        '"' => Some('"'),
        '\u{201C}' => Some('\u{201D}'),
        _ => None,
    }
}

/// Word tokens of a line's text
///
/// Bracketed or quoted spans, digits and other non-letters separate tokens and
/// are dropped. A token directly after CJK text (only whitespace in between)
/// is dropped as well.
fn line_text_tokens(text: &str) -> Vec<String> {
    enum Piece {
        Letter(char),
        Space,
        Break,
        Cjk,
    }

    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(close) = closing_for(c) {
            if let Some(offset) = chars[i + 1..].iter().position(|&x| x == close) {
                pieces.push(Piece::Break);
                i += offset + 2;
                continue;
            }
        }
        pieces.push(if c.is_ascii_alphabetic() || c == '\'' || c == '-' {
            Piece::Letter(c)
        } else if c.is_whitespace() {
            Piece::Space
        } else if is_cjk(c) {
            Piece::Cjk
        } else {
            Piece::Break
        });
        i += 1;
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_blocked = false;
    let mut after_cjk = false;

    let mut flush = |current: &mut String, blocked: bool, after_cjk: &mut bool| {
        if !current.is_empty() {
            if !blocked {
                tokens.push(std::mem::take(current));
            }
            current.clear();
            *after_cjk = false;
        }
    };

    for piece in pieces {
        match piece {
            Piece::Letter(c) => {
                if current.is_empty() {
                    current_blocked = after_cjk;
                }
                current.push(c);
            }
            Piece::Space => flush(&mut current, current_blocked, &mut after_cjk),
            Piece::Break => {
                flush(&mut current, current_blocked, &mut after_cjk);
                after_cjk = false;
            }
            Piece::Cjk => {
                flush(&mut current, current_blocked, &mut after_cjk);
                after_cjk = true;
            }
        }
    }
    flush(&mut current, current_blocked, &mut after_cjk);

    tokens
}

/// Leftmost acceptable word on a line
///
/// Boxed engine words are tried first, ordered by their left edge. When none
/// qualifies the line text itself is parsed, and the word gets the default
/// text-parse confidence and the line's box.
pub fn first_word_in_line(
    line: &TextLine,
    min_confidence: f32,
    text_parse_confidence: f32,
) -> Option<LineWord> {
    let mut boxed: Vec<(&OcrWord, BBox)> = line
        .words
        .iter()
        .filter_map(|word| word.bbox.map(|bbox| (word, bbox)))
        .collect();
    boxed.sort_by_key(|(_, bbox)| bbox.x0);

    for (word, bbox) in boxed {
        let text = word.text.trim();
        if text.is_empty() || word.confidence < min_confidence {
            continue;
        }
        if is_valid_word_start(text, &line.text) {
            return Some(LineWord {
                text: text.to_string(),
                confidence: word.confidence,
                bbox: Some(bbox),
                source: CandidateSource::LineBased,
            });
        }
    }

    line_text_tokens(&line.text)
        .into_iter()
        .find(|token| is_valid_word_pattern(token))
        .map(|token| LineWord {
            text: token,
            confidence: text_parse_confidence,
            bbox: line.bbox,
            source: CandidateSource::Fallback,
        })
}

/// Turn the selected recognition result into ordered, unique word candidates
pub fn extract_words(result: &RecognitionResult, filter: &QualityFilter) -> Vec<WordCandidate> {
    let thresholds = filter.thresholds();
    let lines = collect_lines(result);
    let mut candidates = Vec::new();

    for line in &lines {
        let Some(found) = first_word_in_line(
            line,
            thresholds.min_confidence,
            thresholds.text_parse_confidence,
        ) else {
            continue;
        };

        if is_plausible_word(&found.text, found.confidence)
            && filter.passes(&found.text, found.confidence)
        {
            candidates.push(WordCandidate {
                word: found.text.to_lowercase(),
                confidence: found.confidence,
                bbox: found.bbox,
                line: Some(line.text.clone()),
                source: found.source,
            });
        } else {
            debug!("Rejected '{}' ({:.1}) on line '{}'", found.text, found.confidence, line.text);
        }
    }

    if candidates.is_empty() {
        debug!(
            "No line-based words in {} lines, scanning {} flat words",
            lines.len(),
            result.words.len()
        );
        candidates = flat_list_candidates(&result.words, filter);
    }

    order_candidates(dedupe_candidates(candidates))
}

/// Every word of the flat list that passes the gate on its own
fn flat_list_candidates(words: &[OcrWord], filter: &QualityFilter) -> Vec<WordCandidate> {
    let min_confidence = filter.thresholds().min_confidence;

    words
        .iter()
        .filter_map(|word| {
            let text = word.text.trim();
            if text.is_empty() || word.confidence < min_confidence {
                return None;
            }
            if !is_plausible_word(text, word.confidence) || !filter.passes(text, word.confidence) {
                return None;
            }
            Some(WordCandidate {
                word: text.to_lowercase(),
                confidence: word.confidence,
                bbox: word.bbox,
                line: None,
                source: CandidateSource::FlatList,
            })
        })
        .collect()
}

/// Keep one candidate per lowercase word, the one with the highest confidence
///
/// The survivor takes the position of the first occurrence.
pub fn dedupe_candidates(candidates: Vec<WordCandidate>) -> Vec<WordCandidate> {
    let mut unique: Vec<WordCandidate> = Vec::with_capacity(candidates.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        let key = candidate.word.to_lowercase();
        match index.get(&key) {
            Some(&i) => {
                if candidate.confidence > unique[i].confidence {
                    unique[i] = candidate;
                }
            }
            None => {
                index.insert(key, unique.len());
                unique.push(candidate);
            }
        }
    }

    unique
}

fn compare_candidates(a: &WordCandidate, b: &WordCandidate) -> Ordering {
    match (a.bbox, b.bbox) {
        (Some(a_box), Some(b_box)) => a_box.y0.cmp(&b_box.y0),
        _ => b.confidence.total_cmp(&a.confidence),
    }
}

/// Order top-to-bottom; pairs where a box is missing compare by confidence
///
/// The mixed comparison is not a total order, which the std sorts may reject
/// with a panic, so this is a stable insertion sort.
pub fn order_candidates(mut candidates: Vec<WordCandidate>) -> Vec<WordCandidate> {
    for i in 1..candidates.len() {
        let mut j = i;
        while j > 0 && compare_candidates(&candidates[j - 1], &candidates[j]) == Ordering::Greater {
            candidates.swap(j - 1, j);
            j -= 1;
        }
    }
    candidates
}
