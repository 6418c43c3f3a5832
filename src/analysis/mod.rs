//! Word Analysis Layer
//!
//! Turns recognized text into vocabulary candidates:
//! - Word lists and the validity/plausibility classifier
//! - The final quality gate
//! - Line-scoped candidate extraction

pub mod extraction;
pub mod lexicon;
pub mod words;

pub use extraction::{extract_words, CandidateSource, WordCandidate};
pub use words::{is_plausible_word, is_valid_word_pattern, QualityFilter};
