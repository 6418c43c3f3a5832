//! Fixed word lists used by the word classifier

use std::collections::HashSet;
use std::sync::LazyLock;

/// Real words that contain no a/e/i/o/u
pub static NO_VOWEL_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "by", "cry", "dry", "fly", "fry", "my", "pry", "shy", "sky", "sly", "spy", "try", "why",
    ]
    .into_iter()
    .collect()
});

/// Two-letter words allowed to start with j/q/x/z
pub static RARE_START_WORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ["jo", "qi", "xi", "xu", "za", "zo"].into_iter().collect());

/// High-frequency English words
pub static COMMON_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // function words
        "a", "an", "and", "are", "as", "at", "be", "been", "by", "for", "from", "has", "he",
        "in", "is", "it", "its", "of", "on", "that", "the", "to", "was", "will", "with", "you",
        "your", "have", "had", "his", "her", "she", "we", "they", "them", "this", "can", "do",
        "not", "but", "or",
        // nouns
        "time", "year", "way", "day", "man", "thing", "woman", "life", "child", "world",
        "school", "state", "family", "student", "group", "country", "problem", "hand", "part",
        "place", "case", "week", "company", "system", "program", "question", "work",
        "government", "number", "night", "point", "home", "water", "room", "mother", "area",
        "money", "story", "fact", "month", "lot", "right", "study", "book", "eye", "job",
        "word", "business",
        // verbs and adjectives
        "see", "get", "make", "go", "know", "take", "say", "come", "could", "want", "look",
        "use", "find", "give", "tell", "ask", "seem", "feel", "try", "leave", "call", "good",
        "new", "first", "last", "long", "great", "little", "own", "other", "old", "big",
        "high", "different", "small", "large", "next", "early", "young", "important", "few",
        "public", "bad", "same", "able",
    ]
    .into_iter()
    .collect()
});

/// Tokens OCR commonly hallucinates from strokes, borders and noise
pub static BLACKLIST: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    let mut words: HashSet<&'static str> = [
        // roman numeral fragments
        "il", "ii", "iii", "iv", "vi", "vii", "viii", "ix", "xi",
        // repeated-character noise
        "lol", "lll", "ooo", "uuu",
    ]
    .into_iter()
    .collect();

    // doubled letters "aa" through "zz"
    const DOUBLED: [&str; 26] = [
        "aa", "bb", "cc", "dd", "ee", "ff", "gg", "hh", "ii", "jj", "kk", "ll", "mm", "nn",
        "oo", "pp", "qq", "rr", "ss", "tt", "uu", "vv", "ww", "xx", "yy", "zz",
    ];
    words.extend(DOUBLED);
    words
});
