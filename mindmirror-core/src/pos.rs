//! Part-of-speech tagging for theme keywords.
//!
//! Theme labels keep only nouns and adjectives. Any tagger can be plugged in
//! through [`PosTagger`]; [`LexiconTagger`] is a dependency-free default
//! built from closed word classes and suffix rules.

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PosTag {
    Noun,
    Adjective,
    Verb,
    Adverb,
    /// Determiners, pronouns, prepositions, conjunctions and the rest
    Other,
}

impl PosTag {
    /// True for tags usable in a theme label.
    pub fn is_descriptive(self) -> bool {
        matches!(self, PosTag::Noun | PosTag::Adjective)
    }
}

pub trait PosTagger: Send + Sync {
    fn tag(&self, tokens: &[&str]) -> Result<Vec<(String, PosTag)>>;
}

const FUNCTION_WORDS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "i", "me", "my", "we", "our", "you",
    "your", "he", "him", "his", "she", "her", "it", "its", "they", "them", "their", "and", "or",
    "but", "nor", "so", "yet", "if", "because", "although", "though", "while", "in", "on", "at",
    "by", "for", "with", "about", "against", "between", "into", "through", "during", "before",
    "after", "above", "below", "to", "from", "up", "down", "of", "off", "over", "under", "some",
    "any", "each", "every", "all", "both", "few", "many", "much", "most", "other", "such", "no",
    "not", "only", "own", "same", "than", "too", "very",
];

const ADJECTIVES: &[&str] = &[
    "angry", "anxious", "bad", "best", "better", "big", "busy", "calm", "clear", "close",
    "cold", "difficult", "early", "easy", "fine", "free", "full", "glad", "good", "great",
    "happy", "hard", "high", "hot", "important", "late", "little", "lonely", "long", "lovely",
    "low", "mad", "new", "nice", "old", "okay", "proud", "quiet", "ready", "real", "sad",
    "safe", "scared", "sick", "slow", "small", "strong", "sure", "tired", "upset", "warm",
    "weak", "whole", "worse", "worst", "wrong", "young",
];

const VERBS: &[&str] = &[
    "am", "are", "be", "been", "began", "came", "come", "did", "do", "does", "felt", "feel",
    "find", "found", "gave", "get", "go", "got", "had", "has", "have", "is", "keep", "kept",
    "knew", "know", "left", "let", "made", "make", "need", "said", "saw", "say", "see", "seem",
    "take", "tell", "think", "thought", "told", "took", "try", "want", "was", "went", "were",
    "wish",
];

/// Nouns that look like gerunds or participles.
const ING_NOUNS: &[&str] = &[
    "building", "ceiling", "clothing", "evening", "feeling", "meeting", "morning", "nothing",
    "painting", "something", "spring", "string", "thing", "wedding", "wing", "everything",
    "king", "ring", "anything", "beginning", "training", "reading", "writing", "cooking",
    "shopping", "swimming", "running", "hiking", "journaling",
];

/// `-ly` words that are nouns or adjectives rather than adverbs.
const LY_NON_ADVERBS: &[(&str, PosTag)] = &[
    ("family", PosTag::Noun),
    ("belly", PosTag::Noun),
    ("rally", PosTag::Noun),
    ("ally", PosTag::Noun),
    ("lily", PosTag::Noun),
    ("july", PosTag::Noun),
    ("daily", PosTag::Adjective),
    ("early", PosTag::Adjective),
    ("friendly", PosTag::Adjective),
    ("lonely", PosTag::Adjective),
    ("lovely", PosTag::Adjective),
    ("silly", PosTag::Adjective),
    ("ugly", PosTag::Adjective),
    ("elderly", PosTag::Adjective),
    ("likely", PosTag::Adjective),
    ("holy", PosTag::Adjective),
];

const ADJECTIVE_SUFFIXES: &[&str] = &["ful", "less", "ous", "ive", "able", "ible", "ical", "ish"];

/// Closed-class lexicon plus suffix heuristics; unknown words are nouns.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconTagger;

impl LexiconTagger {
    pub fn tag_word(word: &str) -> PosTag {
        let lower = word.to_lowercase();
        let w = lower.as_str();

        if FUNCTION_WORDS.contains(&w) {
            return PosTag::Other;
        }
        if ADJECTIVES.contains(&w) {
            return PosTag::Adjective;
        }
        if VERBS.contains(&w) {
            return PosTag::Verb;
        }
        if let Some((_, tag)) = LY_NON_ADVERBS.iter().find(|(word, _)| *word == w) {
            return *tag;
        }
        if w.len() > 4 && w.ends_with("ly") {
            return PosTag::Adverb;
        }
        if ING_NOUNS.contains(&w) {
            return PosTag::Noun;
        }
        if w.len() > 5 && w.ends_with("ing") {
            return PosTag::Verb;
        }
        if w.len() > 4 && w.ends_with("ed") && !w.ends_with("eed") {
            return PosTag::Verb;
        }
        if ADJECTIVE_SUFFIXES
            .iter()
            .any(|suffix| w.len() > suffix.len() + 2 && w.ends_with(suffix))
        {
            return PosTag::Adjective;
        }
        PosTag::Noun
    }
}

impl PosTagger for LexiconTagger {
    fn tag(&self, tokens: &[&str]) -> Result<Vec<(String, PosTag)>> {
        Ok(tokens
            .iter()
            .map(|t| (t.to_string(), Self::tag_word(t)))
            .collect())
    }
}
