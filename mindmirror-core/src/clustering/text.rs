//! Keyword preprocessing: normalization, stopwords and noun lemmas.

/// Standard English stopword list.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "ain", "all", "am", "an", "and", "any",
    "are", "aren", "aren't", "as", "at", "be", "because", "been", "before", "being", "below",
    "between", "both", "but", "by", "can", "couldn", "couldn't", "d", "did", "didn", "didn't",
    "do", "does", "doesn", "doesn't", "doing", "don", "don't", "down", "during", "each", "few",
    "for", "from", "further", "had", "hadn", "hadn't", "has", "hasn", "hasn't", "have", "haven",
    "haven't", "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how",
    "i", "if", "in", "into", "is", "isn", "isn't", "it", "it's", "its", "itself", "just", "ll",
    "m", "ma", "me", "mightn", "mightn't", "more", "most", "mustn", "mustn't", "my", "myself",
    "needn", "needn't", "no", "nor", "not", "now", "o", "of", "off", "on", "once", "only", "or",
    "other", "our", "ours", "ourselves", "out", "over", "own", "re", "s", "same", "shan",
    "shan't", "she", "she's", "should", "should've", "shouldn", "shouldn't", "so", "some",
    "such", "t", "than", "that", "that'll", "the", "their", "theirs", "them", "themselves",
    "then", "there", "these", "they", "this", "those", "through", "to", "too", "under", "until",
    "up", "ve", "very", "was", "wasn", "wasn't", "we", "were", "weren", "weren't", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "won", "won't",
    "wouldn", "wouldn't", "y", "you", "you'd", "you'll", "you're", "you've", "your", "yours",
    "yourself", "yourselves",
];

/// Extra function words dropped when weighting terms.
const TERM_STOPWORDS: &[&str] = &[
    "also", "although", "always", "among", "another", "anyhow", "anyone", "anything", "anyway",
    "around", "back", "became", "become", "becomes", "behind", "beside", "besides", "beyond",
    "could", "either", "else", "elsewhere", "enough", "etc", "even", "ever", "every",
    "everyone", "everything", "everywhere", "get", "give", "go", "however", "indeed", "last",
    "less", "made", "many", "may", "might", "mine", "moreover", "much", "must", "neither",
    "never", "nevertheless", "next", "nobody", "none", "nothing", "often", "perhaps", "please",
    "put", "rather", "really", "see", "seem", "seemed", "seems", "several", "since", "something",
    "sometime", "sometimes", "somewhere", "still", "take", "thence", "therefore", "though",
    "thus", "together", "toward", "towards", "upon", "us", "well", "whatever", "whenever",
    "whereas", "whether", "whole", "within", "without", "would", "yet",
];

/// Irregular plural nouns.
const IRREGULAR_NOUNS: &[(&str, &str)] = &[
    ("children", "child"),
    ("feet", "foot"),
    ("geese", "goose"),
    ("knives", "knife"),
    ("leaves", "leaf"),
    ("lives", "life"),
    ("men", "man"),
    ("mice", "mouse"),
    ("selves", "self"),
    ("shelves", "shelf"),
    ("teeth", "tooth"),
    ("thieves", "thief"),
    ("wives", "wife"),
    ("wolves", "wolf"),
    ("women", "woman"),
];

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Stopword check applied on top of [`is_stopword`] when building term weights.
pub fn is_term_stopword(word: &str) -> bool {
    is_stopword(word) || TERM_STOPWORDS.contains(&word)
}

/// Lowercase and drop every character outside `a-z` and whitespace.
///
/// Characters are removed, not replaced: `don't` becomes `dont`.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_whitespace())
        .collect()
}

/// Reduce a plural noun to its singular form.
pub fn lemmatize(word: &str) -> String {
    if let Some((_, lemma)) = IRREGULAR_NOUNS.iter().find(|(plural, _)| *plural == word) {
        return lemma.to_string();
    }
    if word.len() <= 3 || word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        if stem.len() > 1 {
            return format!("{stem}y");
        }
    }
    if word.ends_with("sses") {
        return word[..word.len() - 2].to_string();
    }
    for suffix in ["ches", "shes", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    match word.strip_suffix('s') {
        Some(stem) => stem.to_string(),
        None => word.to_string(),
    }
}

/// Content-word tokens of `text`: normalized, stopwords removed, lemmatized.
pub fn preprocess(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|w| !is_stopword(w))
        .map(lemmatize)
        .collect()
}
