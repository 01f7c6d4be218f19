//! Theme labels for clusters of journal entries.
//!
//! Within each cluster, terms are weighted by TF-IDF (smoothed idf,
//! L2-normalized rows) over the cluster's own entries, summed per term and
//! ranked. The top descriptive terms (nouns and adjectives) form the label.

use super::text::{is_stopword, is_term_stopword, normalize, preprocess};
use crate::error::{Error, Result};
use crate::pos::PosTagger;
use std::collections::{BTreeMap, HashMap};

/// Vocabulary cap per cluster, by corpus frequency.
const MAX_FEATURES: usize = 100;

pub const EMPTY_THEME: &str = "No entries in this theme";

pub fn theme_key(cluster_id: usize) -> String {
    format!("Theme {}", cluster_id + 1)
}

pub fn general_theme(cluster_id: usize) -> String {
    format!("General Theme {}", cluster_id + 1)
}

pub fn error_theme(cluster_id: usize) -> String {
    format!("Error Theme {}", cluster_id + 1)
}

/// Label from ranked keywords: the first two, with `...` when more exist.
pub fn label_from_keywords(keywords: &[String]) -> Option<String> {
    if keywords.is_empty() {
        return None;
    }
    let mut label = keywords.iter().take(2).cloned().collect::<Vec<_>>().join(", ");
    if keywords.len() > 2 {
        label.push_str("...");
    }
    Some(label)
}

/// Sum of L2-normalized TF-IDF rows per term, ranked high to low.
///
/// Ties break alphabetically. Fails when no document has a usable term.
pub fn rank_terms(docs: &[Vec<String>]) -> Result<Vec<(String, f64)>> {
    let docs: Vec<Vec<&str>> = docs
        .iter()
        .map(|doc| {
            doc.iter()
                .map(String::as_str)
                .filter(|t| t.len() >= 2 && !is_term_stopword(t))
                .collect()
        })
        .collect();

    let mut corpus_tf: HashMap<&str, usize> = HashMap::new();
    for doc in &docs {
        for &term in doc {
            *corpus_tf.entry(term).or_default() += 1;
        }
    }
    if corpus_tf.is_empty() {
        return Err(Error::Clustering(
            "empty vocabulary; entries contain only stop words".to_string(),
        ));
    }

    let mut vocab: Vec<(&str, usize)> = corpus_tf.into_iter().collect();
    vocab.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    vocab.truncate(MAX_FEATURES);
    let vocab: Vec<&str> = vocab.into_iter().map(|(t, _)| t).collect();
    let index: HashMap<&str, usize> = vocab.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    let n_docs = docs.len() as f64;
    let mut df = vec![0usize; vocab.len()];
    let mut counts: Vec<HashMap<usize, usize>> = Vec::with_capacity(docs.len());
    for doc in &docs {
        let mut tf: HashMap<usize, usize> = HashMap::new();
        for term in doc {
            if let Some(&i) = index.get(term) {
                *tf.entry(i).or_default() += 1;
            }
        }
        for &i in tf.keys() {
            df[i] += 1;
        }
        counts.push(tf);
    }

    let idf: Vec<f64> = df
        .iter()
        .map(|&d| ((1.0 + n_docs) / (1.0 + d as f64)).ln() + 1.0)
        .collect();

    let mut totals = vec![0.0f64; vocab.len()];
    for tf in &counts {
        let row: Vec<(usize, f64)> = tf.iter().map(|(&i, &c)| (i, c as f64 * idf[i])).collect();
        let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (i, w) in row {
                totals[i] += w / norm;
            }
        }
    }

    let mut ranked: Vec<(String, f64)> = vocab
        .iter()
        .zip(totals)
        .map(|(t, w)| (t.to_string(), w))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(ranked)
}

/// Most frequent non-stopword words of the raw texts, first occurrence first on ties.
pub fn frequent_words(texts: &[&str], limit: usize) -> Vec<String> {
    let joined = normalize(&texts.join(" "));
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for word in joined.split_whitespace().filter(|w| !is_stopword(w)) {
        match counts.iter_mut().find(|(w, _)| *w == word) {
            Some((_, c)) => *c += 1,
            None => counts.push((word, 1)),
        }
    }
    // Stable sort keeps first-occurrence order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(limit)
        .map(|(w, _)| w.to_string())
        .collect()
}

/// Label one cluster's texts.
pub fn label_group(
    cluster_id: usize,
    texts: &[&str],
    num_keywords: usize,
    tagger: &dyn PosTagger,
) -> Result<String> {
    if texts.is_empty() {
        return Ok(EMPTY_THEME.to_string());
    }

    let docs: Vec<Vec<String>> = texts
        .iter()
        .map(|t| preprocess(t))
        .filter(|doc| !doc.is_empty())
        .collect();

    if docs.is_empty() {
        tracing::warn!(
            cluster = cluster_id + 1,
            "No content words after preprocessing, falling back to word counts"
        );
        let keywords = frequent_words(texts, num_keywords);
        return Ok(label_from_keywords(&keywords).unwrap_or_else(|| general_theme(cluster_id)));
    }

    let ranked = rank_terms(&docs)?;
    let terms: Vec<&str> = ranked.iter().map(|(t, _)| t.as_str()).collect();

    let keywords: Vec<String> = match tagger.tag(&terms) {
        Ok(tagged) => tagged
            .into_iter()
            .filter(|(word, tag)| tag.is_descriptive() && !is_stopword(word))
            .map(|(word, _)| word)
            .take(num_keywords)
            .collect(),
        Err(e) => {
            tracing::warn!(cluster = cluster_id + 1, error = %e, "POS tagging failed, using raw terms");
            terms
                .iter()
                .take(num_keywords)
                .map(|t| t.to_string())
                .collect()
        }
    };

    Ok(label_from_keywords(&keywords).unwrap_or_else(|| general_theme(cluster_id)))
}

/// Label every cluster id in `0..n_clusters`.
///
/// `labels[i]` is the cluster of `texts[i]`. A failure in one cluster
/// yields `Error Theme N` for it and does not affect the others.
pub fn label_clusters(
    labels: &[usize],
    n_clusters: usize,
    texts: &[&str],
    num_keywords: usize,
    tagger: &dyn PosTagger,
) -> BTreeMap<String, String> {
    if texts.len() > labels.len() {
        tracing::warn!(
            texts = texts.len(),
            labels = labels.len(),
            "More texts than training labels, extra texts ignored"
        );
    }

    let mut groups: Vec<Vec<&str>> = vec![Vec::new(); n_clusters];
    for (&label, &text) in labels.iter().zip(texts) {
        match groups.get_mut(label) {
            Some(group) => group.push(text),
            None => tracing::warn!(label, n_clusters, "Label out of range, text ignored"),
        }
    }

    groups
        .iter()
        .enumerate()
        .map(|(cluster_id, group)| {
            let label = label_group(cluster_id, group, num_keywords, tagger).unwrap_or_else(|e| {
                tracing::error!(cluster = cluster_id + 1, error = %e, "Theme extraction failed");
                error_theme(cluster_id)
            });
            (theme_key(cluster_id), label)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::{LexiconTagger, PosTag};

    struct FailingTagger;

    impl PosTagger for FailingTagger {
        fn tag(&self, _tokens: &[&str]) -> Result<Vec<(String, PosTag)>> {
            Err(Error::Clustering("tagger unavailable".to_string()))
        }
    }

    fn doc(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn label_format() {
        assert_eq!(label_from_keywords(&[]), None);
        assert_eq!(label_from_keywords(&doc(&["work"])).unwrap(), "work");
        assert_eq!(label_from_keywords(&doc(&["work", "boss"])).unwrap(), "work, boss");
        assert_eq!(
            label_from_keywords(&doc(&["work", "boss", "deadline"])).unwrap(),
            "work, boss..."
        );
    }

    #[test]
    fn tfidf_prefers_terms_shared_and_frequent() {
        let ranked = rank_terms(&[
            doc(&["work", "deadline", "work"]),
            doc(&["work", "boss"]),
        ])
        .unwrap();
        assert_eq!(ranked[0].0, "work");
        let weight = |t: &str| ranked.iter().find(|(w, _)| w == t).unwrap().1;
        assert!(weight("deadline") > 0.0);
        assert!(weight("work") > weight("boss"));
    }

    #[test]
    fn single_doc_rows_are_unit_length() {
        let ranked = rank_terms(&[doc(&["rain", "walk"])]).unwrap();
        let sq: f64 = ranked.iter().map(|(_, w)| w * w).sum();
        assert!((sq - 1.0).abs() < 1e-9);
        // equal weights tie-break alphabetically
        assert_eq!(ranked[0].0, "rain");
    }

    #[test]
    fn empty_vocabulary_is_an_error() {
        assert!(rank_terms(&[doc(&["x", "really"])]).is_err());
    }

    #[test]
    fn frequent_words_keep_first_seen_order() {
        let words = frequent_words(&["Rain, rain and sun", "sun wind"], 5);
        assert_eq!(words, vec!["rain", "sun", "wind"]);
    }

    #[test]
    fn group_labels() {
        let tagger = LexiconTagger;
        assert_eq!(label_group(0, &[], 5, &tagger).unwrap(), EMPTY_THEME);
        assert_eq!(label_group(2, &["and the of"], 5, &tagger).unwrap(), "General Theme 3");

        let label = label_group(
            0,
            &["Work deadline stress at the office", "The office deadline again, work work"],
            5,
            &tagger,
        )
        .unwrap();
        assert!(label.starts_with("work, "), "{label}");
        assert!(label.ends_with("..."), "{label}");
    }

    #[test]
    fn tagger_failure_uses_raw_terms() {
        let label = label_group(0, &["quickly walking home"], 5, &FailingTagger).unwrap();
        assert_eq!(label, "home, quickly...");
    }

    #[test]
    fn one_bad_group_does_not_abort_others() {
        let themes = label_clusters(
            &[0, 1, 1],
            3,
            &["x y z", "garden flowers bloom", "garden soil"],
            5,
            &LexiconTagger,
        );
        assert_eq!(themes.len(), 3);
        assert_eq!(themes["Theme 1"], "Error Theme 1");
        assert!(themes["Theme 2"].starts_with("garden"));
        assert_eq!(themes["Theme 3"], EMPTY_THEME);
    }
}
