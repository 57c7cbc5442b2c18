//! Semantic identifier matcher (C7): a corpus-local TF-IDF model over
//! unigram/bigram identifier tokens, with a small synonym expansion table.
//! No external model or embedding service — this is computed entirely from
//! the project's own identifier vocabulary.

use crate::config::SemanticConfig;
use crate::types::{sort_match_results, MatchResult};
use std::collections::{HashMap, HashSet};

fn stopwords() -> &'static HashSet<&'static str> {
    use std::sync::OnceLock;
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| {
        ["the", "a", "an", "of", "to", "in", "is", "it", "for", "and", "or", "with", "on", "by", "as", "at"]
            .into_iter()
            .collect()
    })
}

fn synonyms() -> &'static HashMap<&'static str, &'static str> {
    use std::sync::OnceLock;
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| {
        [
            ("db", "database"),
            ("auth", "authentication"),
            ("cfg", "config"),
            ("config", "configuration"),
            ("fn", "function"),
            ("func", "function"),
            ("arg", "argument"),
            ("args", "arguments"),
            ("msg", "message"),
            ("err", "error"),
            ("req", "request"),
            ("res", "response"),
            ("resp", "response"),
            ("ctx", "context"),
            ("init", "initialize"),
            ("impl", "implementation"),
            ("util", "utility"),
            ("utils", "utilities"),
            ("num", "number"),
            ("str", "string"),
            ("idx", "index"),
            ("conn", "connection"),
            ("repo", "repository"),
        ]
        .into_iter()
        .collect()
    })
}

/// Splits an identifier on `_`/`-`/whitespace and at case/digit transitions,
/// lowercasing each resulting word. `"HTTPServerConfig"` → `["http",
/// "server", "config"]`, `"db_conn"` → `["db", "conn"]`.
fn split_identifier(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for i in 0..chars.len() {
        let c = chars[i];
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() {
            let prev = current.chars().last().unwrap();
            let case_boundary = (c.is_uppercase() && prev.is_lowercase())
                || (c.is_uppercase() && prev.is_uppercase() && chars.get(i + 1).is_some_and(|n| n.is_lowercase()));
            let digit_boundary = c.is_ascii_digit() != prev.is_ascii_digit();
            if case_boundary || digit_boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words.into_iter().map(|w| w.to_lowercase()).filter(|w| !w.is_empty()).collect()
}

/// Expands a word list with synonym hits (additively — the original word is
/// kept alongside its expansion) and drops stopwords.
fn expand_and_filter(words: &[String]) -> Vec<String> {
    let syn = synonyms();
    let stop = stopwords();
    let mut out = Vec::new();
    for w in words {
        if stop.contains(w.as_str()) {
            continue;
        }
        out.push(w.clone());
        if let Some(expansion) = syn.get(w.as_str()) {
            out.push(expansion.to_string());
        }
    }
    out
}

/// Unigrams plus adjacent-pair bigrams over the (synonym-expanded,
/// stopword-filtered) token sequence.
fn features_for(text: &str) -> Vec<String> {
    let words = expand_and_filter(&split_identifier(text));
    let mut features: Vec<String> = words.clone();
    for pair in words.windows(2) {
        features.push(format!("{}_{}", pair[0], pair[1]));
    }
    features
}

struct SparseVector(HashMap<usize, f64>);

impl SparseVector {
    fn dot(&self, other: &SparseVector) -> f64 {
        let (small, big) = if self.0.len() <= other.0.len() { (&self.0, &other.0) } else { (&other.0, &self.0) };
        small.iter().filter_map(|(k, v)| big.get(k).map(|ov| v * ov)).sum()
    }
}

/// TF-IDF model built once over the project's identifier vocabulary.
pub struct SemanticMatcher {
    vocab: HashMap<String, usize>,
    idf: Vec<f64>,
    docs: Vec<(String, SparseVector)>,
}

impl SemanticMatcher {
    pub fn build(identifiers: impl IntoIterator<Item = String>, cfg: &SemanticConfig) -> Self {
        let mut identifiers: Vec<String> = identifiers.into_iter().collect();
        identifiers.sort_unstable();
        identifiers.dedup();

        let mut doc_features: Vec<(String, Vec<String>)> =
            identifiers.iter().map(|id| (id.clone(), features_for(id))).collect();
        doc_features.retain(|(_, f)| !f.is_empty());

        let mut df: HashMap<String, usize> = HashMap::new();
        for (_, features) in &doc_features {
            let unique: HashSet<&String> = features.iter().collect();
            for f in unique {
                *df.entry(f.clone()).or_insert(0) += 1;
            }
        }

        let mut ranked_features: Vec<(String, usize)> = df.into_iter().collect();
        ranked_features.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked_features.truncate(cfg.max_features.max(1));

        let n_docs = doc_features.len() as f64;
        let mut vocab = HashMap::new();
        let mut idf = Vec::with_capacity(ranked_features.len());
        for (idx, (feature, df)) in ranked_features.into_iter().enumerate() {
            vocab.insert(feature, idx);
            // Smoothed idf, always positive: ln((N+1)/(df+1)) + 1.
            idf.push(((n_docs + 1.0) / (df as f64 + 1.0)).ln() + 1.0);
        }

        let docs: Vec<(String, SparseVector)> = doc_features
            .into_iter()
            .filter_map(|(id, features)| {
                let vector = Self::vectorize(&features, &vocab, &idf);
                (!vector.0.is_empty()).then_some((id, vector))
            })
            .collect();

        Self { vocab, idf, docs }
    }

    fn vectorize(features: &[String], vocab: &HashMap<String, usize>, idf: &[f64]) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        let total = features.len().max(1) as f64;
        for f in features {
            if let Some(&idx) = vocab.get(f) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }
        let mut weighted: HashMap<usize, f64> = HashMap::new();
        for (idx, count) in counts {
            weighted.insert(idx, (count / total) * idf[idx]);
        }
        let norm: f64 = weighted.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in weighted.values_mut() {
                *v /= norm;
            }
        }
        SparseVector(weighted)
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// The single highest-TF-IDF-weight feature term for `identifier`, or
    /// `None` if it has no vocabulary overlap (e.g. an identifier outside
    /// the corpus this matcher was built from). Used to group identifiers
    /// into a shared semantic category.
    pub fn top_term(&self, identifier: &str) -> Option<String> {
        let (_, vector) = self.docs.iter().find(|(id, _)| id == identifier)?;
        let (&idx, _) =
            vector.0.iter().max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
        self.vocab.iter().find(|(_, &i)| i == idx).map(|(term, _)| term.clone())
    }

    pub fn search(&self, query: &str, cfg: &SemanticConfig) -> Vec<MatchResult> {
        if self.docs.is_empty() {
            return Vec::new();
        }
        let features = features_for(query);
        let query_vector = Self::vectorize(&features, &self.vocab, &self.idf);
        if query_vector.0.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<MatchResult> = self
            .docs
            .iter()
            .filter_map(|(id, vector)| {
                let score = query_vector.dot(vector) * 100.0;
                (score >= cfg.threshold * 100.0)
                    .then_some(MatchResult { identifier: id.clone(), score, strategy_tag: "semantic".to_string() })
            })
            .collect();
        sort_match_results(&mut results);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_identifier_handles_camel_and_snake() {
        assert_eq!(split_identifier("db_connection"), vec!["db", "connection"]);
        assert_eq!(split_identifier("HTTPServerConfig"), vec!["http", "server", "config"]);
        assert_eq!(split_identifier("userAuthToken"), vec!["user", "auth", "token"]);
    }

    #[test]
    fn empty_corpus_returns_empty_results() {
        let cfg = SemanticConfig::default();
        let m = SemanticMatcher::build(Vec::<String>::new(), &cfg);
        assert!(m.search("database", &cfg).is_empty());
    }

    #[test]
    fn synonym_expansion_matches_across_abbreviation() {
        let cfg = SemanticConfig { threshold: 0.01, max_features: 1000 };
        let m = SemanticMatcher::build(
            ["db_connection_pool", "render_widget_tree"].iter().map(|s| s.to_string()),
            &cfg,
        );
        let results = m.search("database connection", &cfg);
        assert!(results.iter().any(|r| r.identifier == "db_connection_pool"));
    }

    #[test]
    fn unrelated_query_scores_low_or_absent() {
        let cfg = SemanticConfig { threshold: 0.3, max_features: 1000 };
        let m = SemanticMatcher::build(["widget_tree_renderer"].iter().map(|s| s.to_string()), &cfg);
        let results = m.search("database migration", &cfg);
        assert!(results.is_empty());
    }

    #[test]
    fn max_features_cap_is_respected() {
        let cfg = SemanticConfig { threshold: 0.0, max_features: 3 };
        let ids: Vec<String> = (0..50).map(|i| format!("unique_identifier_number_{i}")).collect();
        let m = SemanticMatcher::build(ids, &cfg);
        assert!(m.vocab.len() <= 3);
    }
}
