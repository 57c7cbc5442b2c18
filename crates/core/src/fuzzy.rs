//! Fuzzy identifier matcher (C6): a handful of independent string-similarity
//! strategies, each producing a 0-100 score; the caller picks which
//! strategies run and at what threshold via `FuzzyConfig`.

use crate::config::FuzzyConfig;
use crate::types::{sort_match_results, MatchResult};
use dashmap::DashMap;
use std::collections::HashSet;

fn split_words(s: &str) -> HashSet<String> {
    s.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];
    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

fn ratio(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100.0;
    }
    let dist = levenshtein(a, b);
    (1.0 - dist as f64 / max_len as f64).max(0.0) * 100.0
}

/// Best-alignment ratio of the shorter string against every equal-length
/// window of the longer one (rapidfuzz's "partial ratio" idea).
fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() { (a, b) } else { (b, a) };
    let short_chars: Vec<char> = short.chars().collect();
    let long_chars: Vec<char> = long.chars().collect();
    if short_chars.is_empty() {
        return 100.0;
    }
    if long_chars.len() < short_chars.len() {
        return ratio(a, b);
    }
    let mut best = 0.0f64;
    for start in 0..=(long_chars.len() - short_chars.len()) {
        let window: String = long_chars[start..start + short_chars.len()].iter().collect();
        let short_s: String = short_chars.iter().collect();
        let r = ratio(&short_s, &window);
        if r > best {
            best = r;
        }
    }
    best
}

fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let sort_tokens = |s: &str| -> String {
        let mut words: Vec<String> = s.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();
        words.sort_unstable();
        words.join(" ")
    };
    ratio(&sort_tokens(a), &sort_tokens(b))
}

fn edit_score(query: &str, candidate: &str) -> f64 {
    ratio(query, candidate).max(partial_ratio(query, candidate)).max(token_sort_ratio(query, candidate))
}

fn word_score(query: &str, candidate: &str) -> f64 {
    let q_words = split_words(query);
    let c_words = split_words(candidate);
    if q_words.is_empty() || c_words.is_empty() {
        return 0.0;
    }
    let intersection = q_words.intersection(&c_words).count();
    let union = q_words.union(&c_words).count();
    if union == 0 {
        return 0.0;
    }
    (intersection as f64 / union as f64) * 100.0
}

/// Per-strategy score for one (query, candidate) pair; `None` when the
/// strategy simply doesn't apply (e.g. prefix on a non-prefix).
fn strategy_score(strategy: &str, query: &str, candidate: &str) -> Option<(f64, &'static str)> {
    let q = query.to_lowercase();
    let c = candidate.to_lowercase();
    let qlen = q.chars().count() as f64;
    match strategy {
        "exact" => (q == c).then_some((100.0, "exact")),
        "prefix" => c.starts_with(&q).then(|| ((70.0 + 2.0 * qlen).min(95.0), "prefix")),
        "suffix" => c.ends_with(&q).then(|| ((65.0 + 2.0 * qlen).min(90.0), "suffix")),
        "substring" => c.contains(&q).then(|| ((60.0 + 2.0 * qlen).min(85.0), "substring")),
        "edit" => {
            let s = edit_score(&q, &c);
            (s > 0.0).then_some((s, "edit"))
        }
        "word" => {
            let s = word_score(&q, &c);
            (s > 0.0).then_some((s, "word"))
        }
        _ => None,
    }
}

type CacheKey = (String, u64, Vec<String>);

/// Fuzzy matcher over a fixed identifier vocabulary. Results for a given
/// `(query, threshold, strategy set)` are memoized for the matcher's
/// lifetime; callers that mutate the corpus should build a new matcher.
pub struct FuzzyMatcher {
    identifiers: Vec<String>,
    cache: DashMap<CacheKey, Vec<MatchResult>>,
}

impl FuzzyMatcher {
    pub fn new(identifiers: impl IntoIterator<Item = String>) -> Self {
        let mut identifiers: Vec<String> = identifiers.into_iter().collect();
        identifiers.sort_unstable();
        identifiers.dedup();
        Self { identifiers, cache: DashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn search(&self, query: &str, cfg: &FuzzyConfig) -> Vec<MatchResult> {
        if query.is_empty() || self.identifiers.is_empty() {
            return Vec::new();
        }

        let mut strategies: Vec<String> = cfg.strategies.iter().cloned().collect();
        strategies.sort_unstable();
        let key: CacheKey = (query.to_string(), cfg.threshold.to_bits(), strategies.clone());

        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }

        let mut results: Vec<MatchResult> = Vec::new();
        for candidate in &self.identifiers {
            let mut best: Option<(f64, &'static str)> = None;
            for strategy in &strategies {
                if let Some((score, tag)) = strategy_score(strategy, query, candidate) {
                    if best.map(|(b, _)| score > b).unwrap_or(true) {
                        best = Some((score, tag));
                    }
                }
            }
            if let Some((score, tag)) = best {
                if score >= cfg.threshold {
                    results.push(MatchResult { identifier: candidate.clone(), score, strategy_tag: tag.to_string() });
                }
            }
        }

        sort_match_results(&mut results);
        self.cache.insert(key, results.clone());
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> FuzzyMatcher {
        FuzzyMatcher::new(
            ["authenticate_user", "UserAuth", "helper_function", "validate_token", "db_connection"]
                .iter()
                .map(|s| s.to_string()),
        )
    }

    #[test]
    fn exact_match_scores_100() {
        let m = matcher();
        let cfg = FuzzyConfig::default();
        let results = m.search("UserAuth", &cfg);
        assert!(results.iter().any(|r| r.identifier == "UserAuth" && r.score == 100.0));
    }

    #[test]
    fn prefix_match_found() {
        let m = matcher();
        let cfg = FuzzyConfig::default();
        let results = m.search("authenticate", &cfg);
        assert!(results.iter().any(|r| r.identifier == "authenticate_user"));
    }

    #[test]
    fn results_sorted_descending() {
        let m = matcher();
        let cfg = FuzzyConfig { threshold: 0.0, ..FuzzyConfig::default() };
        let results = m.search("user", &cfg);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn empty_query_returns_nothing() {
        let m = matcher();
        let cfg = FuzzyConfig::default();
        assert!(m.search("", &cfg).is_empty());
    }

    #[test]
    fn below_threshold_excluded() {
        let m = matcher();
        let cfg = FuzzyConfig { threshold: 99.0, strategies: ["exact"].iter().map(|s| s.to_string()).collect() };
        let results = m.search("zzz_nonexistent", &cfg);
        assert!(results.is_empty());
    }

    #[test]
    fn cache_returns_identical_results() {
        let m = matcher();
        let cfg = FuzzyConfig::default();
        let first = m.search("user", &cfg);
        let second = m.search("user", &cfg);
        assert_eq!(first, second);
    }

    #[test]
    fn word_strategy_matches_on_shared_tokens() {
        let m = matcher();
        let cfg = FuzzyConfig { threshold: 1.0, strategies: ["word"].iter().map(|s| s.to_string()).collect() };
        let results = m.search("token validate", &cfg);
        assert!(results.iter().any(|r| r.identifier == "validate_token"));
    }
}
