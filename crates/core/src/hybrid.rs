//! Hybrid matcher (C8): unions fuzzy and semantic results, combining scores
//! for identifiers both strategies found and keeping single-strategy hits
//! at their (weighted) own score.

use crate::config::HybridConfig;
use crate::fuzzy::FuzzyMatcher;
use crate::semantic::SemanticMatcher;
use crate::types::{sort_match_results, MatchResult};
use std::collections::HashMap;

pub fn combine(fuzzy_results: &[MatchResult], semantic_results: &[MatchResult], cfg: &HybridConfig) -> Vec<MatchResult> {
    let mut merged: HashMap<String, (f64, f64, String)> = HashMap::new();

    for r in fuzzy_results {
        merged.entry(r.identifier.clone()).or_insert((0.0, 0.0, String::new())).0 = r.score;
    }
    for r in semantic_results {
        let entry = merged.entry(r.identifier.clone()).or_insert((0.0, 0.0, String::new()));
        entry.1 = r.score;
    }

    let mut results: Vec<MatchResult> = merged
        .into_iter()
        .map(|(identifier, (fuzzy_score, semantic_score, _))| {
            let combined = cfg.fuzzy_weight * fuzzy_score + cfg.semantic_weight * semantic_score;
            let strategy_tag = match (fuzzy_score > 0.0, semantic_score > 0.0) {
                (true, true) => "hybrid",
                (true, false) => "fuzzy",
                (false, true) => "semantic",
                (false, false) => "hybrid",
            };
            MatchResult { identifier, score: combined.min(100.0), strategy_tag: strategy_tag.to_string() }
        })
        .collect();

    sort_match_results(&mut results);
    results
}

pub struct HybridMatcher<'a> {
    pub fuzzy: &'a FuzzyMatcher,
    pub semantic: &'a SemanticMatcher,
}

impl<'a> HybridMatcher<'a> {
    pub fn search(
        &self,
        query: &str,
        hybrid_cfg: &HybridConfig,
        fuzzy_cfg: &crate::config::FuzzyConfig,
        semantic_cfg: &crate::config::SemanticConfig,
        top_n: usize,
    ) -> Vec<MatchResult> {
        let fuzzy_results = self.fuzzy.search(query, fuzzy_cfg);
        let semantic_results = self.semantic.search(query, semantic_cfg);
        let mut combined = combine(&fuzzy_results, &semantic_results, hybrid_cfg);
        combined.truncate(top_n);
        combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mr(id: &str, score: f64, tag: &str) -> MatchResult {
        MatchResult { identifier: id.to_string(), score, strategy_tag: tag.to_string() }
    }

    #[test]
    fn identifier_found_by_both_gets_weighted_sum() {
        let fuzzy = vec![mr("foo", 80.0, "prefix")];
        let semantic = vec![mr("foo", 50.0, "semantic")];
        let cfg = HybridConfig { fuzzy_weight: 0.6, semantic_weight: 0.4 };
        let results = combine(&fuzzy, &semantic, &cfg);
        assert_eq!(results.len(), 1);
        assert!((results[0].score - (0.6 * 80.0 + 0.4 * 50.0)).abs() < 1e-9);
        assert_eq!(results[0].strategy_tag, "hybrid");
    }

    #[test]
    fn identifier_found_by_only_one_strategy_keeps_weighted_score() {
        let fuzzy = vec![mr("foo", 80.0, "prefix")];
        let cfg = HybridConfig::default();
        let results = combine(&fuzzy, &[], &cfg);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].strategy_tag, "fuzzy");
    }

    #[test]
    fn score_never_exceeds_100() {
        let fuzzy = vec![mr("foo", 100.0, "exact")];
        let semantic = vec![mr("foo", 100.0, "semantic")];
        let cfg = HybridConfig { fuzzy_weight: 0.9, semantic_weight: 0.9 };
        let results = combine(&fuzzy, &semantic, &cfg);
        assert!(results[0].score <= 100.0);
    }
}
