//! Symbol graph builder (C4): from the tag corpus, a weighted directed graph
//! of files linked by definition/reference edges. `r → d` means some
//! identifier defined in `d` is referenced in `r`.

use crate::config::RankerConfig;
use crate::types::{AnalysisOptions, Tag, TagKind};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

pub struct SymbolGraph {
    pub graph: DiGraph<String, f64>,
    pub index_of: HashMap<String, NodeIndex>,
}

impl SymbolGraph {
    pub fn file_index(&self, file: &str) -> Option<NodeIndex> {
        self.index_of.get(file).copied()
    }

    pub fn files(&self) -> impl Iterator<Item = &String> {
        self.graph.node_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// No edge weight is negative; fails loudly in debug builds if violated,
    /// since construction should make this structurally impossible.
    pub fn has_self_edges(&self) -> bool {
        self.graph.edge_indices().any(|e| {
            let (a, b) = self.graph.edge_endpoints(e).unwrap();
            a == b
        })
    }
}

fn is_well_named(name: &str) -> bool {
    let has_separator = name.contains('_') || name.contains('-');
    let has_mixed_case = name.chars().any(|c| c.is_uppercase()) && name.chars().any(|c| c.is_lowercase());
    (has_separator || has_mixed_case) && name.chars().count() >= 8
}

/// Identifier weight multiplier `m(i)` per §4.4.
fn identifier_weight(
    name: &str,
    def_file_count: usize,
    mentioned: bool,
    ranker_cfg: &RankerConfig,
) -> f64 {
    let mut m = 1.0;
    if mentioned {
        m *= 10.0;
    }
    if is_well_named(name) {
        m *= 10.0;
    }
    if name.starts_with('_') {
        m *= ranker_cfg.private_identifier_penalty;
    }
    if def_file_count > 5 {
        m *= ranker_cfg.generic_identifier_penalty;
    }
    if !m.is_finite() || m <= 0.0 {
        m = 1.0;
    }
    m
}

/// Builds the symbol graph from the tag corpus. Self-references are dropped;
/// edge weights are always non-negative and deterministic given identical
/// inputs (the corpus is processed identifier-by-identifier in sorted order).
pub fn build_symbol_graph(corpus: &[Tag], options: &AnalysisOptions, ranker_cfg: &RankerConfig) -> SymbolGraph {
    let mut definitions: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut references: HashMap<&str, Vec<&str>> = HashMap::new();

    for tag in corpus {
        if tag.kind.is_definition() {
            definitions.entry(tag.name.as_str()).or_default().push(tag.file.as_str());
        } else if matches!(tag.kind, TagKind::CallReference | TagKind::ImportReference | TagKind::ImportAlias) {
            references.entry(tag.name.as_str()).or_default().push(tag.file.as_str());
        }
    }

    let mut graph = DiGraph::new();
    let mut index_of: HashMap<String, NodeIndex> = HashMap::new();
    let mut files: Vec<&str> = corpus.iter().map(|t| t.file.as_str()).collect();
    files.sort_unstable();
    files.dedup();
    for file in &files {
        let idx = graph.add_node(file.to_string());
        index_of.insert(file.to_string(), idx);
    }

    let mut edge_weight: HashMap<(NodeIndex, NodeIndex), f64> = HashMap::new();

    let mut identifiers: Vec<&str> = definitions.keys().copied().collect();
    identifiers.sort_unstable();

    for name in identifiers {
        let Some(def_files) = definitions.get(name) else { continue };
        let Some(ref_files) = references.get(name) else { continue };

        let mut def_file_set: Vec<&str> = def_files.clone();
        def_file_set.sort_unstable();
        def_file_set.dedup();

        let mentioned = options.mentioned_identifiers.contains(name);
        let m = identifier_weight(name, def_file_set.len(), mentioned, ranker_cfg);

        // Count references-per-(referencer,definer) pair.
        let mut ref_counts_per_file: HashMap<&str, usize> = HashMap::new();
        for r in ref_files {
            *ref_counts_per_file.entry(*r).or_insert(0) += 1;
        }

        for (&referencer, &count) in &ref_counts_per_file {
            for &definer in &def_file_set {
                if referencer == definer {
                    continue;
                }
                let Some(&r_idx) = index_of.get(referencer) else { continue };
                let Some(&d_idx) = index_of.get(definer) else { continue };
                let contribution = m * (count as f64).sqrt();
                *edge_weight.entry((r_idx, d_idx)).or_insert(0.0) += contribution;
            }
        }
    }

    for ((from, to), weight) in edge_weight {
        graph.add_edge(from, to, weight);
    }

    SymbolGraph { graph, index_of }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TagKind;

    fn tag(name: &str, kind: TagKind, file: &str) -> Tag {
        Tag::new(name, kind, file, 1, 0)
    }

    #[test]
    fn no_self_edges() {
        let corpus = vec![
            tag("f", TagKind::FunctionName, "a.py"),
            tag("f", TagKind::CallReference, "a.py"),
        ];
        let graph = build_symbol_graph(&corpus, &AnalysisOptions::default(), &RankerConfig::default());
        assert!(!graph.has_self_edges());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn edge_added_for_cross_file_reference() {
        let corpus = vec![
            tag("helper_function", TagKind::FunctionName, "a.py"),
            tag("helper_function", TagKind::CallReference, "b.py"),
        ];
        let graph = build_symbol_graph(&corpus, &AnalysisOptions::default(), &RankerConfig::default());
        let a = graph.file_index("a.py").unwrap();
        let b = graph.file_index("b.py").unwrap();
        assert!(graph.graph.find_edge(b, a).is_some());
    }

    #[test]
    fn no_negative_weights() {
        let corpus = vec![
            tag("_private", TagKind::FunctionName, "a.py"),
            tag("_private", TagKind::CallReference, "b.py"),
        ];
        let graph = build_symbol_graph(&corpus, &AnalysisOptions::default(), &RankerConfig::default());
        for e in graph.graph.edge_weights() {
            assert!(*e >= 0.0);
        }
    }

    #[test]
    fn generic_identifier_penalized() {
        // defined in >5 files => 0.1x multiplier, should still produce a
        // (smaller) positive edge, never dropped outright.
        let mut corpus = vec![];
        for i in 0..6 {
            corpus.push(tag("common_name_xyz", TagKind::FunctionName, &format!("d{i}.py")));
        }
        corpus.push(tag("common_name_xyz", TagKind::CallReference, "r.py"));
        let graph = build_symbol_graph(&corpus, &AnalysisOptions::default(), &RankerConfig::default());
        assert!(graph.edge_count() >= 1);
    }
}
