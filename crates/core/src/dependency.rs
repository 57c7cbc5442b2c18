//! Dependency analyzer (C9): resolves the file-level import graph from the
//! tag corpus's import tags, then offers statistics, cycle detection,
//! centrality, and change-impact queries over it.
//!
//! Import resolution is best-effort and language-aware for Python and
//! JS/TS (the languages whose module systems map cleanly onto project-
//! relative paths); Go/C/C++/Java imports are recorded but treated as
//! external unless they resolve to a known project-relative path.

use crate::config::DependenciesConfig;
use crate::error::{RepoMapError, Result};
use crate::types::{Tag, TagKind};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::OnceLock;
use std::time::Instant;

pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index_of: HashMap<String, NodeIndex>,
}

fn ext_of(file: &str) -> &str {
    file.rsplit_once('.').map(|(_, e)| e).unwrap_or("")
}

fn dir_of(file: &str) -> &str {
    file.rsplit_once('/').map(|(d, _)| d).unwrap_or("")
}

fn normalize_path(parts: &[&str]) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for part in parts {
        match *part {
            "" | "." => continue,
            ".." => {
                stack.pop();
            }
            p => stack.push(p),
        }
    }
    stack.join("/")
}

/// Pulls the first quoted string literal out of raw import source text.
fn quoted_literal(text: &str) -> Option<&str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"["']([^"']+)["']"#).unwrap());
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Resolves one import tag to a project-relative file path, if it's a
/// reference this analyzer understands how to follow.
fn resolve_import(importer: &str, raw: &str, known_files: &HashSet<String>) -> Option<String> {
    let ext = ext_of(importer);
    match ext {
        "py" | "pyi" => resolve_python_import(importer, raw, known_files),
        "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" => resolve_js_import(importer, raw, known_files),
        _ => None,
    }
}

fn resolve_python_import(importer: &str, raw: &str, known_files: &HashSet<String>) -> Option<String> {
    let raw = raw.trim();
    let module = if let Some(rest) = raw.strip_prefix("from ") {
        rest.split(" import").next()?.trim()
    } else {
        raw.strip_prefix("import ")?.split(',').next()?.trim().split(" as ").next()?.trim()
    };

    let dots = module.chars().take_while(|&c| c == '.').count();
    let remainder = &module[dots..];
    let segments: Vec<&str> = remainder.split('.').filter(|s| !s.is_empty()).collect();

    let base_dir = if dots > 0 {
        let mut dir_parts: Vec<&str> = dir_of(importer).split('/').filter(|s| !s.is_empty()).collect();
        for _ in 0..dots.saturating_sub(1) {
            dir_parts.pop();
        }
        dir_parts.join("/")
    } else {
        String::new()
    };

    let mut candidate_parts: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    candidate_parts.extend(segments.iter().copied());

    let as_module_file = format!("{}.py", normalize_path(&candidate_parts));
    if known_files.contains(&as_module_file) {
        return Some(as_module_file);
    }
    let as_package_init = normalize_path(&candidate_parts.iter().chain(["__init__"].iter()).copied().collect::<Vec<_>>());
    let as_package_init = format!("{as_package_init}.py");
    if known_files.contains(&as_package_init) {
        return Some(as_package_init);
    }
    None
}

fn resolve_js_import(importer: &str, raw: &str, known_files: &HashSet<String>) -> Option<String> {
    let target = quoted_literal(raw)?;
    if !(target.starts_with('.') || target.starts_with('/')) {
        return None; // bare specifier: node_modules / external, out of scope
    }
    let collapsed = normalize_path(
        &dir_of(importer)
            .split('/')
            .filter(|s| !s.is_empty())
            .chain(target.split('/').filter(|s| !s.is_empty()))
            .collect::<Vec<_>>(),
    );

    const EXTS: [&str; 6] = ["ts", "tsx", "js", "jsx", "mjs", "cjs"];
    for ext in EXTS {
        let candidate = format!("{collapsed}.{ext}");
        if known_files.contains(&candidate) {
            return Some(candidate);
        }
        let index_candidate = format!("{collapsed}/index.{ext}");
        if known_files.contains(&index_candidate) {
            return Some(index_candidate);
        }
    }
    if known_files.contains(&collapsed) {
        return Some(collapsed);
    }
    None
}

impl DependencyGraph {
    /// Builds the dependency graph from import tags in `corpus`, resolved
    /// against `files` (every known project-relative path). Bails with a
    /// graph error if the file count exceeds `cfg.max_graph_size`, or if
    /// construction itself runs past `cfg.performance_threshold_seconds`.
    pub fn build(files: &[String], corpus: &[Tag], cfg: &DependenciesConfig) -> Result<Self> {
        if files.len() > cfg.max_graph_size {
            return Err(RepoMapError::graph(
                "project exceeds configured max_graph_size",
                format!("{} files > max_graph_size={}", files.len(), cfg.max_graph_size),
            ));
        }

        let started = Instant::now();
        let known: HashSet<String> = files.iter().cloned().collect();

        let mut graph = DiGraph::new();
        let mut index_of: HashMap<String, NodeIndex> = HashMap::new();
        let mut sorted_files = files.to_vec();
        sorted_files.sort_unstable();
        for f in &sorted_files {
            let idx = graph.add_node(f.clone());
            index_of.insert(f.clone(), idx);
        }

        let mut edges: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
        for tag in corpus {
            if tag.kind != TagKind::ImportReference {
                continue;
            }
            let Some(target) = resolve_import(&tag.file, &tag.name, &known) else { continue };
            if target == tag.file {
                continue;
            }
            let (Some(&from), Some(&to)) = (index_of.get(&tag.file), index_of.get(&target)) else { continue };
            edges.insert((from, to));
        }
        for (from, to) in edges {
            graph.add_edge(from, to, ());
        }

        if started.elapsed().as_secs() > cfg.performance_threshold_seconds {
            return Err(RepoMapError::graph(
                "dependency graph construction exceeded performance budget",
                format!("elapsed={}s threshold={}s", started.elapsed().as_secs(), cfg.performance_threshold_seconds),
            ));
        }

        Ok(Self { graph, index_of })
    }

    fn idx(&self, file: &str) -> Option<NodeIndex> {
        self.index_of.get(file).copied()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DependencyStats {
    pub file_count: usize,
    pub edge_count: usize,
    pub average_out_degree: f64,
    pub max_out_degree: usize,
    pub isolated_files: Vec<String>,
    pub cycle_count: usize,
    /// Files nothing else imports: entrypoints of the dependency tree.
    pub roots: Vec<String>,
    /// Files that import nothing else themselves: terminal dependencies.
    pub leaves: Vec<String>,
    /// File extension -> count, derived from node paths.
    pub language_distribution: HashMap<String, usize>,
}

pub fn statistics(graph: &DependencyGraph) -> DependencyStats {
    let n = graph.graph.node_count();
    let mut max_out = 0usize;
    let mut isolated = Vec::new();
    let mut roots = Vec::new();
    let mut leaves = Vec::new();
    let mut total_out = 0usize;
    let mut language_distribution: HashMap<String, usize> = HashMap::new();

    for idx in graph.graph.node_indices() {
        let out_deg = graph.graph.edges(idx).count();
        let in_deg = graph.graph.edges_directed(idx, petgraph::Direction::Incoming).count();
        total_out += out_deg;
        max_out = max_out.max(out_deg);

        let file = &graph.graph[idx];
        if out_deg == 0 && in_deg == 0 {
            isolated.push(file.clone());
        }
        if in_deg == 0 {
            roots.push(file.clone());
        }
        if out_deg == 0 {
            leaves.push(file.clone());
        }
        *language_distribution.entry(ext_of(file).to_string()).or_insert(0) += 1;
    }
    isolated.sort_unstable();
    roots.sort_unstable();
    leaves.sort_unstable();

    DependencyStats {
        file_count: n,
        edge_count: graph.graph.edge_count(),
        average_out_degree: if n > 0 { total_out as f64 / n as f64 } else { 0.0 },
        max_out_degree: max_out,
        isolated_files: isolated,
        cycle_count: cycles(graph, usize::MAX).len(),
        roots,
        leaves,
        language_distribution,
    }
}

/// Finds simple cycles up to `max_cycles`, one representative cycle per
/// non-trivial strongly connected component, found by following forward
/// edges from an arbitrary member of each SCC until it revisits itself.
pub fn cycles(graph: &DependencyGraph, max_cycles: usize) -> Vec<Vec<String>> {
    let sccs = petgraph::algo::kosaraju_scc(&graph.graph);
    let mut found = Vec::new();

    for scc in sccs {
        if found.len() >= max_cycles {
            break;
        }
        if scc.len() < 2 {
            continue;
        }
        let members: HashSet<NodeIndex> = scc.iter().copied().collect();
        let start = scc[0];
        let mut path = vec![start];
        let mut visited = HashSet::new();
        visited.insert(start);
        let mut current = start;
        loop {
            let next = graph
                .graph
                .edges(current)
                .map(|e| e.target())
                .find(|t| members.contains(t) && (*t == start || !visited.contains(t)));
            match next {
                Some(t) if t == start => {
                    path.push(t);
                    break;
                }
                Some(t) => {
                    path.push(t);
                    visited.insert(t);
                    current = t;
                }
                None => break,
            }
        }
        if path.len() > 1 && path.first() == path.last() {
            found.push(path.into_iter().map(|i| graph.graph[i].clone()).collect());
        }
    }
    found
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CentralityScores {
    pub degree: f64,
    pub betweenness: f64,
    pub pagerank: f64,
}

fn unweighted_pagerank(graph: &DiGraph<String, ()>, damping: f64, iterations: usize, tolerance: f64) -> HashMap<NodeIndex, f64> {
    let n = graph.node_count();
    if n == 0 {
        return HashMap::new();
    }
    let indices: Vec<NodeIndex> = graph.node_indices().collect();
    let mut rank: HashMap<NodeIndex, f64> = indices.iter().map(|&i| (i, 1.0 / n as f64)).collect();
    let base = (1.0 - damping) / n as f64;

    for _ in 0..iterations {
        let mut next: HashMap<NodeIndex, f64> = indices.iter().map(|&i| (i, base)).collect();
        let mut dangling = 0.0;
        for &idx in &indices {
            let out_deg = graph.edges(idx).count();
            if out_deg == 0 {
                dangling += rank[&idx];
                continue;
            }
            let share = damping * rank[&idx] / out_deg as f64;
            for edge in graph.edges(idx) {
                *next.get_mut(&edge.target()).unwrap() += share;
            }
        }
        let redistribute = damping * dangling / n as f64;
        for v in next.values_mut() {
            *v += redistribute;
        }
        let delta: f64 = indices.iter().map(|i| (next[i] - rank[i]).abs()).sum();
        rank = next;
        if delta < tolerance {
            break;
        }
    }
    rank
}

/// Brandes' algorithm for unweighted betweenness centrality.
fn betweenness(graph: &DiGraph<String, ()>) -> HashMap<NodeIndex, f64> {
    let indices: Vec<NodeIndex> = graph.node_indices().collect();
    let mut centrality: HashMap<NodeIndex, f64> = indices.iter().map(|&i| (i, 0.0)).collect();

    for &s in &indices {
        let mut stack = Vec::new();
        let mut preds: HashMap<NodeIndex, Vec<NodeIndex>> = indices.iter().map(|&i| (i, Vec::new())).collect();
        let mut sigma: HashMap<NodeIndex, f64> = indices.iter().map(|&i| (i, 0.0)).collect();
        let mut dist: HashMap<NodeIndex, i64> = indices.iter().map(|&i| (i, -1)).collect();
        *sigma.get_mut(&s).unwrap() = 1.0;
        *dist.get_mut(&s).unwrap() = 0;

        let mut queue = VecDeque::new();
        queue.push_back(s);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for edge in graph.edges(v) {
                let w = edge.target();
                if dist[&w] < 0 {
                    dist.insert(w, dist[&v] + 1);
                    queue.push_back(w);
                }
                if dist[&w] == dist[&v] + 1 {
                    *sigma.get_mut(&w).unwrap() += sigma[&v];
                    preds.get_mut(&w).unwrap().push(v);
                }
            }
        }

        let mut delta: HashMap<NodeIndex, f64> = indices.iter().map(|&i| (i, 0.0)).collect();
        while let Some(w) = stack.pop() {
            for &v in &preds[&w] {
                let contribution = (sigma[&v] / sigma[&w]) * (1.0 + delta[&w]);
                *delta.get_mut(&v).unwrap() += contribution;
            }
            if w != s {
                *centrality.get_mut(&w).unwrap() += delta[&w];
            }
        }
    }

    centrality
}

pub fn centrality(graph: &DependencyGraph) -> HashMap<String, CentralityScores> {
    let n = graph.graph.node_count();
    let pagerank = unweighted_pagerank(&graph.graph, 0.85, 100, 1e-6);
    let between = betweenness(&graph.graph);
    let norm = if n > 1 { ((n - 1) * (n - 2)) as f64 } else { 1.0 };

    graph
        .graph
        .node_indices()
        .map(|idx| {
            let out_deg = graph.graph.edges(idx).count();
            let in_deg = graph.graph.edges_directed(idx, petgraph::Direction::Incoming).count();
            let degree = if n > 1 { (out_deg + in_deg) as f64 / (n - 1) as f64 } else { 0.0 };
            let scores = CentralityScores {
                degree,
                betweenness: if norm > 0.0 { between.get(&idx).copied().unwrap_or(0.0) / norm } else { 0.0 },
                pagerank: pagerank.get(&idx).copied().unwrap_or(0.0),
            };
            (graph.graph[idx].clone(), scores)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BreakingChangeLevel {
    Low,
    Med,
    High,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChangeImpact {
    pub files: Vec<String>,
    pub affected_files: Vec<String>,
    pub breaking_change_level: HashMap<String, BreakingChangeLevel>,
    pub suggested_tests: Vec<String>,
    pub risk_score: f64,
}

fn is_test_file(file: &str) -> bool {
    let lower = file.to_lowercase();
    lower.contains("/test") || lower.starts_with("test") || lower.contains("_test.") || lower.contains(".test.")
}

/// Classifies how risky changing `file` is from its direct dependent count:
/// nothing depends on it (LOW), a handful of direct dependents (MED), or
/// enough that the change radiates widely (HIGH).
fn classify_breaking_change_level(direct_dependent_count: usize) -> BreakingChangeLevel {
    match direct_dependent_count {
        0 => BreakingChangeLevel::Low,
        1..=3 => BreakingChangeLevel::Med,
        _ => BreakingChangeLevel::High,
    }
}

/// Reverse-reachability over the union of `files`: every file that depends on
/// any of them, directly or transitively. `risk_score` is the fraction of the
/// project transitively affected; `breaking_change_level` classifies each
/// input file by its direct dependent count; `suggested_tests` are the
/// affected files that look like test files, falling back to the direct
/// dependents when none match.
pub fn change_impact(graph: &DependencyGraph, files: &[String]) -> Result<ChangeImpact> {
    let mut starts = Vec::with_capacity(files.len());
    for file in files {
        let Some(idx) = graph.idx(file) else {
            return Err(RepoMapError::graph("unknown file", file.clone()));
        };
        starts.push(idx);
    }

    let mut breaking_change_level = HashMap::new();
    let mut direct_union: HashSet<NodeIndex> = HashSet::new();
    for (&start, file) in starts.iter().zip(files) {
        let direct: Vec<NodeIndex> =
            graph.graph.edges_directed(start, petgraph::Direction::Incoming).map(|e| e.source()).collect();
        breaking_change_level.insert(file.clone(), classify_breaking_change_level(direct.len()));
        direct_union.extend(direct);
    }

    let start_set: HashSet<NodeIndex> = starts.iter().copied().collect();
    let mut visited: HashSet<NodeIndex> = start_set.clone();
    let mut queue: VecDeque<NodeIndex> = starts.iter().copied().collect();
    while let Some(v) = queue.pop_front() {
        for edge in graph.graph.edges_directed(v, petgraph::Direction::Incoming) {
            let src = edge.source();
            if visited.insert(src) {
                queue.push_back(src);
            }
        }
    }
    for start in &start_set {
        visited.remove(start);
    }

    let mut affected: Vec<String> = visited.into_iter().map(|i| graph.graph[i].clone()).collect();
    affected.sort_unstable();

    let mut suggested_tests: Vec<String> = affected.iter().filter(|f| is_test_file(f)).cloned().collect();
    if suggested_tests.is_empty() {
        suggested_tests = direct_union.into_iter().map(|i| graph.graph[i].clone()).collect();
        suggested_tests.sort_unstable();
    }

    let total = graph.graph.node_count().max(1);
    let risk_score = affected.len() as f64 / total as f64;

    Ok(ChangeImpact {
        files: files.to_vec(),
        affected_files: affected,
        breaking_change_level,
        suggested_tests,
        risk_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_import(file: &str, raw: &str) -> Tag {
        Tag::new(raw, TagKind::ImportReference, file, 1, 0)
    }

    #[test]
    fn python_absolute_import_resolves() {
        let files = vec!["pkg/a.py".to_string(), "pkg/b.py".to_string()];
        let corpus = vec![tag_import("pkg/a.py", "from pkg import b")];
        let cfg = DependenciesConfig::default();
        let graph = DependencyGraph::build(&files, &corpus, &cfg).unwrap();
        let stats = statistics(&graph);
        assert_eq!(stats.edge_count, 1);
    }

    #[test]
    fn python_relative_import_resolves() {
        let files = vec!["pkg/a.py".to_string(), "pkg/sub/b.py".to_string()];
        let corpus = vec![tag_import("pkg/a.py", "from .sub import b")];
        let cfg = DependenciesConfig::default();
        let graph = DependencyGraph::build(&files, &corpus, &cfg).unwrap();
        assert_eq!(statistics(&graph).edge_count, 1);
    }

    #[test]
    fn js_relative_import_resolves() {
        let files = vec!["src/index.ts".to_string(), "src/utils.ts".to_string()];
        let corpus = vec![tag_import("src/index.ts", "import { helper } from './utils'")];
        let cfg = DependenciesConfig::default();
        let graph = DependencyGraph::build(&files, &corpus, &cfg).unwrap();
        assert_eq!(statistics(&graph).edge_count, 1);
    }

    #[test]
    fn bare_specifier_is_external_and_ignored() {
        let files = vec!["src/index.ts".to_string()];
        let corpus = vec![tag_import("src/index.ts", "import React from 'react'")];
        let cfg = DependenciesConfig::default();
        let graph = DependencyGraph::build(&files, &corpus, &cfg).unwrap();
        assert_eq!(statistics(&graph).edge_count, 0);
    }

    #[test]
    fn detects_a_two_file_cycle() {
        let files = vec!["a.py".to_string(), "b.py".to_string()];
        let corpus =
            vec![tag_import("a.py", "from b import x"), tag_import("b.py", "from a import y")];
        let cfg = DependenciesConfig::default();
        let graph = DependencyGraph::build(&files, &corpus, &cfg).unwrap();
        let found = cycles(&graph, 10);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn change_impact_reports_direct_and_transitive() {
        let files = vec!["a.py".to_string(), "b.py".to_string(), "c.py".to_string()];
        let corpus =
            vec![tag_import("a.py", "from b import x"), tag_import("b.py", "from c import y")];
        let cfg = DependenciesConfig::default();
        let graph = DependencyGraph::build(&files, &corpus, &cfg).unwrap();
        let impact = change_impact(&graph, &["c.py".to_string()]).unwrap();
        assert!(impact.affected_files.contains(&"b.py".to_string()));
        assert!(impact.affected_files.contains(&"a.py".to_string()));
        assert_eq!(impact.breaking_change_level["c.py"], BreakingChangeLevel::Med);
    }

    #[test]
    fn change_impact_unions_across_multiple_files() {
        let files = vec!["a.py".to_string(), "b.py".to_string(), "c.py".to_string(), "d.py".to_string()];
        let corpus = vec![
            tag_import("a.py", "from b import x"),
            tag_import("d.py", "from c import y"),
        ];
        let cfg = DependenciesConfig::default();
        let graph = DependencyGraph::build(&files, &corpus, &cfg).unwrap();
        let impact = change_impact(&graph, &["b.py".to_string(), "c.py".to_string()]).unwrap();
        assert!(impact.affected_files.contains(&"a.py".to_string()));
        assert!(impact.affected_files.contains(&"d.py".to_string()));
    }

    #[test]
    fn statistics_reports_roots_leaves_and_cycle_count() {
        let files = vec!["a.py".to_string(), "b.py".to_string(), "c.py".to_string()];
        let corpus =
            vec![tag_import("a.py", "from b import x"), tag_import("b.py", "from c import y")];
        let cfg = DependenciesConfig::default();
        let graph = DependencyGraph::build(&files, &corpus, &cfg).unwrap();
        let stats = statistics(&graph);
        assert_eq!(stats.roots, vec!["a.py".to_string()]);
        assert_eq!(stats.leaves, vec!["c.py".to_string()]);
        assert_eq!(stats.cycle_count, 0);
        assert_eq!(stats.language_distribution.get("py"), Some(&3));
    }

    #[test]
    fn oversized_project_rejected() {
        let files = vec!["a.py".to_string(), "b.py".to_string()];
        let cfg = DependenciesConfig { max_graph_size: 1, performance_threshold_seconds: 30 };
        assert!(DependencyGraph::build(&files, &[], &cfg).is_err());
    }
}
