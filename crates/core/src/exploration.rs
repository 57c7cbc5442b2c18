//! Exploration engine (C10): stateful trees of files built by walking the
//! symbol graph from entrypoints discovered via the hybrid matcher, with
//! sessions persisted as JSON so a CLI invocation can resume one later.

use crate::config::ExplorationConfig;
use crate::error::{RepoMapError, Result};
use crate::graph::SymbolGraph;
use crate::semantic::SemanticMatcher;
use crate::types::{validate_path, IdentifierCorpus, MatchResult, Tag};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: String,
    pub symbol: String,
    pub file: String,
    pub line: usize,
    pub depth: usize,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn new(file: impl Into<String>, symbol: impl Into<String>, line: usize, depth: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            file: file.into(),
            line,
            depth,
            children: Vec::new(),
        }
    }

    fn find_mut(&mut self, node_id: &str) -> Option<&mut TreeNode> {
        if self.id == node_id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(node_id))
    }

    fn find(&self, node_id: &str) -> Option<&TreeNode> {
        if self.id == node_id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(node_id))
    }

    fn files_in_subtree(&self, out: &mut HashSet<String>) {
        out.insert(self.file.clone());
        for c in &self.children {
            c.files_in_subtree(out);
        }
    }

    fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationTree {
    pub id: String,
    /// Human-readable label for this tree, surfaced in session listings.
    pub title: String,
    /// The entrypoint identifier this tree was rooted from.
    pub root_symbol: String,
    /// The hybrid-match score of `root_symbol`, carried through as the
    /// tree's confidence that it's relevant to the exploration intent.
    pub confidence: f64,
    pub root: TreeNode,
    pub focused_node_id: Option<String>,
    #[serde(default)]
    pub newly_expanded: HashSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationSession {
    pub id: String,
    pub project_root: PathBuf,
    pub intent: String,
    pub trees: Vec<ExplorationTree>,
    pub created_at: i64,
    pub updated_at: i64,
}

fn stopwords(word: &str) -> bool {
    matches!(word, "the" | "a" | "an" | "of" | "to" | "in" | "is" | "for" | "and" | "or" | "how" | "what" | "does")
}

pub fn content_words(intent: &str) -> Vec<String> {
    intent
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_').to_lowercase())
        .filter(|w| !w.is_empty() && !stopwords(w))
        .collect()
}

/// An entrypoint identifier resolved to one of its definition sites, carrying
/// the hybrid-match score that found it.
#[derive(Debug, Clone)]
struct ScoredEntrypoint {
    identifier: String,
    file: String,
    score: f64,
}

/// Picks a representative defining symbol for `file`: the best-ranked
/// definition tag (class > fn/method > variable, first by line), the same
/// priority order the renderer uses. Falls back to the file path itself when
/// the file has no recorded definitions (e.g. a data file pulled in only by
/// reference).
fn primary_symbol(file: &str, tags: &[Tag]) -> (String, usize) {
    tags.iter()
        .filter(|t| t.file == file && t.kind.is_definition())
        .min_by(|a, b| a.kind.render_priority().cmp(&b.kind.render_priority()).then_with(|| a.line.cmp(&b.line)))
        .map(|t| (t.name.clone(), t.line))
        .unwrap_or_else(|| (file.to_string(), 0))
}

/// Groups entrypoints into up to `max_trees` clusters by top-level directory
/// *and* semantic category — the top TF-IDF term their identifiers share, per
/// the semantic matcher's vocabulary — merging the smallest clusters together
/// when there are more groups than the configured cap.
fn cluster_entrypoints(
    entrypoints: &[ScoredEntrypoint],
    semantic: &SemanticMatcher,
    max_trees: usize,
) -> Vec<Vec<ScoredEntrypoint>> {
    let mut by_key: HashMap<(String, String), Vec<ScoredEntrypoint>> = HashMap::new();
    for e in entrypoints {
        let top_dir = e.file.split('/').next().unwrap_or(&e.file).to_string();
        let category = semantic.top_term(&e.identifier).unwrap_or_default();
        by_key.entry((top_dir, category)).or_default().push(e.clone());
    }
    let mut clusters: Vec<Vec<ScoredEntrypoint>> = by_key.into_values().collect();
    clusters.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].file.cmp(&b[0].file)));

    while clusters.len() > max_trees.max(1) {
        clusters.sort_by_key(|c| c.len());
        let smallest = clusters.remove(0);
        let next_smallest = clusters.remove(0);
        let mut merged = smallest;
        merged.extend(next_smallest);
        clusters.push(merged);
    }
    for c in &mut clusters {
        c.sort_by(|a, b| a.file.cmp(&b.file));
    }
    clusters
}

/// The highest-confidence entrypoint in a cluster becomes its tree's root,
/// per §4.9 — ties broken by file path for determinism.
fn pick_root(cluster: &[ScoredEntrypoint]) -> &ScoredEntrypoint {
    cluster
        .iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.file.cmp(&b.file)))
        .expect("cluster is never empty")
}

/// Builds one tree rooted at `root`, walking the symbol graph's definer
/// edges outward up to `max_depth`. A file already present anywhere in the
/// tree is never re-expanded (cycle detection without re-expansion). Each
/// node carries a representative defining symbol looked up from `tags`.
fn build_tree(root: &ScoredEntrypoint, graph: &SymbolGraph, tags: &[Tag], max_depth: usize) -> TreeNode {
    let root_line = tags
        .iter()
        .find(|t| t.file == root.file && t.name == root.identifier && t.kind.is_definition())
        .map(|t| t.line)
        .unwrap_or(0);
    let mut root_node = TreeNode::new(root.file.clone(), root.identifier.clone(), root_line, 0);
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(root.file.clone());

    let mut frontier: VecDeque<(String, usize)> = VecDeque::new();
    frontier.push_back((root_node.id.clone(), 0));

    while let Some((node_id, depth)) = frontier.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let file = root_node.find(&node_id).map(|n| n.file.clone());
        let Some(file) = file else { continue };
        let Some(idx) = graph.file_index(&file) else { continue };

        let mut neighbors: Vec<String> = graph.graph.edges(idx).map(|e| graph.graph[e.target()].clone()).collect();
        neighbors.sort_unstable();
        neighbors.dedup();

        for neighbor in neighbors {
            if visited.contains(&neighbor) {
                continue;
            }
            visited.insert(neighbor.clone());
            let (symbol, line) = primary_symbol(&neighbor, tags);
            let child = TreeNode::new(neighbor, symbol, line, depth + 1);
            let child_id = child.id.clone();
            if let Some(parent) = root_node.find_mut(&node_id) {
                parent.children.push(child);
            }
            frontier.push_back((child_id, depth + 1));
        }
    }

    root_node
}

/// Starts a new exploration session: discovers entrypoints for `intent` via
/// the caller-supplied hybrid search results, clusters them by directory and
/// semantic category, and builds one tree per cluster rooted at its
/// highest-confidence entrypoint.
pub fn explore(
    project_root: &Path,
    corpus: &IdentifierCorpus,
    tags: &[Tag],
    graph: &SymbolGraph,
    semantic: &SemanticMatcher,
    entrypoints: &[MatchResult],
    intent: &str,
    cfg: &ExplorationConfig,
) -> Result<ExplorationSession> {
    let mut scored: Vec<ScoredEntrypoint> = Vec::new();
    for m in entrypoints {
        if let Some(sites) = corpus.definitions.get(&m.identifier) {
            for site in sites {
                scored.push(ScoredEntrypoint { identifier: m.identifier.clone(), file: site.file.clone(), score: m.score });
            }
        }
    }
    scored.sort_by(|a, b| a.file.cmp(&b.file).then_with(|| a.identifier.cmp(&b.identifier)));
    scored.dedup_by(|a, b| a.file == b.file && a.identifier == b.identifier);

    if scored.is_empty() {
        return Err(RepoMapError::input("no entrypoints found for intent", intent.to_string()));
    }

    let clusters = cluster_entrypoints(&scored, semantic, cfg.max_trees);
    let trees: Vec<ExplorationTree> = clusters
        .into_iter()
        .map(|cluster| {
            let root = pick_root(&cluster).clone();
            let root_node = build_tree(&root, graph, tags, cfg.max_depth);
            ExplorationTree {
                id: uuid::Uuid::new_v4().to_string(),
                title: format!("{} ({})", root.identifier, root.file),
                root_symbol: root.identifier,
                confidence: root.score,
                root: root_node,
                focused_node_id: None,
                newly_expanded: HashSet::new(),
            }
        })
        .collect();

    let now = now_epoch();
    Ok(ExplorationSession {
        id: uuid::Uuid::new_v4().to_string(),
        project_root: project_root.to_path_buf(),
        intent: intent.to_string(),
        trees,
        created_at: now,
        updated_at: now,
    })
}

fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

fn find_tree_mut<'a>(session: &'a mut ExplorationSession, tree_id: &str) -> Result<&'a mut ExplorationTree> {
    session.trees.iter_mut().find(|t| t.id == tree_id).ok_or_else(|| RepoMapError::session("unknown tree_id", tree_id.to_string()))
}

pub fn focus(session: &mut ExplorationSession, tree_id: &str, node_id: &str) -> Result<()> {
    let tree = find_tree_mut(session, tree_id)?;
    if tree.root.find(node_id).is_none() {
        return Err(RepoMapError::session("unknown node_id", node_id.to_string()));
    }
    tree.focused_node_id = Some(node_id.to_string());
    session.updated_at = now_epoch();
    Ok(())
}

/// Expands one more level of neighbors under `node_id`, per §4.4's edges;
/// newly added children are accumulated into `newly_expanded` (alongside any
/// from earlier `expand` calls on this tree) for the `[NEW]` map marker.
pub fn expand(session: &mut ExplorationSession, tree_id: &str, node_id: &str, graph: &SymbolGraph, tags: &[Tag]) -> Result<Vec<String>> {
    let tree = find_tree_mut(session, tree_id)?;
    let mut in_tree: HashSet<String> = HashSet::new();
    tree.root.files_in_subtree(&mut in_tree);

    let node = tree.root.find_mut(node_id).ok_or_else(|| RepoMapError::session("unknown node_id", node_id.to_string()))?;
    let file = node.file.clone();
    let depth = node.depth;
    let Some(idx) = graph.file_index(&file) else {
        return Err(RepoMapError::graph("file not present in symbol graph", file));
    };

    let mut neighbors: Vec<String> = graph.graph.edges(idx).map(|e| graph.graph[e.target()].clone()).collect();
    neighbors.sort_unstable();
    neighbors.dedup();

    let mut added = Vec::new();
    for neighbor in neighbors {
        if in_tree.contains(&neighbor) {
            continue;
        }
        let (symbol, line) = primary_symbol(&neighbor, tags);
        let child = TreeNode::new(neighbor.clone(), symbol, line, depth + 1);
        node.children.push(child);
        added.push(neighbor);
    }

    tree.newly_expanded.extend(added.iter().cloned());
    session.updated_at = now_epoch();
    Ok(added)
}

/// Removes `node_id` (and its subtree) from the tree. Pruning the tree's
/// root is rejected — use a new `explore` call instead.
pub fn prune(session: &mut ExplorationSession, tree_id: &str, node_id: &str) -> Result<()> {
    let tree = find_tree_mut(session, tree_id)?;
    if tree.root.id == node_id {
        return Err(RepoMapError::session("cannot prune the tree root", node_id.to_string()));
    }

    fn remove(node: &mut TreeNode, target: &str) -> bool {
        if let Some(pos) = node.children.iter().position(|c| c.id == target) {
            node.children.remove(pos);
            return true;
        }
        node.children.iter_mut().any(|c| remove(c, target))
    }

    if !remove(&mut tree.root, node_id) {
        return Err(RepoMapError::session("unknown node_id", node_id.to_string()));
    }
    if tree.focused_node_id.as_deref() == Some(node_id) {
        tree.focused_node_id = None;
    }
    tree.newly_expanded.remove(node_id);
    session.updated_at = now_epoch();
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeSummary {
    pub tree_id: String,
    pub root_file: String,
    pub title: String,
    pub confidence: f64,
    pub node_count: usize,
}

pub fn list_trees(session: &ExplorationSession) -> Vec<TreeSummary> {
    session
        .trees
        .iter()
        .map(|t| TreeSummary {
            tree_id: t.id.clone(),
            root_file: t.root.file.clone(),
            title: t.title.clone(),
            confidence: t.confidence,
            node_count: t.root.node_count(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub intent: String,
    pub tree_count: usize,
    pub total_nodes: usize,
    pub created_at: i64,
    pub updated_at: i64,
}

pub fn status(session: &ExplorationSession) -> SessionStatus {
    SessionStatus {
        session_id: session.id.clone(),
        intent: session.intent.clone(),
        tree_count: session.trees.len(),
        total_nodes: session.trees.iter().map(|t| t.root.node_count()).sum(),
        created_at: session.created_at,
        updated_at: session.updated_at,
    }
}

fn render_node(node: &TreeNode, tree: &ExplorationTree, prefix: &str, is_last: bool, project_root: &Path, with_snippets: bool, out: &mut String) {
    let connector = if prefix.is_empty() { "" } else if is_last { "└── " } else { "├── " };
    let focus_marker = if tree.focused_node_id.as_deref() == Some(node.id.as_str()) { " *" } else { "" };
    let new_marker = if tree.newly_expanded.contains(&node.file) { " [NEW]" } else { "" };
    out.push_str(&format!("{prefix}{connector}{} ({}){focus_marker}{new_marker}\n", node.file, node.symbol));

    if with_snippets {
        if let Ok(path) = validate_path(project_root, &node.file) {
            if let Ok(content) = std::fs::read_to_string(&path) {
                if let Some(first_line) = content.lines().next() {
                    let child_prefix = format!("{prefix}{}    ", if is_last { " " } else { "│" });
                    out.push_str(&format!("{child_prefix}{}\n", first_line.trim()));
                }
            }
        }
    }

    let child_prefix = format!("{prefix}{}", if prefix.is_empty() { "" } else if is_last { "    " } else { "│   " });
    for (i, child) in node.children.iter().enumerate() {
        render_node(child, tree, &child_prefix, i == node.children.len() - 1, project_root, with_snippets, out);
    }
}

/// Renders the tree as ASCII art with `├──`/`└──` guides, a `*` suffix on
/// the focused node, and a `[NEW]` suffix on nodes from the most recent
/// `expand` call.
pub fn map(session: &ExplorationSession, tree_id: &str, project_root: &Path, with_snippets: bool) -> Result<String> {
    let tree = session.trees.iter().find(|t| t.id == tree_id).ok_or_else(|| RepoMapError::session("unknown tree_id", tree_id.to_string()))?;
    let mut out = String::new();
    render_node(&tree.root, tree, "", true, project_root, with_snippets, &mut out);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Session persistence
// ---------------------------------------------------------------------------

fn session_path(dir: &Path, session_id: &str) -> PathBuf {
    dir.join(format!("{session_id}.json"))
}

/// Writes the session as JSON using a temp-file-then-rename so a crash
/// mid-write never leaves a half-written session file behind.
pub fn save(session: &ExplorationSession, session_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(session_dir)
        .map_err(|e| RepoMapError::session("failed to create session directory", e.to_string()))?;
    let final_path = session_path(session_dir, &session.id);
    let tmp_path = session_dir.join(format!("{}.tmp", session.id));
    let json = serde_json::to_string_pretty(session).map_err(|e| RepoMapError::session("serialize failed", e.to_string()))?;
    std::fs::write(&tmp_path, json).map_err(|e| RepoMapError::session("write failed", e.to_string()))?;
    std::fs::rename(&tmp_path, &final_path).map_err(|e| RepoMapError::session("rename failed", e.to_string()))?;
    Ok(())
}

pub fn load(session_dir: &Path, session_id: &str) -> Result<ExplorationSession> {
    let path = session_path(session_dir, session_id);
    let content = std::fs::read_to_string(&path).map_err(|_| RepoMapError::session("unknown session", session_id.to_string()))?;
    serde_json::from_str(&content).map_err(|e| RepoMapError::session("corrupt session file", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RankerConfig, SemanticConfig};
    use crate::graph::build_symbol_graph;
    use crate::types::{AnalysisOptions, Tag, TagKind};

    fn sample_corpus() -> Vec<Tag> {
        vec![
            Tag::new("authenticate_user", TagKind::FunctionName, "auth/login.py", 1, 0),
            Tag::new("authenticate_user", TagKind::CallReference, "api/routes.py", 5, 0),
            Tag::new("validate_token", TagKind::FunctionName, "auth/tokens.py", 1, 0),
            Tag::new("validate_token", TagKind::CallReference, "auth/login.py", 10, 0),
        ]
    }

    fn matches_for(ids: &[&str]) -> Vec<MatchResult> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| MatchResult { identifier: id.to_string(), score: 100.0 - i as f64, strategy_tag: "fuzzy".to_string() })
            .collect()
    }

    fn semantic_for(corpus: &IdentifierCorpus) -> SemanticMatcher {
        SemanticMatcher::build(corpus.identifiers().map(|s| s.to_string()), &SemanticConfig::default())
    }

    #[test]
    fn explore_builds_a_tree_per_cluster() {
        let corpus = sample_corpus();
        let identifier_corpus = IdentifierCorpus::from_tags(&corpus);
        let semantic = semantic_for(&identifier_corpus);
        let graph = build_symbol_graph(&corpus, &AnalysisOptions::default(), &RankerConfig::default());
        let session = explore(
            Path::new("/project"),
            &identifier_corpus,
            &corpus,
            &graph,
            &semantic,
            &matches_for(&["authenticate_user"]),
            "how does auth work",
            &ExplorationConfig::default(),
        )
        .unwrap();
        assert_eq!(session.trees.len(), 1);
        assert_eq!(session.trees[0].root.file, "auth/login.py");
        assert_eq!(session.trees[0].root.symbol, "authenticate_user");
        assert_eq!(session.trees[0].root_symbol, "authenticate_user");
        assert_eq!(session.trees[0].confidence, 100.0);
    }

    #[test]
    fn explore_with_no_matches_is_an_error() {
        let corpus = sample_corpus();
        let identifier_corpus = IdentifierCorpus::from_tags(&corpus);
        let semantic = semantic_for(&identifier_corpus);
        let graph = build_symbol_graph(&corpus, &AnalysisOptions::default(), &RankerConfig::default());
        let result = explore(
            Path::new("/project"),
            &identifier_corpus,
            &corpus,
            &graph,
            &semantic,
            &matches_for(&["nonexistent_identifier"]),
            "anything",
            &ExplorationConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn explore_picks_highest_confidence_root_in_a_cluster() {
        let corpus = vec![
            Tag::new("zzz_helper", TagKind::FunctionName, "auth/zzz.py", 1, 0),
            Tag::new("authenticate_user", TagKind::FunctionName, "auth/login.py", 1, 0),
        ];
        let identifier_corpus = IdentifierCorpus::from_tags(&corpus);
        let semantic = semantic_for(&identifier_corpus);
        let graph = build_symbol_graph(&corpus, &AnalysisOptions::default(), &RankerConfig::default());
        // "zzz_helper" sorts after "authenticate_user" alphabetically, but is
        // given the higher score here and must still win the cluster root.
        let entrypoints = vec![
            MatchResult { identifier: "authenticate_user".to_string(), score: 10.0, strategy_tag: "fuzzy".to_string() },
            MatchResult { identifier: "zzz_helper".to_string(), score: 90.0, strategy_tag: "fuzzy".to_string() },
        ];
        let session = explore(
            Path::new("/project"),
            &identifier_corpus,
            &corpus,
            &graph,
            &semantic,
            &entrypoints,
            "auth",
            &ExplorationConfig { max_trees: 1, ..ExplorationConfig::default() },
        )
        .unwrap();
        assert_eq!(session.trees.len(), 1);
        assert_eq!(session.trees[0].root_symbol, "zzz_helper");
    }

    #[test]
    fn focus_and_prune_roundtrip() {
        let corpus = sample_corpus();
        let identifier_corpus = IdentifierCorpus::from_tags(&corpus);
        let semantic = semantic_for(&identifier_corpus);
        let graph = build_symbol_graph(&corpus, &AnalysisOptions::default(), &RankerConfig::default());
        let mut session = explore(
            Path::new("/project"),
            &identifier_corpus,
            &corpus,
            &graph,
            &semantic,
            &matches_for(&["authenticate_user"]),
            "auth",
            &ExplorationConfig::default(),
        )
        .unwrap();
        let tree_id = session.trees[0].id.clone();
        let root_id = session.trees[0].root.id.clone();
        focus(&mut session, &tree_id, &root_id).unwrap();
        assert_eq!(session.trees[0].focused_node_id.as_deref(), Some(root_id.as_str()));

        assert!(prune(&mut session, &tree_id, &root_id).is_err());
    }

    #[test]
    fn unknown_tree_id_fails_clearly() {
        let corpus = sample_corpus();
        let identifier_corpus = IdentifierCorpus::from_tags(&corpus);
        let semantic = semantic_for(&identifier_corpus);
        let graph = build_symbol_graph(&corpus, &AnalysisOptions::default(), &RankerConfig::default());
        let mut session = explore(
            Path::new("/project"),
            &identifier_corpus,
            &corpus,
            &graph,
            &semantic,
            &matches_for(&["authenticate_user"]),
            "auth",
            &ExplorationConfig::default(),
        )
        .unwrap();
        assert!(focus(&mut session, "bogus-tree", "bogus-node").is_err());
    }

    #[test]
    fn expand_accumulates_newly_expanded_across_calls() {
        // auth/login.py references validate_token (defined in auth/tokens.py),
        // giving the root exactly one outgoing edge to expand into.
        let corpus = sample_corpus();
        let identifier_corpus = IdentifierCorpus::from_tags(&corpus);
        let semantic = semantic_for(&identifier_corpus);
        let graph = build_symbol_graph(&corpus, &AnalysisOptions::default(), &RankerConfig::default());
        let mut session = explore(
            Path::new("/project"),
            &identifier_corpus,
            &corpus,
            &graph,
            &semantic,
            &matches_for(&["authenticate_user"]),
            "auth",
            &ExplorationConfig { max_depth: 0, ..ExplorationConfig::default() },
        )
        .unwrap();
        assert!(session.trees[0].root.children.is_empty(), "max_depth: 0 should build a bare root");
        let tree_id = session.trees[0].id.clone();
        let root_id = session.trees[0].root.id.clone();

        let first = expand(&mut session, &tree_id, &root_id, &graph, &corpus).unwrap();
        assert_eq!(first, vec!["auth/tokens.py".to_string()]);
        let first_expanded = session.trees[0].newly_expanded.clone();
        assert_eq!(first_expanded.len(), 1);

        // Expanding the newly added child must not drop the root's own
        // expansion history — newly_expanded should grow, not reset.
        let child_id = session.trees[0].root.children[0].id.clone();
        expand(&mut session, &tree_id, &child_id, &graph, &corpus).unwrap();
        for f in &first_expanded {
            assert!(session.trees[0].newly_expanded.contains(f), "lost prior expansion of {f}");
        }
    }

    #[test]
    fn save_and_load_roundtrip() {
        let corpus = sample_corpus();
        let identifier_corpus = IdentifierCorpus::from_tags(&corpus);
        let semantic = semantic_for(&identifier_corpus);
        let graph = build_symbol_graph(&corpus, &AnalysisOptions::default(), &RankerConfig::default());
        let session = explore(
            Path::new("/project"),
            &identifier_corpus,
            &corpus,
            &graph,
            &semantic,
            &matches_for(&["authenticate_user"]),
            "auth",
            &ExplorationConfig::default(),
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        save(&session, dir.path()).unwrap();
        let loaded = load(dir.path(), &session.id).unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.trees.len(), session.trees.len());
    }

    #[test]
    fn map_renders_ascii_guides() {
        let corpus = sample_corpus();
        let identifier_corpus = IdentifierCorpus::from_tags(&corpus);
        let semantic = semantic_for(&identifier_corpus);
        let graph = build_symbol_graph(&corpus, &AnalysisOptions::default(), &RankerConfig::default());
        let session = explore(
            Path::new("/project"),
            &identifier_corpus,
            &corpus,
            &graph,
            &semantic,
            &matches_for(&["authenticate_user"]),
            "auth",
            &ExplorationConfig::default(),
        )
        .unwrap();
        let tree_id = session.trees[0].id.clone();
        let rendered = map(&session, &tree_id, Path::new("/project"), false).unwrap();
        assert!(rendered.contains("auth/login.py"));
    }
}
