//! `repomap-core`: parses a project's source tree into a symbol corpus,
//! ranks its files with personalized PageRank, renders a token-budgeted
//! textual map, and supports fuzzy/semantic identifier search plus
//! stateful exploration sessions. See the individual modules for the
//! pipeline stage each one covers.

pub mod cache;
pub mod config;
pub mod dependency;
pub mod error;
pub mod exploration;
pub mod extractor;
pub mod fuzzy;
pub mod graph;
pub mod hybrid;
pub mod parser;
pub mod rank;
pub mod semantic;
pub mod tokenizer;
pub mod types;

use config::Config;
use dependency::{ChangeImpact, CentralityScores, DependencyGraph, DependencyStats};
use error::{RepoMapError, Result};
use exploration::{ExplorationSession, SessionStatus, TreeSummary};
use hybrid::HybridMatcher;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use types::{AnalysisOptions, AnalysisResult, ExtractionSummary, IdentifierCorpus, MatchResult, ScanConfig, Tag};

/// A loaded project: the extracted tag corpus plus everything derived from
/// it is computed on demand from here. Re-extracting is cheap when the tag
/// cache is warm (see [`cache::TagCache`]).
pub struct Project {
    pub root: PathBuf,
    pub config: Config,
    pub corpus: Vec<Tag>,
    pub extraction_summary: ExtractionSummary,
}

impl Project {
    pub fn open(root: impl Into<PathBuf>, config: Config) -> Result<Self> {
        config.validate()?;
        let root = root.into();
        let scan_config = ScanConfig::new(root.clone());
        let cache = extractor::open_cache(&config.cache);
        let outcome = extractor::extract(&scan_config, cache.as_deref(), &config.performance, true, None, None);
        if outcome.summary.file_count > 0 && outcome.summary.parse_errors_count == outcome.summary.file_count {
            return Err(RepoMapError::parse(
                "every candidate file failed to parse",
                outcome.summary.first_errors.join("; "),
            ));
        }
        Ok(Self { root, config, corpus: outcome.corpus, extraction_summary: outcome.summary })
    }

    pub fn identifier_corpus(&self) -> IdentifierCorpus {
        IdentifierCorpus::from_tags(&self.corpus)
    }

    pub fn symbol_graph(&self, options: &AnalysisOptions) -> graph::SymbolGraph {
        graph::build_symbol_graph(&self.corpus, options, &self.config.ranker)
    }

    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.corpus.iter().map(|t| t.file.clone()).collect();
        files.sort_unstable();
        files.dedup();
        files
    }

    pub fn dependency_graph(&self) -> Result<DependencyGraph> {
        DependencyGraph::build(&self.files(), &self.corpus, &self.config.dependencies)
    }

    pub fn fuzzy_matcher(&self) -> fuzzy::FuzzyMatcher {
        fuzzy::FuzzyMatcher::new(self.identifier_corpus().identifiers().map(|s| s.to_string()))
    }

    pub fn semantic_matcher(&self) -> semantic::SemanticMatcher {
        semantic::SemanticMatcher::build(self.identifier_corpus().identifiers().map(|s| s.to_string()), &self.config.semantic)
    }
}

// ---------------------------------------------------------------------------
// Top-level programmatic surface
// ---------------------------------------------------------------------------

/// Extracts, ranks, and renders a token-budgeted repo map for `root`.
pub fn analyze(root: impl Into<PathBuf>, config: &Config, options: &AnalysisOptions) -> Result<AnalysisResult> {
    let project = Project::open(root, config.clone())?;
    let graph = project.symbol_graph(options);
    let ranks = rank::personalized_pagerank(&graph, options, &config.ranker);
    let tokenizer = tokenizer::create_tokenizer("chars-estimate");
    let budget = options.map_tokens.unwrap_or(config.map_tokens);
    let rendered_map = rank::render_map(&project.root, &project.corpus, &ranks, budget, tokenizer.as_ref());
    Ok(AnalysisResult {
        rendered_map,
        file_count: project.extraction_summary.file_count,
        tag_count: project.extraction_summary.tag_count,
        parse_errors_count: project.extraction_summary.parse_errors_count,
        stats: project.extraction_summary,
    })
}

/// Hybrid fuzzy+semantic identifier search over `root`'s symbol vocabulary.
pub fn search(root: impl Into<PathBuf>, config: &Config, query: &str, top_n: usize) -> Result<Vec<MatchResult>> {
    let project = Project::open(root, config.clone())?;
    let fuzzy = project.fuzzy_matcher();
    let semantic = project.semantic_matcher();
    let hybrid = HybridMatcher { fuzzy: &fuzzy, semantic: &semantic };
    Ok(hybrid.search(query, &config.hybrid, &config.fuzzy, &config.semantic, top_n))
}

pub fn dependency_stats(root: impl Into<PathBuf>, config: &Config) -> Result<DependencyStats> {
    let project = Project::open(root, config.clone())?;
    let graph = project.dependency_graph()?;
    Ok(dependency::statistics(&graph))
}

pub fn find_cycles(root: impl Into<PathBuf>, config: &Config, max_cycles: usize) -> Result<Vec<Vec<String>>> {
    let project = Project::open(root, config.clone())?;
    let graph = project.dependency_graph()?;
    Ok(dependency::cycles(&graph, max_cycles))
}

pub fn centrality(root: impl Into<PathBuf>, config: &Config) -> Result<HashMap<String, CentralityScores>> {
    let project = Project::open(root, config.clone())?;
    let graph = project.dependency_graph()?;
    Ok(dependency::centrality(&graph))
}

pub fn impact(root: impl Into<PathBuf>, config: &Config, files: &[String]) -> Result<ChangeImpact> {
    let project = Project::open(root, config.clone())?;
    let graph = project.dependency_graph()?;
    dependency::change_impact(&graph, files)
}

// ---------------------------------------------------------------------------
// Exploration sessions
// ---------------------------------------------------------------------------

pub fn start_exploration(root: impl Into<PathBuf>, config: &Config, intent: &str) -> Result<ExplorationSession> {
    let project = Project::open(root, config.clone())?;
    let identifier_corpus = project.identifier_corpus();
    let graph = project.symbol_graph(&AnalysisOptions::default());
    let fuzzy = project.fuzzy_matcher();
    let semantic = project.semantic_matcher();
    let hybrid = HybridMatcher { fuzzy: &fuzzy, semantic: &semantic };

    let words = exploration::content_words(intent).join(" ");
    let matches = hybrid.search(&words, &config.hybrid, &config.fuzzy, &config.semantic, 20);

    let session =
        exploration::explore(&project.root, &identifier_corpus, &project.corpus, &graph, &semantic, &matches, intent, &config.exploration)?;
    exploration::save(&session, &config.exploration.session_dir)?;
    Ok(session)
}

pub fn focus_session(config: &Config, session_id: &str, tree_id: &str, node_id: &str) -> Result<ExplorationSession> {
    let mut session = exploration::load(&config.exploration.session_dir, session_id)?;
    exploration::focus(&mut session, tree_id, node_id)?;
    exploration::save(&session, &config.exploration.session_dir)?;
    Ok(session)
}

pub fn expand_session(root: impl Into<PathBuf>, config: &Config, session_id: &str, tree_id: &str, node_id: &str) -> Result<ExplorationSession> {
    let project = Project::open(root, config.clone())?;
    let graph = project.symbol_graph(&AnalysisOptions::default());
    let mut session = exploration::load(&config.exploration.session_dir, session_id)?;
    exploration::expand(&mut session, tree_id, node_id, &graph, &project.corpus)?;
    exploration::save(&session, &config.exploration.session_dir)?;
    Ok(session)
}

pub fn prune_session(config: &Config, session_id: &str, tree_id: &str, node_id: &str) -> Result<ExplorationSession> {
    let mut session = exploration::load(&config.exploration.session_dir, session_id)?;
    exploration::prune(&mut session, tree_id, node_id)?;
    exploration::save(&session, &config.exploration.session_dir)?;
    Ok(session)
}

pub fn map_session(config: &Config, session_id: &str, tree_id: &str, with_snippets: bool) -> Result<String> {
    let session = exploration::load(&config.exploration.session_dir, session_id)?;
    exploration::map(&session, tree_id, &session.project_root.clone(), with_snippets)
}

pub fn list_trees_session(config: &Config, session_id: &str) -> Result<Vec<TreeSummary>> {
    let session = exploration::load(&config.exploration.session_dir, session_id)?;
    Ok(exploration::list_trees(&session))
}

pub fn session_status(config: &Config, session_id: &str) -> Result<SessionStatus> {
    let session = exploration::load(&config.exploration.session_dir, session_id)?;
    Ok(exploration::status(&session))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn analyze_end_to_end_on_tiny_project() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "def helper_function():\n    pass\n");
        write(dir.path(), "b.py", "from a import helper_function\n\ndef main():\n    helper_function()\n");

        let mut config = Config::default();
        config.cache.enabled = false;
        let result = analyze(dir.path().to_path_buf(), &config, &AnalysisOptions::default()).unwrap();
        assert_eq!(result.file_count, 2);
        assert!(result.tag_count > 0);
    }

    #[test]
    fn search_end_to_end_finds_identifier() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "def authenticate_user():\n    pass\n");

        let mut config = Config::default();
        config.cache.enabled = false;
        let results = search(dir.path().to_path_buf(), &config, "authenticate", 10).unwrap();
        assert!(results.iter().any(|r| r.identifier == "authenticate_user"));
    }

    #[test]
    fn exploration_session_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "auth/login.py", "def authenticate_user():\n    pass\n");
        let session_dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.cache.enabled = false;
        config.exploration.session_dir = session_dir.path().to_path_buf();

        let session = start_exploration(dir.path().to_path_buf(), &config, "how does authentication work").unwrap();
        let status = session_status(&config, &session.id).unwrap();
        assert_eq!(status.session_id, session.id);
    }
}
