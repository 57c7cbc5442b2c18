//! Core data model shared across the repo-map pipeline: tags, the file cache
//! entry shape, the identifier corpus, match results, and path validation
//! utilities used anywhere a relative path reaches the filesystem.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Tag kind
// ---------------------------------------------------------------------------

/// Closed enumeration of recognized tag kinds, plus an escape variant for
/// language-specific kinds the core doesn't special-case. Downstream
/// consumers match on this with an explicit default branch.
///
/// Serializes as a bare string on the wire: the named variants use their
/// dotted form (`"class.name"`, ...), `Comment` serializes as `"comment"`,
/// and `Other(s)` serializes as `s` itself — there's no wrapper object, so
/// `serde(untagged)` (a container-level attribute) doesn't apply here and
/// this impl is hand-written instead of derived.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagKind {
    ClassName,
    FunctionName,
    MethodName,
    VariableName,
    ImportReference,
    ImportAlias,
    CallReference,
    Comment,
    Other(String),
}

impl TagKind {
    pub(crate) fn as_wire_str(&self) -> &str {
        match self {
            TagKind::ClassName => "class.name",
            TagKind::FunctionName => "function.name",
            TagKind::MethodName => "method.name",
            TagKind::VariableName => "variable.name",
            TagKind::ImportReference => "import.reference",
            TagKind::ImportAlias => "import.alias",
            TagKind::CallReference => "call.reference",
            TagKind::Comment => "comment",
            TagKind::Other(s) => s,
        }
    }

    pub(crate) fn from_wire_str(s: &str) -> Self {
        match s {
            "class.name" => TagKind::ClassName,
            "function.name" => TagKind::FunctionName,
            "method.name" => TagKind::MethodName,
            "variable.name" => TagKind::VariableName,
            "import.reference" => TagKind::ImportReference,
            "import.alias" => TagKind::ImportAlias,
            "call.reference" => TagKind::CallReference,
            "comment" => TagKind::Comment,
            other => TagKind::Other(other.to_string()),
        }
    }
}

impl Serialize for TagKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire_str())
    }
}

impl<'de> Deserialize<'de> for TagKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(TagKind::from_wire_str(&s))
    }
}

impl TagKind {
    /// True for definition-like kinds (as opposed to references/imports/calls).
    pub fn is_definition(&self) -> bool {
        matches!(self, TagKind::ClassName | TagKind::FunctionName | TagKind::MethodName | TagKind::VariableName)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, TagKind::ImportReference | TagKind::ImportAlias | TagKind::CallReference)
    }

    /// Rendering priority for the token-budgeted map: lower sorts first.
    pub fn render_priority(&self) -> u8 {
        match self {
            TagKind::ClassName => 0,
            TagKind::FunctionName | TagKind::MethodName => 1,
            TagKind::VariableName => 2,
            _ => 3,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            TagKind::ClassName => "class",
            TagKind::FunctionName => "fn",
            TagKind::MethodName => "method",
            TagKind::VariableName => "var",
            TagKind::ImportReference | TagKind::ImportAlias => "import",
            TagKind::CallReference => "call",
            TagKind::Comment => "comment",
            TagKind::Other(_) => "other",
        }
    }
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// A single extracted symbol occurrence: a definition or a reference, with
/// its source position. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub kind: TagKind,
    /// Project-relative path, using `/` separators regardless of platform.
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub end_line: Option<usize>,
    pub end_column: Option<usize>,
}

impl Tag {
    pub fn new(name: impl Into<String>, kind: TagKind, file: impl Into<String>, line: usize, column: usize) -> Self {
        Self { name: name.into(), kind, file: file.into(), line, column, end_line: None, end_column: None }
    }

    pub fn with_span(mut self, end_line: usize, end_column: usize) -> Self {
        self.end_line = Some(end_line);
        self.end_column = Some(end_column);
        self
    }

    /// Invariant check from §3: `end_line >= line` whenever both are present.
    pub fn is_well_formed(&self) -> bool {
        match self.end_line {
            Some(end) => end >= self.line,
            None => true,
        }
    }
}

pub type TagList = Vec<Tag>;

// ---------------------------------------------------------------------------
// File cache entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCacheEntry {
    pub file_path: String,
    pub content_hash: String,
    pub mtime: i64,
    pub size: u64,
    pub tags: TagList,
    pub cached_at: i64,
}

// ---------------------------------------------------------------------------
// Identifier corpus
// ---------------------------------------------------------------------------

/// Where an identifier is defined: its file and the kind of definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefinitionSite {
    pub file: String,
    pub kind: TagKind,
}

/// Mapping from identifier name to the set of places it's defined. Built once
/// per extraction pass from the corpus of tags; consumed by matchers and the
/// graph builder.
#[derive(Debug, Default, Clone)]
pub struct IdentifierCorpus {
    pub definitions: HashMap<String, HashSet<DefinitionSite>>,
}

impl IdentifierCorpus {
    pub fn from_tags(tags: &[Tag]) -> Self {
        let mut definitions: HashMap<String, HashSet<DefinitionSite>> = HashMap::new();
        for tag in tags {
            if tag.kind.is_definition() {
                definitions
                    .entry(tag.name.clone())
                    .or_default()
                    .insert(DefinitionSite { file: tag.file.clone(), kind: tag.kind.clone() });
            }
        }
        Self { definitions }
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Match result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    pub identifier: String,
    pub score: f64,
    pub strategy_tag: String,
}

/// Sort in-place by descending score, stable on ties by identifier name.
pub fn sort_match_results(results: &mut [MatchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
}

// ---------------------------------------------------------------------------
// Extraction summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub file_count: usize,
    pub tag_count: usize,
    pub parse_errors_count: usize,
    pub first_errors: Vec<String>,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub rendered_map: String,
    pub file_count: usize,
    pub tag_count: usize,
    pub parse_errors_count: usize,
    pub stats: ExtractionSummary,
}

// ---------------------------------------------------------------------------
// Analysis options (personalization inputs to the ranker)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Files "in the chat" — receive the highest personalization mass.
    pub chat_files: HashSet<String>,
    /// Files mentioned but not actively open — receive a smaller mass.
    pub mentioned_files: HashSet<String>,
    /// Identifiers explicitly called out by the user — boost their edge weight.
    pub mentioned_identifiers: HashSet<String>,
    pub map_tokens: Option<usize>,
}

// ---------------------------------------------------------------------------
// Per-project scan config (file walking)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub root: PathBuf,
    pub skip_dirs: HashSet<String>,
    pub extensions: HashSet<String>,
    pub max_file_size: u64,
}

impl ScanConfig {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            skip_dirs: [".git", "node_modules", "__pycache__", "target", "dist", "build", ".next", "vendor"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            extensions: HashSet::new(),
            max_file_size: 1024 * 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// Path validation
// ---------------------------------------------------------------------------

/// Validate and canonicalize a relative path, rejecting traversal attacks and
/// paths outside the project root. Used anywhere a tree node or session
/// references a path and the engine needs to read the underlying source file.
pub fn validate_path(project_root: &Path, rel_path: &str) -> Result<PathBuf, &'static str> {
    if rel_path.is_empty() || rel_path.contains("..") || rel_path.starts_with('/') {
        return Err("invalid path");
    }
    let full = project_root.join(rel_path);
    let canonical = full.canonicalize().map_err(|_| "file not found")?;
    let root_canonical = project_root.canonicalize().map_err(|_| "root not found")?;
    if !canonical.starts_with(&root_canonical) {
        return Err("path traversal detected");
    }
    Ok(canonical)
}

pub type FileRankMap = BTreeMap<String, f64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_span_invariant() {
        let ok = Tag::new("foo", TagKind::FunctionName, "a.py", 3, 0).with_span(5, 1);
        assert!(ok.is_well_formed());
        let bad = Tag { end_line: Some(1), ..Tag::new("foo", TagKind::FunctionName, "a.py", 3, 0) };
        assert!(!bad.is_well_formed());
    }

    #[test]
    fn corpus_collects_definitions_only() {
        let tags = vec![
            Tag::new("f", TagKind::FunctionName, "a.py", 1, 0),
            Tag::new("f", TagKind::CallReference, "b.py", 2, 0),
        ];
        let corpus = IdentifierCorpus::from_tags(&tags);
        assert_eq!(corpus.definitions.get("f").unwrap().len(), 1);
    }

    #[test]
    fn sort_is_stable_on_ties() {
        let mut results = vec![
            MatchResult { identifier: "b".into(), score: 50.0, strategy_tag: "exact".into() },
            MatchResult { identifier: "a".into(), score: 50.0, strategy_tag: "exact".into() },
        ];
        sort_match_results(&mut results);
        assert_eq!(results[0].identifier, "a");
    }

    #[test]
    fn validate_path_rejects_traversal() {
        let root = Path::new("/tmp");
        assert!(validate_path(root, "../etc/passwd").is_err());
    }

    #[test]
    fn validate_path_rejects_absolute() {
        let root = Path::new("/tmp");
        assert!(validate_path(root, "/etc/passwd").is_err());
    }
}
