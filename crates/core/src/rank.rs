//! Ranker (C5): personalized PageRank over the symbol graph, then a
//! token-budgeted textual rendering of the highest-ranked files.

use crate::config::RankerConfig;
use crate::graph::SymbolGraph;
use crate::tokenizer::Tokenizer;
use crate::types::{validate_path, AnalysisOptions, FileRankMap, Tag};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use std::path::Path;

/// Builds the personalization vector per §4.4: chat files get the heaviest
/// mass, mentioned files a smaller one, and the whole vector falls back to
/// uniform when nothing was chat'd or mentioned.
fn personalization_vector(graph: &SymbolGraph, options: &AnalysisOptions) -> HashMap<NodeIndex, f64> {
    const CHAT_MASS: f64 = 50.0;
    const MENTIONED_MASS: f64 = 10.0;

    let mut mass: HashMap<NodeIndex, f64> = HashMap::new();
    for file in options.chat_files.iter() {
        if let Some(idx) = graph.file_index(file) {
            *mass.entry(idx).or_insert(0.0) += CHAT_MASS;
        }
    }
    for file in options.mentioned_files.iter() {
        if let Some(idx) = graph.file_index(file) {
            *mass.entry(idx).or_insert(0.0) += MENTIONED_MASS;
        }
    }

    let total: f64 = mass.values().sum();
    if total <= 0.0 {
        let n = graph.node_count().max(1) as f64;
        return graph.graph.node_indices().map(|idx| (idx, 1.0 / n)).collect();
    }
    mass.into_iter().map(|(idx, v)| (idx, v / total)).collect()
}

/// Personalized PageRank: `damping` mass follows outgoing edges weighted by
/// `w(r→d)`, the remainder teleports according to the personalization
/// vector. Converges when the L1 delta drops below `tolerance` or after
/// `max_iterations` rounds, whichever comes first.
pub fn personalized_pagerank(graph: &SymbolGraph, options: &AnalysisOptions, cfg: &RankerConfig) -> FileRankMap {
    let n = graph.node_count();
    if n == 0 {
        return FileRankMap::new();
    }

    let personalization = personalization_vector(graph, options);
    let indices: Vec<NodeIndex> = graph.graph.node_indices().collect();

    // Precompute each node's total outgoing weight for normalization; a node
    // with no outgoing edges redistributes its mass via the personalization
    // vector (dangling-node handling).
    let mut out_weight: HashMap<NodeIndex, f64> = HashMap::new();
    for idx in &indices {
        let w: f64 = graph.graph.edges(*idx).map(|e| *e.weight()).sum();
        out_weight.insert(*idx, w);
    }

    let mut rank: HashMap<NodeIndex, f64> = indices.iter().map(|&i| (i, 1.0 / n as f64)).collect();

    for _ in 0..cfg.max_iterations {
        let mut next: HashMap<NodeIndex, f64> = indices.iter().map(|&i| (i, 0.0)).collect();
        let mut dangling_mass = 0.0;

        for &idx in &indices {
            let r = rank[&idx];
            let ow = out_weight[&idx];
            if ow <= 0.0 {
                dangling_mass += r;
                continue;
            }
            for edge in graph.graph.edges(idx) {
                let share = r * (*edge.weight() / ow);
                *next.get_mut(&edge.target()).unwrap() += cfg.damping * share;
            }
        }

        for &idx in &indices {
            let teleport = personalization.get(&idx).copied().unwrap_or(0.0);
            let redistributed_dangling = cfg.damping * dangling_mass * teleport;
            let base = (1.0 - cfg.damping) * teleport;
            *next.get_mut(&idx).unwrap() += base + redistributed_dangling;
        }

        let delta: f64 = indices.iter().map(|i| (next[i] - rank[i]).abs()).sum();
        rank = next;
        if delta < cfg.tolerance {
            break;
        }
    }

    rank.into_iter().map(|(idx, score)| (graph.graph[idx].clone(), score)).collect()
}

/// A tag selected for rendering, alongside the file it belongs to.
struct RenderTag<'a> {
    tag: &'a Tag,
}

/// Renders the token-budgeted map per §4.4's final step: files are taken in
/// descending rank order; for each included file, tags are selected by
/// render priority (class > fn/method > variable) and listed in source
/// order; a binary search over the file-count cutoff maximizes token-budget
/// utilization without exceeding it.
pub fn render_map(
    project_root: &Path,
    corpus: &[Tag],
    ranks: &FileRankMap,
    budget_tokens: usize,
    tokenizer: &dyn Tokenizer,
) -> String {
    let mut by_file: HashMap<&str, Vec<RenderTag>> = HashMap::new();
    for tag in corpus {
        if tag.kind.is_definition() {
            by_file.entry(tag.file.as_str()).or_default().push(RenderTag { tag });
        }
    }
    for tags in by_file.values_mut() {
        tags.sort_by(|a, b| {
            a.tag.kind.render_priority().cmp(&b.tag.kind.render_priority()).then_with(|| a.tag.line.cmp(&b.tag.line))
        });
    }

    let mut ranked_files: Vec<(&str, f64)> =
        ranks.iter().map(|(f, s)| (f.as_str(), *s)).filter(|(f, _)| by_file.contains_key(f)).collect();
    ranked_files.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(b.0)));

    // Source lines are read once per file and shared across all of that
    // file's tags rather than re-read per tag.
    let mut source_cache: HashMap<&str, Option<Vec<String>>> = HashMap::new();
    let mut lines_for = |file: &str| -> Option<Vec<String>> {
        source_cache
            .entry(file)
            .or_insert_with(|| {
                let abs = validate_path(project_root, file).ok()?;
                let content = std::fs::read_to_string(abs).ok()?;
                Some(content.lines().map(str::to_string).collect())
            })
            .clone()
    };

    let render_file = |file: &str, tags: &[RenderTag], lines_for: &mut dyn FnMut(&str) -> Option<Vec<String>>| -> String {
        let lines = lines_for(file);
        let mut out = format!("{file}:\n");
        for rt in tags {
            let snippet = render_snippet(rt.tag, lines.as_deref());
            out.push_str(&format!("  {} {}: {}\n", rt.tag.kind.prefix(), rt.tag.name, snippet));
        }
        out
    };

    // Binary search over how many top-ranked files fit the budget.
    let mut lo = 0usize;
    let mut hi = ranked_files.len();
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        let rendered: String = ranked_files
            .iter()
            .take(mid)
            .map(|(f, _)| render_file(f, &by_file[f], &mut lines_for))
            .collect::<Vec<_>>()
            .join("");
        if tokenizer.count_tokens(&rendered) <= budget_tokens {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    ranked_files.iter().take(lo).map(|(f, _)| render_file(f, &by_file[f], &mut lines_for)).collect::<Vec<_>>().join("")
}

/// Reconstructs a tag's signature from its source span when the file is
/// still readable; otherwise falls back to the tag's name and kind per
/// §4.4 step 3.
fn render_snippet(tag: &Tag, lines: Option<&[String]>) -> String {
    if let Some(lines) = lines {
        let start = tag.line.saturating_sub(1);
        if let Some(line) = lines.get(start) {
            let trimmed = line.trim();
            let sig = if trimmed.chars().count() > 200 {
                format!("{}...", trimmed.chars().take(200).collect::<String>())
            } else {
                trimmed.to_string()
            };
            if !sig.is_empty() {
                return format!("line {}: {}", tag.line, sig);
            }
        }
    }
    format!("{} {} (line {})", tag.kind.prefix(), tag.name, tag.line)
}
