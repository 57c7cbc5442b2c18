//! Parallel tag extractor (C3): walks the project, dispatches parses across
//! a worker pool, merges the per-file results into one deterministic corpus.

use crate::cache::TagCache;
use crate::config::{CacheConfig, PerformanceConfig};
use crate::parser;
use crate::types::{ExtractionSummary, ScanConfig, Tag};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
}

/// Walks `config.root`, honoring `.gitignore`, `config.skip_dirs`, hidden
/// files, binary-looking files, and the max file size — producing a
/// deterministic (path-sorted) candidate list.
pub fn walk_project(config: &ScanConfig) -> Vec<CandidateFile> {
    let mut builder = WalkBuilder::new(&config.root);
    builder.hidden(true).git_ignore(true).git_global(true).git_exclude(true);

    let mut files = Vec::new();
    for entry in builder.build() {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if path.components().any(|c| config.skip_dirs.contains(c.as_os_str().to_string_lossy().as_ref())) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        if metadata.len() > config.max_file_size {
            continue;
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
        if !config.extensions.is_empty() && !config.extensions.contains(&ext) {
            continue;
        }
        if !parser::is_supported_ext(&ext) {
            continue;
        }
        let Ok(rel) = path.strip_prefix(&config.root) else { continue };
        files.push(CandidateFile { rel_path: rel.to_string_lossy().replace('\\', "/"), abs_path: path.to_path_buf() });
    }
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    files
}

pub type ProgressCallback = dyn Fn(usize, usize) + Send + Sync;

pub struct ExtractionOutcome {
    pub corpus: Vec<Tag>,
    pub summary: ExtractionSummary,
}

/// Runs the extraction pass: walk → (cache ↔ parse) per file → merge.
/// `cache` is optional — when absent, every file is parsed fresh.
/// `parallel` toggles the rayon dispatch; sequential mode runs the identical
/// per-file pipeline on the calling thread, useful for deterministic tests
/// and for the documented fallback when parallel dispatch is disabled.
pub fn extract(
    config: &ScanConfig,
    cache: Option<&TagCache>,
    perf: &PerformanceConfig,
    parallel: bool,
    progress: Option<&ProgressCallback>,
    cancel: Option<&AtomicBool>,
) -> ExtractionOutcome {
    let files = walk_project(config);
    let total = files.len();
    let completed = AtomicUsize::new(0);
    let last_report = std::sync::Mutex::new(Instant::now());
    let cache_hits = AtomicUsize::new(0);
    let cache_misses = AtomicUsize::new(0);
    let errors: std::sync::Mutex<Vec<String>> = std::sync::Mutex::new(Vec::new());

    let process_one = |file: &CandidateFile| -> Option<Vec<Tag>> {
        if let Some(c) = cancel {
            if c.load(Ordering::Relaxed) {
                return None;
            }
        }
        let result = if let Some(cache) = cache {
            if let Some(tags) = cache.get(&file.rel_path, &file.abs_path) {
                cache_hits.fetch_add(1, Ordering::Relaxed);
                Some(tags)
            } else {
                cache_misses.fetch_add(1, Ordering::Relaxed);
                let tags = parser::parse_file(&file.abs_path, &file.rel_path).unwrap_or_default();
                if let Err(e) = cache.put(&file.rel_path, &file.abs_path, &tags) {
                    errors.lock().unwrap().push(format!("{}: cache write failed: {e}", file.rel_path));
                }
                Some(tags)
            }
        } else {
            match parser::parse_file(&file.abs_path, &file.rel_path) {
                Some(tags) => Some(tags),
                None => {
                    errors.lock().unwrap().push(format!("{}: unsupported or unreadable", file.rel_path));
                    Some(Vec::new())
                }
            }
        };

        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(cb) = progress {
            let mut guard = last_report.lock().unwrap();
            if guard.elapsed() >= Duration::from_millis(100) || done == total {
                cb(done, total);
                *guard = Instant::now();
            }
        }
        result
    };

    let per_file: Vec<Vec<Tag>> = if parallel && total >= perf.parallel_threshold {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(perf.max_workers.max(1)).build();
        match pool {
            Ok(pool) => pool.install(|| files.par_iter().filter_map(process_one).collect()),
            Err(_) => files.iter().filter_map(process_one).collect(),
        }
    } else {
        files.iter().filter_map(process_one).collect()
    };

    // Files already sorted by path; tags within each file keep parse order.
    let corpus: Vec<Tag> = per_file.into_iter().flatten().collect();
    let errors = errors.into_inner().unwrap();

    let summary = ExtractionSummary {
        file_count: files.len(),
        tag_count: corpus.len(),
        parse_errors_count: errors.len(),
        first_errors: errors.into_iter().take(10).collect(),
        cache_hits: cache_hits.load(Ordering::Relaxed),
        cache_misses: cache_misses.load(Ordering::Relaxed),
    };

    ExtractionOutcome { corpus, summary }
}

/// Convenience: build a cache handle from cache config, or `None` if disabled.
pub fn open_cache(cache_config: &CacheConfig) -> Option<Arc<TagCache>> {
    if !cache_config.enabled {
        return None;
    }
    match TagCache::open(&cache_config.dir) {
        Ok(c) => Some(Arc::new(c)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to open tag cache; proceeding without cache");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PerformanceConfig;

    fn write(dir: &std::path::Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn walk_is_sorted_and_filters_skip_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.py", "x = 1\n");
        write(dir.path(), "a.py", "y = 2\n");
        write(dir.path(), "node_modules/ignored.py", "z = 3\n");

        let config = ScanConfig::new(dir.path().to_path_buf());
        let files = walk_project(&config);
        let paths: Vec<_> = files.iter().map(|f| f.rel_path.clone()).collect();
        assert_eq!(paths, vec!["a.py".to_string(), "b.py".to_string()]);
    }

    #[test]
    fn extract_empty_project_has_no_tags() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "empty.py", "");
        let config = ScanConfig::new(dir.path().to_path_buf());
        let perf = PerformanceConfig::default();
        let outcome = extract(&config, None, &perf, false, None, None);
        assert_eq!(outcome.summary.tag_count, 0);
        assert_eq!(outcome.summary.file_count, 1);
    }

    #[test]
    fn extract_deterministic_across_parallel_and_sequential() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "def f(): pass\n");
        write(dir.path(), "b.py", "def g(): f()\n");
        let config = ScanConfig::new(dir.path().to_path_buf());
        let perf = PerformanceConfig::default();

        let seq = extract(&config, None, &perf, false, None, None);
        let par = extract(&config, None, &perf, true, None, None);

        let seq_names: Vec<_> = seq.corpus.iter().map(|t| (t.file.clone(), t.name.clone())).collect();
        let par_names: Vec<_> = par.corpus.iter().map(|t| (t.file.clone(), t.name.clone())).collect();
        assert_eq!(seq_names, par_names);
    }

    #[test]
    fn extract_uses_cache_on_second_pass() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "def f(): pass\n");
        let config = ScanConfig::new(dir.path().to_path_buf());
        let perf = PerformanceConfig::default();
        let cache = TagCache::open_in_memory().unwrap();

        let first = extract(&config, Some(&cache), &perf, false, None, None);
        assert_eq!(first.summary.cache_misses, 1);
        assert_eq!(first.summary.cache_hits, 0);

        let second = extract(&config, Some(&cache), &perf, false, None, None);
        assert_eq!(second.summary.cache_hits, 1);
        assert_eq!(second.summary.cache_misses, 0);
    }
}
