//! `repomap` CLI — thin wrapper around `repomap-core`'s programmatic
//! surface. No server process, no daemon: every invocation extracts (or
//! hits the on-disk tag cache) and answers directly.

use clap::{Parser, Subcommand};
use repomap_core::types::AnalysisOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "repomap", version, about = "Repo map: ranked, token-budgeted codebase summaries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a ranked, token-budgeted map of the project
    Analyze {
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long)]
        tokens: Option<usize>,
        /// Files to weight heavily, as if open in an editor
        #[arg(long = "chat-file")]
        chat_files: Vec<String>,
        /// Files mentioned in conversation, weighted lightly
        #[arg(long = "mention-file")]
        mentioned_files: Vec<String>,
    },
    /// Fuzzy + semantic identifier search
    Search {
        query: String,
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Dependency graph queries
    Deps {
        #[command(subcommand)]
        command: DepsCommands,
    },
    /// Start an exploration session for a natural-language intent
    Explore {
        intent: String,
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Focus a node within an exploration tree
    Focus { session_id: String, tree_id: String, node_id: String },
    /// Expand a node's neighbors within an exploration tree
    Expand {
        session_id: String,
        tree_id: String,
        node_id: String,
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Prune a node (and its subtree) from an exploration tree
    Prune { session_id: String, tree_id: String, node_id: String },
    /// Render a tree as ASCII art
    Map {
        session_id: String,
        tree_id: String,
        #[arg(long)]
        snippets: bool,
    },
    /// Exploration session bookkeeping
    Sessions {
        #[command(subcommand)]
        command: SessionsCommands,
    },
}

#[derive(Subcommand)]
enum DepsCommands {
    Stats {
        #[arg(long)]
        root: Option<PathBuf>,
    },
    Cycles {
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    Centrality {
        #[arg(long)]
        root: Option<PathBuf>,
    },
    Impact {
        #[arg(required = true)]
        files: Vec<String>,
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SessionsCommands {
    List { session_id: String },
    Status { session_id: String },
}

fn resolve_root(root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| std::env::current_dir().expect("could not determine current directory"))
        .canonicalize()
        .expect("project root not found")
}

/// Loads `<root>/.repomap.toml` if present, falling back to defaults.
fn load_config(root: &std::path::Path) -> repomap_core::config::Config {
    let path = root.join(".repomap.toml");
    let Ok(content) = std::fs::read_to_string(&path) else {
        return repomap_core::config::Config::default();
    };
    match toml::from_str(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "failed to parse .repomap.toml; using defaults");
            repomap_core::config::Config::default()
        }
    }
}

fn print_json(value: &impl serde::Serialize) {
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}

fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!("error: {err}");
    std::process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("repomap=warn".parse().unwrap()))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { root, tokens, chat_files, mentioned_files } => {
            let root = resolve_root(root);
            let config = load_config(&root);
            let mut options = AnalysisOptions { map_tokens: tokens, ..Default::default() };
            options.chat_files.extend(chat_files);
            options.mentioned_files.extend(mentioned_files);

            match repomap_core::analyze(root, &config, &options) {
                Ok(result) => {
                    if cli.json {
                        print_json(&result);
                    } else {
                        println!("{}", result.rendered_map);
                        eprintln!(
                            "\n{} files, {} tags ({} parse errors)",
                            result.file_count, result.tag_count, result.parse_errors_count
                        );
                    }
                }
                Err(e) => fail(e),
            }
        }

        Commands::Search { query, root, limit } => {
            let root = resolve_root(root);
            let config = load_config(&root);
            match repomap_core::search(root, &config, &query, limit) {
                Ok(results) => {
                    if cli.json {
                        print_json(&results);
                    } else if results.is_empty() {
                        eprintln!("no matches for '{query}'");
                        std::process::exit(1);
                    } else {
                        for r in &results {
                            println!("{:<40} {:>6.1}  {}", r.identifier, r.score, r.strategy_tag);
                        }
                    }
                }
                Err(e) => fail(e),
            }
        }

        Commands::Deps { command } => match command {
            DepsCommands::Stats { root } => {
                let root = resolve_root(root);
                let config = load_config(&root);
                match repomap_core::dependency_stats(root, &config) {
                    Ok(stats) => {
                        if cli.json {
                            print_json(&stats);
                        } else {
                            println!("files:              {}", stats.file_count);
                            println!("edges:              {}", stats.edge_count);
                            println!("avg out-degree:     {:.2}", stats.average_out_degree);
                            println!("max out-degree:     {}", stats.max_out_degree);
                            println!("isolated files:     {}", stats.isolated_files.len());
                            println!("cycles:             {}", stats.cycle_count);
                            println!("roots:              {}", stats.roots.len());
                            println!("leaves:             {}", stats.leaves.len());
                            for (ext, count) in &stats.language_distribution {
                                println!("  .{ext:<10} {count}");
                            }
                        }
                    }
                    Err(e) => fail(e),
                }
            }
            DepsCommands::Cycles { root, limit } => {
                let root = resolve_root(root);
                let config = load_config(&root);
                match repomap_core::find_cycles(root, &config, limit) {
                    Ok(cycles) => {
                        if cli.json {
                            print_json(&cycles);
                        } else if cycles.is_empty() {
                            println!("no cycles found");
                        } else {
                            for cycle in &cycles {
                                println!("{}", cycle.join(" -> "));
                            }
                        }
                    }
                    Err(e) => fail(e),
                }
            }
            DepsCommands::Centrality { root } => {
                let root = resolve_root(root);
                let config = load_config(&root);
                match repomap_core::centrality(root, &config) {
                    Ok(scores) => {
                        if cli.json {
                            print_json(&scores);
                        } else {
                            let mut rows: Vec<_> = scores.into_iter().collect();
                            rows.sort_by(|a, b| b.1.pagerank.partial_cmp(&a.1.pagerank).unwrap());
                            for (file, s) in rows.iter().take(20) {
                                println!("{:<40} degree={:.3} betweenness={:.3} pagerank={:.4}", file, s.degree, s.betweenness, s.pagerank);
                            }
                        }
                    }
                    Err(e) => fail(e),
                }
            }
            DepsCommands::Impact { files, root } => {
                let root = resolve_root(root);
                let config = load_config(&root);
                match repomap_core::impact(root, &config, &files) {
                    Ok(impact) => {
                        if cli.json {
                            print_json(&impact);
                        } else {
                            println!("affected files:   {}", impact.affected_files.len());
                            println!("risk score:       {:.3}", impact.risk_score);
                            for (file, level) in &impact.breaking_change_level {
                                println!("  {file:<40} {level:?}");
                            }
                            println!("suggested tests:  {}", impact.suggested_tests.join(", "));
                        }
                    }
                    Err(e) => fail(e),
                }
            }
        },

        Commands::Explore { intent, root } => {
            let root = resolve_root(root);
            let config = load_config(&root);
            match repomap_core::start_exploration(root, &config, &intent) {
                Ok(session) => {
                    if cli.json {
                        print_json(&session);
                    } else {
                        println!("session: {}", session.id);
                        for tree in &session.trees {
                            println!("  tree {} ({:.1}): {}", tree.id, tree.confidence, tree.title);
                        }
                    }
                }
                Err(e) => fail(e),
            }
        }

        Commands::Focus { session_id, tree_id, node_id } => {
            let config = repomap_core::config::Config::default();
            match repomap_core::focus_session(&config, &session_id, &tree_id, &node_id) {
                Ok(session) => print_json(&session),
                Err(e) => fail(e),
            }
        }

        Commands::Expand { session_id, tree_id, node_id, root } => {
            let root = resolve_root(root);
            let config = load_config(&root);
            match repomap_core::expand_session(root, &config, &session_id, &tree_id, &node_id) {
                Ok(session) => print_json(&session),
                Err(e) => fail(e),
            }
        }

        Commands::Prune { session_id, tree_id, node_id } => {
            let config = repomap_core::config::Config::default();
            match repomap_core::prune_session(&config, &session_id, &tree_id, &node_id) {
                Ok(session) => print_json(&session),
                Err(e) => fail(e),
            }
        }

        Commands::Map { session_id, tree_id, snippets } => {
            let config = repomap_core::config::Config::default();
            match repomap_core::map_session(&config, &session_id, &tree_id, snippets) {
                Ok(rendered) => println!("{rendered}"),
                Err(e) => fail(e),
            }
        }

        Commands::Sessions { command } => {
            let config = repomap_core::config::Config::default();
            match command {
                SessionsCommands::List { session_id } => match repomap_core::list_trees_session(&config, &session_id) {
                    Ok(trees) => {
                        if cli.json {
                            print_json(&trees);
                        } else {
                            for t in &trees {
                                println!("{:<38} {:<30} conf={:.1} {} nodes  {}", t.tree_id, t.root_file, t.confidence, t.node_count, t.title);
                            }
                        }
                    }
                    Err(e) => fail(e),
                },
                SessionsCommands::Status { session_id } => match repomap_core::session_status(&config, &session_id) {
                    Ok(status) => {
                        if cli.json {
                            print_json(&status);
                        } else {
                            println!("session:     {}", status.session_id);
                            println!("intent:      {}", status.intent);
                            println!("trees:       {}", status.tree_count);
                            println!("total nodes: {}", status.total_nodes);
                        }
                    }
                    Err(e) => fail(e),
                },
            }
        }
    }
}
