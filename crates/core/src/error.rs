//! Error taxonomy for the repo-map core. Every fallible operation on the
//! programmatic surface returns a [`RepoMapError`]; per-file failures during
//! extraction are recovered locally and only surfaced in aggregate.

use std::path::PathBuf;
use thiserror::Error;

/// Structured error payload returned to the host. Each variant corresponds to
/// one taxonomy kind; `context` carries kind-specific detail for display.
#[derive(Debug, Error)]
pub enum RepoMapError {
    #[error("input error: {message} ({context})")]
    Input { message: String, context: String },

    #[error("parse error: {message} ({context})")]
    Parse { message: String, context: String },

    #[error("cache error: {message} ({context})")]
    Cache { message: String, context: String },

    #[error("graph error: {message} ({context})")]
    Graph { message: String, context: String },

    #[error("session error: {message} ({context})")]
    Session { message: String, context: String },

    #[error("configuration error: {message} ({context})")]
    Configuration { message: String, context: String },

    #[error("operation cancelled: {context}")]
    Cancelled { context: String },
}

impl RepoMapError {
    pub fn input(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Input { message: message.into(), context: context.into() }
    }

    pub fn parse(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Parse { message: message.into(), context: context.into() }
    }

    pub fn cache(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Cache { message: message.into(), context: context.into() }
    }

    pub fn graph(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Graph { message: message.into(), context: context.into() }
    }

    pub fn session(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Session { message: message.into(), context: context.into() }
    }

    pub fn configuration(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Configuration { message: message.into(), context: context.into() }
    }

    /// Machine-readable taxonomy tag, stable across error message wording changes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input { .. } => "input",
            Self::Parse { .. } => "parse",
            Self::Cache { .. } => "cache",
            Self::Graph { .. } => "graph",
            Self::Session { .. } => "session",
            Self::Configuration { .. } => "configuration",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, RepoMapError>;

/// A non-fatal failure recorded against a single file during extraction.
/// These never abort a pass; they're aggregated into `parse_errors_count` /
/// `first_errors` on the extraction summary.
#[derive(Debug, Clone)]
pub struct FileWarning {
    pub file: PathBuf,
    pub message: String,
}
