//! Token counting for budget-aware rendering. The default estimator is a
//! cheap chars/4 approximation (see §9, "Token budget" in the glossary);
//! `tiktoken` gives an exact cl100k_base count when the feature is enabled.

use std::sync::Arc;

pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
    fn name(&self) -> &'static str;
}

/// Default tokenizer: `chars / 4`, rounded up. A cheap stand-in for an exact
/// count when no tokenizer backend is compiled in.
pub struct CharsEstimateTokenizer;

impl Tokenizer for CharsEstimateTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    fn name(&self) -> &'static str {
        "chars-estimate"
    }
}

#[cfg(feature = "tiktoken")]
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken")]
impl TiktokenTokenizer {
    pub fn new() -> Self {
        Self { bpe: tiktoken_rs::cl100k_base().expect("cl100k_base tokenizer data must be bundled") }
    }
}

#[cfg(feature = "tiktoken")]
impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &'static str {
        "tiktoken"
    }
}

pub fn create_tokenizer(name: &str) -> Arc<dyn Tokenizer> {
    match name {
        #[cfg(feature = "tiktoken")]
        "tiktoken" => Arc::new(TiktokenTokenizer::new()),
        _ => Arc::new(CharsEstimateTokenizer),
    }
}
