// src/summary/tokens.rs
//! Token counting and the two size gates in front of the completion backend.

use std::sync::Arc;

use anyhow::Context;
use once_cell::sync::OnceCell;
use tiktoken_rs::CoreBPE;
use tracing::warn;

use crate::config::summary::SummaryConfig;

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// cl100k_base BPE, the encoding of the completion models. The merge table
/// is parsed once per process and shared between counters.
#[derive(Clone)]
pub struct BpeTokenCounter {
    bpe: Arc<CoreBPE>,
}

impl BpeTokenCounter {
    pub fn cl100k() -> anyhow::Result<Self> {
        static BPE: OnceCell<Arc<CoreBPE>> = OnceCell::new();
        let bpe = BPE
            .get_or_try_init(|| tiktoken_rs::cl100k_base().map(Arc::new))
            .context("load cl100k_base encoding")?;
        Ok(Self { bpe: bpe.clone() })
    }
}

impl TokenCounter for BpeTokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// BPE counter, or the character heuristic if the encoding cannot be loaded.
pub fn default_counter() -> Arc<dyn TokenCounter> {
    match BpeTokenCounter::cl100k() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            warn!(target: "summary", error = %e, "falling back to heuristic token counts");
            Arc::new(HeuristicTokenCounter)
        }
    }
}

/// ~1 token per 4 characters, rounded up. Undercounts CJK and symbol-heavy
/// text, so only used when the BPE tables are unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

/// Reports the same count for any input. Test helper for boundary checks.
#[derive(Debug, Clone, Copy)]
pub struct FixedTokenCounter(pub usize);

impl TokenCounter for FixedTokenCounter {
    fn count(&self, _text: &str) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChoice {
    /// Over budget: do not call the backend.
    TooLong,
    Model(String),
}

/// `tokens > token_budget` → too long; `tokens > large_model_threshold` → large model.
pub fn choose_model(tokens: usize, cfg: &SummaryConfig) -> ModelChoice {
    if tokens > cfg.token_budget {
        ModelChoice::TooLong
    } else if tokens > cfg.large_model_threshold {
        ModelChoice::Model(cfg.large_model.clone())
    } else {
        ModelChoice::Model(cfg.small_model.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_rounds_up() {
        let c = HeuristicTokenCounter;
        assert_eq!(c.count(""), 0);
        assert_eq!(c.count("abcd"), 1);
        assert_eq!(c.count("abcde"), 2);
    }

    #[test]
    fn bpe_counts_common_words_as_single_tokens() {
        let c = BpeTokenCounter::cl100k().unwrap();
        assert_eq!(c.count(""), 0);
        assert_eq!(c.count("hello world"), 2);
    }

    #[test]
    fn dense_script_is_over_budget_under_bpe() {
        // 20k space-separated ideographs: the char heuristic says 10k tokens,
        // the real encoding needs at least one token per word.
        let text = "龘 ".repeat(20_000);
        let cfg = SummaryConfig::default();

        let heuristic = HeuristicTokenCounter.count(&text);
        assert_eq!(heuristic, 10_000);
        assert_ne!(choose_model(heuristic, &cfg), ModelChoice::TooLong);

        let bpe = BpeTokenCounter::cl100k().unwrap().count(&text);
        assert!(bpe > cfg.token_budget, "bpe count {bpe}");
        assert_eq!(choose_model(bpe, &cfg), ModelChoice::TooLong);
    }

    #[test]
    fn default_counter_uses_bpe() {
        assert_eq!(default_counter().count("hello world"), 2);
    }

    #[test]
    fn budget_and_model_boundaries() {
        let cfg = SummaryConfig::default();
        let small = ModelChoice::Model(cfg.small_model.clone());
        let large = ModelChoice::Model(cfg.large_model.clone());

        assert_eq!(choose_model(4_000, &cfg), small);
        assert_eq!(choose_model(4_001, &cfg), large);
        assert_eq!(choose_model(16_000, &cfg), large);
        assert_eq!(choose_model(16_001, &cfg), ModelChoice::TooLong);
    }
}
