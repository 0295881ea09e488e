//! Token counting for compression decisions
//!
//! Uses tiktoken's cl100k BPE behind a lazily initialized singleton; the
//! encoder is expensive to build and shared by every request.

use std::sync::OnceLock;
use tiktoken_rs::{cl100k_base, CoreBPE};

static CL100K: OnceLock<CoreBPE> = OnceLock::new();

fn encoder() -> &'static CoreBPE {
    CL100K.get_or_init(|| cl100k_base().expect("cl100k_base encoder data is embedded"))
}

/// Counts tokens for threshold checks and before/after comparisons
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    pub fn new() -> Self {
        Self
    }

    /// Token count of `text` under the cl100k encoding
    pub fn count(&self, text: &str) -> usize {
        encoder().encode_with_special_tokens(text).len()
    }
}
