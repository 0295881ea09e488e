//! Compression coordination: cache policy and concurrent dispatch
//!
//! Per candidate: a cache hit substitutes with no call; text that is itself
//! a known compressed output is left alone (no double compression); the
//! remaining misses are deduplicated by text and dispatched to the
//! summarizer concurrently. Results are committed to the cache and written
//! back per locator only after dispatch resolves, so a cancelled request
//! leaves the payload unmutated rather than corrupted.

use crate::compression::cache::CompressionCache;
use crate::compression::summarizer::Summarize;
use crate::compression::tokens::TokenCounter;
use crate::compression::walker::{apply_replacement, collect_candidates, Locator};
use crate::payload::MessagesPayload;
use futures_util::future::join_all;
use nutype::nutype;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Candidates below this token count are never worth the round trip
#[nutype(
    derive(Clone, Copy, Debug, Display, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |tokens: &usize| *tokens > 0),
)]
pub struct MinTokenThreshold(usize);

pub struct CompressionCoordinator {
    cache: Arc<CompressionCache>,
    summarizer: Arc<dyn Summarize>,
    counter: TokenCounter,
    min_tokens: MinTokenThreshold,
}

impl CompressionCoordinator {
    pub fn new(
        cache: Arc<CompressionCache>,
        summarizer: Arc<dyn Summarize>,
        min_tokens: MinTokenThreshold,
    ) -> Self {
        Self {
            cache,
            summarizer,
            counter: TokenCounter::new(),
            min_tokens,
        }
    }

    /// Compress eligible text leaves of `payload` in place. Returns the
    /// number of replacements applied; zero means the payload is untouched
    /// and the caller should forward the original bytes.
    pub async fn compress_messages(&self, payload: &mut MessagesPayload) -> usize {
        let candidates = collect_candidates(payload, &self.counter, *self.min_tokens.as_ref());
        if candidates.is_empty() {
            return 0;
        }

        let mut replacements: Vec<(Locator, String)> = Vec::new();
        // Distinct miss texts in first-seen order, each mapped to every
        // locator where it occurs: identical text shares one call.
        let mut misses: Vec<String> = Vec::new();
        let mut miss_locators: HashMap<String, Vec<Locator>> = HashMap::new();

        for candidate in candidates {
            if let Some(hit) = self.cache.lookup(&candidate.text) {
                // An identity mapping means compression was a losing case;
                // leave the text as-is.
                if hit != candidate.text {
                    replacements.push((candidate.locator, hit));
                }
            } else if self.cache.is_known_output(&candidate.text) {
                debug!("candidate is already a compressed output, skipping");
            } else {
                match miss_locators.entry(candidate.text.clone()) {
                    Entry::Occupied(mut entry) => entry.get_mut().push(candidate.locator),
                    Entry::Vacant(entry) => {
                        misses.push(candidate.text);
                        entry.insert(vec![candidate.locator]);
                    }
                }
            }
        }

        let resolved = join_all(misses.iter().map(|text| self.resolve(text))).await;

        for (text, replacement) in misses.iter().zip(resolved) {
            let Some(replacement) = replacement else {
                continue;
            };
            if let Some(locators) = miss_locators.get(text) {
                for locator in locators {
                    replacements.push((locator.clone(), replacement.clone()));
                }
            }
        }

        let mut applied = 0;
        for (locator, replacement) in replacements {
            if apply_replacement(payload, &locator, replacement) {
                applied += 1;
            }
        }
        applied
    }

    /// Resolve one cache miss. `None` means the original text stands,
    /// either because summarization failed (nothing cached, retried on a
    /// later request) or because the summary came back larger (an identity
    /// mapping is cached so the losing case is not retried every request).
    async fn resolve(&self, text: &str) -> Option<String> {
        let tokens_before = self.counter.count(text);

        match self.summarizer.summarize(text).await {
            Ok(summary) => {
                let tokens_after = self.counter.count(&summary);
                if tokens_after > tokens_before {
                    debug!(
                        tokens_before,
                        tokens_after, "summary exceeded original, storing identity mapping"
                    );
                    self.cache.insert(text.to_string(), text.to_string());
                    None
                } else {
                    debug!(tokens_before, tokens_after, "candidate compressed");
                    self.cache.insert(text.to_string(), summary.clone());
                    Some(summary)
                }
            }
            Err(error) => {
                warn!(%error, "summarization failed, keeping original text");
                None
            }
        }
    }
}
