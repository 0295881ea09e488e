//! Process-wide compression cache
//!
//! Maps original text to its compressed replacement and tracks every value
//! the summarizer ever produced so that text which is itself a compressed
//! output is never re-submitted (no double compression). The forward map is
//! bounded: once at capacity the oldest original is evicted, insertion
//! order. Shared by all concurrent requests; two requests racing to write
//! the same key is fine, last writer wins.

use nutype::nutype;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Upper bound on cached originals
#[nutype(
    derive(Clone, Copy, Debug, Display, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |capacity: &usize| *capacity > 0),
)]
pub struct CacheCapacity(usize);

pub struct CompressionCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    forward: HashMap<String, String>,
    /// Refcounted set of known compressed outputs; a value may back
    /// multiple keys (identity mappings in particular)
    outputs: HashMap<String, usize>,
    /// Keys in insertion order, for eviction
    order: VecDeque<String>,
    capacity: usize,
}

impl CompressionCache {
    pub fn new(capacity: CacheCapacity) -> Self {
        let capacity = *capacity.as_ref();
        Self {
            inner: Mutex::new(CacheInner {
                forward: HashMap::with_capacity(capacity.min(1024)),
                outputs: HashMap::new(),
                order: VecDeque::new(),
                capacity,
            }),
        }
    }

    /// The cached replacement for `original`, if any
    pub fn lookup(&self, original: &str) -> Option<String> {
        self.inner.lock().forward.get(original).cloned()
    }

    /// Whether `text` has ever been produced as a compressed output
    pub fn is_known_output(&self, text: &str) -> bool {
        self.inner.lock().outputs.contains_key(text)
    }

    /// Record `original -> compressed`; replaces any existing mapping and
    /// evicts the oldest entry when the cache is full
    pub fn insert(&self, original: String, compressed: String) {
        let mut inner = self.inner.lock();

        if let Some(previous) = inner.forward.get(&original).cloned() {
            inner.release_output(&previous);
            inner.track_output(compressed.clone());
            inner.forward.insert(original, compressed);
            return;
        }

        while inner.forward.len() >= inner.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if let Some(evicted) = inner.forward.remove(&oldest) {
                inner.release_output(&evicted);
            }
        }

        inner.track_output(compressed.clone());
        inner.order.push_back(original.clone());
        inner.forward.insert(original, compressed);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().forward.is_empty()
    }

    /// Point-in-time copy of the forward map, for the health-route dump
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner.lock().forward.clone()
    }
}

impl CacheInner {
    fn track_output(&mut self, output: String) {
        *self.outputs.entry(output).or_insert(0) += 1;
    }

    fn release_output(&mut self, output: &str) {
        if let Some(count) = self.outputs.get_mut(output) {
            *count -= 1;
            if *count == 0 {
                self.outputs.remove(output);
            }
        }
    }
}
