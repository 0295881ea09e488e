//! Payload compression pipeline
//!
//! A request payload flows walker -> coordinator -> summarizer: the walker
//! collects compression candidates with stable locators, the coordinator
//! resolves each against the shared cache or dispatches cache misses to the
//! summarizer concurrently, and resolved text is written back per locator.
//! Every failure along the way degrades to the original text; compression is
//! never a source of request failure.

pub mod cache;
pub mod coordinator;
pub mod prompts;
pub mod summarizer;
pub mod tokens;
pub mod walker;

pub use cache::{CacheCapacity, CompressionCache};
pub use coordinator::{CompressionCoordinator, MinTokenThreshold};
pub use summarizer::{Summarize, SummarizerClient, SummarizerError};
pub use tokens::TokenCounter;
