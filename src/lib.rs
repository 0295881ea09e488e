//! Tokengate - a transparent, compression-aware gateway for LLM messages APIs
//!
//! The gateway forwards requests to a single upstream provider unmodified,
//! except for one optional transformation: long text segments in the
//! conversation payload are replaced with a token-reduced equivalent produced
//! by a secondary summarization call. Compression is memoized, best-effort,
//! and never a source of request failure.

pub mod application;
pub mod compression;
pub mod config;
pub mod error;
pub mod payload;
pub mod proxy;

pub use application::Application;
pub use error::{Error, Result};
