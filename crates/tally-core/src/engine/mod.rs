//! Pluggable parse engine abstraction
//!
//! - `ParseEngine` trait: one implementation per engine (local heuristic
//!   pipeline, remote document-AI vendor, mock)
//! - `EngineClient` enum: concrete wrapper providing Clone + compile-time
//!   dispatch
//!
//! Every engine maps its own raw output into the canonical `ParseResult` at
//! the boundary, so vendor quirks never leak into the core.

mod local;
mod mock;
mod remote;

pub use local::{LocalEngine, TextRecognizer};
pub use mock::MockEngine;
pub use remote::RemoteEngine;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ParseResult;

/// Incremental progress sink, 0-100
///
/// Lifetime-generic so callers can pass closures that borrow local state.
pub type ProgressFn<'a> = dyn Fn(u8) + Send + Sync + 'a;

/// Trait defining the interface for all parse engines
///
/// An engine takes captured image bytes and returns a canonical
/// `ParseResult`, or an error on any hard failure (network, auth, malformed
/// response). Items in a successful result carry `unit_price > 0` only.
#[async_trait]
pub trait ParseEngine: Send + Sync {
    /// Engine name, for prompts and logging
    fn name(&self) -> &str;

    /// Parse the captured image into bill data
    async fn parse(&self, image: &[u8], progress: &ProgressFn<'_>) -> Result<ParseResult>;
}

/// Concrete engine client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum EngineClient {
    /// Local OCR + heuristic text pipeline
    Local(LocalEngine),
    /// Remote document-AI vendor (HTTP API)
    Remote(RemoteEngine),
    /// Mock engine for testing
    Mock(MockEngine),
}

#[async_trait]
impl ParseEngine for EngineClient {
    fn name(&self) -> &str {
        match self {
            EngineClient::Local(e) => e.name(),
            EngineClient::Remote(e) => e.name(),
            EngineClient::Mock(e) => e.name(),
        }
    }

    async fn parse(&self, image: &[u8], progress: &ProgressFn<'_>) -> Result<ParseResult> {
        match self {
            EngineClient::Local(e) => e.parse(image, progress).await,
            EngineClient::Remote(e) => e.parse(image, progress).await,
            EngineClient::Mock(e) => e.parse(image, progress).await,
        }
    }
}
