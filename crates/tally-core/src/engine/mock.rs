//! Mock parse engine for testing
//!
//! Returns scripted results or failures in order and counts invocations, so
//! tests can assert on fallback-chain behavior without any OCR or network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::ParseResult;

use super::{ParseEngine, ProgressFn};

#[derive(Clone)]
enum Scripted {
    Ok(ParseResult),
    Fail(String),
}

#[derive(Clone)]
pub struct MockEngine {
    name: String,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a successful parse result
    pub fn with_result(self, result: ParseResult) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Scripted::Ok(result));
        }
        self
    }

    /// Queue a hard failure
    pub fn with_failure(self, message: &str) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Scripted::Fail(message.to_string()));
        }
        self
    }

    /// Number of times `parse` has been invoked
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ParseEngine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn parse(&self, _image: &[u8], progress: &ProgressFn<'_>) -> Result<ParseResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        progress(100);
        let next = self
            .script
            .lock()
            .map_err(|_| Error::Engine("mock script poisoned".to_string()))?
            .pop_front();
        match next {
            Some(Scripted::Ok(result)) => Ok(result),
            Some(Scripted::Fail(message)) => Err(Error::Engine(message)),
            None => Err(Error::Engine(format!("{}: no scripted response", self.name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BillItem;

    fn result_with_item() -> ParseResult {
        ParseResult {
            items: vec![BillItem::new("Coke", 1, 20.0)],
            charges: Vec::new(),
            net_total: Some(20.0),
        }
    }

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let engine = MockEngine::new("mock")
            .with_result(result_with_item())
            .with_failure("boom");
        assert!(engine.parse(b"img", &|_| {}).await.is_ok());
        assert!(engine.parse(b"img", &|_| {}).await.is_err());
        assert_eq!(engine.calls(), 2);
    }
}
