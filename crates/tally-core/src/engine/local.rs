//! Local OCR + heuristic parse engine
//!
//! Runs a pluggable text recognizer over the image, then the pure text
//! pipeline. Recognizer progress is forwarded unchanged since the text
//! pipeline itself is effectively instant.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::ParserConfig;
use crate::error::Result;
use crate::models::ParseResult;
use crate::parse::parse_items_and_charges;

use super::{ParseEngine, ProgressFn};

/// On-device text recognition backend
///
/// Implementations wrap whatever OCR runtime the host application ships.
/// `recognize` reports incremental progress in 0-100.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &[u8], progress: &ProgressFn<'_>) -> Result<String>;
}

#[derive(Clone)]
pub struct LocalEngine {
    recognizer: Arc<dyn TextRecognizer>,
    config: ParserConfig,
}

impl LocalEngine {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, config: ParserConfig) -> Self {
        Self { recognizer, config }
    }
}

#[async_trait]
impl ParseEngine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    async fn parse(&self, image: &[u8], progress: &ProgressFn<'_>) -> Result<ParseResult> {
        let text = self.recognizer.recognize(image, progress).await?;
        debug!(chars = text.len(), "recognized receipt text");
        Ok(parse_items_and_charges(&text, &self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRecognizer(&'static str);

    #[async_trait]
    impl TextRecognizer for FixedRecognizer {
        async fn recognize(&self, _image: &[u8], progress: &ProgressFn<'_>) -> Result<String> {
            progress(50);
            progress(100);
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_local_engine_runs_text_pipeline() {
        let text = "MASALA DOSA 2 180.00\nNet Amount 180.00\n";
        let engine = LocalEngine::new(Arc::new(FixedRecognizer(text)), ParserConfig::default());
        let result = engine.parse(b"img", &|_| {}).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.net_total, Some(180.0));
    }

    #[tokio::test]
    async fn test_local_engine_forwards_recognizer_progress() {
        use std::sync::Mutex;
        let seen: Mutex<Vec<u8>> = Mutex::new(Vec::new());
        let engine = LocalEngine::new(
            Arc::new(FixedRecognizer("LIME SODA 85.00")),
            ParserConfig::default(),
        );
        engine
            .parse(b"img", &|p| seen.lock().unwrap().push(p))
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![50, 100]);
    }
}
