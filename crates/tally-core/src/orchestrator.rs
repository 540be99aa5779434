//! Multi-engine parse orchestration
//!
//! Runs the configured engines as a strict linear fallback chain over one
//! captured image. Every engine result passes through the same
//! reconciliation gate; rejection or hard failure surfaces a prompt the UI
//! turns into a "try next engine" decision. Engine errors never escape as
//! errors from the chain itself, they become state transitions.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::bill::BillState;
use crate::config::{EngineKind, ParserConfig, TallyConfig};
use crate::engine::{EngineClient, LocalEngine, ParseEngine, RemoteEngine, TextRecognizer};
use crate::error::{Error, Result};
use crate::models::ReconciliationVerdict;
use crate::parse::Reconciler;

/// Unified progress sink consumed by the UI, 0-100
pub type ProgressCallback = Box<dyn Fn(u8) + Send + Sync>;

/// Decision point surfaced after a rejected or failed attempt
#[derive(Debug, Clone, PartialEq)]
pub struct EnginePrompt {
    pub engine: String,
    pub items_sum: f64,
    pub bill_total: Option<f64>,
    pub next_engine: Option<String>,
}

/// Orchestration state, one capture at a time
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorStatus {
    Idle,
    Running { engine: String },
    Accepted { verdict: ReconciliationVerdict },
    /// Engine produced a parse but the sum disagreed with the total
    Mismatch { prompt: EnginePrompt },
    /// Engine failed outright (network, auth, malformed response)
    Failed { prompt: EnginePrompt },
    Exhausted,
    Cancelled,
}

pub struct Orchestrator {
    engines: Vec<EngineClient>,
    reconciler: Reconciler,
    status: OrchestratorStatus,
    engine_index: usize,
    image: Option<Vec<u8>>,
    fingerprint: Option<String>,
    progress: Option<ProgressCallback>,
}

impl Orchestrator {
    pub fn new(engines: Vec<EngineClient>, config: &ParserConfig) -> Result<Self> {
        if engines.is_empty() {
            return Err(Error::Config("no parse engines configured".to_string()));
        }
        Ok(Self {
            engines,
            reconciler: Reconciler::new(config),
            status: OrchestratorStatus::Idle,
            engine_index: 0,
            image: None,
            fingerprint: None,
            progress: None,
        })
    }

    /// Build the fallback chain from configuration
    ///
    /// The remote client is required only when the configured chain names a
    /// remote engine.
    pub fn from_config(
        config: &TallyConfig,
        recognizer: Arc<dyn TextRecognizer>,
        remote: Option<RemoteEngine>,
    ) -> Result<Self> {
        let mut engines = Vec::new();
        for kind in &config.engines {
            match kind {
                EngineKind::Local => engines.push(EngineClient::Local(LocalEngine::new(
                    recognizer.clone(),
                    config.parser.clone(),
                ))),
                EngineKind::Remote => match &remote {
                    Some(client) => engines.push(EngineClient::Remote(client.clone())),
                    None => {
                        return Err(Error::Config(
                            "remote engine configured but no remote client provided".to_string(),
                        ))
                    }
                },
            }
        }
        Self::new(engines, &config.parser)
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn status(&self) -> &OrchestratorStatus {
        &self.status
    }

    /// Start the chain for a captured image
    ///
    /// The same unchanged image never invokes the engines twice; pass
    /// `force` to re-run anyway. A genuinely new capture resets the chain
    /// and, unless the user has edited the bill by hand, clears prior parse
    /// state.
    pub async fn start(&mut self, bill: &mut BillState, image: &[u8], force: bool) -> Result<()> {
        let fingerprint = hex::encode(Sha256::digest(image));
        if !force && self.fingerprint.as_deref() == Some(fingerprint.as_str()) {
            debug!("image unchanged, skipping re-parse");
            return Ok(());
        }

        self.fingerprint = Some(fingerprint);
        self.image = Some(image.to_vec());
        self.engine_index = 0;
        self.status = OrchestratorStatus::Idle;
        if !bill.has_user_edits() {
            bill.clear_parse_state();
        }
        self.run_current(bill).await
    }

    /// Advance to the next engine after a mismatch or failure
    pub async fn retry_next(&mut self, bill: &mut BillState) -> Result<()> {
        match self.status {
            OrchestratorStatus::Mismatch { .. } | OrchestratorStatus::Failed { .. } => {}
            _ => return Ok(()),
        }
        if self.engine_index + 1 >= self.engines.len() {
            info!("no engines left in the fallback chain");
            self.status = OrchestratorStatus::Exhausted;
            return Ok(());
        }
        self.engine_index += 1;
        self.run_current(bill).await
    }

    /// Abandon the chain, leaving parse state unresolved
    pub fn cancel(&mut self) {
        self.status = OrchestratorStatus::Cancelled;
        self.report(0);
    }

    fn report(&self, progress: u8) {
        if let Some(callback) = &self.progress {
            callback(progress);
        }
    }

    fn next_engine_name(&self) -> Option<String> {
        self.engines
            .get(self.engine_index + 1)
            .map(|e| e.name().to_string())
    }

    async fn run_current(&mut self, bill: &mut BillState) -> Result<()> {
        let engine = self.engines[self.engine_index].clone();
        let name = engine.name().to_string();
        self.status = OrchestratorStatus::Running { engine: name.clone() };
        self.report(0);
        info!(engine = name.as_str(), "running parse engine");

        let image = self
            .image
            .clone()
            .ok_or_else(|| Error::Engine("no captured image".to_string()))?;

        let outcome = {
            let sink = self.progress.as_deref();
            let forward = move |p: u8| {
                if let Some(callback) = sink {
                    callback(p);
                }
            };
            engine.parse(&image, &forward).await
        };

        match outcome {
            Ok(result) => {
                let verdict = self.reconciler.evaluate(&result.items, result.net_total);
                if verdict.accepted {
                    info!(
                        engine = name.as_str(),
                        items_sum = verdict.items_sum,
                        "parse accepted"
                    );
                    if !bill.has_user_edits() {
                        bill.publish(result);
                    }
                    self.report(100);
                    self.status = OrchestratorStatus::Accepted { verdict };
                } else {
                    warn!(
                        engine = name.as_str(),
                        items_sum = verdict.items_sum,
                        bill_total = ?result.net_total,
                        "parse rejected by reconciliation"
                    );
                    self.status = OrchestratorStatus::Mismatch {
                        prompt: EnginePrompt {
                            engine: name,
                            items_sum: verdict.items_sum,
                            bill_total: result.net_total,
                            next_engine: self.next_engine_name(),
                        },
                    };
                }
            }
            Err(err) => {
                warn!(engine = name.as_str(), error = %err, "engine failed");
                self.status = OrchestratorStatus::Failed {
                    prompt: EnginePrompt {
                        engine: name,
                        items_sum: 0.0,
                        bill_total: None,
                        next_engine: self.next_engine_name(),
                    },
                };
            }
        }
        Ok(())
    }
}
