//! Tally Core Library
//!
//! Shared functionality for the Tally bill-splitting tool:
//! - Receipt text parsing pipeline (normalizer, classifier, item and charge
//!   parsers, reconciliation)
//! - Pluggable parse engines (local OCR pipeline, remote document-AI
//!   vendors) behind one adapter contract
//! - Multi-engine orchestration with a strict linear fallback chain
//! - Bill state with the color-allocation contract used by the UI layer
//! - Key-per-value persistence for rehydrating a bill across sessions

pub mod bill;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod parse;
pub mod store;

/// Test utilities including the mock vendor server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use bill::BillState;
pub use config::{EngineKind, ParserConfig, TallyConfig};
pub use engine::{
    EngineClient, LocalEngine, MockEngine, ParseEngine, ProgressFn, RemoteEngine, TextRecognizer,
};
pub use error::{Error, Result};
pub use models::{
    round2, BillCharge, BillItem, ParseResult, ReconciliationVerdict, DEFAULT_COLORS,
};
pub use orchestrator::{EnginePrompt, Orchestrator, OrchestratorStatus, ProgressCallback};
pub use parse::{
    parse_items_and_charges, parse_items_and_charges_with, ChargeParser, ChargeSummary,
    CorrectionRule, ItemParser, LineClass, LineClassifier, Normalizer, Reconciler,
};
pub use store::BillStore;
