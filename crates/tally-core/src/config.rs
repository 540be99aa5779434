//! Parser heuristics and engine-chain configuration
//!
//! Every empirically tuned threshold in the text pipeline lives here rather
//! than as a hard-coded constant, so it can be re-tuned against a receipt
//! corpus without touching parser code.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/tally/config/parser.toml)
//! 2. Fall back to embedded defaults (compiled into binary)

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/parser.toml");

/// One entry in the engine fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// On-device OCR text plus the heuristic pipeline
    Local,
    /// Remote document-AI service
    Remote,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            _ => Err(format!("Unknown engine kind: {}", s)),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tunable thresholds for the text pipeline and reconciliation gate
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Absolute floor of the reconciliation tolerance (currency units)
    pub tolerance_floor: f64,
    /// Relative reconciliation tolerance (fraction of the net total)
    pub tolerance_pct: f64,
    /// Charges above `limit_factor * |Total Amount|` are magnitude-corrupted
    pub magnitude_limit_factor: f64,
    /// Maximum repeated divisions by 10 during magnitude correction
    pub magnitude_max_divisions: u32,
    /// Largest quantity the numeric-deduction fallback will believe
    pub max_plausible_qty: u32,
    /// Relative tolerance for qty * price ~= value in the deduction fallback
    pub qty_price_tolerance_pct: f64,
    /// Lone trailing integers at or above this (no decimal point) discard the line
    pub large_trailing_integer: f64,
    /// Description-only lines shorter than this merge with a trailing numbers line
    pub wrap_merge_max_len: usize,
    /// Absolute floor for accepting an OCR percentage-charge amount as-is
    pub pct_tolerance_floor: f64,
    /// Relative tolerance for accepting an OCR percentage-charge amount as-is
    pub pct_tolerance_pct: f64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            tolerance_floor: 2.0,
            tolerance_pct: 0.05,
            magnitude_limit_factor: 1.2,
            magnitude_max_divisions: 5,
            max_plausible_qty: 20,
            qty_price_tolerance_pct: 0.02,
            large_trailing_integer: 10_000.0,
            wrap_merge_max_len: 40,
            pct_tolerance_floor: 0.25,
            pct_tolerance_pct: 0.15,
        }
    }
}

/// Full Tally configuration: engine chain plus parser thresholds
#[derive(Debug, Clone)]
pub struct TallyConfig {
    /// Strict linear fallback chain; never reordered at runtime
    pub engines: Vec<EngineKind>,
    pub parser: ParserConfig,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            engines: vec![EngineKind::Local, EngineKind::Remote],
            parser: ParserConfig::default(),
        }
    }
}

impl TallyConfig {
    /// Load with the standard two-layer resolution (override file, then embedded)
    pub fn load() -> Result<Self> {
        load_config(None)
    }

    /// Load from an explicit path, falling back to embedded defaults if absent
    pub fn load_from(path: &Path) -> Result<Self> {
        load_config(Some(path))
    }
}

// Raw deserialization shapes; every field optional so partial override
// files only change what they mention.

#[derive(Debug, Deserialize)]
struct RawConfig {
    engines: Option<Vec<EngineKind>>,
    reconciliation: Option<RawReconciliation>,
    magnitude: Option<RawMagnitude>,
    items: Option<RawItems>,
    charges: Option<RawCharges>,
}

#[derive(Debug, Deserialize)]
struct RawReconciliation {
    tolerance_floor: Option<f64>,
    tolerance_pct: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawMagnitude {
    limit_factor: Option<f64>,
    max_divisions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawItems {
    max_plausible_qty: Option<u32>,
    qty_price_tolerance_pct: Option<f64>,
    large_trailing_integer: Option<f64>,
    wrap_merge_max_len: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawCharges {
    pct_tolerance_floor: Option<f64>,
    pct_tolerance_pct: Option<f64>,
}

/// Default override path: `<data_dir>/tally/config/parser.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("tally").join("config").join("parser.toml"))
}

fn load_config(explicit_path: Option<&Path>) -> Result<TallyConfig> {
    let override_path = match explicit_path {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };

    let content = match override_path {
        Some(ref path) if path.exists() => {
            debug!("Loading parser config override from {}", path.display());
            fs::read_to_string(path)?
        }
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

fn parse_config(content: &str) -> Result<TallyConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid parser config: {}", e)))?;

    let defaults = TallyConfig::default();
    let dp = defaults.parser;

    let recon = raw.reconciliation.unwrap_or(RawReconciliation {
        tolerance_floor: None,
        tolerance_pct: None,
    });
    let mag = raw.magnitude.unwrap_or(RawMagnitude {
        limit_factor: None,
        max_divisions: None,
    });
    let items = raw.items.unwrap_or(RawItems {
        max_plausible_qty: None,
        qty_price_tolerance_pct: None,
        large_trailing_integer: None,
        wrap_merge_max_len: None,
    });
    let charges = raw.charges.unwrap_or(RawCharges {
        pct_tolerance_floor: None,
        pct_tolerance_pct: None,
    });

    let engines = raw.engines.unwrap_or(defaults.engines);
    if engines.is_empty() {
        return Err(Error::Config("Engine chain must not be empty".into()));
    }

    Ok(TallyConfig {
        engines,
        parser: ParserConfig {
            tolerance_floor: recon.tolerance_floor.unwrap_or(dp.tolerance_floor),
            tolerance_pct: recon.tolerance_pct.unwrap_or(dp.tolerance_pct),
            magnitude_limit_factor: mag.limit_factor.unwrap_or(dp.magnitude_limit_factor),
            magnitude_max_divisions: mag.max_divisions.unwrap_or(dp.magnitude_max_divisions),
            max_plausible_qty: items.max_plausible_qty.unwrap_or(dp.max_plausible_qty),
            qty_price_tolerance_pct: items
                .qty_price_tolerance_pct
                .unwrap_or(dp.qty_price_tolerance_pct),
            large_trailing_integer: items
                .large_trailing_integer
                .unwrap_or(dp.large_trailing_integer),
            wrap_merge_max_len: items.wrap_merge_max_len.unwrap_or(dp.wrap_merge_max_len),
            pct_tolerance_floor: charges.pct_tolerance_floor.unwrap_or(dp.pct_tolerance_floor),
            pct_tolerance_pct: charges.pct_tolerance_pct.unwrap_or(dp.pct_tolerance_pct),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.engines, vec![EngineKind::Local, EngineKind::Remote]);
        assert_eq!(config.parser.tolerance_floor, 2.0);
        assert_eq!(config.parser.tolerance_pct, 0.05);
        assert_eq!(config.parser.magnitude_max_divisions, 5);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = parse_config("[reconciliation]\ntolerance_pct = 0.1\n").unwrap();
        assert_eq!(config.parser.tolerance_pct, 0.1);
        assert_eq!(config.parser.tolerance_floor, 2.0);
        assert_eq!(config.parser.max_plausible_qty, 20);
    }

    #[test]
    fn test_empty_engine_chain_rejected() {
        let result = parse_config("engines = []\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_engine_kind_from_str() {
        assert_eq!("local".parse::<EngineKind>().unwrap(), EngineKind::Local);
        assert_eq!("Remote".parse::<EngineKind>().unwrap(), EngineKind::Remote);
        assert!("tesseract".parse::<EngineKind>().is_err());
    }

    #[test]
    fn test_load_from_missing_path_uses_embedded() {
        let config = TallyConfig::load_from(Path::new("/nonexistent/parser.toml")).unwrap();
        assert_eq!(config.parser.wrap_merge_max_len, 40);
    }
}
