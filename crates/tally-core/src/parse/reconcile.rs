//! Reconciliation of parsed items against the detected bill total
//!
//! The sole acceptance gate for every engine's output, applied uniformly
//! regardless of which engine produced the parse.

use tracing::debug;

use crate::config::ParserConfig;
use crate::models::{round2, BillItem, ReconciliationVerdict};

#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    tolerance_floor: f64,
    tolerance_pct: f64,
}

impl Reconciler {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            tolerance_floor: config.tolerance_floor,
            tolerance_pct: config.tolerance_pct,
        }
    }

    /// Absolute tolerance for a given detected total
    pub fn tolerance(&self, net_total: f64) -> f64 {
        self.tolerance_floor.max(net_total * self.tolerance_pct)
    }

    /// Compare the item sum against the detected total
    ///
    /// An absent total cannot confirm anything, so the verdict is rejection
    /// with the computed sum still reported.
    pub fn evaluate(&self, items: &[BillItem], net_total: Option<f64>) -> ReconciliationVerdict {
        let items_sum = round2(
            items
                .iter()
                .map(|i| i.unit_price * f64::from(i.original_quantity()))
                .sum(),
        );
        // One cent of slack on top of the tolerance absorbs rounding in the
        // accumulated sum
        let accepted = match net_total {
            Some(total) => (items_sum - total).abs() <= self.tolerance(total) + 0.01,
            None => false,
        };
        debug!(items_sum, ?net_total, accepted, "reconciliation verdict");
        ReconciliationVerdict { items_sum, accepted }
    }
}
