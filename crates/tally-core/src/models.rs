//! Domain models for Tally
//!
//! Serialized field names stay camelCase so persisted state remains
//! interchangeable with bills saved by earlier releases.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default person colors, in palette order.
pub const DEFAULT_COLORS: [&str; 25] = [
    "#FF0000", "#0000FF", "#00FF00", "#FFA500", "#800080", "#FFFF00", "#FF1493", "#00FFFF",
    "#FF69B4", "#32CD32", "#8A2BE2", "#FF4500", "#20B2AA", "#DC143C", "#4169E1", "#228B22",
    "#FF6347", "#9932CC", "#DAA520", "#008B8B", "#B22222", "#5F9EA0", "#D2691E", "#6495ED",
    "#CD5C5C",
];

/// Round a monetary amount to 2 decimals.
pub fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// One line item on the bill
///
/// `quantity` is the count not yet allocated to any color; the parsed
/// quantity is `quantity + sum(color_allocations)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillItem {
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
    #[serde(default)]
    pub color_allocations: BTreeMap<String, u32>,
}

impl BillItem {
    pub fn new(description: impl Into<String>, quantity: u32, unit_price: f64) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price: round2(unit_price),
            color_allocations: BTreeMap::new(),
        }
    }

    /// Units already assigned to a color
    pub fn allocated_quantity(&self) -> u32 {
        self.color_allocations.values().sum()
    }

    /// Quantity as originally parsed (allocated + remaining)
    pub fn original_quantity(&self) -> u32 {
        self.quantity + self.allocated_quantity()
    }

    /// Value of the full line at the original quantity
    pub fn line_total(&self) -> f64 {
        round2(self.unit_price * self.original_quantity() as f64)
    }
}

/// A non-item monetary line (service charge, tax, round-off)
///
/// Amount may be negative (discount / round-off down).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillCharge {
    pub label: String,
    pub amount: f64,
}

impl BillCharge {
    pub fn new(label: impl Into<String>, amount: f64) -> Self {
        Self {
            label: label.into(),
            amount: round2(amount),
        }
    }

    /// Service charges are the only charges allocatable to colors;
    /// tax/VAT/GST lines are informational.
    pub fn is_service_charge(&self) -> bool {
        service_charge_pattern().is_match(&self.label)
    }
}

/// Shared service-charge label pattern
///
/// Used by both the charge parser and the allocation layer so the
/// allocatable/informational split cannot drift between them.
pub fn service_charge_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)service\s*(charge|chg)|\bserc\b").expect("valid regex")
    })
}

/// Output of one parsing attempt, canonical across all engines
///
/// Transient: seeds the long-lived bill state only on acceptance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub items: Vec<BillItem>,
    pub charges: Vec<BillCharge>,
    pub net_total: Option<f64>,
}

impl ParseResult {
    /// Sum of unit price x original quantity over all items
    pub fn items_sum(&self) -> f64 {
        round2(self.items.iter().map(BillItem::line_total).sum())
    }
}

/// Verdict of reconciling a parse against the detected bill total
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconciliationVerdict {
    pub items_sum: f64,
    pub accepted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(19.899999), 19.9);
        assert_eq!(round2(0.005), 0.01);
        assert_eq!(round2(-1.005), -1.0); // banker's edge, fine for display
    }

    #[test]
    fn test_original_quantity() {
        let mut item = BillItem::new("Coke", 3, 19.9);
        assert_eq!(item.original_quantity(), 3);
        item.quantity = 1;
        item.color_allocations.insert("#FF0000".to_string(), 2);
        assert_eq!(item.original_quantity(), 3);
        assert_eq!(item.line_total(), 59.7);
    }

    #[test]
    fn test_service_charge_pattern() {
        assert!(BillCharge::new("Service Charge", 50.0).is_service_charge());
        assert!(BillCharge::new("SERC 10%", 50.0).is_service_charge());
        assert!(BillCharge::new("Service Chg", 50.0).is_service_charge());
        assert!(!BillCharge::new("State GST 2.5%", 25.0).is_service_charge());
        assert!(!BillCharge::new("Round Off", -0.4).is_service_charge());
    }

    #[test]
    fn test_items_sum() {
        let result = ParseResult {
            items: vec![BillItem::new("Ale", 3, 130.0), BillItem::new("Soup", 1, 90.5)],
            charges: vec![],
            net_total: Some(480.5),
        };
        assert_eq!(result.items_sum(), 480.5);
    }

    #[test]
    fn test_camel_case_serialization() {
        let item = BillItem::new("Water", 1, 22.9);
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"unitPrice\""));
        assert!(json.contains("\"colorAllocations\""));
    }
}
