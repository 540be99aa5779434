//! Receipt text parsing pipeline
//!
//! normalize -> classify -> item/charge extraction -> reconciliation.
//! Everything here is pure string/number work with no I/O, so the whole
//! pipeline is unit-testable without an OCR backend.

pub mod charge;
pub mod classify;
pub mod item;
pub mod normalize;
pub mod reconcile;

use tracing::debug;

use crate::config::ParserConfig;
use crate::models::ParseResult;

pub use charge::{ChargeParser, ChargeSummary};
pub use classify::{LineClass, LineClassifier};
pub use item::ItemParser;
pub use normalize::{CorrectionRule, Normalizer};
pub use reconcile::Reconciler;

/// Run the full text pipeline over raw OCR output
pub fn parse_items_and_charges(text: &str, config: &ParserConfig) -> ParseResult {
    parse_items_and_charges_with(&Normalizer::new(), text, config)
}

/// Run the full text pipeline with a custom corrections table
///
/// Callers with venue- or scanner-specific OCR quirks build a `Normalizer`
/// via `Normalizer::with_rules` and pass it here.
pub fn parse_items_and_charges_with(
    normalizer: &Normalizer,
    text: &str,
    config: &ParserConfig,
) -> ParseResult {
    let classifier = LineClassifier::new();
    let item_parser = ItemParser::new(config);
    let charge_parser = ChargeParser::new(config);

    let lines: Vec<String> = text
        .split('\n')
        .map(|l| normalizer.normalize(l))
        .filter(|l| !l.is_empty())
        .collect();

    let (start, end) = classifier.find_item_section(&lines);
    let section = classifier.merge_wrapped_lines(&lines[start..end], config.wrap_merge_max_len);

    let mut items = Vec::new();
    for line in &section {
        let class = classifier.classify(line);
        if class.is_stop || class.is_address {
            continue;
        }
        if let Some(item) = item_parser.parse_item_line(line) {
            items.push(item);
        }
    }

    // Charges and totals live outside the item section, so they scan the
    // whole normalized text
    let summary = charge_parser.parse_charges(&lines);

    debug!(
        items = items.len(),
        charges = summary.charges.len(),
        net_total = ?summary.net_total,
        "parsed receipt text"
    );

    ParseResult {
        items,
        charges: summary.charges,
        net_total: summary.net_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECEIPT: &str = "\
Cafe Thindi Pvt Ltd
12th Main Road, Jayanagar
Bengaluru 560041
Bill No: 1043  Date: 12/05/2024
SNo Description Qty Rate Amount
1 MASALA DOSA 2 90.00 180.00
2 FILTER COFFEE 3 40.00 120.00
3 GINGER ALE 1 130.00 130.00
----------------
Total Amount 430.00
Service Charge 21.50
CGST 2.5% 11.29
SGST 2.5% 11.29
Round Off 0.42
Net Amount 474.50
";

    #[test]
    fn test_full_receipt_pipeline() {
        let result = parse_items_and_charges(RECEIPT, &ParserConfig::default());

        assert_eq!(result.items.len(), 3);
        assert_eq!(result.items[0].description, "MASALA DOSA");
        assert_eq!(result.items[0].quantity, 2);
        assert!((result.items[0].unit_price - 90.0).abs() < 0.005);
        assert_eq!(result.items[2].description, "GINGER ALE");

        assert_eq!(result.charges.len(), 4);
        assert_eq!(result.charges[0].label, "Service Charge");
        assert_eq!(result.charges[3].label, "Round Off");
        assert_eq!(result.net_total, Some(474.50));

        assert!((result.items_sum() - 430.0).abs() < 0.005);
    }

    #[test]
    fn test_address_and_stop_lines_produce_no_items() {
        let text = "Cafe Thindi\n12th Main Road 560041\nBill No: 1043\n";
        let result = parse_items_and_charges(text, &ParserConfig::default());
        assert!(result.items.is_empty());
        assert_eq!(result.net_total, None);
    }

    #[test]
    fn test_custom_corrections_table() {
        // A scanner that prints "Rs." before every amount
        let rules = vec![
            CorrectionRule::new(r"Rs\.?\s*", "").unwrap(),
            CorrectionRule::new(r" {2,}", " ").unwrap(),
        ];
        let normalizer = Normalizer::with_rules(rules);
        let text = "MASALA DOSA 2 Rs. 180.00\nNet Amount Rs. 180.00\n";
        let result =
            parse_items_and_charges_with(&normalizer, text, &ParserConfig::default());
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].quantity, 2);
        assert_eq!(result.net_total, Some(180.0));
    }

    #[test]
    fn test_empty_text() {
        let result = parse_items_and_charges("", &ParserConfig::default());
        assert!(result.items.is_empty());
        assert!(result.charges.is_empty());
        assert_eq!(result.net_total, None);
    }
}
