//! Item line parsing
//!
//! Extracts (description, quantity, unit price) triples from classified item
//! lines. Strategies run in a fixed order and the first match wins; a
//! numeric-token deduction fallback handles severely corrupted lines.

use regex::Regex;
use tracing::debug;

use crate::config::ParserConfig;
use crate::models::{round2, BillItem};
use crate::parse::classify::LineClassifier;

/// Numeric tokens read off the end of a line, left to right
#[derive(Debug, Clone, PartialEq)]
pub struct TrailingNumbers(pub Vec<f64>);

/// One quantity/price hypothesis produced by the deduction fallback
#[derive(Debug, Clone, Copy)]
struct Hypothesis {
    quantity: u32,
    unit_price: f64,
    score: i32,
}

/// Ordered-strategy item line parser
#[derive(Debug, Clone)]
pub struct ItemParser {
    structured_re: Regex,
    two_number_re: Regex,
    qty_prefix_re: Regex,
    trailing_number_re: Regex,
    trailing_dash_re: Regex,
    alpha_re: Regex,
    classifier: LineClassifier,
    max_plausible_qty: u32,
    qty_price_tolerance_pct: f64,
    large_trailing_integer: f64,
}

impl ItemParser {
    pub fn new(config: &ParserConfig) -> Self {
        let re = |p: &str| Regex::new(p).expect("valid regex");
        Self {
            // e.g. "1 GINGER ALE 3 130.00 390.00"
            structured_re: re(r"^(\d+)\s+(.+?)\s+(\d+)\s+([\d.,]+)\s+([\d.,]+)$"),
            // e.g. "MASALA DOSA 2 180.00"
            two_number_re: re(r"^(.+?)\s+(\d+)\s+([\d.,]+)$"),
            // e.g. "2 x COFFEE - 45.00"
            qty_prefix_re: re(r"^(\d+)\s*[xX]?\s+(.+?)[\s-]+\$?([\d.,]+)$"),
            trailing_number_re: re(r"(\d+[\d,]*\.?\d*)\s*$"),
            trailing_dash_re: re(r"[-–]+$"),
            alpha_re: re(r"[A-Za-z]"),
            classifier: LineClassifier::new(),
            max_plausible_qty: config.max_plausible_qty,
            qty_price_tolerance_pct: config.qty_price_tolerance_pct,
            large_trailing_integer: config.large_trailing_integer,
        }
    }

    /// Read up to three numeric tokens off the end of the line
    pub fn trailing_numbers(&self, line: &str) -> TrailingNumbers {
        let mut nums = Vec::new();
        let mut rest = line.to_string();
        for _ in 0..3 {
            let Some(m) = self.trailing_number_re.captures(&rest) else {
                break;
            };
            let Some(g) = m.get(1) else { break };
            let raw = g.as_str().replace(',', "");
            if let Ok(n) = raw.parse::<f64>() {
                nums.insert(0, n);
            }
            rest = rest[..g.start()].trim_end().to_string();
        }
        TrailingNumbers(nums)
    }

    /// Parse one normalized line into a bill item, or None when the line is
    /// not an item row
    pub fn parse_item_line(&self, line: &str) -> Option<BillItem> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        // Lone large integer with no decimal point is an invoice number or a
        // pin code, not a price
        let end_nums = self.trailing_numbers(line);
        if end_nums.0.len() == 1 {
            let n = end_nums.0[0];
            if n >= self.large_trailing_integer && !self.last_token_has_decimal(line) {
                debug!(line, value = n, "discarding line with lone large trailing integer");
                return None;
            }
        }

        // Structured: index desc qty rate amount. The amount column derives
        // the unit price since the rate column is often rounded.
        if let Some(m) = self.structured_re.captures(line) {
            let desc = m.get(2).map(|g| g.as_str()).unwrap_or("");
            let qty = m.get(3).and_then(|g| g.as_str().parse::<u32>().ok());
            let amount = m.get(5).and_then(|g| parse_money(g.as_str()));
            if let (Some(qty), Some(amount)) = (qty, amount) {
                if (1..=self.max_plausible_qty).contains(&qty) {
                    if let Some(item) = self.build_item(desc, qty, amount / qty as f64) {
                        return Some(item);
                    }
                }
            }
        }

        // Two-number form: desc qty amount
        if let Some(m) = self.two_number_re.captures(line) {
            let desc = m.get(1).map(|g| g.as_str()).unwrap_or("");
            let qty = m.get(2).and_then(|g| g.as_str().parse::<u32>().ok());
            let amount = m.get(3).and_then(|g| parse_money(g.as_str()));
            if let (Some(qty), Some(amount)) = (qty, amount) {
                if (1..=self.max_plausible_qty).contains(&qty) {
                    if let Some(item) = self.build_item(desc, qty, amount / qty as f64) {
                        return Some(item);
                    }
                }
            }
        }

        // Quantity-prefixed form: qty [x] desc price. Price here is per unit.
        if let Some(m) = self.qty_prefix_re.captures(line) {
            let qty = m.get(1).and_then(|g| g.as_str().parse::<u32>().ok());
            let desc = m.get(2).map(|g| g.as_str()).unwrap_or("");
            let price = m.get(3).and_then(|g| parse_money(g.as_str()));
            if let (Some(qty), Some(price)) = (qty, price) {
                if (1..=self.max_plausible_qty).contains(&qty) {
                    if let Some(item) = self.build_item(desc, qty, price) {
                        return Some(item);
                    }
                }
            }
        }

        self.deduce_from_numbers(line, &end_nums)
    }

    /// Numeric-token deduction fallback for corrupted lines
    fn deduce_from_numbers(&self, line: &str, end_nums: &TrailingNumbers) -> Option<BillItem> {
        let nums = &end_nums.0;
        if nums.is_empty() {
            return None;
        }

        let desc = self.strip_trailing_numbers(line);
        if !self.alpha_re.is_match(&desc)
            || self.classifier.is_address_text(&desc)
            || self.classifier.is_stop_text(&desc)
        {
            return None;
        }

        let mut hypotheses: Vec<Hypothesis> = Vec::new();

        if nums.len() >= 2 {
            let value = nums[nums.len() - 1];
            let price = nums[nums.len() - 2];

            // Equal trailing pair is a duplicated price/value column
            if (value - price).abs() <= 0.01 {
                hypotheses.push(Hypothesis {
                    quantity: 1,
                    unit_price: value,
                    score: 3,
                });
            }

            // Small integer quantity with qty*price close to value
            if price > 0.0 {
                let qty_guess = (value / price).round();
                if qty_guess >= 1.0 && qty_guess <= self.max_plausible_qty as f64 {
                    let deviation = (qty_guess * price - value).abs();
                    if deviation <= value.abs() * self.qty_price_tolerance_pct {
                        let quantity = qty_guess as u32;
                        let mut score = 1;
                        if (1..=10).contains(&quantity) {
                            score += 2;
                        }
                        hypotheses.push(Hypothesis {
                            quantity,
                            unit_price: value / qty_guess,
                            score,
                        });
                    }
                }
            }
        }

        // Three tokens may carry an explicit leading quantity
        if nums.len() == 3 {
            let qty_tok = nums[0];
            let price = nums[1];
            let value = nums[2];
            if qty_tok.fract() == 0.0
                && qty_tok >= 1.0
                && qty_tok <= self.max_plausible_qty as f64
                && (qty_tok * price - value).abs() <= value.abs() * self.qty_price_tolerance_pct
            {
                let quantity = qty_tok as u32;
                let mut score = 2;
                if (1..=10).contains(&quantity) {
                    score += 2;
                }
                hypotheses.push(Hypothesis {
                    quantity,
                    unit_price: value / qty_tok,
                    score,
                });
            }
        }

        // Last resort: single price, quantity one. The large-integer cutoff
        // only applies to tokens without a decimal point; "10000.00" is a
        // price while "560041" is a pin code.
        let last = nums[nums.len() - 1];
        if last > 0.0 && (last < self.large_trailing_integer || self.last_token_has_decimal(line)) {
            hypotheses.push(Hypothesis {
                quantity: 1,
                unit_price: last,
                score: 0,
            });
        }

        hypotheses
            .into_iter()
            .max_by_key(|h| h.score)
            .and_then(|h| self.build_item(&desc, h.quantity, h.unit_price))
    }

    fn last_token_has_decimal(&self, line: &str) -> bool {
        self.trailing_number_re
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|g| g.as_str().contains('.'))
            .unwrap_or(false)
    }

    fn strip_trailing_numbers(&self, line: &str) -> String {
        let mut rest = line.to_string();
        for _ in 0..3 {
            let Some(m) = self.trailing_number_re.find(&rest) else {
                break;
            };
            rest = rest[..m.start()].trim_end().to_string();
        }
        self.trailing_dash_re.replace(&rest, "").trim().to_string()
    }

    fn build_item(&self, desc: &str, quantity: u32, unit_price: f64) -> Option<BillItem> {
        let desc = desc.trim();
        if desc.is_empty()
            || !self.alpha_re.is_match(desc)
            || self.classifier.is_address_text(desc)
            || self.classifier.is_stop_text(desc)
        {
            return None;
        }
        if !unit_price.is_finite() || unit_price <= 0.0 || quantity == 0 {
            return None;
        }
        Some(BillItem::new(desc, quantity, round2(unit_price)))
    }
}

fn parse_money(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}
