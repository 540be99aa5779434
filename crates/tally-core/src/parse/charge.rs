//! Charge and total line parsing
//!
//! Extracts labeled charges (service charge, GST, round-off) and the detected
//! bill total from normalized lines, with magnitude correction against the
//! printed "Total Amount" reference.

use regex::Regex;
use tracing::debug;

use crate::config::ParserConfig;
use crate::models::{round2, BillCharge};

/// Parsed charges plus the detected bill total, if any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChargeSummary {
    pub charges: Vec<BillCharge>,
    pub net_total: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ChargeParser {
    total_amount_re: Regex,
    net_total_re: Regex,
    service_charge_re: Regex,
    gst_re: Regex,
    pct_re: Regex,
    round_off_re: Regex,
    tail_number_re: Regex,
    tail_strip_re: Regex,
    magnitude_limit_factor: f64,
    magnitude_max_divisions: u32,
    pct_tolerance_floor: f64,
    pct_tolerance_pct: f64,
}

impl ChargeParser {
    pub fn new(config: &ParserConfig) -> Self {
        let re = |p: &str| Regex::new(p).expect("valid regex");
        Self {
            total_amount_re: re(r"(?i)^total\s*amount\b"),
            net_total_re: re(r"(?i)^(net\s*amount|bill\s*total|grand\s*total)\b"),
            service_charge_re: re(r"(?i)\bserc\b|service\s*(charge|chg)\b"),
            gst_re: re(r"(?i)\b(state|central)\s*gst\b|\b[csi]?gst\b"),
            pct_re: re(r"(\d+\.?\d*)\s*%"),
            round_off_re: re(r"(?i)round\s*-?\s*off"),
            tail_number_re: re(r"(-?\d+[\d,]*\.?\d*)\s*$"),
            tail_strip_re: re(r"\s*([\d.,-]+)\s*$"),
            magnitude_limit_factor: config.magnitude_limit_factor,
            magnitude_max_divisions: config.magnitude_max_divisions,
            pct_tolerance_floor: config.pct_tolerance_floor,
            pct_tolerance_pct: config.pct_tolerance_pct,
        }
    }

    /// Parse all charge/total lines from the normalized line sequence
    pub fn parse_charges(&self, lines: &[String]) -> ChargeSummary {
        let mut summary = ChargeSummary::default();
        let mut total_amount: Option<f64> = None;
        let mut service_charge_accum = 0.0;

        for line in lines {
            // "Total Amount" is a magnitude reference, never a charge
            if self.total_amount_re.is_match(line) {
                if let Some(n) = self.tail_number(line) {
                    total_amount = Some(n);
                }
                continue;
            }

            if self.service_charge_re.is_match(line) {
                if let Some(n) = self.tail_number(line) {
                    let amount = self.fix_magnitude(n, total_amount);
                    service_charge_accum += amount;
                    summary.charges.push(BillCharge {
                        label: "Service Charge".to_string(),
                        amount,
                    });
                }
                continue;
            }

            if self.gst_re.is_match(line) {
                let mut amount = self
                    .tail_number(line)
                    .map(|n| self.fix_magnitude(n, total_amount))
                    .unwrap_or(0.0);
                let pct = self
                    .pct_re
                    .captures(line)
                    .and_then(|c| c.get(1))
                    .and_then(|g| g.as_str().parse::<f64>().ok());
                if let (Some(pct), Some(total)) = (pct, total_amount) {
                    let base = total + service_charge_accum;
                    let expected = round2(base * pct / 100.0);
                    let tolerance =
                        self.pct_tolerance_floor.max(expected * self.pct_tolerance_pct);
                    if (amount - expected).abs() > tolerance {
                        debug!(line = line.as_str(), amount, expected, "overriding tax amount from percentage");
                        amount = expected;
                    }
                }
                // Keep the human label minus trailing numbers
                let label = self.tail_strip_re.replace(line, "").trim().to_string();
                summary.charges.push(BillCharge { label, amount });
                continue;
            }

            if self.round_off_re.is_match(line) {
                if let Some(n) = self.tail_number(line) {
                    summary.charges.push(BillCharge {
                        label: "Round Off".to_string(),
                        amount: self.fix_magnitude(n, total_amount),
                    });
                }
                continue;
            }

            if self.net_total_re.is_match(line) && summary.net_total.is_none() {
                if let Some(n) = self.tail_number(line) {
                    summary.net_total = Some(n);
                }
            }
        }

        summary
    }

    /// Repeatedly divide by ten while the amount is implausibly large next to
    /// the printed total; bounded so a garbage total cannot loop forever
    pub fn fix_magnitude(&self, amount: f64, total_amount: Option<f64>) -> f64 {
        let Some(total) = total_amount else {
            return round2(amount);
        };
        let limit = total.abs() * self.magnitude_limit_factor;
        let mut v = amount;
        let mut guard = 0;
        while v.abs() > limit && guard < self.magnitude_max_divisions {
            v /= 10.0;
            guard += 1;
        }
        round2(v)
    }

    fn tail_number(&self, line: &str) -> Option<f64> {
        let g = self.tail_number_re.captures(line)?.get(1)?;
        g.as_str().replace(',', "").parse::<f64>().ok()
    }
}
