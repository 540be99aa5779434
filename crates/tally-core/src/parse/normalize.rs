//! OCR text normalization
//!
//! Cleans raw OCR output of encoding artifacts, spacing noise, and known
//! misreads before any pattern matching runs. The corrections table is an
//! immutable ordered list of (pattern, replacement) rules fixed at
//! construction; `normalize` is a pure, idempotent string transform.

use regex::Regex;

/// One correction rule: pattern plus replacement (may use capture groups)
#[derive(Debug, Clone)]
pub struct CorrectionRule {
    pattern: Regex,
    replacement: String,
}

impl CorrectionRule {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.to_string(),
        })
    }
}

/// Line normalizer with a fixed ordered corrections table
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: Vec<CorrectionRule>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Build a normalizer with the default OCR corrections table
    pub fn new() -> Self {
        let rule = |p: &str, r: &str| CorrectionRule::new(p, r).expect("valid regex");
        Self {
            rules: vec![
                // Tabs become plain spaces before anything else
                rule(r"\t+", " "),
                // Currency glyphs carry no information for parsing
                rule(r"[₹₨$€£]", ""),
                // Letter-for-digit misreads inside digit runs (1O0 -> 100)
                rule(r"(\d)[Oo](\d)", "${1}0${2}"),
                rule(r"(\d)[lI](\d)", "${1}1${2}"),
                // Colon standing in for a decimal point (130:00 -> 130.00)
                rule(r"(\d):(\d{2})(?:\b)", "${1}.${2}"),
                // Stray repeated quote/tilde noise from smudged scans
                rule(r"[~`'´’•·¸]+", ""),
                // Collapse whitespace runs last, once all rules have fired
                rule(r" {2,}", " "),
            ],
        }
    }

    /// Build a normalizer with a custom rules table (applied in order)
    pub fn with_rules(rules: Vec<CorrectionRule>) -> Self {
        Self { rules }
    }

    /// Normalize one raw OCR line
    ///
    /// A correction can expose a fresh match (overlapping misreads like
    /// `1O0O1`, or noise stripped out of a digit run), so the whole table
    /// runs repeatedly until the line stops changing. The pass cap guards
    /// against a non-contracting custom rule.
    pub fn normalize(&self, raw_line: &str) -> String {
        const MAX_PASSES: usize = 8;
        let mut line = raw_line.trim().to_string();
        for _ in 0..MAX_PASSES {
            let mut next = line.clone();
            for rule in &self.rules {
                next = rule.pattern.replace_all(&next, rule.replacement.as_str()).into_owned();
            }
            let next = next.trim().to_string();
            if next == line {
                break;
            }
            line = next;
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace() {
        let n = Normalizer::new();
        assert_eq!(n.normalize("GINGER   ALE\t\t130.00"), "GINGER ALE 130.00");
    }

    #[test]
    fn test_strips_currency_glyphs() {
        let n = Normalizer::new();
        assert_eq!(n.normalize("Total ₹450.00"), "Total 450.00");
        assert_eq!(n.normalize("Tip $5.00"), "Tip 5.00");
    }

    #[test]
    fn test_fixes_letter_digit_confusion() {
        let n = Normalizer::new();
        assert_eq!(n.normalize("COKE 1O0.00"), "COKE 100.00");
        assert_eq!(n.normalize("SODA 1l0.50"), "SODA 110.50");
    }

    #[test]
    fn test_colon_as_decimal_point() {
        let n = Normalizer::new();
        assert_eq!(n.normalize("GINGER ALE 130:00"), "GINGER ALE 130.00");
    }

    #[test]
    fn test_overlapping_misreads_converge() {
        let n = Normalizer::new();
        assert_eq!(n.normalize("1O0O1"), "10001");
        assert_eq!(n.normalize("COKE 1:23:45"), "COKE 1.23.45");
    }

    #[test]
    fn test_idempotent() {
        let n = Normalizer::new();
        let inputs = [
            "  GINGER   ALE  3  130:00   39O.00 ",
            "₹₹ Total Amount:  450.00",
            "plain line",
            "",
            "~~~Noise'' 12.00",
            "1O0O1",
            "COKE 1:23:45",
            "1'O1'",
        ];
        for s in inputs {
            let once = n.normalize(s);
            assert_eq!(n.normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_empty_line() {
        let n = Normalizer::new();
        assert_eq!(n.normalize("   \t  "), "");
    }
}
