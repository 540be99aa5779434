//! Line classification and item-section detection
//!
//! Labels normalized lines (stopword, address, column header, item-row shape)
//! and finds the boundaries of the item section inside the receipt text.

use regex::Regex;

/// Labels that exclude a line from item parsing: dates, table numbers,
/// tax labels, column headers, totals.
const STOPWORDS: [&str; 35] = [
    "bill no",
    "date",
    "time",
    "table",
    "covers",
    "gst",
    "gstin",
    "cgst",
    "sgst",
    "igst",
    "tax",
    "round off",
    "round-off",
    "roundoff",
    "total amount",
    "total",
    "net amount",
    "grand total",
    "balance",
    "kot",
    "user id",
    "server",
    "steward",
    "service charge",
    "servc",
    "serc",
    "subtotal",
    "plan",
    "pvt ltd",
    "rate",
    "qty",
    "amount",
    "snc",
    "sno",
    "description",
];

/// Tokens that mark a line as part of the restaurant's address block.
const ADDRESS_WORDS: [&str; 12] = [
    "layout",
    "road",
    " rd",
    "main",
    "cross",
    "bengaluru",
    "bangalore",
    "banashankari",
    "siddanna",
    "india",
    "pin",
    "gstin",
];

/// Classification flags for one normalized line (non-exclusive)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineClass {
    /// Matches the stopword lexicon; excluded from item parsing
    pub is_stop: bool,
    /// Column-header signature; items begin on the next line
    pub is_header: bool,
    /// Numeric-leading item-row shape; fallback start boundary
    pub is_item_start: bool,
    /// Address-token match; excluded unless inside a confirmed item section
    pub is_address: bool,
}

/// Lexical/positional line classifier
#[derive(Debug, Clone)]
pub struct LineClassifier {
    header_sn_re: Regex,
    header_cols_re: Regex,
    item_start_full_re: Regex,
    item_start_short_re: Regex,
    total_re: Regex,
    divider_re: Regex,
    trailing_number_re: Regex,
    digit_re: Regex,
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LineClassifier {
    pub fn new() -> Self {
        let re = |p: &str| Regex::new(p).expect("valid regex");
        Self {
            header_sn_re: re(r"(?i)\b(sn|sno|snc)\b.*(desc|description)"),
            header_cols_re: re(r"(?i)description.*(qty|rate|amount)"),
            // e.g. "1 GINGER ALE 3 130.00 390.00"
            item_start_full_re: re(r"^\d+\s+\D+\s+\d+\s+[\d.,]+\s+[\d.,]+$"),
            // e.g. "1 GINGER ALE 390.00"
            item_start_short_re: re(r"^\d+\s+\D+\s+[\d.,]+$"),
            total_re: re(r"(?i)^(bill\s*total|grand\s*total|net\s*amount)\b"),
            divider_re: re(r"^[-=]{3,}$"),
            trailing_number_re: re(r"\d[\d,]*\.?\d*\s*$"),
            digit_re: re(r"\d"),
        }
    }

    /// Classify one normalized line
    pub fn classify(&self, line: &str) -> LineClass {
        let lower = line.to_lowercase();
        LineClass {
            is_stop: STOPWORDS.iter().any(|w| lower.contains(w)),
            is_header: self.header_sn_re.is_match(line) || self.header_cols_re.is_match(line),
            is_item_start: self.item_start_full_re.is_match(line)
                || self.item_start_short_re.is_match(line),
            is_address: ADDRESS_WORDS.iter().any(|w| lower.contains(w)),
        }
    }

    /// True when the description text hits the address lexicon
    pub fn is_address_text(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        ADDRESS_WORDS.iter().any(|w| lower.contains(w))
    }

    /// True when the description text hits the stopword lexicon
    pub fn is_stop_text(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        STOPWORDS.iter().any(|w| lower.contains(w))
    }

    /// Find the item section as a half-open index range over `lines`
    ///
    /// Start: the line after an explicit column header, or the first line
    /// shaped like an item row. End: a total line or a divider row of
    /// repeated dashes/equals; otherwise end of text.
    pub fn find_item_section(&self, lines: &[String]) -> (usize, usize) {
        let mut start = 0;
        for (i, line) in lines.iter().enumerate() {
            let class = self.classify(line);
            if class.is_header {
                start = i + 1;
                break;
            }
            if class.is_item_start {
                start = i;
                break;
            }
        }

        let mut end = lines.len();
        for (i, line) in lines.iter().enumerate().skip(start) {
            if self.total_re.is_match(line) || self.divider_re.is_match(line) {
                end = i;
                break;
            }
        }

        (start, end.max(start))
    }

    /// Merge wrapped description lines
    ///
    /// A line with no digits immediately before a line with trailing numeric
    /// tokens is one logical item whose description wrapped; merge the two.
    /// `max_len` bounds the description part so unrelated lines never merge.
    pub fn merge_wrapped_lines(&self, lines: &[String], max_len: usize) -> Vec<String> {
        let mut merged = Vec::with_capacity(lines.len());
        let mut i = 0;
        while i < lines.len() {
            let cur = &lines[i];
            if let Some(next) = lines.get(i + 1) {
                let wrapped = !self.digit_re.is_match(cur)
                    && self.trailing_number_re.is_match(next)
                    && cur.len() < max_len;
                if wrapped {
                    merged.push(format!("{} {}", cur, next));
                    i += 2;
                    continue;
                }
            }
            merged.push(cur.clone());
            i += 1;
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_stop_lines() {
        let c = LineClassifier::new();
        assert!(c.classify("Bill No: 1043").is_stop);
        assert!(c.classify("CGST 2.5% 11.25").is_stop);
        assert!(c.classify("Table 12 Covers 4").is_stop);
        assert!(!c.classify("GINGER ALE 3 130.00").is_stop);
    }

    #[test]
    fn test_address_lines() {
        let c = LineClassifier::new();
        assert!(c.classify("21st Main, 2nd Cross, Banashankari").is_address);
        assert!(c.classify("100 Ft Road, Bengaluru 560085").is_address);
        assert!(!c.classify("PANEER TIKKA 2 180.00").is_address);
    }

    #[test]
    fn test_header_signatures() {
        let c = LineClassifier::new();
        assert!(c.classify("SNo Description Qty Rate Amount").is_header);
        assert!(c.classify("Description Qty Amount").is_header);
        assert!(!c.classify("GINGER ALE 130.00").is_header);
    }

    #[test]
    fn test_item_start_shapes() {
        let c = LineClassifier::new();
        assert!(c.classify("1 GINGER ALE 3 130.00 390.00").is_item_start);
        assert!(c.classify("1 GINGER ALE 390.00").is_item_start);
        assert!(!c.classify("Thank you, visit again").is_item_start);
    }

    #[test]
    fn test_section_starts_after_header() {
        let c = LineClassifier::new();
        let text = lines(&[
            "Cafe Madras",
            "SNo Description Qty Rate Amount",
            "1 IDLI 2 40.00 80.00",
            "2 DOSA 1 90.00 90.00",
        ]);
        assert_eq!(c.find_item_section(&text), (2, 4));
    }

    #[test]
    fn test_section_starts_at_item_shape_without_header() {
        let c = LineClassifier::new();
        let text = lines(&["Cafe Madras", "1 IDLI 2 40.00 80.00", "2 DOSA 1 90.00 90.00"]);
        assert_eq!(c.find_item_section(&text), (1, 3));
    }

    #[test]
    fn test_section_ends_at_total_or_divider() {
        let c = LineClassifier::new();
        let text = lines(&[
            "1 IDLI 2 40.00 80.00",
            "----------------",
            "Grand Total 80.00",
        ]);
        assert_eq!(c.find_item_section(&text), (0, 1));

        let text = lines(&["1 IDLI 2 40.00 80.00", "Net Amount 80.00"]);
        assert_eq!(c.find_item_section(&text), (0, 1));
    }

    #[test]
    fn test_merge_wrapped_descriptions() {
        let c = LineClassifier::new();
        let text = lines(&["PANEER BUTTER", "MASALA 1 220.00", "DOSA 1 90.00"]);
        let merged = c.merge_wrapped_lines(&text, 40);
        assert_eq!(merged, vec!["PANEER BUTTER MASALA 1 220.00", "DOSA 1 90.00"]);
    }

    #[test]
    fn test_merge_respects_max_len() {
        let c = LineClassifier::new();
        let long = "A VERY LONG STANDALONE FOOTER LINE WITH NO NUMBERS AT ALL HERE";
        let text = lines(&[long, "90.00"]);
        let merged = c.merge_wrapped_lines(&text, 40);
        assert_eq!(merged.len(), 2);
    }
}
