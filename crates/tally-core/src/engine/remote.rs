//! Remote document-AI parse engine
//!
//! HTTP client for a hosted receipt-parsing service. The vendor response
//! shape varies across deployments, so deserialization is deliberately
//! tolerant (aliased fields, optional everything) and the mapping into the
//! canonical `ParseResult` happens entirely here.

use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{round2, BillCharge, BillItem, ParseResult};

use super::{ParseEngine, ProgressFn};

#[derive(Clone)]
pub struct RemoteEngine {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    name: String,
}

#[derive(Serialize)]
struct ParseRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct VendorResponse {
    #[serde(alias = "items")]
    line_items: Option<Vec<VendorItem>>,
    #[serde(alias = "net_total", alias = "grand_total")]
    total: Option<f64>,
    tax: Option<f64>,
    tip: Option<f64>,
    discount: Option<f64>,
}

#[derive(Deserialize)]
struct VendorItem {
    #[serde(alias = "name")]
    description: Option<String>,
    quantity: Option<f64>,
    #[serde(alias = "price")]
    unit_price: Option<f64>,
    total: Option<f64>,
}

impl RemoteEngine {
    /// Create a new remote engine client
    pub fn new(name: &str, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            name: name.to_string(),
        }
    }

    fn map_response(&self, response: VendorResponse) -> ParseResult {
        let mut items = Vec::new();
        for raw in response.line_items.unwrap_or_default() {
            let Some(description) = raw.description.filter(|d| !d.trim().is_empty()) else {
                continue;
            };
            let quantity = raw
                .quantity
                .filter(|q| *q >= 1.0 && q.fract() == 0.0)
                .map(|q| q as u32)
                .unwrap_or(1);
            // Prefer the explicit unit price; derive from the line total when
            // the vendor only reports that
            let unit_price = match (raw.unit_price, raw.total) {
                (Some(p), _) => p,
                (None, Some(t)) => t / f64::from(quantity),
                (None, None) => 0.0,
            };
            if unit_price <= 0.0 {
                warn!(description = description.as_str(), "dropping vendor item without a usable price");
                continue;
            }
            items.push(BillItem::new(description.trim(), quantity, round2(unit_price)));
        }

        let mut charges = Vec::new();
        if let Some(tax) = response.tax.filter(|t| *t != 0.0) {
            charges.push(BillCharge {
                label: "Tax".to_string(),
                amount: round2(tax),
            });
        }
        if let Some(tip) = response.tip.filter(|t| *t != 0.0) {
            charges.push(BillCharge {
                label: "Tip".to_string(),
                amount: round2(tip),
            });
        }
        if let Some(discount) = response.discount.filter(|d| *d != 0.0) {
            // Discounts always reduce the bill
            charges.push(BillCharge {
                label: "Discount".to_string(),
                amount: -round2(discount.abs()),
            });
        }

        ParseResult {
            items,
            charges,
            net_total: response.total,
        }
    }
}

#[async_trait::async_trait]
impl ParseEngine for RemoteEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn parse(&self, image: &[u8], progress: &ProgressFn<'_>) -> Result<ParseResult> {
        progress(10);

        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let url = format!("{}/v1/parse", self.base_url);
        debug!(engine = self.name.as_str(), url = url.as_str(), "calling remote parse engine");

        let mut request = self.http_client.post(&url).json(&ParseRequest { image: &encoded });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Engine(format!(
                "{} returned HTTP {}",
                self.name,
                response.status()
            )));
        }

        let vendor: VendorResponse = response.json().await?;
        let result = self.map_response(vendor);
        progress(100);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RemoteEngine {
        RemoteEngine::new("vendor-a", "http://localhost:0", None)
    }

    fn vendor(json: &str) -> VendorResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_maps_aliased_item_fields() {
        let r = engine().map_response(vendor(
            r#"{"items":[{"name":"Coke","quantity":2,"price":19.90}],"net_total":39.80}"#,
        ));
        assert_eq!(r.items.len(), 1);
        assert_eq!(r.items[0].description, "Coke");
        assert_eq!(r.items[0].quantity, 2);
        assert_eq!(r.net_total, Some(39.80));
    }

    #[test]
    fn test_derives_unit_price_from_line_total() {
        let r = engine().map_response(vendor(
            r#"{"line_items":[{"description":"Dosa","quantity":2,"total":180.0}]}"#,
        ));
        assert!((r.items[0].unit_price - 90.0).abs() < 0.005);
    }

    #[test]
    fn test_drops_items_without_usable_price() {
        let r = engine().map_response(vendor(
            r#"{"line_items":[{"description":"Bread"},{"description":"Soup","price":-4.0}]}"#,
        ));
        assert!(r.items.is_empty());
    }

    #[test]
    fn test_lifts_tax_tip_discount_to_charges() {
        let r = engine().map_response(vendor(
            r#"{"line_items":[],"total":100.0,"tax":5.0,"tip":10.0,"discount":3.0}"#,
        ));
        let labels: Vec<&str> = r.charges.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Tax", "Tip", "Discount"]);
        assert!((r.charges[2].amount + 3.0).abs() < 0.005);
    }

    #[test]
    fn test_fractional_quantity_defaults_to_one() {
        let r = engine().map_response(vendor(
            r#"{"items":[{"name":"Wine","quantity":0.5,"price":30.0}]}"#,
        ));
        assert_eq!(r.items[0].quantity, 1);
    }
}
