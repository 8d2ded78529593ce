// Price Resolution
// Two phases: a batched variant-to-template mapping, then a session-scoped
// pricelist report call whose HTML fragment is scraped for currency values.
// Both phases fail closed: any error degrades to an empty map, never to a
// partial one.

use std::collections::HashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::services::odoo::client::{OdooClient, Result};

// Pairs each data-res-id marker with the next currency span, non-greedy
// across intervening markup. (?s) lets the gap span lines.
static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)data-res-id="(\d+)".*?<span class="oe_currency_value">([\d,.]+)</span>"#)
        .expect("price regex")
});

/// Extract `{template_id: price}` pairs from the pricelist report HTML.
/// Thousands separators are stripped; the value is otherwise left as the
/// report printed it - parsing to a number happens at storage/display time.
pub fn parse_pricelist_html(html: &str) -> HashMap<i64, String> {
    PRICE_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let id = caps.get(1)?.as_str().parse().ok()?;
            let price = caps.get(2)?.as_str().replace(',', "");
            Some((id, price))
        })
        .collect()
}

pub struct PriceService {
    odoo: OdooClient,
    pricelist_id: i64,
}

impl PriceService {
    pub fn new(odoo: OdooClient) -> Self {
        let pricelist_id = odoo.config().pricelist_id;
        Self { odoo, pricelist_id }
    }

    /// Map product.product ids to their product.template ids in one batched
    /// query. Variants with no match are silently dropped - they simply get
    /// no price later. Errors degrade to an empty map.
    pub async fn template_map(&self, product_ids: &[i64]) -> HashMap<i64, i64> {
        if product_ids.is_empty() {
            return HashMap::new();
        }

        let result = self
            .odoo
            .execute_kw(
                "product.product",
                "search_read",
                vec![json!(["id", "in", product_ids])],
                &["id", "product_tmpl_id"],
                json!({}),
            )
            .await;

        match result {
            Ok(records) => records
                .iter()
                .filter_map(|rec| {
                    let id = rec.get("id")?.as_i64()?;
                    let template_id = rec.get("product_tmpl_id")?.as_array()?.first()?.as_i64()?;
                    Some((id, template_id))
                })
                .collect(),
            Err(e) => {
                tracing::error!("Error al mapear productos a templates: {}", e);
                HashMap::new()
            }
        }
    }

    /// Resolve prices for a set of templates via the session report flow.
    /// Returns `{template_id: price_string}`; any transport or parse failure
    /// yields an empty map.
    pub async fn get_prices(&self, template_ids: &[i64]) -> HashMap<i64, String> {
        if template_ids.is_empty() {
            return HashMap::new();
        }

        match self.fetch_html(template_ids).await {
            Ok(html) => parse_pricelist_html(&html),
            Err(e) => {
                tracing::error!("Error al procesar precios: {}", e);
                HashMap::new()
            }
        }
    }

    async fn fetch_html(&self, template_ids: &[i64]) -> Result<String> {
        self.odoo
            .fetch_pricelist_html(template_ids, self.pricelist_id)
            .await
    }
}

/// Parse a resolved price string into a number, the way downstream storage
/// does it. `N/A`, empty and non-numeric strings are None.
pub fn parse_price(price_str: &str) -> Option<f64> {
    let trimmed = price_str.trim();
    if trimmed.is_empty() || trimmed == "N/A" {
        return None;
    }
    trimmed.replace(',', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pricelist_html_two_blocks() {
        let html = r#"
            <tr data-res-id="1" class="o_pricelist">
                <td>Llanta A</td>
                <td><span class="oe_currency_value">100.00</span></td>
            </tr>
            <tr data-res-id="2" class="o_pricelist">
                <td>Llanta B</td>
                <td><span class="oe_currency_value">250.50</span></td>
            </tr>
        "#;

        let prices = parse_pricelist_html(html);
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[&1], "100.00");
        assert_eq!(prices[&2], "250.50");
    }

    #[test]
    fn test_parse_pricelist_html_strips_thousands_separators() {
        let html = r#"<div data-res-id="7"><span class="oe_currency_value">1,234.56</span></div>"#;
        let prices = parse_pricelist_html(html);
        assert_eq!(prices[&7], "1234.56");
    }

    #[test]
    fn test_parse_pricelist_html_spans_lines() {
        let html = "data-res-id=\"3\"\n<td>relleno</td>\n<span class=\"oe_currency_value\">88.00</span>";
        let prices = parse_pricelist_html(html);
        assert_eq!(prices[&3], "88.00");
    }

    #[test]
    fn test_parse_pricelist_html_empty_on_garbage() {
        assert!(parse_pricelist_html("").is_empty());
        assert!(parse_pricelist_html("<html>sin precios</html>").is_empty());
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("1,234.56"), Some(1234.56));
        assert_eq!(parse_price("100.00"), Some(100.0));
        assert_eq!(parse_price("N/A"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("abc"), None);
    }
}
