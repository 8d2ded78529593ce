// Inventory Aggregation
// Pulls stock.quant pages from Odoo and folds them into one aggregate per
// product: total quantity plus a four-zone breakdown with per-warehouse
// sums. Consignment categories never reach the output.

use std::collections::{BTreeMap, HashSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::services::odoo::attribute_service::{AttributeService, TireAttributes};
use crate::services::odoo::client::{many2one, OdooClient, Result};
use crate::services::odoo::price_service::PriceService;

/// Consignment stock categories, excluded from every inventory view.
pub const CONSIGNA_CATEGORY_IDS: [i64; 4] = [503, 504, 505, 517];

/// Upstream page size. The Odoo API has no streaming cursor; pages are
/// accumulated until the first empty one.
pub const STOCK_PAGE_SIZE: i64 = 5000;

static ZONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[1-4]").expect("zone regex"));

/// First digit in 1-4 found anywhere in a location display name. Locations
/// without one contribute to the product total but to no zone bucket.
pub fn extract_zone(location_name: &str) -> Option<u8> {
    ZONE_RE
        .find(location_name)
        .and_then(|m| m.as_str().parse().ok())
}

// ============================================================================
// Raw records and aggregates
// ============================================================================

#[derive(Debug, Clone)]
pub struct StockQuant {
    pub product_id: i64,
    pub product_name: String,
    pub location_name: String,
    pub quantity: f64,
    pub warehouse: Option<(i64, String)>,
    pub categ_id: Option<i64>,
}

impl StockQuant {
    /// Parse one raw stock.quant record. Returns None when the record is
    /// missing its product pair; those are logged and skipped upstream.
    pub fn from_value(value: &Value) -> Option<Self> {
        let (product_id, product_name) = many2one(value.get("product_id")?)?;
        let location_name = value
            .get("location_id")
            .and_then(many2one)
            .map(|(_, name)| name)
            .unwrap_or_default();

        Some(Self {
            product_id,
            product_name,
            location_name,
            quantity: value.get("quantity").and_then(Value::as_f64).unwrap_or(0.0),
            warehouse: value.get("warehouse_id").and_then(many2one),
            categ_id: value
                .get("product_categ_id")
                .and_then(many2one)
                .map(|(id, _)| id)
                .or_else(|| value.get("product_categ_id").and_then(Value::as_i64)),
        })
    }

    pub fn is_consigna(&self) -> bool {
        self.categ_id
            .map(|id| CONSIGNA_CATEGORY_IDS.contains(&id))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct WarehouseQuantity {
    pub name: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ZoneAggregate {
    pub total: f64,
    pub almacenes: BTreeMap<i64, WarehouseQuantity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductAggregate {
    pub id: i64,
    pub name: String,
    pub total_quantity: f64,
    pub price: Option<String>,
    pub attributes: TireAttributes,
    /// Keys 1-4, always all present.
    pub zonas: BTreeMap<u8, ZoneAggregate>,
}

impl ProductAggregate {
    fn new(id: i64, name: String) -> Self {
        let zonas = (1..=4).map(|z| (z, ZoneAggregate::default())).collect();
        Self {
            id,
            name,
            total_quantity: 0.0,
            price: None,
            attributes: TireAttributes::default(),
            zonas,
        }
    }
}

#[derive(Debug)]
pub struct InventorySnapshot {
    pub products: Vec<ProductAggregate>,
    pub consigna_excluded: usize,
}

// ============================================================================
// Aggregation (pure)
// ============================================================================

/// Group raw stock records by product, splitting quantities into zones and
/// warehouses. Consignment records are dropped entirely; the count of
/// distinct products dropped is reported alongside.
pub fn aggregate_stock(records: &[StockQuant]) -> (BTreeMap<i64, ProductAggregate>, usize) {
    let mut grouped: BTreeMap<i64, ProductAggregate> = BTreeMap::new();
    let mut consigna_products: HashSet<i64> = HashSet::new();

    for record in records {
        if record.is_consigna() {
            consigna_products.insert(record.product_id);
            continue;
        }

        let entry = grouped
            .entry(record.product_id)
            .or_insert_with(|| ProductAggregate::new(record.product_id, record.product_name.clone()));

        entry.total_quantity += record.quantity;

        let zone = extract_zone(&record.location_name);
        if let (Some(zone), Some((warehouse_id, warehouse_name))) = (zone, &record.warehouse) {
            // Zones 1-4 are prefilled in ProductAggregate::new
            let Some(zone_data) = entry.zonas.get_mut(&zone) else {
                continue;
            };
            zone_data.total += record.quantity;

            let almacen = zone_data
                .almacenes
                .entry(*warehouse_id)
                .or_insert_with(|| WarehouseQuantity {
                    name: warehouse_name.clone(),
                    quantity: 0.0,
                });
            almacen.quantity += record.quantity;
        }
    }

    // A product excluded by category never appears, even if other records
    // reference the same id.
    for id in &consigna_products {
        grouped.remove(id);
    }

    (grouped, consigna_products.len())
}

// ============================================================================
// Service
// ============================================================================

pub struct InventoryService {
    odoo: OdooClient,
}

impl InventoryService {
    pub fn new(odoo: OdooClient) -> Self {
        Self { odoo }
    }

    fn stock_fields() -> [&'static str; 6] {
        [
            "id",
            "product_id",
            "quantity",
            "location_id",
            "warehouse_id",
            "product_categ_id",
        ]
    }

    /// Pull every stock.quant page matching `domain` until an empty page
    /// comes back. Records that fail to parse are logged and skipped, never
    /// fatal to the run.
    pub async fn fetch_all_stock(&self, domain: Vec<Value>) -> Result<Vec<StockQuant>> {
        let mut all_records = Vec::new();
        let mut offset: i64 = 0;

        loop {
            tracing::info!("📋 Consultando stock.quant (offset: {}, limit: {})", offset, STOCK_PAGE_SIZE);

            let batch = self
                .odoo
                .execute_kw(
                    "stock.quant",
                    "search_read",
                    domain.clone(),
                    &Self::stock_fields(),
                    json!({"limit": STOCK_PAGE_SIZE, "offset": offset}),
                )
                .await?;

            if batch.is_empty() {
                tracing::info!("🏁 Fin de paginación en offset {}", offset);
                break;
            }

            let batch_len = batch.len();
            for raw in &batch {
                match StockQuant::from_value(raw) {
                    Some(record) => all_records.push(record),
                    None => tracing::error!("⚠️ Registro stock.quant inválido: {}", raw),
                }
            }

            offset += STOCK_PAGE_SIZE;
            tracing::info!("📦 Lote actual: {} items. Total acumulado: {}", batch_len, all_records.len());
        }

        Ok(all_records)
    }

    fn base_domain(line_id: Option<i64>) -> Vec<Value> {
        let mut domain = vec![json!(["location_id.usage", "=", "internal"])];
        if let Some(line_id) = line_id {
            domain.push(json!(["product_id.product_tmpl_id.line_id", "=", line_id]));
        }
        domain.push(json!(["product_id.categ_id", "not in", CONSIGNA_CATEGORY_IDS]));
        domain
    }

    /// Full inventory pull: paginate, aggregate, then enrich the aggregates
    /// with prices and positional attributes.
    pub async fn get_all_inventory(
        &self,
        line_id: Option<i64>,
        prices: &PriceService,
        attributes: &AttributeService,
    ) -> Result<InventorySnapshot> {
        tracing::info!("🚀 Iniciando inventario completo con line_id: {:?}", line_id);

        let records = self.fetch_all_stock(Self::base_domain(line_id)).await?;
        tracing::info!("📊 Total de registros encontrados: {}", records.len());

        let (mut grouped, consigna_excluded) = aggregate_stock(&records);
        tracing::info!("🧮 Productos agrupados: {} items", grouped.len());

        if !grouped.is_empty() {
            self.enrich(&mut grouped, prices, attributes).await;
        }

        Ok(InventorySnapshot {
            products: grouped.into_values().collect(),
            consigna_excluded,
        })
    }

    /// On-demand inventory search with tire-size filters compiled into the
    /// Odoo domain. Rin input is upper-cased and matched with and without
    /// its R prefix.
    pub async fn search_inventory(
        &self,
        piso: Option<&str>,
        serie: Option<&str>,
        rin: Option<&str>,
        prices: &PriceService,
        attributes: &AttributeService,
    ) -> Result<Vec<ProductAggregate>> {
        let mut domain = vec![json!(["location_id.usage", "=", "internal"])];

        if let Some(piso) = piso {
            domain.push(json!(["product_id.name", "ilike", piso]));
        }
        if let Some(serie) = serie {
            domain.push(json!(["product_id.name", "ilike", serie]));
        }
        if let Some(rin) = rin {
            let rin_value = rin.to_uppercase().replace('R', "");
            domain.push(json!("|"));
            domain.push(json!(["product_id.name", "ilike", format!("R{}", rin_value)]));
            domain.push(json!(["product_id.name", "ilike", rin_value]));
        }

        let records = self.fetch_all_stock(domain).await?;
        let (mut grouped, _) = aggregate_stock(&records);

        if !grouped.is_empty() {
            self.enrich(&mut grouped, prices, attributes).await;
        }

        Ok(grouped.into_values().collect())
    }

    /// Attach prices and human-readable attributes to the aggregates. Both
    /// lookups fail closed to empty maps, so a degraded upstream leaves the
    /// aggregates without prices rather than aborting the pull.
    async fn enrich(
        &self,
        grouped: &mut BTreeMap<i64, ProductAggregate>,
        prices: &PriceService,
        attributes: &AttributeService,
    ) {
        let product_ids: Vec<i64> = grouped.keys().copied().collect();

        tracing::info!("💲 Obteniendo mapeo de templates para {} productos", product_ids.len());
        let template_map = prices.template_map(&product_ids).await;
        tracing::info!("🔄 Mapeo de templates obtenido: {} items", template_map.len());

        if template_map.is_empty() {
            return;
        }

        let mut template_ids: Vec<i64> = template_map.values().copied().collect();
        template_ids.sort_unstable();
        template_ids.dedup();

        tracing::info!("💰 Obteniendo precios para {} templates", template_ids.len());
        let price_map = prices.get_prices(&template_ids).await;
        tracing::info!("💵 Precios obtenidos: {} items", price_map.len());

        tracing::info!("🏷️ Obteniendo atributos para {} templates", template_ids.len());
        let attribute_map = attributes.enrich(&template_ids).await;

        let mut assigned_prices = 0;
        for (product_id, aggregate) in grouped.iter_mut() {
            if let Some(template_id) = template_map.get(product_id) {
                if let Some(price) = price_map.get(template_id) {
                    aggregate.price = Some(price.clone());
                    assigned_prices += 1;
                }
                if let Some(attrs) = attribute_map.get(template_id) {
                    aggregate.attributes = attrs.clone();
                }
            }
        }
        tracing::info!("💲 Precios asignados a {} productos", assigned_prices);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        product_id: i64,
        location_name: &str,
        quantity: f64,
        warehouse: Option<(i64, &str)>,
        categ_id: Option<i64>,
    ) -> StockQuant {
        StockQuant {
            product_id,
            product_name: format!("[SKU{}] Llanta {}", product_id, product_id),
            location_name: location_name.to_string(),
            quantity,
            warehouse: warehouse.map(|(id, name)| (id, name.to_string())),
            categ_id,
        }
    }

    #[test]
    fn test_extract_zone_first_match() {
        assert_eq!(extract_zone("CEDIS Zona 3 / Stock"), Some(3));
        assert_eq!(extract_zone("Z2/Existencias"), Some(2));
        // 5 is outside the zone range; scanning continues to the 1
        assert_eq!(extract_zone("Piso 5 Rack 1"), Some(1));
        assert_eq!(extract_zone("Bodega Central"), None);
        assert_eq!(extract_zone("Almacen 9"), None);
        assert_eq!(extract_zone(""), None);
    }

    #[test]
    fn test_aggregate_groups_by_product_and_zone() {
        let records = vec![
            record(10, "Zona 1 / A", 5.0, Some((100, "CEDIS Norte")), Some(1)),
            record(10, "Zona 1 / B", 3.0, Some((100, "CEDIS Norte")), Some(1)),
            record(10, "Zona 2 / A", 2.0, Some((200, "Sucursal Sur")), Some(1)),
            record(11, "Zona 1 / A", 7.0, Some((100, "CEDIS Norte")), Some(1)),
        ];

        let (grouped, consigna) = aggregate_stock(&records);
        assert_eq!(consigna, 0);
        assert_eq!(grouped.len(), 2);

        let p10 = &grouped[&10];
        assert_eq!(p10.total_quantity, 10.0);
        assert_eq!(p10.zonas[&1].total, 8.0);
        assert_eq!(p10.zonas[&1].almacenes[&100].quantity, 8.0);
        assert_eq!(p10.zonas[&2].total, 2.0);
        assert_eq!(p10.zonas[&3].total, 0.0);
        assert_eq!(p10.zonas[&4].total, 0.0);

        let p11 = &grouped[&11];
        assert_eq!(p11.total_quantity, 7.0);
    }

    #[test]
    fn test_no_zone_counts_toward_total_only() {
        let records = vec![
            record(10, "Bodega Central", 6.0, Some((100, "CEDIS Norte")), None),
            record(10, "Zona 3 / A", 4.0, Some((100, "CEDIS Norte")), None),
        ];

        let (grouped, _) = aggregate_stock(&records);
        let p10 = &grouped[&10];
        assert_eq!(p10.total_quantity, 10.0);
        let zoned: f64 = p10.zonas.values().map(|z| z.total).sum();
        assert_eq!(zoned, 4.0);
    }

    #[test]
    fn test_missing_warehouse_excluded_from_zone_breakdown() {
        let records = vec![record(10, "Zona 2 / A", 9.0, None, None)];

        let (grouped, _) = aggregate_stock(&records);
        let p10 = &grouped[&10];
        assert_eq!(p10.total_quantity, 9.0);
        assert_eq!(p10.zonas[&2].total, 0.0);
        assert!(p10.zonas[&2].almacenes.is_empty());
    }

    #[test]
    fn test_consigna_product_never_appears() {
        let records = vec![
            // Product 10 is consignment in one record, plain in another;
            // the whole product must be dropped regardless.
            record(10, "Zona 3 / A", 5.0, Some((7, "Sucursal Zona 3")), Some(503)),
            record(10, "Zona 3 / B", 2.0, Some((7, "Sucursal Zona 3")), Some(1)),
            record(11, "Zona 3 / A", 8.0, Some((7, "Sucursal Zona 3")), Some(1)),
        ];

        let (grouped, consigna) = aggregate_stock(&records);
        assert_eq!(consigna, 1);
        assert!(!grouped.contains_key(&10));
        assert!(grouped.contains_key(&11));
    }

    #[test]
    fn test_stock_quant_from_value() {
        let raw = serde_json::json!({
            "id": 1,
            "product_id": [10, "[P10] Llanta 185/65R15"],
            "quantity": 4.0,
            "location_id": [55, "Zona 1 / Stock"],
            "warehouse_id": [7, "CEDIS Norte"],
            "product_categ_id": [503, "Consigna"]
        });

        let record = StockQuant::from_value(&raw).unwrap();
        assert_eq!(record.product_id, 10);
        assert_eq!(record.location_name, "Zona 1 / Stock");
        assert_eq!(record.warehouse, Some((7, "CEDIS Norte".to_string())));
        assert!(record.is_consigna());

        // warehouse_id serialized as `false` when absent
        let raw = serde_json::json!({
            "product_id": [10, "Llanta"],
            "quantity": 1.0,
            "location_id": [55, "Zona 1"],
            "warehouse_id": false
        });
        let record = StockQuant::from_value(&raw).unwrap();
        assert_eq!(record.warehouse, None);
        assert!(!record.is_consigna());
    }
}
