// Report Builder
// Query-time merge of three sources: the products snapshot, the
// inventory+warehouse join, and the external plant-stock table. Entries are
// keyed by SKU; plant-only SKUs get synthetic zones named after the plant
// warehouse label. Pagination metadata counts only the products table -
// plant-only entries do not move total_pages.

use std::collections::{BTreeMap, HashMap};
use rust_decimal::Decimal;
use serde_json::json;

use crate::middleware::error_handling::Result;
use crate::models::product::{PlantStock, Product};
use crate::models::report::{
    ProviderInfo, ReportEntry, ReportPagination, ReportQuery, ReportResponse, WarehouseSlot,
    ZoneBreakdown,
};
use crate::repositories::product_repo::{InventoryJoinRow, ProductRepository};

pub const DEFAULT_PER_PAGE: i64 = 500;
pub const MAX_PER_PAGE: i64 = 500;
const EXPORT_PAGE_SIZE: i64 = 1000;

/// Merge the three sources into SKU-keyed entries plus the per-manufacturer
/// provider info. Pure; all I/O happens in `build`.
pub fn merge_report(
    products: &[Product],
    inventory: &[InventoryJoinRow],
    plant_stock: &[PlantStock],
    prices: &HashMap<String, Decimal>,
) -> (BTreeMap<String, ReportEntry>, BTreeMap<String, ProviderInfo>) {
    let mut reporte: BTreeMap<String, ReportEntry> = BTreeMap::new();
    let mut proveedores: BTreeMap<String, ProviderInfo> = BTreeMap::new();

    // Provider info comes from the first plant row per manufacturer
    for e in plant_stock {
        if let Some(manufacturer) = &e.manufacturer {
            proveedores
                .entry(manufacturer.clone())
                .or_insert_with(|| ProviderInfo {
                    update: e.update.clone(),
                    created_at: e.created_at,
                });
        }
    }

    // Synced products: zones 1-4 always prefilled
    for p in products {
        let Some(sku) = p.sku.clone().filter(|s| !s.is_empty()) else {
            continue;
        };
        let zonas = (1..=4)
            .map(|z: i32| (z.to_string(), ZoneBreakdown::default()))
            .collect();
        reporte.insert(
            sku.clone(),
            ReportEntry {
                sku: sku.clone(),
                nombre: p.name.clone(),
                piso: p.piso.clone(),
                serie: p.serie.clone(),
                rin: p.rin.clone(),
                marca: p.marca.clone(),
                precio: prices.get(&sku).copied(),
                zonas,
            },
        );
    }

    // Inventory join rows bucket into CEDIS vs Sucursales by stored type
    let sku_by_product: HashMap<i64, &str> = products
        .iter()
        .filter_map(|p| Some((p.id, p.sku.as_deref()?)))
        .collect();

    for item in inventory {
        let Some(sku) = sku_by_product.get(&item.product_id) else {
            continue;
        };
        let Some(entry) = reporte.get_mut(*sku) else {
            continue;
        };

        let zone = item.warehouse.zone.to_string();
        let zone_data = entry.zonas.entry(zone).or_default();
        let almacen = WarehouseSlot {
            almacen_id: Some(item.warehouse.id),
            nombre: item.warehouse.name.clone(),
            cantidad: item.quantity as i64,
        };

        if item.warehouse.warehouse_type.to_uppercase() == "CEDIS" {
            zone_data.cedis.push(almacen);
        } else {
            zone_data.sucursales.push(almacen);
        }
    }

    // Plant stock: fallback entries for SKUs the sync never saw, synthetic
    // zone keyed by the plant's own warehouse label, CEDIS bucket by
    // convention
    for e in plant_stock {
        if e.sku.is_empty() {
            continue;
        }

        let entry = reporte.entry(e.sku.clone()).or_insert_with(|| ReportEntry {
            sku: e.sku.clone(),
            nombre: e
                .description
                .clone()
                .unwrap_or_else(|| format!("SKU-{}", e.sku)),
            marca: e.brand.clone(),
            piso: e.width.clone(),
            serie: e.ratio.map(|r| r.to_string()),
            rin: e.diameter.clone(),
            precio: prices.get(&e.sku).copied(),
            zonas: BTreeMap::new(),
        });

        let zone_name = e.warehouse.clone().unwrap_or_else(|| "Planta".to_string());
        let zone_data = entry.zonas.entry(zone_name.clone()).or_default();
        zone_data.cedis.push(WarehouseSlot {
            almacen_id: None,
            nombre: format!("Planta ({})", zone_name),
            cantidad: e.on_hand,
        });
    }

    for entry in reporte.values_mut() {
        for zone in entry.zonas.values_mut() {
            zone.compute_totals();
        }
    }

    (reporte, proveedores)
}

pub struct ReportService {
    repo: ProductRepository,
}

impl ReportService {
    pub fn new(repo: ProductRepository) -> Self {
        Self { repo }
    }

    pub async fn build(&self, query: &ReportQuery) -> Result<ReportResponse> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        let offset = (page - 1) * per_page;

        tracing::info!("📊 Generando reporte (página {}, {} items)", page, per_page);

        let piso = query.piso.as_deref();
        let serie = query.serie.as_deref();
        let rin = query.rin.as_deref();

        let (products, total_items) = self.repo.find_filtered(piso, serie, rin, per_page, offset).await?;

        let product_ids: Vec<i64> = products.iter().map(|p| p.id).collect();
        let inventory = self.repo.inventory_with_warehouses(&product_ids).await?;

        // Plant stock is filtered independently, never joined to the page
        let plant_stock = self.repo.plant_stock_filtered(piso, serie, rin).await?;

        let mut skus: Vec<String> = products
            .iter()
            .filter_map(|p| p.sku.clone())
            .chain(plant_stock.iter().map(|e| e.sku.clone()))
            .collect();
        skus.sort_unstable();
        skus.dedup();
        let prices = self.repo.prices_for_skus(&skus).await?;

        let (reporte, proveedores) = merge_report(&products, &inventory, &plant_stock, &prices);

        let mut filters = serde_json::Map::new();
        if let Some(piso) = piso {
            filters.insert("piso".to_string(), json!(piso));
        }
        if let Some(serie) = serie {
            filters.insert("serie".to_string(), json!(serie));
        }
        if let Some(rin) = rin {
            filters.insert("rin".to_string(), json!(rin));
        }

        Ok(ReportResponse {
            data: reporte.into_values().collect(),
            proveedores,
            pagination: ReportPagination {
                total_items,
                current_page: page,
                per_page,
                total_pages: (total_items + per_page - 1) / per_page,
                filters: serde_json::Value::Object(filters),
            },
        })
    }

    /// Full inventory export: one header line, one CSV line per product.
    /// Returned as individual encoded lines so the handler can stream them.
    pub async fn export_csv_lines(&self) -> Result<Vec<String>> {
        let mut all_products = Vec::new();
        let mut page: i64 = 0;
        loop {
            tracing::info!("Obteniendo productos página {}", page + 1);
            let batch = self.repo.page(EXPORT_PAGE_SIZE, page * EXPORT_PAGE_SIZE).await?;
            if batch.is_empty() {
                break;
            }
            all_products.extend(batch);
            page += 1;
        }

        if all_products.is_empty() {
            return Err(crate::middleware::error_handling::AppError::NotFound(
                "No se encontraron productos".to_string(),
            ));
        }

        let prices = self.repo.all_prices().await?;

        let mut lines = Vec::with_capacity(all_products.len() + 1);
        lines.push(csv_line(&[
            "SKU", "Nombre", "Piso", "Serie", "Rin", "Marca", "Modelo", "Precio", "Stock Total",
        ]));

        for product in &all_products {
            let sku = product.sku.clone().unwrap_or_default();
            let precio = prices
                .get(&sku)
                .map(|p| p.to_string())
                .unwrap_or_default();
            lines.push(csv_line(&[
                &sku,
                &product.name,
                product.piso.as_deref().unwrap_or(""),
                product.serie.as_deref().unwrap_or(""),
                product.rin.as_deref().unwrap_or(""),
                product.marca.as_deref().unwrap_or(""),
                product.modelo.as_deref().unwrap_or(""),
                &precio,
                &product.total_quantity.to_string(),
            ]));
        }

        Ok(lines)
    }
}

fn csv_line(fields: &[&str]) -> String {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    // Serialization into an in-memory Vec cannot fail
    let _ = writer.write_record(fields);
    let _ = writer.flush();
    String::from_utf8(writer.into_inner().unwrap_or_default()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::Warehouse;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn product(id: i64, sku: &str, serie: &str) -> Product {
        Product {
            id,
            name: format!("[{}] Llanta 185/{}R15", sku, serie),
            sku: Some(sku.to_string()),
            total_quantity: 10,
            piso: Some("185".to_string()),
            serie: Some(serie.to_string()),
            rin: Some("R15".to_string()),
            carga_velocidad: None,
            marca: Some("Firestone".to_string()),
            modelo: None,
            last_sync: Utc::now(),
        }
    }

    fn join_row(product_id: i64, warehouse_id: i64, wh_type: &str, zone: i32, qty: i32) -> InventoryJoinRow {
        InventoryJoinRow {
            product_id,
            quantity: qty,
            warehouse: Warehouse {
                id: warehouse_id,
                name: format!("Almacen {}", warehouse_id),
                warehouse_type: wh_type.to_string(),
                zone,
            },
        }
    }

    fn plant_row(sku: &str, warehouse: &str, on_hand: i64) -> PlantStock {
        PlantStock {
            sku: sku.to_string(),
            description: Some(format!("Planta {}", sku)),
            brand: Some("General".to_string()),
            width: Some("185".to_string()),
            ratio: Some(70),
            diameter: Some("13".to_string()),
            size: Some("185/70R13".to_string()),
            on_hand,
            manufacturer: Some("Continental MX".to_string()),
            warehouse: Some(warehouse.to_string()),
            update: Some("2025-08-01".to_string()),
            created_at: None,
        }
    }

    #[test]
    fn test_merge_buckets_by_warehouse_type_and_zone() {
        let products = vec![product(11, "F185", "65")];
        let inventory = vec![
            join_row(11, 1, "CEDIS", 3, 10),
            join_row(11, 2, "Sucursal", 3, 4),
            join_row(11, 3, "Amazon", 1, 2),
        ];

        let (reporte, _) = merge_report(&products, &inventory, &[], &HashMap::new());
        let entry = &reporte["F185"];

        let zona3 = &entry.zonas["3"];
        assert_eq!(zona3.total_cedis, 10);
        assert_eq!(zona3.total_sucursales, 4);
        assert_eq!(zona3.total_general, 14);

        // Amazon warehouses land in the branches bucket
        let zona1 = &entry.zonas["1"];
        assert_eq!(zona1.total_sucursales, 2);

        // Prefilled zones stay present with zero totals
        assert_eq!(entry.zonas["2"].total_general, 0);
        assert_eq!(entry.zonas["4"].total_general, 0);
    }

    #[test]
    fn test_merge_plant_only_sku_gets_synthetic_zone() {
        let plant = vec![plant_row("PL900", "TULTITLAN", 25)];
        let (reporte, proveedores) = merge_report(&[], &[], &plant, &HashMap::new());

        let entry = &reporte["PL900"];
        assert_eq!(entry.nombre, "Planta PL900");
        assert_eq!(entry.serie.as_deref(), Some("70"));

        let zone = &entry.zonas["TULTITLAN"];
        assert_eq!(zone.cedis.len(), 1);
        assert_eq!(zone.cedis[0].almacen_id, None);
        assert_eq!(zone.cedis[0].nombre, "Planta (TULTITLAN)");
        assert_eq!(zone.total_cedis, 25);
        assert_eq!(zone.total_general, 25);
        // No numeric zones were fabricated for a plant-only SKU
        assert!(!entry.zonas.contains_key("1"));

        assert!(proveedores.contains_key("Continental MX"));
    }

    #[test]
    fn test_merge_plant_adds_zone_to_existing_product() {
        let products = vec![product(11, "F185", "65")];
        let plant = vec![plant_row("F185", "SAN LUIS", 8)];

        let (reporte, _) = merge_report(&products, &[], &plant, &HashMap::new());
        let entry = &reporte["F185"];

        // Name stays from the products table, plant adds a fifth zone
        assert_eq!(entry.nombre, "[F185] Llanta 185/65R15");
        assert_eq!(entry.zonas.len(), 5);
        assert_eq!(entry.zonas["SAN LUIS"].total_cedis, 8);
    }

    #[test]
    fn test_merge_resolves_prices_for_both_sources() {
        let products = vec![product(11, "F185", "65")];
        let plant = vec![plant_row("PL900", "TULTITLAN", 5)];
        let mut prices = HashMap::new();
        prices.insert("F185".to_string(), dec!(1599.00));
        prices.insert("PL900".to_string(), dec!(899.50));

        let (reporte, _) = merge_report(&products, &[], &plant, &prices);
        assert_eq!(reporte["F185"].precio.unwrap().to_string(), "1599.00");
        assert_eq!(reporte["PL900"].precio.unwrap().to_string(), "899.50");
    }

    #[test]
    fn test_merge_output_sorted_by_sku() {
        let products = vec![product(2, "ZZZ", "65"), product(1, "AAA", "65")];
        let (reporte, _) = merge_report(&products, &[], &[], &HashMap::new());
        let skus: Vec<&String> = reporte.keys().collect();
        assert_eq!(skus, vec!["AAA", "ZZZ"]);
    }

    #[test]
    fn test_merge_skips_products_without_sku() {
        let mut p = product(5, "X", "65");
        p.sku = None;
        let (reporte, _) = merge_report(&[p], &[], &[], &HashMap::new());
        assert!(reporte.is_empty());
    }

    #[test]
    fn test_csv_line_quotes_embedded_commas() {
        let line = csv_line(&["A1", "Llanta, radial", "185"]);
        assert_eq!(line.trim_end(), "A1,\"Llanta, radial\",185");
    }
}
