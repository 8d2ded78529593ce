use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub piso: Option<String>,
    pub serie: Option<String>,
    pub rin: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// One warehouse line inside a zone bucket. `almacen_id` is None for
/// plant-stock rows, which have no warehouse id of their own.
#[derive(Debug, Clone, Serialize)]
pub struct WarehouseSlot {
    pub almacen_id: Option<i64>,
    pub nombre: String,
    pub cantidad: i64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ZoneBreakdown {
    #[serde(rename = "CEDIS")]
    pub cedis: Vec<WarehouseSlot>,
    #[serde(rename = "Sucursales")]
    pub sucursales: Vec<WarehouseSlot>,
    pub total_cedis: i64,
    pub total_sucursales: i64,
    pub total_general: i64,
}

impl ZoneBreakdown {
    pub fn compute_totals(&mut self) {
        self.total_cedis = self.cedis.iter().map(|s| s.cantidad).sum();
        self.total_sucursales = self.sucursales.iter().map(|s| s.cantidad).sum();
        self.total_general = self.total_cedis + self.total_sucursales;
    }
}

/// Ephemeral report row, keyed by SKU. Zones are string-keyed: "1".."4" for
/// synced products, the plant warehouse label for plant-only SKUs.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub sku: String,
    pub nombre: String,
    pub piso: Option<String>,
    pub serie: Option<String>,
    pub rin: Option<String>,
    pub marca: Option<String>,
    pub precio: Option<rust_decimal::Decimal>,
    pub zonas: BTreeMap<String, ZoneBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub update: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ReportPagination {
    pub total_items: i64,
    pub current_page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub filters: Value,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub data: Vec<ReportEntry>,
    pub proveedores: BTreeMap<String, ProviderInfo>,
    pub pagination: ReportPagination,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };
        Self {
            total,
            page,
            per_page,
            total_pages,
            has_next: page * per_page < total,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_totals() {
        let mut zone = ZoneBreakdown::default();
        zone.cedis.push(WarehouseSlot { almacen_id: Some(1), nombre: "CEDIS Norte".into(), cantidad: 10 });
        zone.cedis.push(WarehouseSlot { almacen_id: None, nombre: "Planta (TULTITLAN)".into(), cantidad: 5 });
        zone.sucursales.push(WarehouseSlot { almacen_id: Some(7), nombre: "Sucursal Centro".into(), cantidad: 3 });
        zone.compute_totals();

        assert_eq!(zone.total_cedis, 15);
        assert_eq!(zone.total_sucursales, 3);
        assert_eq!(zone.total_general, 18);
    }

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(25, 2, 10);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(p.has_prev);

        let p = Pagination::new(0, 1, 10);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_prev);
    }
}
