use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Snapshot row for a synced tire product. The whole table is replaced on
/// every sync cycle, so there is no incremental-update shape here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub sku: Option<String>,
    pub total_quantity: i32,
    pub piso: Option<String>,
    pub serie: Option<String>,
    pub rin: Option<String>,
    pub carga_velocidad: Option<String>,
    pub marca: Option<String>,
    pub modelo: Option<String>,
    pub last_sync: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarehouseType {
    #[serde(rename = "CEDIS")]
    Cedis,
    Amazon,
    Sucursal,
}

impl WarehouseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarehouseType::Cedis => "CEDIS",
            WarehouseType::Amazon => "Amazon",
            WarehouseType::Sucursal => "Sucursal",
        }
    }

    /// Infer the type from a warehouse display name. Case-insensitive;
    /// anything that is not a CEDIS or the Amazon fulfillment store counts
    /// as a branch.
    pub fn infer_from_name(name: &str) -> Self {
        let upper = name.to_uppercase();
        if upper.contains("CEDIS") {
            WarehouseType::Cedis
        } else if upper.contains("AMAZON") {
            WarehouseType::Amazon
        } else {
            WarehouseType::Sucursal
        }
    }
}

impl std::str::FromStr for WarehouseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CEDIS" => Ok(WarehouseType::Cedis),
            "AMAZON" => Ok(WarehouseType::Amazon),
            "SUCURSAL" => Ok(WarehouseType::Sucursal),
            other => Err(format!("unknown warehouse type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Warehouse {
    pub id: i64,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub warehouse_type: String,
    pub zone: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryRecord {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i32,
    pub last_updated: DateTime<Utc>,
}

/// Factory-side stock, owned by an external loader. Read-only here; merged
/// into reports but never touched by the sync.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlantStock {
    pub sku: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub width: Option<String>,
    pub ratio: Option<i32>,
    pub diameter: Option<String>,
    pub size: Option<String>,
    pub on_hand: i64,
    pub manufacturer: Option<String>,
    pub warehouse: Option<String>,
    pub update: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Price keyed by SKU rather than product id: survives the delete-then-insert
/// product refresh as long as the SKU is stable.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductPrice {
    pub sku: String,
    pub price: rust_decimal::Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PlantStockQuery {
    pub width: String,
    pub ratio: String,
    pub diameter: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warehouse_type_inference() {
        assert_eq!(WarehouseType::infer_from_name("CEDIS Monterrey"), WarehouseType::Cedis);
        assert_eq!(WarehouseType::infer_from_name("cedis norte"), WarehouseType::Cedis);
        assert_eq!(WarehouseType::infer_from_name("Bodega Amazon MX"), WarehouseType::Amazon);
        assert_eq!(WarehouseType::infer_from_name("Sucursal Centro"), WarehouseType::Sucursal);
        assert_eq!(WarehouseType::infer_from_name("Tienda 12"), WarehouseType::Sucursal);
    }
}
