use std::collections::HashMap;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{query, PgPool, Postgres, QueryBuilder, Row};

use crate::middleware::error_handling::{AppError, Result};
use crate::models::product::{PlantStock, Product, Warehouse};

/// Product row as written by the sync. Attribute strings come pre-truncated
/// by the sync orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInsert {
    pub id: i64,
    pub name: String,
    pub sku: Option<String>,
    pub total_quantity: i32,
    pub piso: String,
    pub serie: String,
    pub rin: String,
    pub carga_velocidad: String,
    pub marca: String,
    pub modelo: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseUpsert {
    pub id: i64,
    pub name: String,
    pub zone: i32,
    pub warehouse_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryInsert {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct InventoryJoinRow {
    pub product_id: i64,
    pub quantity: i32,
    pub warehouse: Warehouse,
}

pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Filtered, paginated product page plus the exact total count used for
    /// pagination metadata. `piso`/`rin` match by substring, `serie` exactly.
    pub async fn find_filtered(
        &self,
        piso: Option<&str>,
        serie: Option<&str>,
        rin: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Product>, i64)> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, name, sku, total_quantity, piso, serie, rin, carga_velocidad, marca, modelo, last_sync \
             FROM products WHERE 1=1",
        );
        Self::push_size_filters(&mut qb, piso, serie, rin);
        qb.push(" ORDER BY sku NULLS LAST LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let products = rows
            .into_iter()
            .map(Self::product_from_row)
            .collect::<Result<Vec<_>>>()?;

        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) AS total FROM products WHERE 1=1");
        Self::push_size_filters(&mut count_qb, piso, serie, rin);
        let count_row = count_qb.build().fetch_one(&self.pool).await?;
        let total: i64 = count_row.try_get("total")?;

        Ok((products, total))
    }

    fn push_size_filters(
        qb: &mut QueryBuilder<Postgres>,
        piso: Option<&str>,
        serie: Option<&str>,
        rin: Option<&str>,
    ) {
        if let Some(piso) = piso {
            qb.push(" AND piso ILIKE ");
            qb.push_bind(format!("%{}%", piso));
        }
        if let Some(serie) = serie {
            qb.push(" AND serie = ");
            qb.push_bind(serie.to_string());
        }
        if let Some(rin) = rin {
            qb.push(" AND rin ILIKE ");
            qb.push_bind(format!("%{}%", rin));
        }
    }

    fn product_from_row(row: sqlx::postgres::PgRow) -> Result<Product> {
        Ok(Product {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            sku: row.try_get("sku")?,
            total_quantity: row.try_get("total_quantity")?,
            piso: row.try_get("piso")?,
            serie: row.try_get("serie")?,
            rin: row.try_get("rin")?,
            carga_velocidad: row.try_get("carga_velocidad")?,
            marca: row.try_get("marca")?,
            modelo: row.try_get("modelo")?,
            last_sync: row.try_get("last_sync")?,
        })
    }

    /// SKU/name substring search with price-join done by the caller.
    pub async fn search(&self, term: &str, limit: i64, offset: i64) -> Result<(Vec<Product>, i64)> {
        let pattern = format!("%{}%", term);
        let rows = query(
            "SELECT id, name, sku, total_quantity, piso, serie, rin, carga_velocidad, marca, modelo, last_sync \
             FROM products WHERE sku ILIKE $1 OR name ILIKE $1 \
             ORDER BY sku NULLS LAST LIMIT $2 OFFSET $3",
        )
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let products = rows
            .into_iter()
            .map(Self::product_from_row)
            .collect::<Result<Vec<_>>>()?;

        let count_row = query("SELECT COUNT(*) AS total FROM products WHERE sku ILIKE $1 OR name ILIKE $1")
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = count_row.try_get("total")?;

        Ok((products, total))
    }

    pub async fn page(&self, limit: i64, offset: i64) -> Result<Vec<Product>> {
        let rows = query(
            "SELECT id, name, sku, total_quantity, piso, serie, rin, carga_velocidad, marca, modelo, last_sync \
             FROM products ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::product_from_row).collect()
    }

    pub async fn sku_exists(&self, sku: &str) -> Result<bool> {
        let row = query("SELECT EXISTS(SELECT 1 FROM products WHERE sku = $1) AS found")
            .bind(sku)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<bool, _>("found")?)
    }

    /// Inventory rows joined to their warehouse for a page of products.
    pub async fn inventory_with_warehouses(&self, product_ids: &[i64]) -> Result<Vec<InventoryJoinRow>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = query(
            "SELECT i.product_id, i.quantity, w.id AS warehouse_id, w.name, w.\"type\", w.zone \
             FROM inventory i JOIN warehouses w ON i.warehouse_id = w.id \
             WHERE i.product_id = ANY($1)",
        )
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(InventoryJoinRow {
                    product_id: row.try_get("product_id")?,
                    quantity: row.try_get("quantity")?,
                    warehouse: Warehouse {
                        id: row.try_get("warehouse_id")?,
                        name: row.try_get("name")?,
                        warehouse_type: row.try_get("type")?,
                        zone: row.try_get("zone")?,
                    },
                })
            })
            .collect()
    }

    pub async fn prices_for_skus(&self, skus: &[String]) -> Result<HashMap<String, Decimal>> {
        if skus.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = query("SELECT sku, price FROM product_prices WHERE sku = ANY($1)")
            .bind(skus)
            .fetch_all(&self.pool)
            .await?;

        let mut prices = HashMap::new();
        for row in rows {
            prices.insert(row.try_get("sku")?, row.try_get("price")?);
        }
        Ok(prices)
    }

    pub async fn all_prices(&self) -> Result<HashMap<String, Decimal>> {
        let rows = query("SELECT sku, price FROM product_prices")
            .fetch_all(&self.pool)
            .await?;

        let mut prices = HashMap::new();
        for row in rows {
            prices.insert(row.try_get("sku")?, row.try_get("price")?);
        }
        Ok(prices)
    }

    pub async fn upsert_price(&self, sku: &str, price: Decimal) -> Result<()> {
        let result = query(
            "INSERT INTO product_prices (sku, price, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (sku) DO UPDATE SET price = EXCLUDED.price, updated_at = EXCLUDED.updated_at",
        )
        .bind(sku)
        .bind(price)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Persistence(format!("price upsert wrote nothing for sku {}", sku)));
        }
        Ok(())
    }

    // ========================================================================
    // Plant stock (external table, read-only)
    // ========================================================================

    /// Filtered plant stock: width/diameter by substring, ratio exactly.
    pub async fn plant_stock_filtered(
        &self,
        piso: Option<&str>,
        serie: Option<&str>,
        rin: Option<&str>,
    ) -> Result<Vec<PlantStock>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT sku, description, brand, width, ratio, diameter, size, on_hand, manufacturer, warehouse, \"update\", created_at \
             FROM \"ExistenciaPlanta\" WHERE 1=1",
        );
        if let Some(piso) = piso {
            qb.push(" AND width ILIKE ");
            qb.push_bind(format!("%{}%", piso));
        }
        if let Some(serie) = serie {
            let ratio: i32 = serie
                .parse()
                .map_err(|_| AppError::BadRequest(format!("serie inválida: {}", serie)))?;
            qb.push(" AND ratio = ");
            qb.push_bind(ratio);
        }
        if let Some(rin) = rin {
            qb.push(" AND diameter ILIKE ");
            qb.push_bind(format!("%{}%", rin));
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::plant_stock_from_row).collect()
    }

    pub async fn plant_stock_by_size(&self, size: &str) -> Result<Vec<PlantStock>> {
        let rows = query(
            "SELECT sku, description, brand, width, ratio, diameter, size, on_hand, manufacturer, warehouse, \"update\", created_at \
             FROM \"ExistenciaPlanta\" WHERE size = $1",
        )
        .bind(size)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::plant_stock_from_row).collect()
    }

    fn plant_stock_from_row(row: sqlx::postgres::PgRow) -> Result<PlantStock> {
        Ok(PlantStock {
            sku: row.try_get("sku")?,
            description: row.try_get("description")?,
            brand: row.try_get("brand")?,
            width: row.try_get("width")?,
            ratio: row.try_get("ratio")?,
            diameter: row.try_get("diameter")?,
            size: row.try_get("size")?,
            on_hand: row.try_get("on_hand")?,
            manufacturer: row.try_get("manufacturer")?,
            warehouse: row.try_get("warehouse")?,
            update: row.try_get("update")?,
            created_at: row.try_get("created_at")?,
        })
    }

    // ========================================================================
    // Sync writes
    // ========================================================================

    pub async fn existing_warehouse_types(&self) -> Result<HashMap<i64, String>> {
        let rows = query("SELECT id, \"type\" FROM warehouses")
            .fetch_all(&self.pool)
            .await?;

        let mut types = HashMap::new();
        for row in rows {
            types.insert(row.try_get("id")?, row.try_get("type")?);
        }
        Ok(types)
    }

    /// Full snapshot replacement. Inventory goes first (FK on products), then
    /// products; warehouses are reconciled, never deleted; prices are upserts
    /// keyed by SKU and survive the product refresh. One transaction, so a
    /// failed run never leaves the tables empty.
    pub async fn replace_snapshot(
        &self,
        products: &[ProductInsert],
        warehouses: &[WarehouseUpsert],
        inventory: &[InventoryInsert],
        prices: &[(String, Decimal)],
    ) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        query("DELETE FROM inventory").execute(&mut *tx).await?;
        query("DELETE FROM products").execute(&mut *tx).await?;

        for wh in warehouses {
            query(
                "INSERT INTO warehouses (id, name, \"type\", zone) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, zone = EXCLUDED.zone",
            )
            .bind(wh.id)
            .bind(&wh.name)
            .bind(&wh.warehouse_type)
            .bind(wh.zone)
            .execute(&mut *tx)
            .await?;
        }

        for product in products {
            query(
                "INSERT INTO products (id, name, sku, total_quantity, piso, serie, rin, carga_velocidad, marca, modelo, last_sync) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
                 ON CONFLICT (id) DO UPDATE SET \
                     name = EXCLUDED.name, sku = EXCLUDED.sku, total_quantity = EXCLUDED.total_quantity, \
                     piso = EXCLUDED.piso, serie = EXCLUDED.serie, rin = EXCLUDED.rin, \
                     carga_velocidad = EXCLUDED.carga_velocidad, marca = EXCLUDED.marca, \
                     modelo = EXCLUDED.modelo, last_sync = EXCLUDED.last_sync",
            )
            .bind(product.id)
            .bind(&product.name)
            .bind(&product.sku)
            .bind(product.total_quantity)
            .bind(&product.piso)
            .bind(&product.serie)
            .bind(&product.rin)
            .bind(&product.carga_velocidad)
            .bind(&product.marca)
            .bind(&product.modelo)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for record in inventory {
            query(
                "INSERT INTO inventory (product_id, warehouse_id, quantity, last_updated) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (product_id, warehouse_id) DO UPDATE SET \
                     quantity = EXCLUDED.quantity, last_updated = EXCLUDED.last_updated",
            )
            .bind(record.product_id)
            .bind(record.warehouse_id)
            .bind(record.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for (sku, price) in prices {
            query(
                "INSERT INTO product_prices (sku, price, updated_at) VALUES ($1, $2, $3) \
                 ON CONFLICT (sku) DO UPDATE SET price = EXCLUDED.price, updated_at = EXCLUDED.updated_at",
            )
            .bind(sku)
            .bind(price)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // serie filters exactly, piso/rin by substring
    #[test]
    fn test_size_filter_sql_shape() {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM products WHERE 1=1");
        ProductRepository::push_size_filters(&mut qb, Some("165"), Some("70"), Some("13"));
        let sql = qb.into_sql();

        assert!(sql.contains("piso ILIKE"));
        assert!(sql.contains("serie ="));
        assert!(sql.contains("rin ILIKE"));
        assert!(!sql.contains("serie ILIKE"));
    }

    #[test]
    fn test_spec_filters_absent_when_not_given() {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM products WHERE 1=1");
        ProductRepository::push_size_filters(&mut qb, None, None, None);
        assert_eq!(qb.into_sql(), "SELECT * FROM products WHERE 1=1");
    }
}
