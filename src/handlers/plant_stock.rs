use axum::{extract::{Query, State}, Json};

use crate::{
    config::AppConfig,
    middleware::error_handling::Result,
    models::product::{PlantStock, PlantStockQuery},
    repositories::ProductRepository,
};

/// Plant stock lookup by exact tire size, e.g. `165/70R13`.
pub async fn search_by_size(
    State(config): State<AppConfig>,
    Query(query): Query<PlantStockQuery>,
) -> Result<Json<Vec<PlantStock>>> {
    let size = format!("{}/{}R{}", query.width, query.ratio, query.diameter);

    let repo = ProductRepository::new(config.database_pool.clone());
    let rows = repo.plant_stock_by_size(&size).await?;
    Ok(Json(rows))
}
