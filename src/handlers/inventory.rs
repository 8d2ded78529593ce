use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::Response,
    Extension, Json,
};
use chrono::Utc;
use futures::stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;

use crate::{
    config::AppConfig,
    middleware::{error_handling::{AppError, Result}, Claims},
    models::report::{ReportQuery, ReportResponse},
    repositories::{LogRepository, ProductRepository},
    services::{
        odoo::{AttributeService, InventoryService, OdooClient, PriceService, ProductAggregate},
        ReportService, SyncService,
    },
};

/// Full-replace sync against the ERP. Also fired by the daily scheduler;
/// both paths share the single-flight guard inside SyncService.
pub async fn sync_inventory(State(config): State<AppConfig>) -> Result<Json<Value>> {
    let sync = SyncService::new(&config)?;
    let details = sync.run().await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Inventario sincronizado",
        "details": details
    })))
}

/// Zone/warehouse report over the persisted snapshot plus plant stock.
pub async fn report_zones(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportResponse>> {
    // Search logging must never break the report
    let log_repo = LogRepository::new(config.database_pool.clone());
    let medidas = match (&query.piso, &query.serie, &query.rin) {
        (Some(p), Some(s), Some(r)) => Some(format!("{}/{}R{}", p, s, r)),
        _ => None,
    };
    if let Err(e) = log_repo
        .insert_busqueda(
            claims.user_id,
            claims.parent_partner_id,
            query.piso.as_deref(),
            query.serie.as_deref(),
            query.rin.as_deref(),
            medidas.as_deref(),
        )
        .await
    {
        tracing::error!("Error registrando búsqueda: {}", e);
    }

    let service = ReportService::new(ProductRepository::new(config.database_pool.clone()));
    let report = service.build(&query).await?;
    Ok(Json(report))
}

/// CSV export of the whole snapshot: one header chunk, then one chunk per
/// product row.
pub async fn export_csv(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
) -> Result<Response> {
    tracing::info!("Iniciando exportación CSV para usuario {}", claims.user_id);

    let service = ReportService::new(ProductRepository::new(config.database_pool.clone()));
    let lines = service.export_csv_lines().await?;

    let filename = format!("inventario_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));
    let body = Body::from_stream(stream::iter(
        lines.into_iter().map(Ok::<_, Infallible>),
    ));

    Response::builder()
        .header(header::CONTENT_TYPE, "text/csv")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", filename),
        )
        .body(body)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV response build failed: {}", e)))
}

#[derive(Debug, Deserialize)]
pub struct EnrichRequest {
    pub product_ids: Vec<i64>,
}

/// On-demand price enrichment for a set of product ids.
pub async fn enrich_products(
    State(config): State<AppConfig>,
    Json(request): Json<EnrichRequest>,
) -> Result<Json<Value>> {
    if request.product_ids.is_empty() {
        return Err(AppError::BadRequest("Faltan product_ids".to_string()));
    }

    let odoo = OdooClient::new(config.odoo.clone())?;
    let prices = PriceService::new(odoo);

    let template_map = prices.template_map(&request.product_ids).await;
    let mut template_ids: Vec<i64> = template_map.values().copied().collect();
    template_ids.sort_unstable();
    template_ids.dedup();
    let price_map = prices.get_prices(&template_ids).await;

    let mut response = serde_json::Map::new();
    for pid in &request.product_ids {
        let price = template_map
            .get(pid)
            .and_then(|template_id| price_map.get(template_id))
            .cloned()
            .unwrap_or_else(|| "N/A".to_string());
        response.insert(pid.to_string(), json!({ "price": price }));
    }

    Ok(Json(Value::Object(response)))
}

#[derive(Debug, Deserialize)]
pub struct InventorySearchQuery {
    pub piso: Option<String>,
    pub serie: Option<String>,
    pub rin: Option<String>,
}

/// Live inventory search straight against the ERP, aggregated by
/// zone/warehouse with prices attached.
pub async fn search_inventory(
    State(config): State<AppConfig>,
    Extension(_claims): Extension<Claims>,
    Query(query): Query<InventorySearchQuery>,
) -> Result<Json<Vec<ProductAggregate>>> {
    let odoo = OdooClient::new(config.odoo.clone())?;
    let inventory = InventoryService::new(odoo.clone());
    let prices = PriceService::new(odoo.clone());
    let attributes = AttributeService::new(odoo);

    let results = inventory
        .search_inventory(
            query.piso.as_deref(),
            query.serie.as_deref(),
            query.rin.as_deref(),
            &prices,
            &attributes,
        )
        .await?;

    Ok(Json(results))
}
