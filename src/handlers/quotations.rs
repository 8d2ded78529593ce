use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AppConfig,
    middleware::{error_handling::Result, Claims},
    models::quotation::{
        CotizacionCompleta, CotizacionListQuery, CreateCotizacionRequest, UpdateCotizacionRequest,
    },
    models::report::PaginatedResponse,
    models::user::{UserPublic, UserRole},
    repositories::{ProductRepository, QuotationRepository, UserRepository},
    services::QuotationService,
};

fn quotation_service(config: &AppConfig) -> QuotationService {
    QuotationService::new(
        QuotationRepository::new(config.database_pool.clone()),
        ProductRepository::new(config.database_pool.clone()),
    )
}

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub search: Option<String>,
    pub role: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// User lookup for the quotation screens. Vendedores only see users under
/// their own id.
pub async fn search_users(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<Value>> {
    let repo = UserRepository::new(config.database_pool.clone());
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);

    let partner_scope = if claims.role == UserRole::Vendedor {
        Some(claims.user_id)
    } else {
        None
    };

    let users: Vec<UserPublic> = repo
        .search(
            query.search.as_deref(),
            query.role.as_deref(),
            partner_scope,
            per_page,
            (page - 1) * per_page,
        )
        .await?;

    Ok(Json(json!({
        "data": users,
        "pagination": {
            "page": page,
            "per_page": per_page,
            "total": users.len()
        }
    })))
}

#[derive(Debug, Deserialize)]
pub struct ProductSearchParams {
    pub search: String,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Product lookup by SKU or name, with the stored price joined in.
pub async fn search_products(
    State(config): State<AppConfig>,
    Extension(_claims): Extension<Claims>,
    Query(query): Query<ProductSearchParams>,
) -> Result<Json<Value>> {
    let repo = ProductRepository::new(config.database_pool.clone());
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 500);

    let (products, total) = repo
        .search(&query.search, per_page, (page - 1) * per_page)
        .await?;

    let skus: Vec<String> = products.iter().filter_map(|p| p.sku.clone()).collect();
    let prices = repo.prices_for_skus(&skus).await?;

    let data: Vec<Value> = products
        .into_iter()
        .map(|product| {
            let price = product
                .sku
                .as_ref()
                .and_then(|sku| prices.get(sku))
                .copied();
            let mut value = serde_json::to_value(&product).unwrap_or(Value::Null);
            if let Value::Object(ref mut map) = value {
                map.insert("price".to_string(), json!(price));
            }
            value
        })
        .collect();

    Ok(Json(json!({
        "data": data,
        "pagination": {
            "total_items": total,
            "current_page": page,
            "per_page": per_page,
            "total_pages": (total + per_page - 1) / per_page
        }
    })))
}

pub async fn create_quotation(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateCotizacionRequest>,
) -> Result<Json<CotizacionCompleta>> {
    request.validate()?;
    let cotizacion = quotation_service(&config).create(&claims, request).await?;
    Ok(Json(cotizacion))
}

pub async fn list_quotations(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<CotizacionListQuery>,
) -> Result<Json<PaginatedResponse<CotizacionCompleta>>> {
    let response = quotation_service(&config).list(&claims, &query).await?;
    Ok(Json(response))
}

pub async fn get_quotation(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<CotizacionCompleta>> {
    let cotizacion = quotation_service(&config).get(&claims, id).await?;
    Ok(Json(cotizacion))
}

pub async fn update_quotation(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCotizacionRequest>,
) -> Result<Json<CotizacionCompleta>> {
    request.validate()?;
    let cotizacion = quotation_service(&config).update(&claims, id, request).await?;
    Ok(Json(cotizacion))
}

pub async fn delete_quotation(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode> {
    quotation_service(&config).delete(&claims, id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
