use axum::{extract::{Query, State}, Extension, Json};
use validator::Validate;

use crate::{
    config::AppConfig,
    middleware::{error_handling::Result, Claims},
    models::denied_tire::{CreateLlantaNegadaRequest, LlantaNegada, LlantaNegadaQuery},
    repositories::LogRepository,
};

/// Record a tire the caller could not sell (no stock, no price, ...).
pub async fn create_denied_tire(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateLlantaNegadaRequest>,
) -> Result<Json<LlantaNegada>> {
    request.validate()?;

    let medidas = request.medidas_or_derived();
    let repo = LogRepository::new(config.database_pool.clone());

    let registro = repo
        .insert_llanta_negada(
            claims.user_id,
            claims.parent_partner_id,
            request.sku.as_deref(),
            request.piso.as_deref(),
            request.serie.as_deref(),
            request.rin.as_deref(),
            request.modelo.as_deref(),
            medidas.as_deref(),
            request.cantidad.unwrap_or(1),
            request.tipo.as_str(),
            request.marca.as_deref(),
        )
        .await?;

    Ok(Json(registro))
}

/// Denied-tire history, optionally date-bounded. Non-admins only see their
/// own rows (or their partner's).
pub async fn list_denied_tires(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<LlantaNegadaQuery>,
) -> Result<Json<Vec<LlantaNegada>>> {
    let repo = LogRepository::new(config.database_pool.clone());

    let (scope_usuario, scope_partner) = if claims.is_admin() {
        (None, None)
    } else {
        (Some(claims.user_id), claims.parent_partner_id)
    };

    let rows = repo
        .list_llantas_negadas(
            scope_usuario,
            scope_partner,
            query.fecha_inicio.as_deref(),
            query.fecha_fin.as_deref(),
            query.limit.unwrap_or(100).clamp(1, 1000),
        )
        .await?;

    Ok(Json(rows))
}
