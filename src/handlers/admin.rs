use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AppConfig,
    middleware::{error_handling::{AppError, Result}, Claims},
    models::report::{PaginatedResponse, Pagination},
    models::user::{UpdateUserRequest, UserListQuery, UserPublic, UserRole},
    repositories::UserRepository,
};

/// User listing for back-office roles. Vendedores only see users hanging
/// from their own partner id, with the filters applied in memory.
pub async fn list_users(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<PaginatedResponse<UserPublic>>> {
    let allowed = matches!(
        claims.role,
        UserRole::Admin | UserRole::Sistemas | UserRole::Precios | UserRole::Vendedor
    );
    if !allowed {
        return Err(AppError::Forbidden(
            "Requiere privilegios de administrador o sistemas".to_string(),
        ));
    }

    let repo = UserRepository::new(config.database_pool.clone());
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);

    let users: Vec<UserPublic> = if claims.role == UserRole::Vendedor {
        repo.find_by_partner(claims.user_id)
            .await?
            .into_iter()
            .map(UserPublic::from)
            .filter(|u| {
                query
                    .role
                    .map(|role| u.rol == role.as_str())
                    .unwrap_or(true)
            })
            .filter(|u| {
                query
                    .company
                    .as_deref()
                    .map(|c| {
                        u.empresa
                            .as_deref()
                            .map(|e| e.to_lowercase().contains(&c.to_lowercase()))
                            .unwrap_or(false)
                    })
                    .unwrap_or(true)
            })
            .filter(|u| {
                query
                    .search
                    .as_deref()
                    .map(|s| {
                        let s = s.to_lowercase();
                        u.nombre.to_lowercase().contains(&s) || u.correo.to_lowercase().contains(&s)
                    })
                    .unwrap_or(true)
            })
            .filter(|u| query.validated.map(|v| u.validado == v).unwrap_or(true))
            .collect()
    } else {
        repo.list(
            query.role,
            query.company.as_deref(),
            query.search.as_deref(),
            query.validated,
        )
        .await?
    };

    let total = users.len() as i64;
    let start = ((page - 1) * per_page) as usize;
    let data: Vec<UserPublic> = users
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .collect();

    Ok(Json(PaginatedResponse {
        data,
        pagination: Pagination::new(total, page, per_page),
    }))
}

pub async fn user_by_code(
    State(config): State<AppConfig>,
    Extension(_claims): Extension<Claims>,
    Path(user_code): Path<String>,
) -> Result<Json<UserPublic>> {
    let repo = UserRepository::new(config.database_pool.clone());
    let user = repo
        .find_by_codigo(&user_code)
        .await?
        .ok_or_else(|| AppError::NotFound("Usuario no encontrado".to_string()))?;

    Ok(Json(user.into()))
}

pub async fn get_user(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserPublic>> {
    if !claims.is_admin() {
        return Err(AppError::Forbidden("Admin privileges required".to_string()));
    }

    let repo = UserRepository::new(config.database_pool.clone());
    let user = repo
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}

pub async fn update_user(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserPublic>> {
    if !claims.is_admin() {
        return Err(AppError::Forbidden("Admin privileges required".to_string()));
    }
    request.validate()?;

    let repo = UserRepository::new(config.database_pool.clone());
    let user = repo
        .update(
            user_id,
            request.nombre.as_deref(),
            request.empresa.as_deref(),
            request.rol,
            request.parent_partner_id,
            request.validado,
            request.telefono.as_deref(),
            request.direccion.as_deref(),
        )
        .await?;

    Ok(Json(user.into()))
}

pub async fn delete_user(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> Result<axum::http::StatusCode> {
    if !claims.is_admin() {
        return Err(AppError::Forbidden("Admin privileges required".to_string()));
    }

    let repo = UserRepository::new(config.database_pool.clone());
    repo.delete(user_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
