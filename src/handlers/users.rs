use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    config::AppConfig,
    middleware::{error_handling::{AppError, Result}, Claims},
    models::user::{ChangePasswordRequest, UpdateUserRequest, UserPublic},
    repositories::UserRepository,
};

pub async fn read_me(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserPublic>> {
    let repo = UserRepository::new(config.database_pool.clone());
    let user = repo
        .find_by_id(claims.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Usuario no encontrado".to_string()))?;

    Ok(Json(user.into()))
}

pub async fn update_me(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserPublic>> {
    request.validate()?;

    let repo = UserRepository::new(config.database_pool.clone());
    let user = repo
        .update(
            claims.user_id,
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

/// Own password for anyone; other users' passwords only for admin/sistemas.
pub async fn change_password(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<Value>> {
    request.validate()?;

    let repo = UserRepository::new(config.database_pool.clone());
    let target_user_id = request.user_id.unwrap_or(claims.user_id);

    if target_user_id != claims.user_id {
        if !claims.is_admin() {
            return Err(AppError::Forbidden(
                "Admin privileges required to change other users' passwords".to_string(),
            ));
        }
        if repo.find_by_id(target_user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }
    }

    let password_hash = bcrypt::hash(&request.new_password, 12)?;
    repo.update_password(target_user_id, &password_hash).await?;

    let message = if target_user_id == claims.user_id {
        "Your password has been updated successfully".to_string()
    } else {
        let correo = repo
            .find_by_id(target_user_id)
            .await?
            .map(|u| u.correo)
            .unwrap_or_else(|| "the user".to_string());
        format!("Password for user {} has been updated successfully", correo)
    };

    Ok(Json(json!({ "message": message })))
}

pub async fn logout() -> Json<Value> {
    Json(json!({ "message": "Logged out successfully" }))
}
