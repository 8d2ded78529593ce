use axum::{
    extract::{ConnectInfo, State},
    Form, Json,
};
use std::net::SocketAddr;
use validator::Validate;

use crate::{
    config::AppConfig,
    middleware::error_handling::Result,
    models::user::{CreateUserRequest, LoginRequest, Token},
    repositories::{LogRepository, UserRepository},
    services::AuthService,
};

fn auth_service(config: &AppConfig) -> AuthService {
    AuthService::new(
        UserRepository::new(config.database_pool.clone()),
        LogRepository::new(config.database_pool.clone()),
        &config.jwt_secret,
    )
}

pub async fn register(
    State(config): State<AppConfig>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<crate::services::auth_service::RegisterResponse>> {
    tracing::info!("🔥 Data received on /auth/register for: {}", request.correo);
    request.validate()?;

    let response = auth_service(&config).register(request).await?;
    Ok(Json(response))
}

/// OAuth2-style form login: `username` carries the email.
pub async fn login(
    State(config): State<AppConfig>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(request): Form<LoginRequest>,
) -> Result<Json<Token>> {
    request.validate()?;

    let token = auth_service(&config)
        .login(&request.username, &request.password, &addr.ip().to_string())
        .await?;

    Ok(Json(token))
}
