use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;
use crate::config::AppConfig;
use crate::models::user::UserRole;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub user_id: Uuid,
    pub role: UserRole,
    pub parent_partner_id: Option<Uuid>,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Sistemas)
    }
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    pub fn generate_token(
        &self,
        user_id: Uuid,
        role: UserRole,
        parent_partner_id: Option<Uuid>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as usize;

        let claims = Claims {
            sub: user_id.to_string(),
            user_id,
            role,
            parent_partner_id,
            exp: now + 24 * 60 * 60,
            iat: now,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
    }

    pub fn extract_token_from_header(auth_header: &str) -> Option<&str> {
        if auth_header.starts_with("Bearer ") {
            Some(&auth_header[7..])
        } else {
            None
        }
    }
}

pub async fn auth_middleware(
    State(config): State<AppConfig>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let jwt_service = JwtService::new(&config.jwt_secret);

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(JwtService::extract_token_from_header);

    if let Some(token) = token {
        match jwt_service.validate_token(token) {
            Ok(claims) => {
                request.extensions_mut().insert(claims);
                return Ok(next.run(request).await);
            }
            Err(_) => return Err(StatusCode::UNAUTHORIZED),
        }
    }

    Err(StatusCode::UNAUTHORIZED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let service = JwtService::new("test-secret");
        let user_id = Uuid::new_v4();
        let token = service
            .generate_token(user_id, UserRole::Vendedor, None)
            .unwrap();

        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, UserRole::Vendedor);
        assert!(claims.parent_partner_id.is_none());
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(
            JwtService::extract_token_from_header("Bearer abc123"),
            Some("abc123")
        );
        assert_eq!(JwtService::extract_token_from_header("Basic abc123"), None);
    }

    #[test]
    fn test_admin_check_covers_sistemas() {
        let service = JwtService::new("test-secret");
        let token = service
            .generate_token(Uuid::new_v4(), UserRole::Sistemas, None)
            .unwrap();
        let claims = service.validate_token(&token).unwrap();
        assert!(claims.is_admin());
    }
}
