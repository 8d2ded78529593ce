use uuid::Uuid;
use serde::Serialize;

use crate::middleware::error_handling::{AppError, Result};
use crate::middleware::JwtService;
use crate::models::user::{CreateUserRequest, Token, User, UserRole};
use crate::repositories::{LogRepository, UserRepository};

const BCRYPT_COST: u32 = 12;
const CODIGO_SEED: i64 = 450_000;

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: Uuid,
    pub codigo_usuario: Option<String>,
    pub message: &'static str,
}

pub struct AuthService {
    user_repo: UserRepository,
    log_repo: LogRepository,
    jwt_service: JwtService,
}

impl AuthService {
    pub fn new(user_repo: UserRepository, log_repo: LogRepository, jwt_secret: &str) -> Self {
        Self {
            user_repo,
            log_repo,
            jwt_service: JwtService::new(jwt_secret),
        }
    }

    pub async fn register(&self, request: CreateUserRequest) -> Result<RegisterResponse> {
        if self.user_repo.find_by_email(&request.correo).await?.is_some() {
            return Err(AppError::BadRequest("Email already registered".to_string()));
        }

        // Resolve the parent code to a partner id when one was sent
        let parent_partner_id = match &request.codigo_usuario {
            Some(codigo) => {
                let parent = self
                    .user_repo
                    .find_by_codigo(codigo)
                    .await?
                    .ok_or_else(|| {
                        AppError::BadRequest("Código usuario padre no válido".to_string())
                    })?;
                Some(parent.id)
            }
            None => None,
        };

        let password_hash = bcrypt::hash(&request.contrasena, BCRYPT_COST)?;
        let codigo = self.generate_codigo(&request.nombre).await?;
        let rol = request.rol.unwrap_or(UserRole::Cliente);

        let user = self
            .user_repo
            .create(
                &request.correo,
                &password_hash,
                &request.nombre,
                request.empresa.as_deref(),
                rol,
                parent_partner_id,
                &codigo,
            )
            .await?;

        tracing::info!(
            "✅ User registered with ID: {} and codigo_usuario: {:?}",
            user.id,
            user.codigo_usuario
        );

        Ok(RegisterResponse {
            id: user.id,
            codigo_usuario: user.codigo_usuario,
            message: "User registered successfully",
        })
    }

    /// `X-NNNNNN` user code: first letter of the name, numeric suffix
    /// continuing from the highest existing code with that letter.
    async fn generate_codigo(&self, nombre: &str) -> Result<String> {
        let letter = nombre
            .trim()
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .ok_or_else(|| AppError::BadRequest("Nombre vacío".to_string()))?;

        let next_number = match self.user_repo.latest_codigo_for_letter(letter).await? {
            Some(codigo) => codigo
                .split('-')
                .nth(1)
                .and_then(|suffix| suffix.parse::<i64>().ok())
                .map(|n| n + 1)
                .unwrap_or(CODIGO_SEED),
            None => CODIGO_SEED,
        };

        Ok(format!("{}-{}", letter, next_number))
    }

    pub async fn authenticate(&self, correo: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.user_repo.find_by_email(correo).await? else {
            tracing::warn!("User not found: {}", correo);
            return Ok(None);
        };

        if !bcrypt::verify(password, &user.contrasena)? {
            tracing::warn!("Invalid password for user: {}", correo);
            return Ok(None);
        }

        Ok(Some(user))
    }

    pub async fn login(&self, correo: &str, password: &str, ip: &str) -> Result<Token> {
        let user = self
            .authenticate(correo, password)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let role = user.role();
        let token = self
            .jwt_service
            .generate_token(user.id, role, user.parent_partner_id)?;

        self.log_repo
            .insert_sesion(user.id, user.parent_partner_id, ip)
            .await?;

        Ok(Token {
            access_token: token,
            token_type: "bearer".to_string(),
            role: role.as_str().to_string(),
            user_id: user.id.to_string(),
        })
    }
}
