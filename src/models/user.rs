use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Partner,
    Cliente,
    Sistemas,
    Precios,
    Vendedor,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Partner => "partner",
            UserRole::Cliente => "cliente",
            UserRole::Sistemas => "sistemas",
            UserRole::Precios => "precios",
            UserRole::Vendedor => "vendedor",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "partner" => Ok(UserRole::Partner),
            "cliente" => Ok(UserRole::Cliente),
            "sistemas" => Ok(UserRole::Sistemas),
            "precios" => Ok(UserRole::Precios),
            "vendedor" => Ok(UserRole::Vendedor),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub correo: String,
    #[serde(skip_serializing)]
    pub contrasena: String,
    pub nombre: String,
    pub empresa: Option<String>,
    pub rol: String,
    pub parent_partner_id: Option<Uuid>,
    pub validado: bool,
    pub codigo_usuario: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub creado_en: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> UserRole {
        self.rol.parse().unwrap_or(UserRole::Cliente)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub correo: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub contrasena: String,
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub nombre: String,
    #[validate(length(max = 100, message = "Company name too long"))]
    pub empresa: Option<String>,
    pub rol: Option<UserRole>,
    // Parent user code, resolved to parent_partner_id on registration
    pub codigo_usuario: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub role: String,
    pub user_id: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct UserPublic {
    pub id: Uuid,
    pub correo: String,
    pub nombre: String,
    pub empresa: Option<String>,
    pub rol: String,
    pub parent_partner_id: Option<Uuid>,
    pub validado: bool,
    pub codigo_usuario: Option<String>,
    pub codigo_partner: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub creado_en: DateTime<Utc>,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            correo: user.correo,
            nombre: user.nombre,
            empresa: user.empresa,
            rol: user.rol,
            parent_partner_id: user.parent_partner_id,
            validado: user.validado,
            codigo_usuario: user.codigo_usuario,
            codigo_partner: None,
            telefono: user.telefono,
            direccion: user.direccion,
            creado_en: user.creado_en,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub nombre: Option<String>,
    #[validate(length(max = 100, message = "Company name too long"))]
    pub empresa: Option<String>,
    pub rol: Option<UserRole>,
    pub parent_partner_id: Option<Uuid>,
    pub validado: Option<bool>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    // Absent => the caller changes their own password
    pub user_id: Option<Uuid>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub role: Option<UserRole>,
    pub company: Option<String>,
    pub search: Option<String>,
    pub validated: Option<bool>,
}
