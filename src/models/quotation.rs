use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;
use crate::models::user::UserPublic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstadoCotizacion {
    Nueva,
    Vista,
    Aceptada,
    Rechazada,
    EnProceso,
    Pagada,
    Cerrada,
    Cancelada,
}

impl EstadoCotizacion {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstadoCotizacion::Nueva => "nueva",
            EstadoCotizacion::Vista => "vista",
            EstadoCotizacion::Aceptada => "aceptada",
            EstadoCotizacion::Rechazada => "rechazada",
            EstadoCotizacion::EnProceso => "en_proceso",
            EstadoCotizacion::Pagada => "pagada",
            EstadoCotizacion::Cerrada => "cerrada",
            EstadoCotizacion::Cancelada => "cancelada",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cotizacion {
    pub id: Uuid,
    pub cliente_id: Option<Uuid>,
    pub partner_id: Option<Uuid>,
    pub usuario_id: Uuid,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub observaciones: Option<String>,
    pub estado: String,
    pub fecha: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DetalleCotizacion {
    pub id: Uuid,
    pub cotizacion_id: Uuid,
    // SKU of the quoted product
    pub codigo: String,
    pub precio_unitario: Decimal,
    pub cantidad: i32,
    pub total: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetalleConProducto {
    #[serde(flatten)]
    pub detalle: DetalleCotizacion,
    pub producto: Option<ProductoResumen>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductoResumen {
    pub sku: Option<String>,
    pub name: String,
    pub marca: Option<String>,
    pub modelo: Option<String>,
    pub piso: Option<String>,
    pub serie: Option<String>,
    pub rin: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CotizacionCompleta {
    #[serde(flatten)]
    pub cotizacion: Cotizacion,
    pub detalle_cotizacion: Vec<DetalleConProducto>,
    pub cliente: Option<UserPublic>,
    pub partner: Option<UserPublic>,
    pub usuario: Option<UserPublic>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DetalleCreateRequest {
    #[validate(length(min = 1, max = 50, message = "SKU required"))]
    pub codigo: String,
    #[validate(range(min = 0.01, message = "Price must be positive"))]
    pub precio_unitario: f64,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub cantidad: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCotizacionRequest {
    pub cliente_id: Option<Uuid>,
    #[validate(length(max = 500, message = "Observations too long"))]
    pub observaciones: Option<String>,
    pub estado: Option<EstadoCotizacion>,
    pub subtotal: Option<f64>,
    pub total: Option<f64>,
    #[validate(nested)]
    pub detalles: Vec<DetalleCreateRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCotizacionRequest {
    pub estado: Option<EstadoCotizacion>,
    #[validate(length(max = 500, message = "Observations too long"))]
    pub observaciones: Option<String>,
    pub cliente_id: Option<Uuid>,
    pub subtotal: Option<f64>,
    pub total: Option<f64>,
    #[validate(nested)]
    pub detalles: Option<Vec<DetalleCreateRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct CotizacionListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub estado: Option<String>,
    pub cliente_id: Option<Uuid>,
}
