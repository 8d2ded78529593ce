use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Where a denied-tire record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoRegistro {
    Busqueda,
    Tabla,
    Manual,
}

impl TipoRegistro {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipoRegistro::Busqueda => "busqueda",
            TipoRegistro::Tabla => "tabla",
            TipoRegistro::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LlantaNegada {
    pub id: Uuid,
    pub usuario_id: Uuid,
    pub partner_id: Option<Uuid>,
    pub codigo: Option<String>,
    pub piso: Option<String>,
    pub serie: Option<String>,
    pub rin: Option<String>,
    pub modelo: Option<String>,
    pub medidas: Option<String>,
    pub cantidad: i32,
    pub tipo: String,
    pub marca: Option<String>,
    pub fecha: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLlantaNegadaRequest {
    #[validate(length(max = 50))]
    pub sku: Option<String>,
    #[validate(length(max = 20))]
    pub piso: Option<String>,
    #[validate(length(max = 20))]
    pub serie: Option<String>,
    #[validate(length(max = 20))]
    pub rin: Option<String>,
    #[validate(length(max = 100))]
    pub modelo: Option<String>,
    #[validate(length(max = 50))]
    pub medidas: Option<String>,
    pub cantidad: Option<i32>,
    pub tipo: TipoRegistro,
    #[validate(length(max = 50))]
    pub marca: Option<String>,
}

impl CreateLlantaNegadaRequest {
    /// Derive `medidas` as `{piso}/{serie}R{rin}` when not provided.
    pub fn medidas_or_derived(&self) -> Option<String> {
        if self.medidas.is_some() {
            return self.medidas.clone();
        }
        match (&self.piso, &self.serie, &self.rin) {
            (Some(p), Some(s), Some(r)) => Some(format!("{}/{}R{}", p, s, r)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LlantaNegadaQuery {
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_medidas_derivation() {
        let req = CreateLlantaNegadaRequest {
            sku: None,
            piso: Some("165".into()),
            serie: Some("70".into()),
            rin: Some("13".into()),
            modelo: None,
            medidas: None,
            cantidad: None,
            tipo: TipoRegistro::Busqueda,
            marca: None,
        };
        assert_eq!(req.medidas_or_derived().as_deref(), Some("165/70R13"));
    }

    #[test]
    fn test_medidas_passthrough_and_missing_parts() {
        let mut req = CreateLlantaNegadaRequest {
            sku: None,
            piso: Some("165".into()),
            serie: None,
            rin: Some("13".into()),
            modelo: None,
            medidas: None,
            cantidad: None,
            tipo: TipoRegistro::Manual,
            marca: None,
        };
        assert_eq!(req.medidas_or_derived(), None);

        req.medidas = Some("205/55R16".into());
        assert_eq!(req.medidas_or_derived().as_deref(), Some("205/55R16"));
    }
}
