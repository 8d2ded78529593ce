use sqlx::{query, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::denied_tire::LlantaNegada;

pub struct LogRepository {
    pool: PgPool,
}

impl LogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_sesion(
        &self,
        usuario_id: Uuid,
        partner_id: Option<Uuid>,
        ip: &str,
    ) -> Result<()> {
        let result = query("INSERT INTO log_sesiones (usuario_id, partner_id, ip) VALUES ($1, $2, $3)")
            .bind(usuario_id)
            .bind(partner_id)
            .bind(ip)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Persistence("log_sesiones insert wrote nothing".to_string()));
        }
        Ok(())
    }

    pub async fn insert_busqueda(
        &self,
        usuario_id: Uuid,
        partner_id: Option<Uuid>,
        piso: Option<&str>,
        serie: Option<&str>,
        rin: Option<&str>,
        medidas: Option<&str>,
    ) -> Result<()> {
        let result = query(
            "INSERT INTO log_busquedas (usuario_id, partner_id, piso, serie, rin, medidas) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(usuario_id)
        .bind(partner_id)
        .bind(piso)
        .bind(serie)
        .bind(rin)
        .bind(medidas)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Persistence("log_busquedas insert wrote nothing".to_string()));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_llanta_negada(
        &self,
        usuario_id: Uuid,
        partner_id: Option<Uuid>,
        codigo: Option<&str>,
        piso: Option<&str>,
        serie: Option<&str>,
        rin: Option<&str>,
        modelo: Option<&str>,
        medidas: Option<&str>,
        cantidad: i32,
        tipo: &str,
        marca: Option<&str>,
    ) -> Result<LlantaNegada> {
        let row = query(
            "INSERT INTO llantas_negadas \
                 (usuario_id, partner_id, codigo, piso, serie, rin, modelo, medidas, cantidad, tipo, marca) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING id, usuario_id, partner_id, codigo, piso, serie, rin, modelo, medidas, cantidad, tipo, marca, fecha",
        )
        .bind(usuario_id)
        .bind(partner_id)
        .bind(codigo)
        .bind(piso)
        .bind(serie)
        .bind(rin)
        .bind(modelo)
        .bind(medidas)
        .bind(cantidad)
        .bind(tipo)
        .bind(marca)
        .fetch_one(&self.pool)
        .await?;

        Self::llanta_from_row(row)
    }

    fn llanta_from_row(row: sqlx::postgres::PgRow) -> Result<LlantaNegada> {
        Ok(LlantaNegada {
            id: row.try_get("id")?,
            usuario_id: row.try_get("usuario_id")?,
            partner_id: row.try_get("partner_id")?,
            codigo: row.try_get("codigo")?,
            piso: row.try_get("piso")?,
            serie: row.try_get("serie")?,
            rin: row.try_get("rin")?,
            modelo: row.try_get("modelo")?,
            medidas: row.try_get("medidas")?,
            cantidad: row.try_get("cantidad")?,
            tipo: row.try_get("tipo")?,
            marca: row.try_get("marca")?,
            fecha: row.try_get("fecha")?,
        })
    }

    /// Denied-tire history, newest first. Non-admin callers are scoped to
    /// their own rows or their partner's.
    pub async fn list_llantas_negadas(
        &self,
        scope_usuario: Option<Uuid>,
        scope_partner: Option<Uuid>,
        fecha_inicio: Option<&str>,
        fecha_fin: Option<&str>,
        limit: i64,
    ) -> Result<Vec<LlantaNegada>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, usuario_id, partner_id, codigo, piso, serie, rin, modelo, medidas, cantidad, tipo, marca, fecha \
             FROM llantas_negadas WHERE 1=1",
        );

        match (scope_usuario, scope_partner) {
            (Some(usuario_id), Some(partner_id)) => {
                qb.push(" AND (usuario_id = ");
                qb.push_bind(usuario_id);
                qb.push(" OR partner_id = ");
                qb.push_bind(partner_id);
                qb.push(")");
            }
            (Some(usuario_id), None) => {
                qb.push(" AND usuario_id = ");
                qb.push_bind(usuario_id);
            }
            _ => {}
        }

        if let Some(inicio) = fecha_inicio {
            qb.push(" AND fecha >= ");
            qb.push_bind(format!("{}T00:00:00", inicio));
            qb.push("::timestamptz");
        }
        if let Some(fin) = fecha_fin {
            qb.push(" AND fecha <= ");
            qb.push_bind(format!("{}T23:59:59", fin));
            qb.push("::timestamptz");
        }

        qb.push(" ORDER BY fecha DESC LIMIT ");
        qb.push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::llanta_from_row).collect()
    }
}
