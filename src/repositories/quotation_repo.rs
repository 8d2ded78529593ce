use std::collections::HashMap;
use rust_decimal::Decimal;
use sqlx::{query, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::quotation::{
    Cotizacion, CotizacionCompleta, DetalleConProducto, DetalleCotizacion, ProductoResumen,
};
use crate::models::user::{User, UserPublic};

/// Role-derived visibility for quotation queries. `None` fields put no
/// constraint; admin/sistemas pass an all-None scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct CotizacionScope {
    pub partner_id: Option<Uuid>,
    pub usuario_id: Option<Uuid>,
    pub cliente_id: Option<Uuid>,
}

pub struct QuotationRepository {
    pool: PgPool,
}

const COTIZACION_COLUMNS: &str =
    "id, cliente_id, partner_id, usuario_id, subtotal, total, observaciones, estado, fecha";

impl QuotationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn cotizacion_from_row(row: sqlx::postgres::PgRow) -> Result<Cotizacion> {
        Ok(Cotizacion {
            id: row.try_get("id")?,
            cliente_id: row.try_get("cliente_id")?,
            partner_id: row.try_get("partner_id")?,
            usuario_id: row.try_get("usuario_id")?,
            subtotal: row.try_get("subtotal")?,
            total: row.try_get("total")?,
            observaciones: row.try_get("observaciones")?,
            estado: row.try_get("estado")?,
            fecha: row.try_get("fecha")?,
        })
    }

    pub async fn create(
        &self,
        cliente_id: Option<Uuid>,
        partner_id: Option<Uuid>,
        usuario_id: Uuid,
        subtotal: Decimal,
        total: Decimal,
        observaciones: Option<&str>,
        estado: &str,
    ) -> Result<Cotizacion> {
        let row = query(&format!(
            "INSERT INTO cotizaciones (cliente_id, partner_id, usuario_id, subtotal, total, observaciones, estado) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            COTIZACION_COLUMNS
        ))
        .bind(cliente_id)
        .bind(partner_id)
        .bind(usuario_id)
        .bind(subtotal)
        .bind(total)
        .bind(observaciones)
        .bind(estado)
        .fetch_one(&self.pool)
        .await?;

        Self::cotizacion_from_row(row)
    }

    pub async fn insert_detalle(
        &self,
        cotizacion_id: Uuid,
        codigo: &str,
        precio_unitario: Decimal,
        cantidad: i32,
    ) -> Result<DetalleCotizacion> {
        let row = query(
            "INSERT INTO detalle_cotizacion (cotizacion_id, codigo, precio_unitario, cantidad, total) \
             VALUES ($1, $2, $3, $4, $3 * $4) \
             RETURNING id, cotizacion_id, codigo, precio_unitario, cantidad, total",
        )
        .bind(cotizacion_id)
        .bind(codigo)
        .bind(precio_unitario)
        .bind(cantidad)
        .fetch_one(&self.pool)
        .await?;

        Ok(DetalleCotizacion {
            id: row.try_get("id")?,
            cotizacion_id: row.try_get("cotizacion_id")?,
            codigo: row.try_get("codigo")?,
            precio_unitario: row.try_get("precio_unitario")?,
            cantidad: row.try_get("cantidad")?,
            total: row.try_get("total")?,
        })
    }

    pub async fn delete_detalles(&self, cotizacion_id: Uuid) -> Result<()> {
        query("DELETE FROM detalle_cotizacion WHERE cotizacion_id = $1")
            .bind(cotizacion_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Cotizacion>> {
        let row = query(&format!(
            "SELECT {} FROM cotizaciones WHERE id = $1",
            COTIZACION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::cotizacion_from_row).transpose()
    }

    pub async fn find_completa(&self, id: Uuid) -> Result<Option<CotizacionCompleta>> {
        let Some(cotizacion) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let mut complete = self.hydrate(vec![cotizacion]).await?;
        Ok(complete.pop())
    }

    /// Role-scoped, filtered, paginated listing; the count query applies the
    /// same scope and filters.
    pub async fn list(
        &self,
        scope: CotizacionScope,
        estado: Option<&str>,
        cliente_filter: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CotizacionCompleta>, i64)> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM cotizaciones WHERE 1=1",
            COTIZACION_COLUMNS
        ));
        Self::push_filters(&mut qb, scope, estado, cliente_filter);
        qb.push(" ORDER BY fecha DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let cotizaciones = rows
            .into_iter()
            .map(Self::cotizacion_from_row)
            .collect::<Result<Vec<_>>>()?;

        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) AS total FROM cotizaciones WHERE 1=1");
        Self::push_filters(&mut count_qb, scope, estado, cliente_filter);
        let total: i64 = count_qb.build().fetch_one(&self.pool).await?.try_get("total")?;

        let complete = self.hydrate(cotizaciones).await?;
        Ok((complete, total))
    }

    fn push_filters(
        qb: &mut QueryBuilder<Postgres>,
        scope: CotizacionScope,
        estado: Option<&str>,
        cliente_filter: Option<Uuid>,
    ) {
        if let Some(partner_id) = scope.partner_id {
            qb.push(" AND partner_id = ");
            qb.push_bind(partner_id);
        }
        if let Some(usuario_id) = scope.usuario_id {
            qb.push(" AND usuario_id = ");
            qb.push_bind(usuario_id);
        }
        if let Some(cliente_id) = scope.cliente_id {
            qb.push(" AND cliente_id = ");
            qb.push_bind(cliente_id);
        }
        if let Some(estado) = estado {
            qb.push(" AND estado = ");
            qb.push_bind(estado.to_string());
        }
        if let Some(cliente_filter) = cliente_filter {
            qb.push(" AND cliente_id = ");
            qb.push_bind(cliente_filter);
        }
    }

    /// Attach detail rows (with product summaries) and the three user
    /// relations, batched over the whole page.
    async fn hydrate(&self, cotizaciones: Vec<Cotizacion>) -> Result<Vec<CotizacionCompleta>> {
        if cotizaciones.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = cotizaciones.iter().map(|c| c.id).collect();

        let detalle_rows = query(
            "SELECT d.id, d.cotizacion_id, d.codigo, d.precio_unitario, d.cantidad, d.total, \
                    p.sku, p.name, p.marca, p.modelo, p.piso, p.serie, p.rin \
             FROM detalle_cotizacion d LEFT JOIN products p ON p.sku = d.codigo \
             WHERE d.cotizacion_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut detalles_by_cotizacion: HashMap<Uuid, Vec<DetalleConProducto>> = HashMap::new();
        for row in detalle_rows {
            let detalle = DetalleCotizacion {
                id: row.try_get("id")?,
                cotizacion_id: row.try_get("cotizacion_id")?,
                codigo: row.try_get("codigo")?,
                precio_unitario: row.try_get("precio_unitario")?,
                cantidad: row.try_get("cantidad")?,
                total: row.try_get("total")?,
            };
            let producto = match row.try_get::<Option<String>, _>("name")? {
                Some(name) => Some(ProductoResumen {
                    sku: row.try_get("sku")?,
                    name,
                    marca: row.try_get("marca")?,
                    modelo: row.try_get("modelo")?,
                    piso: row.try_get("piso")?,
                    serie: row.try_get("serie")?,
                    rin: row.try_get("rin")?,
                }),
                None => None,
            };
            detalles_by_cotizacion
                .entry(detalle.cotizacion_id)
                .or_default()
                .push(DetalleConProducto { detalle, producto });
        }

        let mut user_ids: Vec<Uuid> = Vec::new();
        for c in &cotizaciones {
            user_ids.push(c.usuario_id);
            user_ids.extend(c.cliente_id);
            user_ids.extend(c.partner_id);
        }
        user_ids.sort_unstable();
        user_ids.dedup();

        let user_rows = query(
            "SELECT id, correo, contrasena, nombre, empresa, rol, parent_partner_id, validado, \
                    codigo_usuario, telefono, direccion, creado_en \
             FROM usuarios WHERE id = ANY($1)",
        )
        .bind(&user_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut users: HashMap<Uuid, UserPublic> = HashMap::new();
        for row in user_rows {
            let user = User {
                id: row.try_get("id")?,
                correo: row.try_get("correo")?,
                contrasena: row.try_get("contrasena")?,
                nombre: row.try_get("nombre")?,
                empresa: row.try_get("empresa")?,
                rol: row.try_get("rol")?,
                parent_partner_id: row.try_get("parent_partner_id")?,
                validado: row.try_get("validado")?,
                codigo_usuario: row.try_get("codigo_usuario")?,
                telefono: row.try_get("telefono")?,
                direccion: row.try_get("direccion")?,
                creado_en: row.try_get("creado_en")?,
            };
            users.insert(user.id, UserPublic::from(user));
        }

        Ok(cotizaciones
            .into_iter()
            .map(|cotizacion| {
                let detalle_cotizacion = detalles_by_cotizacion
                    .remove(&cotizacion.id)
                    .unwrap_or_default();
                let cliente = cotizacion.cliente_id.and_then(|id| users.get(&id).cloned());
                let partner = cotizacion.partner_id.and_then(|id| users.get(&id).cloned());
                let usuario = users.get(&cotizacion.usuario_id).cloned();
                CotizacionCompleta {
                    cotizacion,
                    detalle_cotizacion,
                    cliente,
                    partner,
                    usuario,
                }
            })
            .collect())
    }

    pub async fn update(
        &self,
        id: Uuid,
        estado: Option<&str>,
        observaciones: Option<&str>,
        cliente_id: Option<Uuid>,
        subtotal: Option<Decimal>,
        total: Option<Decimal>,
    ) -> Result<()> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE cotizaciones SET ");
        let mut has_fields = false;

        macro_rules! push_field {
            ($name:literal, $value:expr) => {
                if let Some(value) = $value {
                    if has_fields {
                        qb.push(", ");
                    }
                    qb.push(concat!($name, " = "));
                    qb.push_bind(value);
                    has_fields = true;
                }
            };
        }

        push_field!("estado", estado.map(|v| v.to_string()));
        push_field!("observaciones", observaciones.map(|v| v.to_string()));
        push_field!("cliente_id", cliente_id);
        push_field!("subtotal", subtotal);
        push_field!("total", total);

        if !has_fields {
            return Ok(());
        }

        qb.push(" WHERE id = ");
        qb.push_bind(id);

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Cotización no encontrada".to_string()));
        }
        Ok(())
    }

    /// Details cascade via the FK.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = query("DELETE FROM cotizaciones WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Cotización no encontrada".to_string()));
        }
        Ok(())
    }
}
