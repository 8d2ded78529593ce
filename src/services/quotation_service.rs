use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::middleware::Claims;
use crate::models::quotation::{
    CotizacionCompleta, CotizacionListQuery, CreateCotizacionRequest, DetalleCreateRequest,
    EstadoCotizacion, UpdateCotizacionRequest,
};
use crate::models::report::{PaginatedResponse, Pagination};
use crate::models::user::UserRole;
use crate::repositories::quotation_repo::{CotizacionScope, QuotationRepository};
use crate::repositories::ProductRepository;

pub struct QuotationService {
    repo: QuotationRepository,
    product_repo: ProductRepository,
}

impl QuotationService {
    pub fn new(repo: QuotationRepository, product_repo: ProductRepository) -> Self {
        Self { repo, product_repo }
    }

    fn decimal(value: f64) -> Decimal {
        Decimal::from_f64(value).unwrap_or_default()
    }

    fn detalles_subtotal(detalles: &[DetalleCreateRequest]) -> f64 {
        detalles
            .iter()
            .map(|d| d.precio_unitario * d.cantidad as f64)
            .sum()
    }

    /// Visibility scope per role: admin/sistemas see everything, partner by
    /// partner_id, vendedor by usuario_id, cliente by cliente_id.
    fn scope_for(claims: &Claims) -> Result<CotizacionScope> {
        match claims.role {
            UserRole::Admin | UserRole::Sistemas => Ok(CotizacionScope::default()),
            UserRole::Partner => Ok(CotizacionScope {
                partner_id: Some(claims.user_id),
                ..Default::default()
            }),
            UserRole::Vendedor => Ok(CotizacionScope {
                usuario_id: Some(claims.user_id),
                ..Default::default()
            }),
            UserRole::Cliente => Ok(CotizacionScope {
                cliente_id: Some(claims.user_id),
                ..Default::default()
            }),
            UserRole::Precios => Err(AppError::Forbidden(
                "No tienes permisos para ver cotizaciones".to_string(),
            )),
        }
    }

    async fn ensure_skus_exist(&self, detalles: &[DetalleCreateRequest]) -> Result<()> {
        for detalle in detalles {
            if !self.product_repo.sku_exists(&detalle.codigo).await? {
                return Err(AppError::BadRequest(format!(
                    "El SKU {} no existe en la tabla products",
                    detalle.codigo
                )));
            }
        }
        Ok(())
    }

    pub async fn create(
        &self,
        claims: &Claims,
        request: CreateCotizacionRequest,
    ) -> Result<CotizacionCompleta> {
        self.ensure_skus_exist(&request.detalles).await?;

        // Partner attribution follows the caller's role
        let partner_id = match claims.role {
            UserRole::Partner => Some(claims.user_id),
            UserRole::Vendedor => claims.parent_partner_id,
            _ => None,
        };

        let computed = Self::detalles_subtotal(&request.detalles);
        let subtotal = Self::decimal(request.subtotal.unwrap_or(computed));
        let total = Self::decimal(request.total.unwrap_or(computed));
        let estado = request.estado.unwrap_or(EstadoCotizacion::Nueva);

        let cotizacion = self
            .repo
            .create(
                request.cliente_id,
                partner_id,
                claims.user_id,
                subtotal,
                total,
                request.observaciones.as_deref(),
                estado.as_str(),
            )
            .await?;

        for detalle in &request.detalles {
            self.repo
                .insert_detalle(
                    cotizacion.id,
                    &detalle.codigo,
                    Self::decimal(detalle.precio_unitario),
                    detalle.cantidad,
                )
                .await?;
        }

        self.repo
            .find_completa(cotizacion.id)
            .await?
            .ok_or_else(|| AppError::Persistence("cotización recién creada no encontrada".to_string()))
    }

    pub async fn list(
        &self,
        claims: &Claims,
        query: &CotizacionListQuery,
    ) -> Result<PaginatedResponse<CotizacionCompleta>> {
        let scope = Self::scope_for(claims)?;
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(10).clamp(1, 100);

        // The client filter is only honored for roles that can see other
        // people's quotations
        let cliente_filter = match claims.role {
            UserRole::Admin | UserRole::Sistemas | UserRole::Partner => query.cliente_id,
            _ => None,
        };

        let (data, total) = self
            .repo
            .list(
                scope,
                query.estado.as_deref(),
                cliente_filter,
                per_page,
                (page - 1) * per_page,
            )
            .await?;

        Ok(PaginatedResponse {
            data,
            pagination: Pagination::new(total, page, per_page),
        })
    }

    pub async fn get(&self, claims: &Claims, id: Uuid) -> Result<CotizacionCompleta> {
        let cotizacion = self
            .repo
            .find_completa(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Cotización no encontrada".to_string()))?;

        let denied = match claims.role {
            UserRole::Cliente => cotizacion.cotizacion.cliente_id != Some(claims.user_id),
            UserRole::Partner => cotizacion
                .cotizacion
                .partner_id
                .map(|p| p != claims.user_id)
                .unwrap_or(false),
            UserRole::Vendedor => cotizacion.cotizacion.usuario_id != claims.user_id,
            _ => false,
        };
        if denied {
            return Err(AppError::Forbidden(
                "No tienes acceso a esta cotización".to_string(),
            ));
        }

        Ok(cotizacion)
    }

    pub async fn update(
        &self,
        claims: &Claims,
        id: Uuid,
        request: UpdateCotizacionRequest,
    ) -> Result<CotizacionCompleta> {
        let cotizacion = self
            .repo
            .find_completa(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Cotización no encontrada".to_string()))?;

        match claims.role {
            UserRole::Cliente => {
                // Clients may only accept or reject their own quotation
                let estado_ok = matches!(
                    request.estado,
                    Some(EstadoCotizacion::Aceptada) | Some(EstadoCotizacion::Rechazada)
                );
                if !estado_ok {
                    return Err(AppError::Forbidden(
                        "Solo puedes aceptar o rechazar la cotización".to_string(),
                    ));
                }
                if cotizacion.cotizacion.cliente_id != Some(claims.user_id) {
                    return Err(AppError::Forbidden(
                        "No puedes modificar esta cotización".to_string(),
                    ));
                }
            }
            UserRole::Vendedor => {
                let created_it = cotizacion.cotizacion.usuario_id == claims.user_id;
                let client_is_theirs = cotizacion
                    .cliente
                    .as_ref()
                    .and_then(|c| c.parent_partner_id)
                    .map(|p| p == claims.user_id)
                    .unwrap_or(false);
                if !(created_it || client_is_theirs) {
                    return Err(AppError::Forbidden(
                        "No puedes modificar esta cotización".to_string(),
                    ));
                }
            }
            UserRole::Partner => {
                if cotizacion.cotizacion.partner_id != Some(claims.user_id) {
                    return Err(AppError::Forbidden(
                        "No puedes modificar cotizaciones de otros partners".to_string(),
                    ));
                }
            }
            _ => {}
        }

        // Recompute totals when details change and the caller did not send
        // explicit figures
        let (mut subtotal, mut total) = (request.subtotal, request.total);
        if let Some(detalles) = &request.detalles {
            let computed = Self::detalles_subtotal(detalles);
            subtotal = subtotal.or(Some(computed));
            total = total.or(Some(computed));
        }

        self.repo
            .update(
                id,
                request.estado.map(|e| e.as_str()),
                request.observaciones.as_deref(),
                request.cliente_id,
                subtotal.map(Self::decimal),
                total.map(Self::decimal),
            )
            .await?;

        if let Some(detalles) = &request.detalles {
            self.ensure_skus_exist(detalles).await?;
            self.repo.delete_detalles(id).await?;
            for detalle in detalles {
                self.repo
                    .insert_detalle(
                        id,
                        &detalle.codigo,
                        Self::decimal(detalle.precio_unitario),
                        detalle.cantidad,
                    )
                    .await?;
            }
        }

        self.repo
            .find_completa(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Error al obtener la cotización actualizada".to_string()))
    }

    pub async fn delete(&self, claims: &Claims, id: Uuid) -> Result<()> {
        if !claims.is_admin() {
            return Err(AppError::Forbidden(
                "Requiere privilegios de administrador o sistemas".to_string(),
            ));
        }
        self.repo.delete(id).await
    }
}
