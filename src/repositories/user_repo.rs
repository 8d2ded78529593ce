use sqlx::{query, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::user::{User, UserPublic, UserRole};

pub struct UserRepository {
    pool: PgPool,
}

const USER_COLUMNS: &str =
    "id, correo, contrasena, nombre, empresa, rol, parent_partner_id, validado, codigo_usuario, telefono, direccion, creado_en";

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn user_from_row(row: sqlx::postgres::PgRow) -> Result<User> {
        Ok(User {
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
        })
    }

    pub async fn create(
        &self,
        correo: &str,
        password_hash: &str,
        nombre: &str,
        empresa: Option<&str>,
        rol: UserRole,
        parent_partner_id: Option<Uuid>,
        codigo_usuario: &str,
    ) -> Result<User> {
        let row = query(&format!(
            "INSERT INTO usuarios (correo, contrasena, nombre, empresa, rol, parent_partner_id, validado, codigo_usuario) \
             VALUES ($1, $2, $3, $4, $5, $6, false, $7) \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(correo)
        .bind(password_hash)
        .bind(nombre)
        .bind(empresa)
        .bind(rol.as_str())
        .bind(parent_partner_id)
        .bind(codigo_usuario)
        .fetch_one(&self.pool)
        .await?;

        Self::user_from_row(row)
    }

    pub async fn find_by_email(&self, correo: &str) -> Result<Option<User>> {
        let row = query(&format!("SELECT {} FROM usuarios WHERE correo = $1", USER_COLUMNS))
            .bind(correo)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::user_from_row).transpose()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = query(&format!("SELECT {} FROM usuarios WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::user_from_row).transpose()
    }

    pub async fn find_by_codigo(&self, codigo: &str) -> Result<Option<User>> {
        let row = query(&format!(
            "SELECT {} FROM usuarios WHERE codigo_usuario = $1",
            USER_COLUMNS
        ))
        .bind(codigo)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::user_from_row).transpose()
    }

    /// Highest existing user code for a letter prefix, e.g. `M-450123`.
    pub async fn latest_codigo_for_letter(&self, letter: char) -> Result<Option<String>> {
        let row = query(
            "SELECT codigo_usuario FROM usuarios WHERE codigo_usuario ILIKE $1 \
             ORDER BY codigo_usuario DESC LIMIT 1",
        )
        .bind(format!("{}-%", letter))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.try_get("codigo_usuario")).transpose()?)
    }

    pub async fn find_by_partner(&self, partner_id: Uuid) -> Result<Vec<User>> {
        let rows = query(&format!(
            "SELECT {} FROM usuarios WHERE parent_partner_id = $1",
            USER_COLUMNS
        ))
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::user_from_row).collect()
    }

    /// Admin listing with optional filters; each user carries the code of
    /// their parent partner when one exists.
    pub async fn list(
        &self,
        role: Option<UserRole>,
        company: Option<&str>,
        search: Option<&str>,
        validated: Option<bool>,
    ) -> Result<Vec<UserPublic>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT u.id, u.correo, u.contrasena, u.nombre, u.empresa, u.rol, u.parent_partner_id, \
                    u.validado, u.codigo_usuario, u.telefono, u.direccion, u.creado_en, \
                    p.codigo_usuario AS codigo_partner \
             FROM usuarios u LEFT JOIN usuarios p ON u.parent_partner_id = p.id WHERE 1=1",
        );

        if let Some(role) = role {
            qb.push(" AND u.rol = ");
            qb.push_bind(role.as_str());
        }
        if let Some(company) = company {
            qb.push(" AND u.empresa ILIKE ");
            qb.push_bind(format!("%{}%", company));
        }
        if let Some(search) = search {
            let pattern = format!("%{}%", search);
            qb.push(" AND (u.nombre ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR u.correo ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
        if let Some(validated) = validated {
            qb.push(" AND u.validado = ");
            qb.push_bind(validated);
        }
        qb.push(" ORDER BY u.creado_en DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                let codigo_partner: Option<String> = row.try_get("codigo_partner")?;
                let user = Self::user_from_row(row)?;
                let mut public = UserPublic::from(user);
                public.codigo_partner = codigo_partner;
                Ok(public)
            })
            .collect()
    }

    /// Name/email search used by the quotation screens, optionally scoped to
    /// a partner and filtered by role.
    pub async fn search(
        &self,
        search: Option<&str>,
        role: Option<&str>,
        parent_partner_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserPublic>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM usuarios WHERE 1=1",
            USER_COLUMNS
        ));

        if let Some(partner_id) = parent_partner_id {
            qb.push(" AND parent_partner_id = ");
            qb.push_bind(partner_id);
        }
        if let Some(search) = search {
            let pattern = format!("%{}%", search);
            qb.push(" AND (nombre ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR correo ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
        if let Some(role) = role {
            qb.push(" AND rol = ");
            qb.push_bind(role.to_string());
        }
        qb.push(" ORDER BY nombre LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| Ok(UserPublic::from(Self::user_from_row(row)?)))
            .collect()
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        nombre: Option<&str>,
        empresa: Option<&str>,
        rol: Option<UserRole>,
        parent_partner_id: Option<Uuid>,
        validado: Option<bool>,
        telefono: Option<&str>,
        direccion: Option<&str>,
    ) -> Result<User> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE usuarios SET ");
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

        push_field!("nombre", nombre.map(|v| v.to_string()));
        push_field!("empresa", empresa.map(|v| v.to_string()));
        push_field!("rol", rol.map(|r| r.as_str().to_string()));
        push_field!("parent_partner_id", parent_partner_id);
        push_field!("validado", validado);
        push_field!("telefono", telefono.map(|v| v.to_string()));
        push_field!("direccion", direccion.map(|v| v.to_string()));

        if !has_fields {
            return self
                .find_by_id(user_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Usuario no encontrado".to_string()));
        }

        qb.push(" WHERE id = ");
        qb.push_bind(user_id);
        qb.push(format!(" RETURNING {}", USER_COLUMNS));

        let row = qb.build().fetch_one(&self.pool).await?;
        Self::user_from_row(row)
    }

    pub async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let result = query("UPDATE usuarios SET contrasena = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Usuario no encontrado".to_string()));
        }
        Ok(())
    }

    pub async fn delete(&self, user_id: Uuid) -> Result<()> {
        let result = query("DELETE FROM usuarios WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Usuario no encontrado".to_string()));
        }
        Ok(())
    }
}
