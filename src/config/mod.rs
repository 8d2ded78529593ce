use std::env;
use anyhow::Result;
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("DATABASE_PORT")
                .unwrap_or_else(|_| "5432".to_string())
                .parse()?,
            username: env::var("DATABASE_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: env::var("DATABASE_PASSWORD")?,
            database: env::var("DATABASE_NAME").unwrap_or_else(|_| "mayoreo".to_string()),
            ssl_mode: env::var("DATABASE_SSL_MODE").unwrap_or_else(|_| "prefer".to_string()),
        })
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.username, self.password, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

/// Odoo endpoints and credentials. Two distinct bases: `url` serves the
/// service-account JSON-RPC calls, `prices_url` serves the session-cookie
/// pricing report flow (a separate login pair).
#[derive(Debug, Clone)]
pub struct OdooConfig {
    pub url: String,
    pub prices_url: String,
    pub database: String,
    pub user_id: i64,
    pub api_key: String,
    pub session_login: String,
    pub session_password: String,
    pub pricelist_id: i64,
    pub line_id: Option<i64>,
}

impl OdooConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("ODOO_URL")?,
            prices_url: env::var("ODOO_URL_PRICES")?,
            database: env::var("ODOO_DB")?,
            user_id: env::var("ODOO_USER_ID")?.parse()?,
            api_key: env::var("ODOO_API_KEY")?,
            session_login: env::var("ODOO_USERNAME")?,
            session_password: env::var("ODOO_PASSWORD")?,
            pricelist_id: env::var("PRICELIST_ID")
                .unwrap_or_else(|_| "7".to_string())
                .parse()?,
            line_id: env::var("ODOO_LINE_ID")
                .ok()
                .map(|v| v.parse())
                .transpose()?
                .or(Some(4)),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub odoo: OdooConfig,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub database_pool: PgPool,
}

impl AppConfig {
    pub async fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let database_config = DatabaseConfig::from_env()?;
        let database_pool = sqlx::PgPool::connect(&database_config.connection_string()).await?;

        Ok(Self {
            database: database_config,
            odoo: OdooConfig::from_env()?,
            jwt_secret: env::var("JWT_SECRET")?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            cors_origins,
            database_pool,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
