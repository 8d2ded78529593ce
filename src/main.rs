use axum::{
    extract::Request,
    middleware,
    middleware::Next,
    routing::{delete, get, post, put},
    Json, Router,
};
use axum::http::{header, HeaderValue, Method};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mayoreo_llantas::config::AppConfig;
use mayoreo_llantas::handlers::{
    admin, auth, denied_tires, inventory, plant_stock, prices, quotations, users,
};
use mayoreo_llantas::middleware::auth_middleware;
use mayoreo_llantas::services::SyncService;

pub fn create_app(config: AppConfig) -> Router {
    // Default to INFO; override with RUST_LOG for debugging
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "mayoreo_llantas=info,tower_http=info,sqlx=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    let cors_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(header_val) => Some(header_val),
            Err(e) => {
                tracing::error!("❌ Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    tracing::info!("✅ CORS configured with {} allowed origins", cors_origins.len());

    let cors = CorsLayer::new()
        .allow_origin(cors_origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_credentials(true)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/", get(|| async { Json(json!({"message": "Bienvenido a Mayoreo Llantas"})) }))
        .nest(
            "/auth",
            Router::new()
                .route("/register", post(auth::register))
                .route("/token", post(auth::login)),
        )
        .nest(
            "/users",
            Router::new()
                .route("/me", get(users::read_me))
                .route("/me", put(users::update_me))
                .route("/change-password", post(users::change_password))
                .route("/logout", post(users::logout))
                .layer(middleware::from_fn_with_state(config.clone(), auth_middleware)),
        )
        .nest(
            "/admin",
            Router::new()
                .route("/", get(admin::list_users))
                .route("/user-by-code/:user_code", get(admin::user_by_code))
                .route("/users/:id", get(admin::get_user))
                .route("/users/:id", put(admin::update_user))
                .route("/users/:id", delete(admin::delete_user))
                .layer(middleware::from_fn_with_state(config.clone(), auth_middleware)),
        )
        .nest(
            "/inventory",
            Router::new()
                // Sync + enrich stay open for the external scheduler hosts
                .route("/stockquant/all", get(inventory::sync_inventory))
                .route("/stockquant/enrich", post(inventory::enrich_products))
                .merge(
                    Router::new()
                        .route("/reporte-zonas-detallado", get(inventory::report_zones))
                        .route("/export/csv", get(inventory::export_csv))
                        .route("/search", get(inventory::search_inventory))
                        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware)),
                ),
        )
        .nest(
            "/prices",
            Router::new()
                .route("/upload", post(prices::upload_prices))
                .layer(middleware::from_fn_with_state(config.clone(), auth_middleware)),
        )
        .nest(
            "/existencia",
            Router::new().route("/search", get(plant_stock::search_by_size)),
        )
        .nest(
            "/deniedtires",
            Router::new()
                .route("/", post(denied_tires::create_denied_tire))
                .route("/", get(denied_tires::list_denied_tires))
                .layer(middleware::from_fn_with_state(config.clone(), auth_middleware)),
        )
        .nest(
            "/cotizaciones",
            Router::new()
                .route("/buscar-usuarios", get(quotations::search_users))
                .route("/buscar-productos", get(quotations::search_products))
                .route("/", post(quotations::create_quotation))
                .route("/", get(quotations::list_quotations))
                .route("/:id", get(quotations::get_quotation))
                .route("/:id", put(quotations::update_quotation))
                .route("/:id", delete(quotations::delete_quotation))
                .layer(middleware::from_fn_with_state(config.clone(), auth_middleware)),
        )
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(config)
        .layer(axum::middleware::from_fn(
            |req: Request, next: Next| async move {
                tracing::info!("{} {}", req.method(), req.uri());
                let response = next.run(req).await;
                tracing::info!("Response status: {}", response.status());
                response
            },
        ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().await?;
    let app = create_app(config.clone());

    // Daily inventory sync, same single-flight guard as the manual trigger.
    // Failures are logged and skipped, never retried within the cycle.
    let scheduler_config = config.clone();
    tokio::spawn(async move {
        use std::time::Duration;

        let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        // The first tick fires immediately; consume it so the sync runs on
        // the daily cadence, not at boot
        interval.tick().await;

        tracing::info!("⏰ Scheduler de sincronización diaria iniciado (cada 24h)");

        loop {
            interval.tick().await;
            tracing::info!("🔄 Iniciando sincronización automática");

            match SyncService::new(&scheduler_config) {
                Ok(sync) => match sync.run().await {
                    Ok(summary) => tracing::info!(
                        "✅ Sincronización automática completada: {} productos, {} almacenes, {} registros",
                        summary.products_updated,
                        summary.warehouses,
                        summary.inventory_records
                    ),
                    Err(e) => tracing::error!("❌ Error en sincronización automática: {}", e),
                },
                Err(e) => tracing::error!("❌ No se pudo crear el servicio de sincronización: {}", e),
            }
        }
    });

    let addr: std::net::SocketAddr = config.server_address().parse()?;
    tracing::info!("Starting Mayoreo Llantas server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
