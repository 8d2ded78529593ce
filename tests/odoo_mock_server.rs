// Mock Odoo Server for Testing
// Simulates the JSON-RPC object endpoint, the session authentication flow
// and the pricelist report endpoint.
// Run with: cargo test --test odoo_mock_server

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

use mayoreo_llantas::config::OdooConfig;
use mayoreo_llantas::services::odoo::{
    AttributeService, InventoryService, OdooClient, OdooError, PriceService,
};

// ============================================================================
// Mock State
// ============================================================================

#[derive(Debug, Default)]
pub struct MockOdooState {
    /// stock.quant responses served chunk by chunk, one per call
    pub stock_chunks: Vec<Vec<Value>>,
    pub stock_call_index: usize,
    pub template_records: Vec<Value>,
    pub attribute_line_records: Vec<Value>,
    pub attribute_value_records: Vec<Value>,
    pub pricelist_html: String,
    pub session_valid: bool,
    pub rpc_error: Option<String>,
}

type SharedState = Arc<RwLock<MockOdooState>>;

fn consigna_exclusions(domain: &[Value]) -> Vec<i64> {
    for clause in domain {
        if let Some(parts) = clause.as_array() {
            if parts.first().and_then(Value::as_str) == Some("product_id.categ_id")
                && parts.get(1).and_then(Value::as_str) == Some("not in")
            {
                return parts
                    .get(2)
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                    .unwrap_or_default();
            }
        }
    }
    Vec::new()
}

fn record_categ(record: &Value) -> Option<i64> {
    record
        .get("product_categ_id")
        .and_then(Value::as_array)
        .and_then(|pair| pair.first())
        .and_then(Value::as_i64)
}

// ============================================================================
// JSON-RPC object endpoint
// ============================================================================

async fn jsonrpc_object(
    State(state): State<SharedState>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    let mut state = state.write().await;

    if let Some(message) = &state.rpc_error {
        return Json(json!({
            "jsonrpc": "2.0",
            "error": {"code": 200, "message": message}
        }));
    }

    let args = payload["params"]["args"].as_array().cloned().unwrap_or_default();
    let model = args.get(3).and_then(Value::as_str).unwrap_or("");
    let domain: Vec<Value> = args
        .get(5)
        .and_then(Value::as_array)
        .and_then(|positional| positional.first())
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let result: Vec<Value> = match model {
        "stock.quant" => {
            let excluded = consigna_exclusions(&domain);
            let chunk = state
                .stock_chunks
                .get(state.stock_call_index)
                .cloned()
                .unwrap_or_default();
            state.stock_call_index += 1;
            chunk
                .into_iter()
                .filter(|rec| {
                    record_categ(rec)
                        .map(|categ| !excluded.contains(&categ))
                        .unwrap_or(true)
                })
                .collect()
        }
        "product.product" => state.template_records.clone(),
        "product.template.attribute.line" => state.attribute_line_records.clone(),
        "product.attribute.value" => state.attribute_value_records.clone(),
        _ => Vec::new(),
    };

    Json(json!({"jsonrpc": "2.0", "result": result}))
}

// ============================================================================
// Session + pricelist report endpoints
// ============================================================================

async fn session_authenticate(
    State(state): State<SharedState>,
    Json(_payload): Json<Value>,
) -> (StatusCode, HeaderMap, Json<Value>) {
    let state = state.read().await;
    let mut headers = HeaderMap::new();

    if state.session_valid {
        headers.insert(
            header::SET_COOKIE,
            "session_id=mock-session-token; Path=/; HttpOnly".parse().unwrap(),
        );
        (
            StatusCode::OK,
            headers,
            Json(json!({"jsonrpc": "2.0", "result": {"uid": 7}})),
        )
    } else {
        (
            StatusCode::OK,
            headers,
            Json(json!({"jsonrpc": "2.0", "error": {"message": "Invalid credentials"}})),
        )
    }
}

async fn pricelist_get_html(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(_payload): Json<Value>,
) -> Json<Value> {
    let state = state.read().await;

    let has_session = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("session_id="))
        .unwrap_or(false);

    if !has_session {
        return Json(json!({"jsonrpc": "2.0", "error": {"message": "Session expired"}}));
    }

    Json(json!({"jsonrpc": "2.0", "result": state.pricelist_html}))
}

// ============================================================================
// Server Setup
// ============================================================================

pub fn create_mock_odoo_router(state: SharedState) -> Router {
    Router::new()
        .route("/", post(jsonrpc_object))
        .route("/web/session/authenticate", post(session_authenticate))
        .route(
            "/web/dataset/call_kw/report.product.report_pricelist/get_html",
            post(pricelist_get_html),
        )
        .with_state(state)
}

pub async fn start_mock_odoo(state: SharedState) -> String {
    let app = create_mock_odoo_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    format!("http://{}", addr)
}

fn mock_config(base_url: &str) -> OdooConfig {
    OdooConfig {
        url: base_url.to_string(),
        prices_url: base_url.to_string(),
        database: "mock".to_string(),
        user_id: 2,
        api_key: "mock-key".to_string(),
        session_login: "precios@example.com".to_string(),
        session_password: "secret".to_string(),
        pricelist_id: 7,
        line_id: Some(4),
    }
}

fn stock_record(id: i64, product: (i64, &str), location: &str, qty: f64, warehouse: Option<(i64, &str)>, categ: i64) -> Value {
    json!({
        "id": id,
        "product_id": [product.0, product.1],
        "quantity": qty,
        "location_id": [id * 10, location],
        "warehouse_id": warehouse.map(|(wid, wname)| json!([wid, wname])).unwrap_or(json!(false)),
        "product_categ_id": [categ, "Categoria"]
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_answers_jsonrpc() {
        let state = Arc::new(RwLock::new(MockOdooState {
            stock_chunks: vec![vec![stock_record(1, (10, "[A1] Llanta"), "Zona 1", 5.0, Some((7, "CEDIS 1")), 1)]],
            session_valid: true,
            ..Default::default()
        }));

        let server = axum_test::TestServer::new(create_mock_odoo_router(state)).unwrap();
        let response = server
            .post("/")
            .json(&json!({
                "jsonrpc": "2.0",
                "method": "call",
                "params": {
                    "service": "object",
                    "method": "execute_kw",
                    "args": ["mock", 2, "key", "stock.quant", "search_read", [[]], {"fields": []}]
                }
            }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["result"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pagination_accumulates_until_empty_page() {
        // Three chunks of 3+3+1 records, then the empty page stops the loop
        let chunk = |start: i64, len: i64| -> Vec<Value> {
            (start..start + len)
                .map(|i| stock_record(i, (i, "Llanta"), "Zona 1", 1.0, Some((7, "CEDIS 1")), 1))
                .collect()
        };
        let state = Arc::new(RwLock::new(MockOdooState {
            stock_chunks: vec![chunk(1, 3), chunk(4, 3), chunk(7, 1)],
            ..Default::default()
        }));

        let url = start_mock_odoo(state.clone()).await;
        let client = OdooClient::new(mock_config(&url)).unwrap();
        let inventory = InventoryService::new(client);

        let records = inventory.fetch_all_stock(vec![]).await.unwrap();
        assert_eq!(records.len(), 7);

        // One call per chunk plus the final empty page
        assert_eq!(state.read().await.stock_call_index, 4);
    }

    #[tokio::test]
    async fn test_sync_scenario_consigna_product_excluded() {
        // Product 10 is category 503 (consigna), product 11 is category 1;
        // both have stock in warehouse 7 whose location names zone 3
        let state = Arc::new(RwLock::new(MockOdooState {
            stock_chunks: vec![vec![
                stock_record(1, (10, "[A10] Llanta consigna"), "Zona 3 / Stock", 5.0, Some((7, "Sucursal Zona 3")), 503),
                stock_record(2, (11, "[B11] Llanta normal"), "Zona 3 / Stock", 8.0, Some((7, "Sucursal Zona 3")), 1),
            ]],
            session_valid: true,
            ..Default::default()
        }));

        let url = start_mock_odoo(state).await;
        let client = OdooClient::new(mock_config(&url)).unwrap();
        let inventory = InventoryService::new(client.clone());
        let prices = PriceService::new(client.clone());
        let attributes = AttributeService::new(client);

        let snapshot = inventory
            .get_all_inventory(Some(4), &prices, &attributes)
            .await
            .unwrap();

        assert_eq!(snapshot.products.len(), 1);
        let product = &snapshot.products[0];
        assert_eq!(product.id, 11);
        assert_eq!(product.total_quantity, 8.0);
        assert_eq!(product.zonas[&3].almacenes[&7].quantity, 8.0);
    }

    #[tokio::test]
    async fn test_full_pipeline_with_prices_and_attributes() {
        let html = r#"
            <tr data-res-id="100"><td>Llanta</td>
            <td><span class="oe_currency_value">1,234.50</span></td></tr>
        "#;
        let state = Arc::new(RwLock::new(MockOdooState {
            stock_chunks: vec![vec![
                stock_record(1, (10, "[A10] Llanta 185/65R15"), "Zona 2 / Stock", 4.0, Some((3, "CEDIS Zona 2")), 1),
            ]],
            template_records: vec![json!({"id": 10, "product_tmpl_id": [100, "Template"]})],
            attribute_line_records: vec![
                json!({"id": 1, "product_tmpl_id": [100, "T"], "attribute_id": [50, "Piso"], "value_ids": [500]}),
                json!({"id": 2, "product_tmpl_id": [100, "T"], "attribute_id": [51, "Serie"], "value_ids": [501]}),
                json!({"id": 3, "product_tmpl_id": [100, "T"], "attribute_id": [52, "Rin"], "value_ids": [502]}),
            ],
            attribute_value_records: vec![
                json!({"id": 500, "name": "185"}),
                json!({"id": 501, "name": "65"}),
                json!({"id": 502, "name": "R15"}),
            ],
            pricelist_html: html.to_string(),
            session_valid: true,
            ..Default::default()
        }));

        let url = start_mock_odoo(state).await;
        let client = OdooClient::new(mock_config(&url)).unwrap();
        let inventory = InventoryService::new(client.clone());
        let prices = PriceService::new(client.clone());
        let attributes = AttributeService::new(client);

        let snapshot = inventory
            .get_all_inventory(None, &prices, &attributes)
            .await
            .unwrap();

        let product = &snapshot.products[0];
        // Thousands separator stripped, not rounded
        assert_eq!(product.price.as_deref(), Some("1234.50"));
        assert_eq!(product.attributes.piso.as_deref(), Some("185"));
        assert_eq!(product.attributes.serie.as_deref(), Some("65"));
        assert_eq!(product.attributes.rin.as_deref(), Some("R15"));
        assert_eq!(product.attributes.marca, None);
    }

    #[tokio::test]
    async fn test_price_resolver_two_template_scenario() {
        let html = r#"
            <tr data-res-id="1"><td><span class="oe_currency_value">100.00</span></td></tr>
            <tr data-res-id="2"><td><span class="oe_currency_value">250.50</span></td></tr>
        "#;
        let state = Arc::new(RwLock::new(MockOdooState {
            pricelist_html: html.to_string(),
            session_valid: true,
            ..Default::default()
        }));

        let url = start_mock_odoo(state).await;
        let client = OdooClient::new(mock_config(&url)).unwrap();
        let prices = PriceService::new(client);

        let map = prices.get_prices(&[1, 2]).await;
        assert_eq!(map.len(), 2);
        assert_eq!(map[&1], "100.00");
        assert_eq!(map[&2], "250.50");
    }

    #[tokio::test]
    async fn test_session_failure_fails_closed_to_empty_prices() {
        let state = Arc::new(RwLock::new(MockOdooState {
            pricelist_html: r#"<span data-res-id="1"><span class="oe_currency_value">1.00</span></span>"#.to_string(),
            session_valid: false,
            ..Default::default()
        }));

        let url = start_mock_odoo(state).await;
        let client = OdooClient::new(mock_config(&url)).unwrap();

        // The raw client surfaces the session failure...
        match client.fetch_pricelist_html(&[1], 7).await {
            Err(OdooError::SessionAuth(_)) => {}
            other => panic!("expected SessionAuth error, got {:?}", other),
        }

        // ...and the price resolver degrades to an empty map
        let prices = PriceService::new(client);
        assert!(prices.get_prices(&[1]).await.is_empty());
    }

    #[tokio::test]
    async fn test_rpc_error_surfaces_remote_message() {
        let state = Arc::new(RwLock::new(MockOdooState {
            rpc_error: Some("Odoo Server Error: invalid domain".to_string()),
            ..Default::default()
        }));

        let url = start_mock_odoo(state).await;
        let client = OdooClient::new(mock_config(&url)).unwrap();

        match client.execute_kw("stock.quant", "search_read", vec![], &[], json!({})).await {
            Err(OdooError::Rpc(msg)) => assert!(msg.contains("invalid domain")),
            other => panic!("expected Rpc error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_maps_to_unavailable() {
        let config = mock_config("http://127.0.0.1:1");
        let client = OdooClient::new(config).unwrap();

        match client.execute_kw("stock.quant", "search_read", vec![], &[], json!({})).await {
            Err(OdooError::Unavailable(_)) => {}
            other => panic!("expected Unavailable error, got {:?}", other),
        }
    }
}
