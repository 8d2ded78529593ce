// Odoo JSON-RPC Client
// Service-account calls go through the `execute_kw` object protocol; the
// pricing report flow needs a separate session-cookie login against the
// prices host. Sessions are scoped to a single call and never cached - the
// upstream re-authenticates on every price lookup.

use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::OdooConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum OdooError {
    // Network failure or timeout reaching Odoo (503-equivalent)
    #[error("Odoo unreachable: {0}")]
    Unavailable(String),

    // Odoo answered, but the JSON-RPC body embeds an error object
    #[error("Odoo RPC error: {0}")]
    Rpc(String),

    // The session login for the pricing report flow was rejected
    #[error("Odoo session authentication failed: {0}")]
    SessionAuth(String),

    #[error("Malformed Odoo response: {0}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, OdooError>;

// ============================================================================
// Client
// ============================================================================

#[derive(Clone)]
pub struct OdooClient {
    http: Client,
    config: OdooConfig,
}

impl OdooClient {
    pub fn new(config: OdooConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OdooError::Unavailable(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &OdooConfig {
        &self.config
    }

    /// Call `execute_kw` on the object service with the fixed service-account
    /// credential pair. `domain` is the Odoo search domain, `fields` the
    /// projection, `kwargs` extra keyword arguments (limit/offset/order).
    /// Returns the raw record list from the `result` key.
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        domain: Vec<Value>,
        fields: &[&str],
        kwargs: Value,
    ) -> Result<Vec<Value>> {
        let mut keyword_args = Map::new();
        keyword_args.insert("fields".to_string(), json!(fields));
        if let Value::Object(extra) = kwargs {
            for (k, v) in extra {
                keyword_args.insert(k, v);
            }
        }

        let payload = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "service": "object",
                "method": "execute_kw",
                "args": [
                    &self.config.database,
                    self.config.user_id,
                    &self.config.api_key,
                    model,
                    method,
                    [domain],
                    Value::Object(keyword_args)
                ]
            }
        });

        let response = self
            .http
            .post(&self.config.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| OdooError::Unavailable(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| OdooError::MalformedResponse(e.to_string()))?;

        Self::extract_result_records(body)
    }

    fn extract_result_records(body: Value) -> Result<Vec<Value>> {
        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown Odoo error");
            return Err(OdooError::Rpc(message.to_string()));
        }

        match body.get("result") {
            Some(Value::Array(records)) => Ok(records.clone()),
            Some(other) => Err(OdooError::MalformedResponse(format!(
                "expected record list, got: {}",
                other
            ))),
            None => Err(OdooError::MalformedResponse(
                "response has neither result nor error".to_string(),
            )),
        }
    }

    // ========================================================================
    // Session-cookie pricing flow
    // ========================================================================

    /// Log into the prices host and return a cookie-holding client scoped to
    /// this call. Callers must re-authenticate per lookup; there is no
    /// session cache.
    async fn authenticate_session(&self) -> Result<Client> {
        tracing::info!("Autenticando en Odoo con usuario de sesión");

        let session_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .cookie_store(true)
            .build()
            .map_err(|e| OdooError::Unavailable(e.to_string()))?;

        let response = session_client
            .post(format!("{}/web/session/authenticate", self.config.prices_url))
            .json(&json!({
                "jsonrpc": "2.0",
                "params": {
                    "db": &self.config.database,
                    "login": &self.config.session_login,
                    "password": &self.config.session_password
                }
            }))
            .send()
            .await
            .map_err(|e| OdooError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(OdooError::SessionAuth(format!(
                "authentication endpoint returned {}",
                status
            )));
        }

        let got_session_cookie = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.starts_with("session_id="));

        if !got_session_cookie {
            return Err(OdooError::SessionAuth(
                "no session_id cookie in authentication response".to_string(),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| OdooError::MalformedResponse(e.to_string()))?;

        if body.get("error").is_some() {
            return Err(OdooError::SessionAuth(
                "credentials rejected by Odoo".to_string(),
            ));
        }

        Ok(session_client)
    }

    /// Fetch the rendered pricelist report HTML for a set of product
    /// templates. Quantity is fixed at one unit.
    pub async fn fetch_pricelist_html(
        &self,
        template_ids: &[i64],
        pricelist_id: i64,
    ) -> Result<String> {
        let session_client = self.authenticate_session().await?;

        let payload = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "model": "report.product.report_pricelist",
                "method": "get_html",
                "args": [],
                "kwargs": {
                    "data": {
                        "active_model": "product.template",
                        "active_ids": template_ids,
                        "pricelist_id": pricelist_id,
                        "quantities": [1]
                    }
                }
            }
        });

        let response = session_client
            .post(format!(
                "{}/web/dataset/call_kw/report.product.report_pricelist/get_html",
                self.config.prices_url
            ))
            .json(&payload)
            .send()
            .await
            .map_err(|e| OdooError::Unavailable(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| OdooError::MalformedResponse(e.to_string()))?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown Odoo error");
            return Err(OdooError::Rpc(message.to_string()));
        }

        Ok(body
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

/// Odoo serializes many2one fields as `[id, display_name]`. Anything else
/// (false, null, bare id) yields None.
pub fn many2one(value: &Value) -> Option<(i64, String)> {
    let pair = value.as_array()?;
    let id = pair.first()?.as_i64()?;
    let name = pair.get(1)?.as_str()?.to_string();
    Some((id, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_many2one_pair() {
        let v = json!([42, "CEDIS Zona 3"]);
        assert_eq!(many2one(&v), Some((42, "CEDIS Zona 3".to_string())));
    }

    #[test]
    fn test_many2one_rejects_scalar_and_false() {
        assert_eq!(many2one(&json!(false)), None);
        assert_eq!(many2one(&json!(42)), None);
        assert_eq!(many2one(&json!(null)), None);
    }

    #[test]
    fn test_extract_result_records_error_body() {
        let body = json!({
            "jsonrpc": "2.0",
            "error": {"code": 200, "message": "Odoo Server Error"}
        });
        match OdooClient::extract_result_records(body) {
            Err(OdooError::Rpc(msg)) => assert_eq!(msg, "Odoo Server Error"),
            other => panic!("expected Rpc error, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_result_records_list() {
        let body = json!({"jsonrpc": "2.0", "result": [{"id": 1}, {"id": 2}]});
        let records = OdooClient::extract_result_records(body).unwrap();
        assert_eq!(records.len(), 2);
    }
}
