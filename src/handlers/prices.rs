use axum::{extract::{Multipart, State}, Extension, Json};
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use csv::ReaderBuilder;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::io::Cursor;

use crate::{
    config::AppConfig,
    middleware::{error_handling::{AppError, Result}, Claims},
    models::user::UserRole,
    repositories::ProductRepository,
};

/// Upload SKU prices from a CSV or XLSX file with `sku` and `price` columns.
/// Rows are processed independently; bad rows are collected as errors while
/// the rest go through.
pub async fn upload_prices(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    if !matches!(claims.role, UserRole::Admin | UserRole::Precios) {
        return Err(AppError::Forbidden(
            "Se requieren privilegios de admin o precios".to_string(),
        ));
    }

    let mut file_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart data: {}", e)))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().map(|s| s.to_string());
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?
                    .to_vec(),
            );
        }
    }

    let file_data = file_data.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;
    let filename = filename.unwrap_or_default();

    let rows = parse_price_rows(&file_data, &filename)?;

    let repo = ProductRepository::new(config.database_pool.clone());
    let mut success_count = 0usize;
    let mut errors: Vec<String> = Vec::new();

    for (sku, price) in rows {
        if price <= 0.0 {
            errors.push(format!("Precio inválido para SKU {}: {}", sku, price));
            continue;
        }
        let Some(price) = Decimal::from_f64(price) else {
            errors.push(format!("Precio inválido para SKU {}: {}", sku, price));
            continue;
        };

        match repo.upsert_price(&sku, price).await {
            Ok(()) => success_count += 1,
            Err(e) => {
                tracing::error!("Error actualizando precio de {}: {}", sku, e);
                errors.push(format!("No se pudo actualizar el precio para SKU {}", sku));
            }
        }
    }

    Ok(Json(json!({
        "message": format!("Procesado completo. Éxitos: {}, Errores: {}", success_count, errors.len()),
        "success_count": success_count,
        "error_count": errors.len(),
        "errors": if errors.is_empty() { Value::Null } else { json!(errors) }
    })))
}

/// Extract (sku, price) pairs from a CSV or XLSX upload. The header row must
/// contain `sku` and `price` columns (any order, extra columns ignored).
pub fn parse_price_rows(data: &[u8], filename: &str) -> Result<Vec<(String, f64)>> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".csv") {
        parse_csv_prices(data)
    } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        parse_excel_prices(data)
    } else {
        Err(AppError::BadRequest(
            "Formato de archivo no soportado. Use CSV o Excel.".to_string(),
        ))
    }
}

fn find_columns(headers: &[String]) -> Result<(usize, usize)> {
    let sku_idx = headers.iter().position(|h| h.eq_ignore_ascii_case("sku"));
    let price_idx = headers.iter().position(|h| h.eq_ignore_ascii_case("price"));

    match (sku_idx, price_idx) {
        (Some(sku), Some(price)) => Ok((sku, price)),
        _ => Err(AppError::BadRequest(
            "El archivo debe contener las columnas 'sku' y 'price'".to_string(),
        )),
    }
}

fn parse_csv_prices(data: &[u8]) -> Result<Vec<(String, f64)>> {
    let text = std::str::from_utf8(data)
        .map_err(|e| AppError::BadRequest(format!("Invalid UTF-8 encoding: {}", e)))?;

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::BadRequest(format!("Failed to read CSV headers: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() {
        return Err(AppError::BadRequest("El archivo está vacío".to_string()));
    }

    let (sku_idx, price_idx) = find_columns(&headers)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AppError::BadRequest(format!("Invalid CSV row: {}", e)))?;
        let sku = record.get(sku_idx).unwrap_or("").trim().to_string();
        if sku.is_empty() {
            continue;
        }
        let price = record
            .get(price_idx)
            .unwrap_or("")
            .trim()
            .replace(',', "")
            .parse::<f64>()
            .unwrap_or(-1.0);
        rows.push((sku, price));
    }

    Ok(rows)
}

fn parse_excel_prices(data: &[u8]) -> Result<Vec<(String, f64)>> {
    let cursor = Cursor::new(data);
    let mut workbook: Xlsx<_> = open_workbook_from_rs(cursor)
        .map_err(|e| AppError::BadRequest(format!("No se pudo leer el archivo Excel: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::BadRequest("El archivo está vacío".to_string()))?
        .map_err(|e| AppError::BadRequest(format!("No se pudo leer la hoja: {}", e)))?;

    let mut iter = range.rows();
    let headers: Vec<String> = iter
        .next()
        .ok_or_else(|| AppError::BadRequest("El archivo está vacío".to_string()))?
        .iter()
        .map(|c| c.to_string().trim().to_string())
        .collect();

    let (sku_idx, price_idx) = find_columns(&headers)?;

    let mut rows = Vec::new();
    for row in iter {
        let sku = row
            .get(sku_idx)
            .map(|c| c.to_string().trim().to_string())
            .unwrap_or_default();
        if sku.is_empty() {
            continue;
        }
        let price = match row.get(price_idx) {
            Some(Data::Float(f)) => *f,
            Some(Data::Int(i)) => *i as f64,
            Some(other) => other.to_string().trim().replace(',', "").parse().unwrap_or(-1.0),
            None => -1.0,
        };
        rows.push((sku, price));
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_prices() {
        let csv = b"sku,price\nAB123,1599.50\nCD456,899\n";
        let rows = parse_csv_prices(csv).unwrap();
        assert_eq!(rows, vec![("AB123".to_string(), 1599.50), ("CD456".to_string(), 899.0)]);
    }

    #[test]
    fn test_parse_csv_prices_extra_columns_and_order() {
        let csv = b"price,name,sku\n100.0,Llanta,ZZ9\n";
        let rows = parse_csv_prices(csv).unwrap();
        assert_eq!(rows, vec![("ZZ9".to_string(), 100.0)]);
    }

    #[test]
    fn test_parse_csv_prices_bad_price_marked_invalid() {
        let csv = b"sku,price\nAB123,no-numerico\n";
        let rows = parse_csv_prices(csv).unwrap();
        assert_eq!(rows[0].1, -1.0);
    }

    #[test]
    fn test_parse_csv_requires_columns() {
        let csv = b"codigo,importe\nAB123,100\n";
        assert!(parse_csv_prices(csv).is_err());
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        assert!(parse_price_rows(b"{}", "precios.json").is_err());
    }
}
