// Attribute Enrichment
// Attribute lines are fetched ordered by attribute id ascending and matched
// to labels purely by POSITION in ATTRIBUTE_SLOTS - not by name or id. The
// server-side ordering is load-bearing: if the upstream attribute
// configuration is ever reordered, every product gets silently mislabeled.
// That contract is intentional and covered by tests; do not "fix" it here.

use std::collections::HashMap;
use serde::Serialize;
use serde_json::{json, Value};

use crate::services::odoo::client::{OdooClient, Result};

/// Fixed label slots, in upstream ordering. A template with fewer attribute
/// lines leaves the trailing slots empty; extra lines are ignored.
pub const ATTRIBUTE_SLOTS: [&str; 6] = [
    "piso",
    "serie",
    "rin",
    "carga / velocidad",
    "marca",
    "modelo",
];

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct TireAttributes {
    pub piso: Option<String>,
    pub serie: Option<String>,
    pub rin: Option<String>,
    pub carga_velocidad: Option<String>,
    pub marca: Option<String>,
    pub modelo: Option<String>,
}

impl TireAttributes {
    fn set_slot(&mut self, index: usize, value: Option<String>) {
        match index {
            0 => self.piso = value,
            1 => self.serie = value,
            2 => self.rin = value,
            3 => self.carga_velocidad = value,
            4 => self.marca = value,
            5 => self.modelo = value,
            _ => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttributeLine {
    pub attribute_id: i64,
    pub value_ids: Vec<i64>,
}

/// Map ordered attribute lines onto the fixed slots. Each line is assumed to
/// carry exactly one relevant value id; a missing value-name entry produces
/// None for that slot rather than an error.
pub fn map_by_position(lines: &[AttributeLine], value_names: &HashMap<i64, String>) -> TireAttributes {
    let mut attributes = TireAttributes::default();

    for (i, line) in lines.iter().enumerate() {
        if i >= ATTRIBUTE_SLOTS.len() {
            break;
        }
        let value = line
            .value_ids
            .first()
            .and_then(|id| value_names.get(id))
            .cloned();
        attributes.set_slot(i, value);
    }

    attributes
}

pub struct AttributeService {
    odoo: OdooClient,
}

impl AttributeService {
    pub fn new(odoo: OdooClient) -> Self {
        Self { odoo }
    }

    /// Attribute lines per template, ordered server-side by attribute id
    /// ascending. That ordering is what makes the positional mapping hold.
    async fn attribute_lines(&self, template_ids: &[i64]) -> Result<HashMap<i64, Vec<AttributeLine>>> {
        let records = self
            .odoo
            .execute_kw(
                "product.template.attribute.line",
                "search_read",
                vec![json!(["product_tmpl_id", "in", template_ids])],
                &["id", "product_tmpl_id", "attribute_id", "value_ids"],
                json!({"order": "attribute_id asc"}),
            )
            .await?;

        let mut per_template: HashMap<i64, Vec<AttributeLine>> = HashMap::new();
        for rec in &records {
            let template_id = rec
                .get("product_tmpl_id")
                .and_then(Value::as_array)
                .and_then(|pair| pair.first())
                .and_then(Value::as_i64);
            let attribute_id = rec
                .get("attribute_id")
                .and_then(Value::as_array)
                .and_then(|pair| pair.first())
                .and_then(Value::as_i64);

            if let (Some(template_id), Some(attribute_id)) = (template_id, attribute_id) {
                let value_ids = rec
                    .get("value_ids")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                    .unwrap_or_default();

                per_template
                    .entry(template_id)
                    .or_default()
                    .push(AttributeLine { attribute_id, value_ids });
            }
        }

        Ok(per_template)
    }

    async fn value_names(&self, value_ids: &[i64]) -> Result<HashMap<i64, String>> {
        if value_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let records = self
            .odoo
            .execute_kw(
                "product.attribute.value",
                "search_read",
                vec![json!(["id", "in", value_ids])],
                &["id", "name"],
                json!({}),
            )
            .await?;

        Ok(records
            .iter()
            .filter_map(|rec| {
                let id = rec.get("id")?.as_i64()?;
                let name = rec.get("name")?.as_str()?.to_string();
                Some((id, name))
            })
            .collect())
    }

    /// Human-readable attributes per template. Errors degrade to an empty
    /// map, leaving aggregates without attributes rather than failing the
    /// whole pull.
    pub async fn enrich(&self, template_ids: &[i64]) -> HashMap<i64, TireAttributes> {
        if template_ids.is_empty() {
            return HashMap::new();
        }

        let per_template = match self.attribute_lines(template_ids).await {
            Ok(lines) => lines,
            Err(e) => {
                tracing::error!("Error al obtener líneas de atributos: {}", e);
                return HashMap::new();
            }
        };

        let mut all_value_ids: Vec<i64> = per_template
            .values()
            .flatten()
            .flat_map(|line| line.value_ids.iter().copied())
            .collect();
        all_value_ids.sort_unstable();
        all_value_ids.dedup();

        let value_names = match self.value_names(&all_value_ids).await {
            Ok(names) => names,
            Err(e) => {
                tracing::error!("Error al obtener valores de atributos: {}", e);
                return HashMap::new();
            }
        };

        per_template
            .into_iter()
            .map(|(template_id, lines)| (template_id, map_by_position(&lines, &value_names)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(pairs: &[(i64, &str)]) -> HashMap<i64, String> {
        pairs.iter().map(|(id, n)| (*id, n.to_string())).collect()
    }

    #[test]
    fn test_positional_mapping_follows_input_order() {
        let value_names = names(&[(100, "185"), (200, "65")]);
        let line_a = AttributeLine { attribute_id: 50, value_ids: vec![100] };
        let line_b = AttributeLine { attribute_id: 51, value_ids: vec![200] };

        let attrs = map_by_position(&[line_a.clone(), line_b.clone()], &value_names);
        assert_eq!(attrs.piso.as_deref(), Some("185"));
        assert_eq!(attrs.serie.as_deref(), Some("65"));

        // Reordering the input flips the labels - that is the contract.
        let attrs = map_by_position(&[line_b, line_a], &value_names);
        assert_eq!(attrs.piso.as_deref(), Some("65"));
        assert_eq!(attrs.serie.as_deref(), Some("185"));
    }

    #[test]
    fn test_fewer_lines_leave_trailing_slots_empty() {
        let value_names = names(&[(1, "205"), (2, "55"), (3, "R16")]);
        let lines = vec![
            AttributeLine { attribute_id: 10, value_ids: vec![1] },
            AttributeLine { attribute_id: 11, value_ids: vec![2] },
            AttributeLine { attribute_id: 12, value_ids: vec![3] },
        ];

        let attrs = map_by_position(&lines, &value_names);
        assert_eq!(attrs.rin.as_deref(), Some("R16"));
        assert_eq!(attrs.carga_velocidad, None);
        assert_eq!(attrs.marca, None);
        assert_eq!(attrs.modelo, None);
    }

    #[test]
    fn test_extra_lines_ignored() {
        let value_names = names(&[(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e"), (6, "f"), (7, "sobra")]);
        let lines: Vec<AttributeLine> = (1..=7)
            .map(|v| AttributeLine { attribute_id: v + 40, value_ids: vec![v] })
            .collect();

        let attrs = map_by_position(&lines, &value_names);
        assert_eq!(attrs.modelo.as_deref(), Some("f"));
    }

    #[test]
    fn test_missing_value_name_yields_none() {
        let value_names = names(&[(2, "65")]);
        let lines = vec![
            // value 999 has no name entry
            AttributeLine { attribute_id: 10, value_ids: vec![999] },
            AttributeLine { attribute_id: 11, value_ids: vec![2] },
        ];

        let attrs = map_by_position(&lines, &value_names);
        assert_eq!(attrs.piso, None);
        assert_eq!(attrs.serie.as_deref(), Some("65"));
    }

    #[test]
    fn test_line_without_values_yields_none() {
        let value_names = names(&[]);
        let lines = vec![AttributeLine { attribute_id: 10, value_ids: vec![] }];
        let attrs = map_by_position(&lines, &value_names);
        assert_eq!(attrs.piso, None);
    }
}
