use serde::Serialize;
use std::collections::HashMap;

use crate::error::{DedupError, Result};
use crate::types::{key_labels, Cell, Dataset, RowId};

/// Which role a reported field plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    EntityKey,
    Identity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateValue {
    pub value: String,
    pub count: usize,
}

/// Values of one column that occur more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDuplicates {
    pub field: String,
    pub role: FieldRole,
    pub values: Vec<DuplicateValue>,
}

/// A full entity-key tuple shared by several rows. `None` marks a null component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub key: Vec<Option<String>>,
    pub rows: Vec<RowId>,
}

/// Read-only view of repeated values, recomputed from the dataset on every call.
///
/// This is informational for the presentation layer; flagging never reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateReport {
    pub fields: Vec<FieldDuplicates>,
    pub entity_keys: Vec<DuplicateKey>,
}

impl DuplicateReport {
    /// Whether `value` is reported as repeated in `field`, for highlighting.
    pub fn is_duplicate(&self, field: &str, value: &str) -> bool {
        self.fields
            .iter()
            .filter(|f| f.field == field)
            .any(|f| f.values.iter().any(|v| v.value == value))
    }

    pub fn duplicate_count(&self, role: FieldRole) -> usize {
        self.fields
            .iter()
            .filter(|f| f.role == role)
            .map(|f| f.values.len())
            .sum()
    }
}

/// Find entity-key and identity values occurring more than once.
///
/// Nulls and blank strings are never reported. Identity fields missing from
/// the schema are skipped; entity-key fields must exist.
pub fn find_duplicates(
    dataset: &Dataset,
    entity_key_fields: &[String],
    identity_fields: &[String],
) -> Result<DuplicateReport> {
    if entity_key_fields.is_empty() {
        return Err(DedupError::EmptyGroupKey);
    }
    let key_indices = dataset.schema.require_all(entity_key_fields)?;

    let mut fields = Vec::new();
    for (field, &index) in entity_key_fields.iter().zip(&key_indices) {
        fields.push(FieldDuplicates {
            field: field.clone(),
            role: FieldRole::EntityKey,
            values: repeated_values(dataset, index),
        });
    }
    for field in identity_fields {
        match dataset.schema.index_of(field) {
            Some(index) => fields.push(FieldDuplicates {
                field: field.clone(),
                role: FieldRole::Identity,
                values: repeated_values(dataset, index),
            }),
            None => tracing::debug!(field = %field, "Identity field not in dataset, skipping"),
        }
    }

    let mut by_key: HashMap<Vec<Option<String>>, Vec<RowId>> = HashMap::new();
    for row in &dataset.rows {
        by_key
            .entry(key_labels(&row.key(&key_indices)))
            .or_default()
            .push(row.id);
    }
    let mut entity_keys: Vec<DuplicateKey> = by_key
        .into_iter()
        .filter(|(_, rows)| rows.len() > 1)
        .map(|(key, rows)| DuplicateKey { key, rows })
        .collect();
    entity_keys.sort_by(|a, b| b.rows.len().cmp(&a.rows.len()).then_with(|| a.key.cmp(&b.key)));

    Ok(DuplicateReport { fields, entity_keys })
}

fn repeated_values(dataset: &Dataset, index: usize) -> Vec<DuplicateValue> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in &dataset.rows {
        let value = match row.get(index) {
            Cell::Null => continue,
            cell => cell.to_string(),
        };
        if value.trim().is_empty() {
            continue;
        }
        *counts.entry(value).or_default() += 1;
    }

    let mut values: Vec<DuplicateValue> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(value, count)| DuplicateValue { value, count })
        .collect();
    values.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> Dataset {
        Dataset::from_text_rows(
            &["Hostname", "FQDN", "Serial Number"],
            &[
                vec!["HR-LAP-001", "hr.corp", "SN1"],
                vec!["HR-LAP-001", "hr.corp", "SN1"],
                vec!["FIN-SRV-01", "", "  "],
                vec!["FIN-SRV-01", "", "  "],
                vec!["FIN-SRV-01", "fin.corp", ""],
                vec!["DEV-01", "dev.corp", ""],
            ],
        )
        .unwrap()
    }

    fn keys() -> Vec<String> {
        vec!["Hostname".into(), "FQDN".into()]
    }

    #[test]
    fn reports_repeated_hostnames_most_frequent_first() {
        let report = find_duplicates(&inventory(), &keys(), &["Serial Number".into()]).unwrap();
        let hostnames = &report.fields[0];
        assert_eq!(hostnames.field, "Hostname");
        assert_eq!(
            hostnames.values,
            vec![
                DuplicateValue { value: "FIN-SRV-01".into(), count: 3 },
                DuplicateValue { value: "HR-LAP-001".into(), count: 2 },
            ]
        );
        assert!(report.is_duplicate("Hostname", "HR-LAP-001"));
        assert!(!report.is_duplicate("Hostname", "DEV-01"));
    }

    #[test]
    fn blank_and_null_identity_values_are_ignored() {
        let report = find_duplicates(&inventory(), &keys(), &["Serial Number".into()]).unwrap();
        let serials = report.fields.iter().find(|f| f.role == FieldRole::Identity).unwrap();
        assert_eq!(serials.values, vec![DuplicateValue { value: "SN1".into(), count: 2 }]);
        assert_eq!(report.duplicate_count(FieldRole::Identity), 1);
    }

    #[test]
    fn null_key_components_still_form_a_duplicate_tuple() {
        let report = find_duplicates(&inventory(), &keys(), &[]).unwrap();
        assert_eq!(report.entity_keys.len(), 2);
        let fin = report
            .entity_keys
            .iter()
            .find(|k| k.key == vec![Some("FIN-SRV-01".to_string()), None])
            .unwrap();
        assert_eq!(fin.rows, vec![RowId(2), RowId(3)]);
    }

    #[test]
    fn missing_identity_field_is_skipped() {
        let report = find_duplicates(&inventory(), &keys(), &["Asset Tag".into()]).unwrap();
        assert_eq!(report.fields.len(), 2);
    }

    #[test]
    fn missing_key_field_is_an_error() {
        let err = find_duplicates(&inventory(), &["Host".into()], &[]).unwrap_err();
        assert!(matches!(err, DedupError::MissingColumn(c) if c == "Host"));
    }
}
