//! Typed response mapper: raw JSON items to domain records.

use crate::error::ValidationError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;

/// A domain record that can be validated from raw API JSON.
pub trait Record: DeserializeOwned {
    /// Resource name used in warnings and logs.
    const RESOURCE: &'static str;

    /// Identity used to de-duplicate aggregated results.
    fn natural_key(&self) -> String;
}

/// Validate one raw item. `index` is its position in the aggregated sequence.
pub fn map<T: Record>(raw: &Value, index: usize) -> Result<T, ValidationError> {
    T::deserialize(raw).map_err(|e| ValidationError {
        resource: T::RESOURCE.to_string(),
        index,
        key: raw_key(raw),
        message: e.to_string(),
    })
}

/// Validate a sequence of raw items, keeping input order.
///
/// Items that fail validation are dropped and returned as warnings.
/// `offset` is the index of the first item in the aggregated sequence.
pub fn map_page<T: Record>(items: &[Value], offset: usize) -> (Vec<T>, Vec<ValidationError>) {
    let mut records = Vec::with_capacity(items.len());
    let mut warnings = Vec::new();
    for (i, raw) in items.iter().enumerate() {
        match map::<T>(raw, offset + i) {
            Ok(record) => records.push(record),
            Err(e) => warnings.push(e),
        }
    }
    (records, warnings)
}

/// Drop records whose natural key was already seen. First occurrence wins.
pub fn dedupe<T: Record>(records: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.natural_key()))
        .collect()
}

/// Best guess at a record's identity for warnings, before it is validated.
fn raw_key(raw: &Value) -> Option<String> {
    ["id", "username", "link"]
        .iter()
        .find_map(|field| match raw.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classroom, Exam};
    use serde_json::json;

    fn classroom(id: &str) -> Value {
        json!({ "id": id, "reserves": format!("https://example.edu/aules/{}/reserves", id) })
    }

    #[test]
    fn malformed_record_becomes_warning() {
        let items = vec![
            classroom("A5001"),
            json!({ "id": "A5002" }),
            classroom("A5003"),
        ];
        let (records, warnings) = map_page::<Classroom>(&items, 10);
        let ids: Vec<_> = records.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["A5001", "A5003"]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].index, 11);
        assert_eq!(warnings[0].key.as_deref(), Some("A5002"));
        assert_eq!(warnings[0].resource, "aules");
        assert!(warnings[0].message.contains("reserves"));
    }

    #[test]
    fn wrong_types_are_rejected() {
        let raw = json!({
            "id": "not-a-number", "assig": "BD", "codi_upc": "1", "aules": "",
            "inici": "2025-01-14T08:00:00", "fi": "2025-01-14T11:00:00",
            "quatr": 1, "curs": 2024, "pla": "GRAU", "tipus": "F"
        });
        assert!(map::<Exam>(&raw, 0).is_err());
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let items = vec![classroom("A1"), classroom("A2"), classroom("A1")];
        let (mut records, _) = map_page::<Classroom>(&items, 0);
        records[2].reserves = "later".into();
        let unique = dedupe(records);
        assert_eq!(unique.len(), 2);
        assert_ne!(unique[0].reserves, "later");
    }
}
