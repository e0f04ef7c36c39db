//! Record and row snapshots attached to manipulations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// One field of a snapshot: the stored value and, when the view layer
/// formats it, the text a user actually sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    /// Raw stored value.
    pub raw: Value,
    /// Displayed representation, if it differs from the raw value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl FieldValue {
    /// Create a field carrying only a raw value.
    pub fn new(raw: impl Into<Value>) -> Self {
        Self {
            raw: raw.into(),
            display: None,
        }
    }

    /// Create a field with both a raw value and its displayed text.
    pub fn displayed(raw: impl Into<Value>, display: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            display: Some(display.into()),
        }
    }
}

/// A snapshot of an entity row keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder style).
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Look up a field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Number of fields in the snapshot.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the snapshot has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_fields() {
        let mut record = Record::new()
            .with_field("status", FieldValue::new("open"))
            .with_field("customer", FieldValue::displayed(12i64, "ACME Corp"));
        record.set("status", FieldValue::new("closed"));

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("status").unwrap().raw, Value::from("closed"));
        assert_eq!(
            record.get("customer").unwrap().display.as_deref(),
            Some("ACME Corp")
        );
        assert!(record.get("missing").is_none());

        let names: Vec<&str> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["customer", "status"]);
    }
}
