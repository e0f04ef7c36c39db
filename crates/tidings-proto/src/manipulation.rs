//! Entity manipulation descriptions.

use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::value::Value;

/// Kind of change a manipulation describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManipulationType {
    /// A row was created.
    Insert,
    /// A row was changed.
    Update,
    /// A row was removed.
    Delete,
    /// No structural change (e.g. a status-only notification).
    None,
}

impl ManipulationType {
    /// Whether the manipulation carries a row that can be tested against a
    /// view's search predicate.
    ///
    /// Everything else (deletes and `None`) must reach every view on the
    /// channel unconditionally.
    pub fn is_upsert(&self) -> bool {
        matches!(self, ManipulationType::Insert | ManipulationType::Update)
    }
}

/// A description of one entity row's insert/update/delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manipulation {
    /// Entity class name of the changed row.
    pub entity: String,
    /// Primary key of the changed row.
    pub primary_key: Value,
    /// Kind of change.
    #[serde(rename = "type")]
    pub kind: ManipulationType,
    /// Pipeline status reported by the save operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Record snapshot, used for search matching.
    #[serde(default)]
    pub record: Record,
    /// Row snapshot as a list view would render it.
    #[serde(default)]
    pub row: Record,
    /// Owner of the changed row, if the entity is owned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// View this manipulation was matched for. Empty until delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_view: Option<String>,
}

impl Manipulation {
    /// Create a manipulation with empty snapshots.
    pub fn new(
        entity: impl Into<String>,
        primary_key: impl Into<Value>,
        kind: ManipulationType,
    ) -> Self {
        Self {
            entity: entity.into(),
            primary_key: primary_key.into(),
            kind,
            status: None,
            record: Record::new(),
            row: Record::new(),
            owner: None,
            target_view: None,
        }
    }

    /// Shorthand for an insert manipulation.
    pub fn insert(entity: impl Into<String>, primary_key: impl Into<Value>) -> Self {
        Self::new(entity, primary_key, ManipulationType::Insert)
    }

    /// Shorthand for an update manipulation.
    pub fn update(entity: impl Into<String>, primary_key: impl Into<Value>) -> Self {
        Self::new(entity, primary_key, ManipulationType::Update)
    }

    /// Shorthand for a delete manipulation.
    pub fn delete(entity: impl Into<String>, primary_key: impl Into<Value>) -> Self {
        Self::new(entity, primary_key, ManipulationType::Delete)
    }

    /// Attach the record snapshot.
    pub fn with_record(mut self, record: Record) -> Self {
        self.record = record;
        self
    }

    /// Attach the row snapshot.
    pub fn with_row(mut self, row: Record) -> Self {
        self.row = row;
        self
    }

    /// Set the pipeline status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the owner.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Copy this manipulation tagged for the given view.
    pub fn for_view(&self, view_id: &str) -> Self {
        let mut tagged = self.clone();
        tagged.target_view = Some(view_id.to_string());
        tagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    #[test]
    fn test_is_upsert() {
        assert!(ManipulationType::Insert.is_upsert());
        assert!(ManipulationType::Update.is_upsert());
        assert!(!ManipulationType::Delete.is_upsert());
        assert!(!ManipulationType::None.is_upsert());
    }

    #[test]
    fn test_for_view_leaves_original_untouched() {
        let original = Manipulation::update("Order", 1i64)
            .with_record(Record::new().with_field("status", FieldValue::new("open")))
            .with_status("saved");

        let tagged = original.for_view("grid1");

        assert_eq!(tagged.target_view.as_deref(), Some("grid1"));
        assert!(original.target_view.is_none());
        assert_eq!(tagged.record, original.record);
        assert_eq!(tagged.status.as_deref(), Some("saved"));
    }
}
