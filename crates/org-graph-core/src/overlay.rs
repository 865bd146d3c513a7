//! Manually maintained overrides merged onto directory records.
//!
//! An [`OverlayDocument`] is a partial record keyed by employee id, written
//! with the same wire field names the directory uses. The [`OverlayStore`]
//! fetches every document once through an [`OverlaySource`] and is
//! immutable afterwards; the migration only ever reads from it.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{fields, value_text, EmployeeRecord, RecordError, SLOT_COUNT};

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("failed to read overlay documents: {0}")]
    Io(#[from] std::io::Error),
    #[error("overlay documents are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid overlay document #{index}: {source}")]
    Document {
        index: usize,
        #[source]
        source: RecordError,
    },
}

/// How an overlay treats one field of the base record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldPatch {
    /// Field not mentioned: the source value stands.
    #[default]
    Keep,
    /// Field given a value: it replaces the source value.
    Set(String),
    /// Field given `null` or `""`: the source value is dropped.
    Clear,
}

impl FieldPatch {
    fn read(map: &Map<String, Value>, key: &str) -> Self {
        match map.get(key) {
            None => FieldPatch::Keep,
            Some(value) => match value_text(value) {
                Some(text) => FieldPatch::Set(text),
                None => FieldPatch::Clear,
            },
        }
    }

    fn apply(&self, target: &mut Option<String>) {
        match self {
            FieldPatch::Keep => {}
            FieldPatch::Set(value) => *target = Some(value.clone()),
            FieldPatch::Clear => *target = None,
        }
    }

    /// Identity fields cannot be cleared, only replaced.
    fn apply_required(&self, target: &mut String) {
        if let FieldPatch::Set(value) = self {
            *target = value.clone();
        }
    }
}

/// Overrides for a single position slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotPatch {
    pub job_title: FieldPatch,
    pub location_code: FieldPatch,
    pub location_name: FieldPatch,
    pub manager_id: FieldPatch,
}

/// A partial employee record; fields present win over the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayDocument {
    pub employee_id: String,
    pub display_name: FieldPatch,
    pub first_name: FieldPatch,
    pub last_name: FieldPatch,
    pub email: FieldPatch,
    pub phone: FieldPatch,
    pub employee_type: FieldPatch,
    pub department: FieldPatch,
    pub positions: [SlotPatch; SLOT_COUNT],
}

impl OverlayDocument {
    /// Parse an overlay written with directory wire field names.
    /// Only `Employee_ID` is required.
    pub fn from_fields(map: &Map<String, Value>) -> Result<Self, RecordError> {
        let employee_id = map
            .get(fields::EMPLOYEE_ID)
            .and_then(value_text)
            .ok_or(RecordError::MissingField(fields::EMPLOYEE_ID))?;

        let positions = std::array::from_fn(|weight| SlotPatch {
            job_title: FieldPatch::read(map, &fields::slot_field(weight, fields::JOB_DESCRIPTION)),
            location_code: FieldPatch::read(map, &fields::slot_field(weight, fields::LOCATION_CODE)),
            location_name: FieldPatch::read(map, &fields::slot_field(weight, fields::LOCATION)),
            manager_id: FieldPatch::read(map, &fields::slot_field(weight, fields::MANAGER)),
        });

        Ok(Self {
            employee_id,
            display_name: FieldPatch::read(map, fields::DISPLAY_NAME),
            first_name: FieldPatch::read(map, fields::FIRST_NAME),
            last_name: FieldPatch::read(map, fields::LAST_NAME),
            email: FieldPatch::read(map, fields::EMAIL),
            phone: FieldPatch::read(map, fields::PHONE),
            employee_type: FieldPatch::read(map, fields::EMPLOYEE_TYPE),
            department: FieldPatch::read(map, fields::DEPARTMENT),
            positions,
        })
    }

    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        match value {
            Value::Object(map) => Self::from_fields(map),
            _ => Err(RecordError::NotAnObject),
        }
    }

    /// Shallow merge: every patched field replaces the record's value.
    pub fn merge_onto(&self, mut record: EmployeeRecord) -> EmployeeRecord {
        self.display_name.apply_required(&mut record.display_name);
        self.first_name.apply_required(&mut record.first_name);
        self.last_name.apply_required(&mut record.last_name);
        self.email.apply(&mut record.email);
        self.phone.apply(&mut record.phone);
        self.employee_type.apply(&mut record.employee_type);
        self.department.apply(&mut record.department);

        for (slot, patch) in record.positions.iter_mut().zip(&self.positions) {
            patch.job_title.apply(&mut slot.job_title);
            patch.location_code.apply(&mut slot.location_code);
            patch.location_name.apply(&mut slot.location_name);
            patch.manager_id.apply(&mut slot.manager_id);
        }
        record
    }
}

/// Bulk, read-only access to the overlay document collection.
#[async_trait]
pub trait OverlaySource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<OverlayDocument>, OverlayError>;
}

/// A fixed set of documents, for tests and for callers that load overlays
/// themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticOverlays(pub Vec<OverlayDocument>);

#[async_trait]
impl OverlaySource for StaticOverlays {
    async fn fetch_all(&self) -> Result<Vec<OverlayDocument>, OverlayError> {
        Ok(self.0.clone())
    }
}

/// Overlay documents indexed by employee id.
#[derive(Debug, Clone, Default)]
pub struct OverlayStore {
    documents: HashMap<String, OverlayDocument>,
}

impl OverlayStore {
    /// An empty store: every record passes through unchanged.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fetch every document once and index it. Later documents for the same
    /// employee replace earlier ones.
    pub async fn load(source: &dyn OverlaySource) -> Result<Self, OverlayError> {
        let documents = source.fetch_all().await?;
        let store = Self::from_documents(documents);
        tracing::debug!(overlays = store.len(), "loaded overlay documents");
        Ok(store)
    }

    pub fn from_documents(documents: impl IntoIterator<Item = OverlayDocument>) -> Self {
        let documents = documents
            .into_iter()
            .map(|doc| (doc.employee_id.clone(), doc))
            .collect();
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, employee_id: &str) -> Option<&OverlayDocument> {
        self.documents.get(employee_id)
    }

    /// Return `record` with the overlay for `employee_id` merged over it, or
    /// unchanged when no overlay exists.
    pub fn apply(&self, employee_id: &str, record: EmployeeRecord) -> EmployeeRecord {
        match self.documents.get(employee_id) {
            Some(doc) => doc.merge_onto(record),
            None => record,
        }
    }
}
