//! Directory records as the migration consumes them.
//!
//! The directory search API returns flat JSON objects: one key per field,
//! with position data spread over five prefixed key groups
//! (`Primary_Position_*`, `Position_2_*` … `Position_5_*`). This module
//! parses those objects into an [`EmployeeRecord`] holding a fixed array of
//! [`PositionSlot`]s, rejecting records that lack identity fields instead
//! of deferring the failure to the graph write.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Number of position slots carried by every directory record.
pub const SLOT_COUNT: usize = 5;

/// Wire field names used by the directory search API.
pub mod fields {
    pub const EMPLOYEE_ID: &str = "Employee_ID";
    pub const DISPLAY_NAME: &str = "Display_Name";
    pub const FIRST_NAME: &str = "First_Name";
    pub const LAST_NAME: &str = "Last_Name";
    pub const EMAIL: &str = "mail";
    pub const PHONE: &str = "Work_Phone";
    pub const EMPLOYEE_TYPE: &str = "Employee_Type";
    pub const DEPARTMENT: &str = "Manager_s_Default_Supervisory_Organization";

    /// Key prefix of each position slot, indexed by weight.
    pub const SLOT_PREFIXES: [&str; super::SLOT_COUNT] = [
        "Primary_Position",
        "Position_2",
        "Position_3",
        "Position_4",
        "Position_5",
    ];

    pub const JOB_DESCRIPTION: &str = "Job_Description";
    pub const LOCATION_CODE: &str = "Location_Code";
    pub const LOCATION: &str = "Location";
    pub const MANAGER: &str = "Manager";

    /// Manager of the primary position; direct reports are looked up by it.
    pub const PRIMARY_MANAGER: &str = "Primary_Position_Manager";
    pub const PRIMARY_LOCATION_CODE: &str = "Primary_Position_Location_Code";

    /// Full wire name of a per-slot field, e.g. `Position_3_Manager`.
    pub fn slot_field(weight: usize, suffix: &str) -> String {
        format!("{}_{}", SLOT_PREFIXES[weight], suffix)
    }
}

/// Errors raised while turning a wire object into a typed record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record is missing required field '{0}'")]
    MissingField(&'static str),
}

/// One job assignment of an employee. Weight 0 is the primary position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PositionSlot {
    pub job_title: Option<String>,
    pub location_code: Option<String>,
    pub location_name: Option<String>,
    pub manager_id: Option<String>,
}

/// A single employee as returned by the directory, optionally patched by an
/// overlay document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeRecord {
    pub employee_id: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub employee_type: Option<String>,
    pub department: Option<String>,
    pub positions: [PositionSlot; SLOT_COUNT],
}

/// Natural key of a `Position` node: `<employee id>-<weight>`.
pub fn position_id(employee_id: &str, weight: usize) -> String {
    format!("{}-{}", employee_id, weight)
}

impl EmployeeRecord {
    /// Parse a directory object.
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        match value {
            Value::Object(map) => Self::from_fields(map),
            _ => Err(RecordError::NotAnObject),
        }
    }

    /// Parse a flat field map. Identity fields are required; everything
    /// else is optional and blank values count as absent.
    pub fn from_fields(map: &Map<String, Value>) -> Result<Self, RecordError> {
        let positions = std::array::from_fn(|weight| PositionSlot {
            job_title: text(map, &fields::slot_field(weight, fields::JOB_DESCRIPTION)),
            location_code: text(map, &fields::slot_field(weight, fields::LOCATION_CODE)),
            location_name: text(map, &fields::slot_field(weight, fields::LOCATION)),
            manager_id: text(map, &fields::slot_field(weight, fields::MANAGER)),
        });

        Ok(Self {
            employee_id: required(map, fields::EMPLOYEE_ID)?,
            display_name: required(map, fields::DISPLAY_NAME)?,
            first_name: required(map, fields::FIRST_NAME)?,
            last_name: required(map, fields::LAST_NAME)?,
            email: text(map, fields::EMAIL),
            phone: text(map, fields::PHONE),
            employee_type: text(map, fields::EMPLOYEE_TYPE),
            department: text(map, fields::DEPARTMENT),
            positions,
        })
    }

    pub fn slot(&self, weight: usize) -> &PositionSlot {
        &self.positions[weight]
    }

    pub fn position_id(&self, weight: usize) -> String {
        position_id(&self.employee_id, weight)
    }

    pub fn primary_position_id(&self) -> String {
        self.position_id(0)
    }

    /// Look a field up by its wire name. Used to evaluate search conditions
    /// against already-parsed records.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            fields::EMPLOYEE_ID => return Some(&self.employee_id),
            fields::DISPLAY_NAME => return Some(&self.display_name),
            fields::FIRST_NAME => return Some(&self.first_name),
            fields::LAST_NAME => return Some(&self.last_name),
            fields::EMAIL => return self.email.as_deref(),
            fields::PHONE => return self.phone.as_deref(),
            fields::EMPLOYEE_TYPE => return self.employee_type.as_deref(),
            fields::DEPARTMENT => return self.department.as_deref(),
            _ => {}
        }

        for (weight, prefix) in fields::SLOT_PREFIXES.iter().enumerate() {
            let Some(suffix) = name
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('_'))
            else {
                continue;
            };
            let slot = &self.positions[weight];
            return match suffix {
                fields::JOB_DESCRIPTION => slot.job_title.as_deref(),
                fields::LOCATION_CODE => slot.location_code.as_deref(),
                fields::LOCATION => slot.location_name.as_deref(),
                fields::MANAGER => slot.manager_id.as_deref(),
                _ => None,
            };
        }
        None
    }
}

/// Normalize a wire value to text. Numbers are rendered, blanks and nulls
/// are absent.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(value_text)
}

fn required(map: &Map<String, Value>, key: &'static str) -> Result<String, RecordError> {
    text(map, key).ok_or(RecordError::MissingField(key))
}
