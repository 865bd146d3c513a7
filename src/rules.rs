//! Configuration-driven eligibility rules.
//!
//! Job titles are matched against case-insensitive glob patterns
//! (`"*Substitute*"`), employee types and location codes by exact,
//! case-insensitive comparison.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use org_graph_core::models::EmployeeRecord;
use org_graph_core::validate::Validator;

use crate::config::ValidationConfig;

pub struct RuleValidator {
    excluded_titles: GlobSet,
    excluded_types: Vec<String>,
    excluded_locations: Vec<String>,
}

impl RuleValidator {
    pub fn from_config(config: &ValidationConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.excluded_job_titles {
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("Invalid job title pattern: {}", pattern))?;
            builder.add(glob);
        }

        Ok(Self {
            excluded_titles: builder.build()?,
            excluded_types: lowercase(&config.excluded_employee_types),
            excluded_locations: lowercase(&config.excluded_locations),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.excluded_titles.is_empty()
            && self.excluded_types.is_empty()
            && self.excluded_locations.is_empty()
    }
}

fn lowercase(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

fn listed(list: &[String], value: Option<&str>) -> bool {
    match value {
        Some(v) => list.contains(&v.to_lowercase()),
        None => false,
    }
}

impl Validator for RuleValidator {
    fn validate_position(&self, weight: usize, record: &EmployeeRecord) -> bool {
        let slot = record.slot(weight);
        if let Some(title) = &slot.job_title {
            if self.excluded_titles.is_match(title) {
                return false;
            }
        }
        !listed(&self.excluded_locations, slot.location_code.as_deref())
    }

    fn validate_employee(&self, record: &EmployeeRecord) -> bool {
        !listed(&self.excluded_types, record.employee_type.as_deref())
    }
}
