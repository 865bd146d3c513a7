//! Eligibility rules applied during traversal.
//!
//! A rejected position slot is simply not materialized; a rejected
//! subordinate is not visited, and neither is anyone below them. Neither
//! case is an error.

use crate::models::EmployeeRecord;

/// Pluggable eligibility predicates. Implementations must be pure.
pub trait Validator: Send + Sync {
    /// Whether position slot `weight` of `record` should become a
    /// `Position` node.
    fn validate_position(&self, weight: usize, record: &EmployeeRecord) -> bool;

    /// Whether `record`, found as a direct report, should be migrated
    /// together with its own subtree.
    fn validate_employee(&self, record: &EmployeeRecord) -> bool;
}

/// Accepts every slot and every employee.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate_position(&self, _weight: usize, _record: &EmployeeRecord) -> bool {
        true
    }

    fn validate_employee(&self, _record: &EmployeeRecord) -> bool {
        true
    }
}
