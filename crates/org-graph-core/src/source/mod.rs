//! Read access to the employee directory.
//!
//! The [`DirectorySource`] trait is the paged search protocol as the
//! engine sees it: `find` returns every record matching a set of equality
//! conditions, already aggregated across pages. The HTTP client lives in
//! the application crate; [`memory::InMemoryDirectory`] serves tests.

pub mod memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{fields, EmployeeRecord, RecordError};

/// Failure to obtain a page from the directory. Always fatal to a run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },
    #[error("directory reported failure for {url}")]
    Unsuccessful { url: String },
    #[error("record #{index} from {url} is invalid: {source}")]
    Record {
        url: String,
        index: usize,
        #[source]
        source: RecordError,
    },
}

/// Equality conditions of a directory search, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions(Vec<(String, String)>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `field = value` condition.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((field.into(), value.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a parsed record satisfies every condition.
    pub fn matches(&self, record: &EmployeeRecord) -> bool {
        self.iter()
            .all(|(field, value)| record.field(field) == Some(value))
    }
}

impl fmt::Display for Conditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join("&"))
    }
}

/// Paged search over the directory.
///
/// `delay` is the pause taken before each page request to stay under the
/// directory's rate limit. It is passed per call so one client can serve
/// runs with different pacing.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Every record matching `conditions`, aggregated across all pages.
    async fn find(
        &self,
        conditions: &Conditions,
        delay: Duration,
    ) -> Result<Vec<EmployeeRecord>, SourceError>;

    /// First record matching `conditions`, if any.
    async fn find_one(
        &self,
        conditions: &Conditions,
        delay: Duration,
    ) -> Result<Option<EmployeeRecord>, SourceError> {
        Ok(self.find(conditions, delay).await?.into_iter().next())
    }

    /// Employees whose primary position reports to `employee_id`.
    async fn direct_reports(
        &self,
        employee_id: &str,
        delay: Duration,
    ) -> Result<Vec<EmployeeRecord>, SourceError> {
        let conditions = Conditions::new().eq(fields::PRIMARY_MANAGER, employee_id);
        self.find(&conditions, delay).await
    }
}
