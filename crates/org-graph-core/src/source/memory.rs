//! In-memory [`DirectorySource`] for tests and offline runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::models::EmployeeRecord;

use super::{Conditions, DirectorySource, SourceError};

/// A directory backed by a vector of parsed records.
///
/// Records are returned in insertion order. A failure can be armed for one
/// condition set to exercise abort paths.
#[derive(Default)]
pub struct InMemoryDirectory {
    records: Vec<EmployeeRecord>,
    fail_on: Option<Conditions>,
    queries: AtomicUsize,
}

impl InMemoryDirectory {
    pub fn new(records: Vec<EmployeeRecord>) -> Self {
        Self {
            records,
            fail_on: None,
            queries: AtomicUsize::new(0),
        }
    }

    /// Make every search with exactly these conditions fail.
    pub fn failing_on(mut self, conditions: Conditions) -> Self {
        self.fail_on = Some(conditions);
        self
    }

    /// Number of `find` calls served so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectorySource for InMemoryDirectory {
    async fn find(
        &self,
        conditions: &Conditions,
        _delay: Duration,
    ) -> Result<Vec<EmployeeRecord>, SourceError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        if self.fail_on.as_ref() == Some(conditions) {
            return Err(SourceError::Unsuccessful {
                url: format!("memory://search?{}", conditions),
            });
        }

        Ok(self
            .records
            .iter()
            .filter(|record| conditions.matches(record))
            .cloned()
            .collect())
    }
}
