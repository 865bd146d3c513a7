//! HTTP client for the employee directory search API.
//!
//! # Endpoints
//!
//! | Endpoint | Purpose |
//! |----------|---------|
//! | `GET {search_path}?q[Field]=value&page=N&page_size=100` | Paged record search |
//! | `GET {field_values_path}/<Field>/values?q[Field]=value` | Distinct values of one field |
//!
//! Both answer with `{"success": bool, "message": [...]}`. Anything else
//! (transport failure, non-2xx status, invalid JSON, `success: false`) is a
//! [`SourceError`].
//!
//! # Pagination
//!
//! [`DirectoryClient::find`] requests page 0, 1, 2, … and stops at the
//! first page holding fewer than `page_size` items, so a result of exactly
//! `k * page_size` records costs one extra, empty request. All pages are
//! collected before returning.
//!
//! # Rate limiting
//!
//! The caller-supplied delay is slept before every request, including the
//! first.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use org_graph_core::models::{fields, value_text, EmployeeRecord};
use org_graph_core::source::{Conditions, DirectorySource, SourceError};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::DirectoryConfig;

/// Response envelope shared by every directory endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    message: Option<Vec<Value>>,
}

pub struct DirectoryClient {
    client: reqwest::Client,
    base_url: String,
    search_path: String,
    field_values_path: String,
    page_size: usize,
}

impl DirectoryClient {
    pub fn new(config: &DirectoryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            search_path: config.search_path.clone(),
            field_values_path: config.field_values_path.trim_end_matches('/').to_string(),
            page_size: config.page_size,
        })
    }

    fn search_url(&self) -> String {
        format!("{}{}", self.base_url, self.search_path)
    }

    fn field_values_url(&self, field: &str) -> String {
        format!("{}{}/{}/values", self.base_url, self.field_values_path, field)
    }

    /// Send one GET and unwrap the `{success, message}` envelope.
    async fn get_envelope(
        &self,
        url: &str,
        query: &[(String, String)],
        delay: Duration,
    ) -> Result<Vec<Value>, SourceError> {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| SourceError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let envelope: Envelope =
            serde_json::from_str(&body).map_err(|e| SourceError::Malformed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !envelope.success {
            return Err(SourceError::Unsuccessful {
                url: url.to_string(),
            });
        }

        Ok(envelope.message.unwrap_or_default())
    }

    async fn fetch_page(
        &self,
        conditions: &Conditions,
        page: usize,
        delay: Duration,
    ) -> Result<Vec<EmployeeRecord>, SourceError> {
        let url = self.search_url();
        let mut query = condition_query(conditions);
        query.push(("page".to_string(), page.to_string()));
        query.push(("page_size".to_string(), self.page_size.to_string()));

        let items = self.get_envelope(&url, &query, delay).await?;

        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                EmployeeRecord::from_value(item).map_err(|source| SourceError::Record {
                    url: url.clone(),
                    index: page * self.page_size + index,
                    source,
                })
            })
            .collect()
    }

    /// Distinct, non-empty values of `field` among records matching
    /// `conditions`, in the order the directory returns them.
    pub async fn field_values(
        &self,
        field: &str,
        conditions: &Conditions,
        delay: Duration,
    ) -> Result<Vec<String>, SourceError> {
        let url = self.field_values_url(field);
        let items = self
            .get_envelope(&url, &condition_query(conditions), delay)
            .await?;

        let mut values: Vec<String> = Vec::new();
        for value in items.iter().filter_map(value_text) {
            if !values.contains(&value) {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Department names of employees whose primary position is at
    /// `location_code`.
    pub async fn departments_for_location(
        &self,
        location_code: &str,
        delay: Duration,
    ) -> Result<Vec<String>, SourceError> {
        let conditions = Conditions::new().eq(fields::PRIMARY_LOCATION_CODE, location_code);
        self.field_values(fields::DEPARTMENT, &conditions, delay)
            .await
    }

    /// Department names across several locations, without repeats.
    pub async fn departments(
        &self,
        location_codes: &[String],
        delay: Duration,
    ) -> Result<Vec<String>, SourceError> {
        let mut all: Vec<String> = Vec::new();
        for code in location_codes {
            for name in self.departments_for_location(code, delay).await? {
                if !all.contains(&name) {
                    all.push(name);
                }
            }
        }
        Ok(all)
    }

    /// The first employee whose department field names `department`.
    pub async fn department_head(
        &self,
        department: &str,
        delay: Duration,
    ) -> Result<Option<EmployeeRecord>, SourceError> {
        let conditions = Conditions::new().eq(fields::DEPARTMENT, department);
        self.find_one(&conditions, delay).await
    }
}

/// Encode conditions the way the directory expects: `q[Field]=value`.
fn condition_query(conditions: &Conditions) -> Vec<(String, String)> {
    conditions
        .iter()
        .map(|(field, value)| (format!("q[{}]", field), value.to_string()))
        .collect()
}

#[async_trait]
impl DirectorySource for DirectoryClient {
    async fn find(
        &self,
        conditions: &Conditions,
        delay: Duration,
    ) -> Result<Vec<EmployeeRecord>, SourceError> {
        let mut records = Vec::new();
        let mut page = 0;

        loop {
            let batch = self.fetch_page(conditions, page, delay).await?;
            let count = batch.len();
            records.extend(batch);

            debug!(conditions = %conditions, page, count, "directory page");

            if count < self.page_size {
                break;
            }
            page += 1;
        }

        Ok(records)
    }
}
