//! Overlay documents stored as a JSON array on disk.
//!
//! ```json
//! [
//!   {"Employee_ID": "E07715", "Display_Name": "Dr. Pat Quinn"},
//!   {"Employee_ID": "E10001", "Position_2_Job_Description": null}
//! ]
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use org_graph_core::overlay::{OverlayDocument, OverlayError, OverlaySource};
use serde_json::Value;
use tracing::warn;

pub struct JsonFileOverlays {
    path: PathBuf,
    required: bool,
}

impl JsonFileOverlays {
    /// When `required` is false a missing file reads as no overlays.
    pub fn new(path: impl Into<PathBuf>, required: bool) -> Self {
        Self {
            path: path.into(),
            required,
        }
    }
}

#[async_trait]
impl OverlaySource for JsonFileOverlays {
    async fn fetch_all(&self) -> Result<Vec<OverlayDocument>, OverlayError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !self.required => {
                warn!(path = %self.path.display(), "overlay file not found, running without overlays");
                return Ok(Vec::new());
            }
            Err(e) => return Err(OverlayError::Io(e)),
        };

        let documents: Vec<Value> = serde_json::from_str(&content)?;
        documents
            .iter()
            .enumerate()
            .map(|(index, value)| {
                OverlayDocument::from_value(value)
                    .map_err(|source| OverlayError::Document { index, source })
            })
            .collect()
    }
}
