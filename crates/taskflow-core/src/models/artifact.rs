//! Artifact records and the summaries derived from them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// One tracked file produced by a step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactRecord {
    /// Canonical path; the registry key within a task
    pub resolved_path: PathBuf,

    /// File name used inside archives and listings
    pub display_name: String,

    /// Normalized type tag such as `text` or `json`
    pub type_tag: String,

    pub size_bytes: u64,

    /// Step that produced the file, or `report` for generated reports
    pub producing_step_id: String,

    pub description: String,

    pub registered_at: Timestamp,

    /// Location of the copy inside the task directory, once copied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copied_path: Option<PathBuf>,
}

/// Listing entry returned in an [`ArtifactSummary`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub size: u64,
    pub description: String,
}

impl From<&ArtifactRecord> for ArtifactEntry {
    fn from(record: &ArtifactRecord) -> Self {
        Self {
            name: record.display_name.clone(),
            type_tag: record.type_tag.clone(),
            size: record.size_bytes,
            description: record.description.clone(),
        }
    }
}

/// Aggregate view over the artifacts of one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactSummary {
    pub task_id: String,
    pub file_count: usize,
    pub total_size: u64,
    /// Count of files per type tag
    #[serde(rename = "file_types")]
    pub type_histogram: BTreeMap<String, usize>,
    pub created_at: Timestamp,
    pub files: Vec<ArtifactEntry>,
}

impl ArtifactSummary {
    pub fn from_records(task_id: &str, created_at: Timestamp, records: &[ArtifactRecord]) -> Self {
        let mut type_histogram = BTreeMap::new();
        for record in records {
            *type_histogram.entry(record.type_tag.clone()).or_insert(0) += 1;
        }

        Self {
            task_id: task_id.to_string(),
            file_count: records.len(),
            total_size: records.iter().map(|r| r.size_bytes).sum(),
            type_histogram,
            created_at,
            files: records.iter().map(ArtifactEntry::from).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.file_count == 0
    }
}

/// Contents of `task_metadata.json` inside a task archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskFilesMetadata {
    pub task_id: String,
    pub user_id: String,
    pub created_at: Timestamp,
    pub task_dir: PathBuf,
    pub file_count: usize,
    pub total_size: u64,
}
