//! Persisted task reports.
//!
//! A [`ResultReporter`] turns a finished task into a [`Report`], writes it
//! as JSON and plain text under `<storage>/reports/`, keeps a raw dump of
//! plan and result under `<storage>/raw_data/`, and answers history
//! queries from the saved JSON reports. Every method here does blocking
//! filesystem work; async callers should go through `spawn_blocking`.

mod model;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use jiff::{Timestamp, Zoned};
use serde_json::json;

use crate::artifacts::ArtifactRegistry;
use crate::error::{FsResultExt, Result};
use crate::models::{ExecutionResult, StepStatus, Task};

pub use model::{
    ExecutionSummary, HistoryEntry, Report, ReportFormat, ReportMetadata, ResultType,
    StepAnalysis, StepDetail, TaskInfo, REPORT_VERSION,
};

const REPORTS_DIR: &str = "reports";
const RAW_DATA_DIR: &str = "raw_data";
const LOGS_DIR: &str = "logs";

/// Maximum characters of user input shown in history entries.
pub const HISTORY_INPUT_LIMIT: usize = 100;

/// Step id recorded on artifacts that are reports themselves.
pub const REPORT_STEP_ID: &str = "report";

#[derive(Debug)]
pub struct ResultReporter {
    storage_dir: PathBuf,
    artifacts: Option<Arc<ArtifactRegistry>>,
}

impl ResultReporter {
    /// Opens (and creates) the storage layout under `storage_dir`.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        let storage_dir = storage_dir.into();
        for sub in [REPORTS_DIR, RAW_DATA_DIR, LOGS_DIR] {
            let dir = storage_dir.join(sub);
            fs::create_dir_all(&dir).fs_context(&dir)?;
        }
        Ok(Self {
            storage_dir,
            artifacts: None,
        })
    }

    /// Saved reports are also registered as artifacts of their task.
    pub fn with_artifacts(mut self, artifacts: Arc<ArtifactRegistry>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.storage_dir.join(REPORTS_DIR)
    }

    pub fn raw_data_dir(&self) -> PathBuf {
        self.storage_dir.join(RAW_DATA_DIR)
    }

    /// Builds the report for a finished task.
    pub fn build(&self, result: &ExecutionResult, task: &Task) -> Report {
        let step_details = result
            .results
            .iter()
            .map(|outcome| {
                let duration = task
                    .plan
                    .step(&outcome.step_id)
                    .and_then(|s| s.duration_secs());
                StepDetail {
                    outcome: outcome.clone(),
                    analysis: StepAnalysis {
                        execution_duration: duration,
                        result_type: ResultType::classify(&outcome.result),
                        success_score: if outcome.status == StepStatus::Completed {
                            1.0
                        } else {
                            0.0
                        },
                    },
                }
            })
            .collect();

        Report {
            task_info: TaskInfo {
                task_id: task.task_id.clone(),
                user_input: task.user_input.clone(),
                task_type: task.task_type.clone(),
                complexity_level: task.complexity.clone(),
                status: task.status.to_string(),
            },
            execution_summary: ExecutionSummary {
                success: result.success,
                execution_time: result.execution_time,
                total_steps: result.results.len(),
                successful_steps: result.completed_steps(),
                failed_steps: result.failed_steps(),
                files_generated: result.files_generated.clone(),
                error_message: result.error_message.clone(),
            },
            step_details,
            metadata: ReportMetadata {
                generated_at: Timestamp::now(),
                report_version: REPORT_VERSION.to_string(),
            },
        }
    }

    /// Writes the report in each requested format.
    ///
    /// Returns the written path per format. Formats listed twice are only
    /// written once.
    pub fn save(
        &self,
        report: &Report,
        formats: &[ReportFormat],
    ) -> Result<BTreeMap<ReportFormat, PathBuf>> {
        let task_id = &report.task_info.task_id;
        let stamp = file_stamp();
        let mut written = BTreeMap::new();

        for format in formats {
            if written.contains_key(format) {
                continue;
            }
            let path = self
                .reports_dir()
                .join(format!("report_{task_id}_{stamp}.{}", format.extension()));
            let body = match format {
                ReportFormat::Json => serde_json::to_string_pretty(report)?,
                ReportFormat::Text => report.to_text(),
            };
            fs::write(&path, body).fs_context(&path)?;
            log::info!("Saved {format} report {}", path.display());

            if let Some(artifacts) = &self.artifacts {
                let description = match format {
                    ReportFormat::Json => "Task execution report (JSON)",
                    ReportFormat::Text => "Task execution report (text)",
                };
                artifacts.register(task_id, &path, format.as_str(), REPORT_STEP_ID, description);
            }
            written.insert(*format, path);
        }
        Ok(written)
    }

    /// Dumps the full task and result for later inspection.
    pub fn save_raw(&self, result: &ExecutionResult, task: &Task) -> Result<PathBuf> {
        let path = self
            .raw_data_dir()
            .join(format!("raw_{}_{}.json", task.task_id, file_stamp()));
        let dump = json!({
            "task_plan": task,
            "execution_result": result,
            "metadata": {
                "saved_at": Timestamp::now(),
                "version": REPORT_VERSION,
            },
        });
        fs::write(&path, serde_json::to_string_pretty(&dump)?).fs_context(&path)?;
        log::debug!("Saved raw data {}", path.display());
        Ok(path)
    }

    /// Most recent reports first, at most `limit` entries.
    ///
    /// Reports that cannot be read or parsed are skipped.
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let dir = self.reports_dir();
        let mut reports = Vec::new();
        for entry in fs::read_dir(&dir).fs_context(&dir)? {
            let entry = entry.fs_context(&dir)?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with("report_") && name.ends_with(".json")) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            reports.push((modified, entry.path()));
        }
        reports.sort_by(|a, b| b.0.cmp(&a.0));

        let mut history = Vec::new();
        for (_, path) in reports {
            if history.len() >= limit {
                break;
            }
            match read_report(&path) {
                Ok(report) => history.push(history_entry(report, path)),
                Err(e) => log::warn!("Skipping unreadable report {}: {e}", path.display()),
            }
        }
        Ok(history)
    }

    /// Deletes stored files last modified more than `older_than` ago.
    pub fn purge(&self, older_than: Duration) -> Result<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let removed = purge_dir(&self.storage_dir, cutoff)?;
        log::info!("Purged {removed} stored result files");
        Ok(removed)
    }
}

fn file_stamp() -> String {
    Zoned::now().strftime("%Y%m%d_%H%M%S").to_string()
}

fn read_report(path: &Path) -> Result<Report> {
    let raw = fs::read_to_string(path).fs_context(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn history_entry(report: Report, report_file: PathBuf) -> HistoryEntry {
    let input = &report.task_info.user_input;
    let user_input = if input.chars().count() > HISTORY_INPUT_LIMIT {
        let cut: String = input.chars().take(HISTORY_INPUT_LIMIT).collect();
        format!("{cut}...")
    } else {
        input.clone()
    };
    HistoryEntry {
        task_id: report.task_info.task_id,
        user_input,
        success: report.execution_summary.success,
        execution_time: report.execution_summary.execution_time,
        files_generated: report.execution_summary.files_generated.len(),
        generated_at: report.metadata.generated_at,
        report_file,
    }
}

fn purge_dir(dir: &Path, cutoff: SystemTime) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir).fs_context(dir)? {
        let entry = entry.fs_context(dir)?;
        let path = entry.path();
        let file_type = entry.file_type().fs_context(&path)?;
        if file_type.is_dir() {
            removed += purge_dir(&path, cutoff)?;
            continue;
        }
        let modified = entry.metadata().and_then(|m| m.modified()).fs_context(&path)?;
        if modified < cutoff {
            fs::remove_file(&path).fs_context(&path)?;
            log::debug!("Removed {}", path.display());
            removed += 1;
        }
    }
    Ok(removed)
}
