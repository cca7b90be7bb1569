//! Per-task registry of files produced by steps.
//!
//! Files are keyed by canonical path within a task, so the same file is never
//! recorded twice. Registration normalizes the file extension to match the
//! declared type, renaming the file on disk when needed. Tasks own a
//! directory at `<base>/<user>/<task>` and can be packaged into
//! `<base>/<user>/<task>_files.zip`.

pub mod extension;
pub mod extract;
pub mod package;
mod resolve;

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use jiff::Timestamp;
use serde_json::Value;

pub use extract::{FileRef, ToolResult};
pub use resolve::{SearchPathPolicy, SearchRoot};

use crate::error::{FsResultExt, OrchestratorError, Result};
use crate::models::{ArtifactRecord, ArtifactSummary, TaskFilesMetadata};

/// User ID assumed when a file is registered for a task nobody created.
pub const DEFAULT_USER: &str = "default";

/// Checks that `value` is usable as exactly one directory name.
///
/// User and task ids become path segments under the base directory, so
/// separators, `.` and `..` are rejected.
pub fn path_segment<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let mut components = Path::new(value).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_normal || value.contains(['/', '\\']) {
        return Err(OrchestratorError::invalid_input(field)
            .with_reason("must be a single path component without separators"));
    }
    Ok(value)
}

#[derive(Debug)]
struct TaskArtifacts {
    user_id: String,
    created_at: Timestamp,
    task_dir: PathBuf,
    files: Vec<ArtifactRecord>,
}

impl TaskArtifacts {
    fn metadata(&self, task_id: &str) -> TaskFilesMetadata {
        TaskFilesMetadata {
            task_id: task_id.to_string(),
            user_id: self.user_id.clone(),
            created_at: self.created_at,
            task_dir: self.task_dir.clone(),
            file_count: self.files.len(),
            total_size: self.files.iter().map(|f| f.size_bytes).sum(),
        }
    }

    fn contains(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f.resolved_path == path)
    }
}

/// Tracks artifacts for every task in the process.
#[derive(Debug)]
pub struct ArtifactRegistry {
    base_dir: PathBuf,
    search_paths: SearchPathPolicy,
    tasks: Mutex<HashMap<String, TaskArtifacts>>,
}

impl ArtifactRegistry {
    /// Creates a registry rooted at `base_dir`, creating the directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).fs_context(&base_dir)?;
        log::debug!("Artifact registry rooted at {}", base_dir.display());
        Ok(Self {
            base_dir,
            search_paths: SearchPathPolicy::default(),
            tasks: Mutex::new(HashMap::new()),
        })
    }

    /// Replaces the policy used to locate missing nominal paths.
    pub fn with_search_paths(mut self, policy: SearchPathPolicy) -> Self {
        self.search_paths = policy;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `<base>/<user>/<task>`, rejecting ids that would leave the base.
    pub fn task_dir(&self, task_id: &str, user_id: &str) -> Result<PathBuf> {
        Ok(self
            .base_dir
            .join(path_segment("user_id", user_id)?)
            .join(path_segment("task_id", task_id)?))
    }

    pub fn archive_path(&self, task_id: &str, user_id: &str) -> Result<PathBuf> {
        let task_id = path_segment("task_id", task_id)?;
        Ok(self
            .base_dir
            .join(path_segment("user_id", user_id)?)
            .join(format!("{task_id}_files.zip")))
    }

    /// Creates `<base>/<user>/<task>` and starts tracking the task.
    pub fn create_task_directory(&self, task_id: &str, user_id: &str) -> Result<PathBuf> {
        let task_dir = self.task_dir(task_id, user_id)?;
        fs::create_dir_all(&task_dir).fs_context(&task_dir)?;

        self.lock()
            .entry(task_id.to_string())
            .or_insert_with(|| TaskArtifacts {
                user_id: user_id.to_string(),
                created_at: Timestamp::now(),
                task_dir: task_dir.clone(),
                files: Vec::new(),
            });

        log::info!("Created task directory {}", task_dir.display());
        Ok(task_dir)
    }

    /// Records `path` for the task.
    ///
    /// Returns false when the file does not exist. Registering a path that
    /// is already tracked returns true without adding a record.
    pub fn register(
        &self,
        task_id: &str,
        path: &Path,
        type_tag: &str,
        step_id: &str,
        description: &str,
    ) -> bool {
        self.register_path(task_id, path, type_tag, step_id, description)
            .is_some()
    }

    /// Like [`register`](Self::register) but returns the stored canonical path.
    fn register_path(
        &self,
        task_id: &str,
        path: &Path,
        type_tag: &str,
        step_id: &str,
        description: &str,
    ) -> Option<PathBuf> {
        if !path.exists() {
            log::warn!("File does not exist, not registering: {}", path.display());
            return None;
        }

        match self.try_register(task_id, path, type_tag, step_id, description) {
            Ok(stored) => Some(stored),
            Err(e) => {
                log::error!("Failed to register {}: {e}", path.display());
                None
            }
        }
    }

    fn try_register(
        &self,
        task_id: &str,
        path: &Path,
        type_tag: &str,
        step_id: &str,
        description: &str,
    ) -> Result<PathBuf> {
        let canonical = path.canonicalize().fs_context(path)?;
        if self.is_registered(task_id, &canonical) {
            log::debug!("Already registered: {}", canonical.display());
            return Ok(canonical);
        }

        let original_name = canonical
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let fixed_name = extension::normalize_file_name(&original_name, type_tag);

        let renamed = canonical.with_file_name(&fixed_name);
        let (resolved_path, display_name) = if fixed_name == original_name {
            (canonical, original_name)
        } else if renamed.exists() {
            log::warn!("Keeping {original_name}: {fixed_name} already exists");
            (canonical, original_name)
        } else {
            match fs::rename(&canonical, &renamed) {
                Ok(()) => {
                    log::info!("Renamed {original_name} to {fixed_name}");
                    (renamed, fixed_name)
                }
                Err(e) => {
                    log::warn!("Could not rename {original_name} to {fixed_name}: {e}");
                    (canonical, original_name)
                }
            }
        };

        let size_bytes = fs::metadata(&resolved_path)
            .fs_context(&resolved_path)?
            .len();
        let default_dir = self.task_dir(task_id, DEFAULT_USER)?;

        let mut tasks = self.lock();
        let entry = tasks
            .entry(task_id.to_string())
            .or_insert_with(|| TaskArtifacts {
                user_id: DEFAULT_USER.to_string(),
                created_at: Timestamp::now(),
                task_dir: default_dir,
                files: Vec::new(),
            });

        if !entry.contains(&resolved_path) {
            entry.files.push(ArtifactRecord {
                resolved_path: resolved_path.clone(),
                display_name,
                type_tag: type_tag.to_string(),
                size_bytes,
                producing_step_id: step_id.to_string(),
                description: description.to_string(),
                registered_at: Timestamp::now(),
                copied_path: None,
            });
            log::info!(
                "Registered {} for task {task_id}",
                resolved_path.display()
            );
        }
        Ok(resolved_path)
    }

    /// Decodes a raw step result and registers every file it mentions.
    ///
    /// Missing nominal paths go through the search-path policy. Returns the
    /// canonical paths that ended up registered.
    pub fn extract_from_result(
        &self,
        task_id: &str,
        raw: &Value,
        tool_name: &str,
        step_id: &str,
        description: &str,
    ) -> Vec<PathBuf> {
        let decoded = ToolResult::decode(raw);
        log::debug!("Result of {tool_name} decoded as {decoded:?}");

        let tracked = self.lock().get(task_id).map(|t| t.task_dir.clone());
        let task_dir = match tracked {
            Some(dir) => dir,
            None => match self.task_dir(task_id, DEFAULT_USER) {
                Ok(dir) => dir,
                Err(e) => {
                    log::warn!("Not extracting artifacts for task {task_id}: {e}");
                    return Vec::new();
                }
            },
        };

        let mut registered = Vec::new();
        for (file, is_chart) in decoded.files() {
            let nominal = Path::new(&file.path);
            let Some(resolved) = self
                .search_paths
                .resolve(nominal, &task_dir, &self.base_dir)
            else {
                log::warn!("Artifact {} not found in any search root", file.path);
                continue;
            };

            let type_tag = if file.type_tag == "unknown" {
                extension::infer_type(&resolved)
            } else {
                file.type_tag.as_str()
            };
            let description = if is_chart {
                format!("Chart file - {description}")
            } else {
                description.to_string()
            };

            if let Some(stored) =
                self.register_path(task_id, &resolved, type_tag, step_id, &description)
            {
                registered.push(stored);
            }
        }
        registered
    }

    /// Copies every registered file into the task directory.
    ///
    /// Returns the number of files copied and records each copy's location.
    pub fn copy_to_task_directory(&self, task_id: &str, user_id: &str) -> Result<usize> {
        let records = self.files(task_id);
        if records.is_empty() {
            log::warn!("Task {task_id} has no registered files");
            return Ok(0);
        }

        let task_dir = self.create_task_directory(task_id, user_id)?;
        let mut copied = Vec::new();
        for record in &records {
            let target = task_dir.join(&record.display_name);
            if record.resolved_path == target {
                copied.push((record.resolved_path.clone(), target));
                continue;
            }
            match fs::copy(&record.resolved_path, &target) {
                Ok(_) => copied.push((record.resolved_path.clone(), target)),
                Err(e) => log::warn!(
                    "Could not copy {} to {}: {e}",
                    record.resolved_path.display(),
                    target.display()
                ),
            }
        }

        let mut tasks = self.lock();
        if let Some(entry) = tasks.get_mut(task_id) {
            for (source, target) in &copied {
                if let Some(record) = entry.files.iter_mut().find(|r| &r.resolved_path == source) {
                    record.copied_path = Some(target.clone());
                }
            }
        }
        log::info!("Copied {} files into {}", copied.len(), task_dir.display());
        Ok(copied.len())
    }

    /// Packages the task's files into `<base>/<user>/<task>_files.zip`.
    ///
    /// Returns `None` when the task has nothing registered or belongs to
    /// another user.
    pub fn package(&self, task_id: &str, user_id: &str) -> Result<Option<PathBuf>> {
        let zip_path = self.archive_path(task_id, user_id)?;
        let (records, metadata) = {
            let tasks = self.lock();
            match tasks.get(task_id) {
                Some(entry) if entry.user_id != user_id => {
                    log::warn!("Task {task_id} is not owned by {user_id}, not packaging");
                    return Ok(None);
                }
                Some(entry) if !entry.files.is_empty() => {
                    (entry.files.clone(), entry.metadata(task_id))
                }
                _ => return Ok(None),
            }
        };

        let user_dir = self.base_dir.join(user_id);
        fs::create_dir_all(&user_dir).fs_context(&user_dir)?;

        let written = package::write_archive(&zip_path, &records, &metadata)?;
        log::info!(
            "Packaged {written} files for task {task_id} into {}",
            zip_path.display()
        );
        Ok(Some(zip_path))
    }

    pub fn summary(&self, task_id: &str) -> Option<ArtifactSummary> {
        self.lock()
            .get(task_id)
            .map(|entry| ArtifactSummary::from_records(task_id, entry.created_at, &entry.files))
    }

    pub fn files(&self, task_id: &str) -> Vec<ArtifactRecord> {
        self.lock()
            .get(task_id)
            .map(|entry| entry.files.clone())
            .unwrap_or_default()
    }

    pub fn metadata(&self, task_id: &str) -> Option<TaskFilesMetadata> {
        self.lock().get(task_id).map(|entry| entry.metadata(task_id))
    }

    /// Deletes the task directory and archive, and forgets the task.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::TaskNotFound` if another user owns the task
    pub fn cleanup(&self, task_id: &str, user_id: &str) -> Result<()> {
        let task_dir = self.task_dir(task_id, user_id)?;
        let zip_path = self.archive_path(task_id, user_id)?;
        if self
            .lock()
            .get(task_id)
            .is_some_and(|entry| entry.user_id != user_id)
        {
            return Err(OrchestratorError::TaskNotFound {
                task_id: task_id.to_string(),
            });
        }

        if task_dir.exists() {
            fs::remove_dir_all(&task_dir).fs_context(&task_dir)?;
            log::info!("Removed task directory {}", task_dir.display());
        }

        if zip_path.exists() {
            fs::remove_file(&zip_path).fs_context(&zip_path)?;
            log::info!("Removed archive {}", zip_path.display());
        }

        self.lock().remove(task_id);
        Ok(())
    }

    fn is_registered(&self, task_id: &str, path: &Path) -> bool {
        self.lock()
            .get(task_id)
            .is_some_and(|entry| entry.contains(path))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TaskArtifacts>> {
        self.tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn registry() -> (ArtifactRegistry, TempDir) {
        let dir = TempDir::new().unwrap();
        let registry = ArtifactRegistry::new(dir.path().join("artifacts")).unwrap();
        (registry, dir)
    }

    #[test]
    fn test_register_missing_file_returns_false() {
        let (reg, dir) = registry();
        assert!(!reg.register("t1", &dir.path().join("nope.txt"), "text", "s1", ""));
        assert!(reg.summary("t1").is_none());
    }

    #[test]
    fn test_register_dedups_canonical_paths() {
        let (reg, dir) = registry();
        let file = dir.path().join("a.txt");
        fs::write(&file, "hello").unwrap();

        assert!(reg.register("t1", &file, "text", "s1", "first"));
        let indirect = dir.path().join(".").join("a.txt");
        assert!(reg.register("t1", &indirect, "text", "s2", "second"));

        let files = reg.files("t1");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].description, "first");
        assert_eq!(files[0].size_bytes, 5);
    }

    #[test]
    fn test_register_normalizes_extension() {
        let (reg, dir) = registry();
        let file = dir.path().join("report");
        fs::write(&file, "{}").unwrap();

        assert!(reg.register("t1", &file, "json", "s1", ""));
        assert!(!file.exists());
        assert!(dir.path().join("report.json").exists());
        assert_eq!(reg.files("t1")[0].display_name, "report.json");

        let other = dir.path().join("summary.json");
        fs::write(&other, "{}").unwrap();
        assert!(reg.register("t2", &other, "json", "s1", ""));
        assert!(other.exists());
        assert_eq!(reg.files("t2")[0].display_name, "summary.json");
    }

    #[test]
    fn test_rename_never_overwrites_existing_file() {
        let (reg, dir) = registry();
        let existing = dir.path().join("data.json");
        fs::write(&existing, "{\"first\": true}").unwrap();
        assert!(reg.register("t1", &existing, "json", "s1", ""));

        let bare = dir.path().join("data");
        fs::write(&bare, "{}").unwrap();
        assert!(reg.register("t1", &bare, "json", "s2", ""));

        assert!(bare.exists());
        assert_eq!(fs::read_to_string(&existing).unwrap(), "{\"first\": true}");
        let files = reg.files("t1");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].size_bytes, 15);
        assert_eq!(files[1].display_name, "data");
    }

    #[test]
    fn test_path_segment_rejects_traversal() {
        for bad in ["", ".", "..", "../escaped", "a/b", "a\\b", "/abs"] {
            assert!(
                matches!(
                    path_segment("user_id", bad),
                    Err(OrchestratorError::InvalidInput { .. })
                ),
                "accepted {bad:?}"
            );
        }
        assert_eq!(path_segment("user_id", "alice").unwrap(), "alice");
        assert_eq!(path_segment("task_id", "a.b-c_1").unwrap(), "a.b-c_1");
    }

    #[test]
    fn test_paths_stay_under_base() {
        let (reg, _dir) = registry();
        assert!(reg.task_dir("t1", "../../escaped").is_err());
        assert!(reg.archive_path("../t1", "alice").is_err());
        assert!(reg.create_task_directory("t1", "..").is_err());
        assert!(reg.cleanup("../..", "alice").is_err());
        assert!(reg.package("t1", "a/b").is_err());
        assert!(reg.metadata("t1").is_none());
    }

    #[test]
    fn test_package_and_cleanup_require_owner() {
        let (reg, _dir) = registry();
        let task_dir = reg.create_task_directory("t1", "alice").unwrap();
        let file = task_dir.join("out.txt");
        fs::write(&file, "out").unwrap();
        reg.register("t1", &file, "text", "s1", "");

        assert!(reg.package("t1", "mallory").unwrap().is_none());
        assert!(!reg.base_dir().join("mallory").exists());
        assert!(matches!(
            reg.cleanup("t1", "mallory"),
            Err(OrchestratorError::TaskNotFound { .. })
        ));
        assert!(task_dir.exists());
        assert!(reg.package("t1", "alice").unwrap().is_some());
    }

    #[test]
    fn test_unknown_type_keeps_name() {
        let (reg, dir) = registry();
        let file = dir.path().join("blob.bin");
        fs::write(&file, [0u8, 1, 2]).unwrap();
        assert!(reg.register("t1", &file, "unknown", "s1", ""));
        assert_eq!(reg.files("t1")[0].display_name, "blob.bin");
    }

    #[test]
    fn test_extract_direct_result() {
        let (reg, dir) = registry();
        let file = dir.path().join("x.txt");
        fs::write(&file, "x").unwrap();

        let raw = json!({"file_path": file.to_str().unwrap(), "file_type": "text"});
        let paths = reg.extract_from_result("t1", &raw, "file_generation_tool", "s1", "Write x");

        assert_eq!(paths, vec![file.canonicalize().unwrap()]);
        let files = reg.files("t1");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].type_tag, "text");
        assert_eq!(files[0].producing_step_id, "s1");
    }

    #[test]
    fn test_extract_chart_prefixes_description() {
        let (reg, dir) = registry();
        let file = dir.path().join("chart.html");
        fs::write(&file, "<html></html>").unwrap();

        let raw = json!({"type": "chart", "success": true, "file_path": file.to_str().unwrap()});
        reg.extract_from_result("t1", &raw, "data_chart_tool", "s1", "Sales");

        let files = reg.files("t1");
        assert_eq!(files[0].type_tag, "html");
        assert_eq!(files[0].description, "Chart file - Sales");
    }

    #[test]
    fn test_extract_infers_type_and_uses_search_paths() {
        let (reg, _dir) = registry();
        let task_dir = reg.create_task_directory("t1", "alice").unwrap();
        fs::write(task_dir.join("main.py"), "print(1)").unwrap();

        let raw = json!("generated_files/main.py");
        let paths = reg.extract_from_result("t1", &raw, "file_generation_tool", "s1", "");

        assert_eq!(paths.len(), 1);
        assert_eq!(reg.files("t1")[0].type_tag, "python");
    }

    #[test]
    fn test_extract_opaque_registers_nothing() {
        let (reg, _dir) = registry();
        let paths = reg.extract_from_result("t1", &json!({"text": "hi"}), "echo_tool", "s1", "");
        assert!(paths.is_empty());
        assert!(reg.files("t1").is_empty());
    }

    #[test]
    fn test_package_round_trip() {
        let (reg, dir) = registry();
        reg.create_task_directory("t1", "alice").unwrap();
        for (name, body) in [("a.txt", "alpha"), ("b.json", "{\"b\": 1}")] {
            let path = dir.path().join(name);
            fs::write(&path, body).unwrap();
            assert!(reg.register("t1", &path, "unknown", "s1", ""));
        }

        let zip_path = reg.package("t1", "alice").unwrap().unwrap();
        assert_eq!(zip_path, reg.base_dir().join("alice").join("t1_files.zip"));

        let mut archive = zip::ZipArchive::new(fs::File::open(&zip_path).unwrap()).unwrap();
        let summary = reg.summary("t1").unwrap();
        for entry in &summary.files {
            let file = archive.by_name(&entry.name).unwrap();
            assert_eq!(file.size(), entry.size);
        }

        let mut metadata = String::new();
        archive
            .by_name(package::METADATA_ENTRY)
            .unwrap()
            .read_to_string(&mut metadata)
            .unwrap();
        let metadata: TaskFilesMetadata = serde_json::from_str(&metadata).unwrap();
        assert_eq!(metadata.file_count, 2);
        assert_eq!(metadata.user_id, "alice");
    }

    #[test]
    fn test_package_skips_vanished_files() {
        let (reg, dir) = registry();
        let keep = dir.path().join("keep.txt");
        let gone = dir.path().join("gone.txt");
        fs::write(&keep, "k").unwrap();
        fs::write(&gone, "g").unwrap();
        reg.register("t1", &keep, "text", "s1", "");
        reg.register("t1", &gone, "text", "s1", "");
        fs::remove_file(&gone).unwrap();

        let zip_path = reg.package("t1", DEFAULT_USER).unwrap().unwrap();
        let archive = zip::ZipArchive::new(fs::File::open(zip_path).unwrap()).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"keep.txt"));
        assert!(!names.contains(&"gone.txt"));
    }

    #[test]
    fn test_package_without_files() {
        let (reg, _dir) = registry();
        assert!(reg.package("t1", "alice").unwrap().is_none());
        reg.create_task_directory("t1", "alice").unwrap();
        assert!(reg.package("t1", "alice").unwrap().is_none());
    }

    #[test]
    fn test_copy_to_task_directory() {
        let (reg, dir) = registry();
        let file = dir.path().join("notes.md");
        fs::write(&file, "# notes").unwrap();
        reg.register("t1", &file, "markdown", "s1", "");

        assert_eq!(reg.copy_to_task_directory("t1", "bob").unwrap(), 1);
        let copied = reg.task_dir("t1", "bob").unwrap().join("notes.md");
        assert_eq!(fs::read_to_string(&copied).unwrap(), "# notes");
        assert_eq!(reg.files("t1")[0].copied_path.as_ref(), Some(&copied));
    }

    #[test]
    fn test_cleanup_removes_everything() {
        let (reg, _dir) = registry();
        let task_dir = reg.create_task_directory("t1", "alice").unwrap();
        let file = task_dir.join("out.txt");
        fs::write(&file, "out").unwrap();
        reg.register("t1", &file, "text", "s1", "");
        let zip_path = reg.package("t1", "alice").unwrap().unwrap();

        reg.cleanup("t1", "alice").unwrap();
        assert!(!task_dir.exists());
        assert!(!zip_path.exists());
        assert!(reg.metadata("t1").is_none());
    }

    #[test]
    fn test_summary_histogram() {
        let (reg, dir) = registry();
        for name in ["a.txt", "b.txt", "c.csv"] {
            let path = dir.path().join(name);
            fs::write(&path, "12345").unwrap();
            reg.register("t1", &path, extension::infer_type(&path), "s1", "");
        }
        let summary = reg.summary("t1").unwrap();
        assert_eq!(summary.file_count, 3);
        assert_eq!(summary.total_size, 15);
        assert_eq!(summary.type_histogram.get("text"), Some(&2));
        assert_eq!(summary.type_histogram.get("csv"), Some(&1));
    }
}
