//! Zip packaging of a task's artifacts.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{FsResultExt, Result};
use crate::models::{ArtifactRecord, TaskFilesMetadata};

/// Name of the metadata entry added to every archive.
pub const METADATA_ENTRY: &str = "task_metadata.json";

/// Writes `records` into a deflated archive at `zip_path`.
///
/// Entries are named by display name; a repeated name gets a numeric
/// prefix. Files that vanished since registration are skipped. Returns the
/// number of files written, not counting the metadata entry.
pub fn write_archive(
    zip_path: &Path,
    records: &[ArtifactRecord],
    metadata: &TaskFilesMetadata,
) -> Result<usize> {
    let file = File::create(zip_path).fs_context(zip_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut written = 0;
    let mut used = HashSet::new();
    for record in records {
        let mut source = match File::open(&record.resolved_path) {
            Ok(source) => source,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!(
                    "Skipping vanished artifact {}",
                    record.resolved_path.display()
                );
                continue;
            }
            Err(e) => return Err(e).fs_context(&record.resolved_path),
        };

        let mut name = record.display_name.clone();
        let mut n = 1;
        while name == METADATA_ENTRY || !used.insert(name.clone()) {
            n += 1;
            name = format!("{n}_{}", record.display_name);
        }

        zip.start_file(name.as_str(), options)?;
        io::copy(&mut source, &mut zip).fs_context(&record.resolved_path)?;
        written += 1;
    }

    zip.start_file(METADATA_ENTRY, options)?;
    let json = serde_json::to_vec_pretty(metadata)?;
    zip.write_all(&json).fs_context(zip_path)?;

    zip.finish()?;
    Ok(written)
}
