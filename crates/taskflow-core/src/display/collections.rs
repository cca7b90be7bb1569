//! Newtype wrappers for displaying lists.

use std::fmt;

use super::datetime::{ByteSize, LocalDateTime, LocalTime};
use crate::gateway::ToolSpec;
use crate::models::{ArtifactSummary, ChatMessage};
use crate::report::HistoryEntry;

/// Saved report history, newest first.
pub struct HistoryEntries(pub Vec<HistoryEntry>);

impl HistoryEntries {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for HistoryEntries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No reports found.");
        }
        for entry in &self.0 {
            let icon = if entry.success { "✓" } else { "✗" };
            writeln!(f, "## {icon} {}", entry.user_input)?;
            writeln!(f)?;
            writeln!(f, "- **Task**: {}", entry.task_id)?;
            writeln!(f, "- **Time**: {:.2}s", entry.execution_time)?;
            writeln!(f, "- **Files**: {}", entry.files_generated)?;
            writeln!(f, "- **Generated**: {}", LocalDateTime(&entry.generated_at))?;
            writeln!(f, "- **Report**: {}", entry.report_file.display())?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Tool catalog as advertised by the transport.
pub struct ToolCatalog(pub Vec<ToolSpec>);

impl fmt::Display for ToolCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No tools available.");
        }
        for tool in &self.0 {
            if tool.description.is_empty() {
                writeln!(f, "- `{}`", tool.name)?;
            } else {
                writeln!(f, "- `{}`: {}", tool.name, tool.description)?;
            }
        }
        Ok(())
    }
}

/// Chat messages, oldest first.
pub struct ChatTranscript(pub Vec<ChatMessage>);

impl fmt::Display for ChatTranscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No messages.");
        }
        for message in &self.0 {
            writeln!(
                f,
                "**{}** ({}):",
                message.sender,
                LocalTime(&message.timestamp)
            )?;
            writeln!(f, "{}", message.content)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for ArtifactSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "## Files for task {} ({} files, {})",
            self.task_id,
            self.file_count,
            ByteSize(self.total_size)
        )?;
        writeln!(f)?;
        if self.files.is_empty() {
            return writeln!(f, "No files registered.");
        }
        for file in &self.files {
            write!(f, "- **{}** ({}, {})", file.name, file.type_tag, ByteSize(file.size))?;
            if file.description.is_empty() {
                writeln!(f)?;
            } else {
                writeln!(f, ": {}", file.description)?;
            }
        }
        Ok(())
    }
}
