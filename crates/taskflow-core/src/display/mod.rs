//! Markdown formatting for presentation layers.
//!
//! Domain models implement [`std::fmt::Display`] directly (see [`models`]);
//! lists and composite results go through the newtype wrappers here. All
//! output is markdown so the CLI can render it with its terminal renderer
//! and the MCP server can return it verbatim.
//!
//! ```rust
//! use taskflow_core::display::ToolCatalog;
//! use taskflow_core::gateway::ToolSpec;
//!
//! let catalog = ToolCatalog(vec![ToolSpec::new("echo_tool", "Echoes input")]);
//! assert!(catalog.to_string().contains("echo_tool"));
//! ```

pub mod collections;
pub mod datetime;
pub mod models;
pub mod results;

pub use collections::{ChatTranscript, HistoryEntries, ToolCatalog};
pub use datetime::{ByteSize, LocalDateTime, LocalTime};
pub use results::RunSummary;
