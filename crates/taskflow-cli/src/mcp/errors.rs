//! Error handling utilities for MCP server

use rmcp::ErrorData;
use taskflow_core::OrchestratorError;

/// Converts orchestrator errors to MCP errors.
///
/// Errors caused by the caller's arguments map to `invalid_params`, the rest
/// to `internal_error`.
pub fn to_mcp_error(message: &str, error: &OrchestratorError) -> ErrorData {
    let text = format!("{message}: {error}");
    match error {
        OrchestratorError::InvalidInput { .. }
        | OrchestratorError::SessionNotFound { .. }
        | OrchestratorError::TaskNotFound { .. } => ErrorData::invalid_params(text, None),
        _ => ErrorData::internal_error(text, None),
    }
}
