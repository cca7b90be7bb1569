//! Console templates for lifecycle events.

use serde_json::Value;

use super::{Event, EventKind};

const PREVIEW_CHARS: usize = 100;

/// Renders an event into the human readable form written to the log.
pub fn render(event: &Event) -> String {
    let data = &event.data;
    let ts = event.timestamp;
    match &event.kind {
        EventKind::TaskStart => format!(
            "▶ Task started [{}] \"{}\" ({} steps) at {ts}",
            text(data, "task_id"),
            truncate(text(data, "description"), 40),
            number(data, "total_steps"),
        ),
        EventKind::StepStart => format!(
            "┌ Step: {} (tool: {}) at {ts}",
            text(data, "description"),
            text(data, "tool_name"),
        ),
        EventKind::ToolCallStart => format!(
            "│ Calling {} with {}",
            text(data, "tool_name"),
            data.get("args").cloned().unwrap_or(Value::Null),
        ),
        EventKind::ToolCallComplete => {
            let success = flag(data, "success");
            format!(
                "│ {} {} in {:.2}s: {}",
                if success { "✓" } else { "✗" },
                text(data, "tool_name"),
                data.get("duration").and_then(Value::as_f64).unwrap_or(0.0),
                describe_result(data.get("result").unwrap_or(&Value::Null)),
            )
        }
        EventKind::StepProgress => {
            let progress = data
                .get("progress")
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
                .clamp(0.0, 100.0);
            let filled = (progress / 10.0) as usize;
            format!(
                "│ [{}{}] {progress:.0}%",
                "█".repeat(filled),
                "░".repeat(10 - filled)
            )
        }
        EventKind::StepComplete => {
            let status = text(data, "status");
            let icon = if status == "completed" { "✓" } else { "✗" };
            format!("└ {icon} Step {status} at {ts}")
        }
        EventKind::TaskComplete => {
            let success = flag(data, "success");
            let files = data
                .get("files_generated")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            format!(
                "■ Task {} in {:.2}s, {files} file(s) generated",
                if success { "succeeded" } else { "failed" },
                data.get("execution_time")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
            )
        }
        kind => match data.get("message").and_then(Value::as_str) {
            Some(message) => format!("• {kind}: {message}"),
            None => format!("• {kind}: {data}"),
        },
    }
}

/// Short description of a raw tool result.
pub fn describe_result(result: &Value) -> String {
    match result {
        Value::Object(map) => {
            if let Some(error) = map.get("error") {
                return format!("error: {}", plain(error));
            }
            if map.get("type").and_then(Value::as_str) == Some("chart") {
                return if flag(result, "success") {
                    format!(
                        "chart generated: {}",
                        map.get("file_name")
                            .and_then(Value::as_str)
                            .unwrap_or("chart.html")
                    )
                } else {
                    "chart generation failed".to_string()
                };
            }
            if let Some(path) = map.get("file_path") {
                return format!("file: {}", plain(path));
            }
            truncate(&result.to_string(), PREVIEW_CHARS)
        }
        Value::String(s) => {
            let trimmed = s.trim_start();
            if trimmed.starts_with("<!DOCTYPE html>") || trimmed.starts_with("<html") {
                format!("HTML content ({} chars)", s.chars().count())
            } else {
                truncate(s, PREVIEW_CHARS)
            }
        }
        other => truncate(&other.to_string(), PREVIEW_CHARS),
    }
}

/// Truncates to `max` characters, appending `...` when anything was cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    }
}

fn text<'a>(data: &'a Value, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or("N/A")
}

fn number(data: &Value, key: &str) -> u64 {
    data.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn flag(data: &Value, key: &str) -> bool {
    data.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
