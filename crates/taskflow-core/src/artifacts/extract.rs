//! Decoding raw tool results into the file paths they mention.

use serde_json::{Map, Value};

use super::extension::looks_like_path;

/// A path a tool result claims to have produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub path: String,
    /// Declared type, `unknown` when the result did not say
    pub type_tag: String,
}

impl FileRef {
    fn new(path: &str, type_tag: &str) -> Self {
        Self {
            path: path.to_string(),
            type_tag: type_tag.to_string(),
        }
    }
}

/// Shape of a raw tool result as far as artifact discovery is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    /// `{"file_path": ..., "file_type"?: ...}`
    Direct(FileRef),
    /// `{"result": ...}`, decoded one level deep
    Wrapped(Box<ToolResult>),
    /// `{"type": "chart", "success": true, "file_path": ...}`
    Chart(FileRef),
    /// Bare strings that end in a recognized extension
    PlainList(Vec<String>),
    Opaque,
}

impl ToolResult {
    pub fn decode(raw: &Value) -> Self {
        decode(raw, true)
    }

    /// Every file reference the result carries, paired with whether it came
    /// from a chart.
    pub fn files(&self) -> Vec<(FileRef, bool)> {
        match self {
            ToolResult::Direct(file) => vec![(file.clone(), false)],
            ToolResult::Chart(file) => vec![(file.clone(), true)],
            ToolResult::Wrapped(inner) => inner.files(),
            ToolResult::PlainList(paths) => paths
                .iter()
                .map(|p| (FileRef::new(p, "unknown"), false))
                .collect(),
            ToolResult::Opaque => Vec::new(),
        }
    }
}

fn decode(raw: &Value, allow_wrapped: bool) -> ToolResult {
    match raw {
        Value::Object(map) => decode_object(map, allow_wrapped),
        Value::Array(items) => {
            let paths: Vec<String> = items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| looks_like_path(s))
                .map(str::to_string)
                .collect();
            if paths.is_empty() {
                ToolResult::Opaque
            } else {
                ToolResult::PlainList(paths)
            }
        }
        Value::String(s) if looks_like_path(s) => ToolResult::PlainList(vec![s.clone()]),
        _ => ToolResult::Opaque,
    }
}

fn decode_object(map: &Map<String, Value>, allow_wrapped: bool) -> ToolResult {
    let file_path = map.get("file_path").and_then(Value::as_str);
    let file_type = map.get("file_type").and_then(Value::as_str);
    let not_failed = map.get("success") != Some(&Value::Bool(false));

    if map.get("type").and_then(Value::as_str) == Some("chart")
        && map.get("success") == Some(&Value::Bool(true))
    {
        if let Some(path) = file_path {
            return ToolResult::Chart(FileRef::new(path, file_type.unwrap_or("html")));
        }
    }

    if let Some(path) = file_path {
        if not_failed {
            return ToolResult::Direct(FileRef::new(path, file_type.unwrap_or("unknown")));
        }
        return ToolResult::Opaque;
    }

    if allow_wrapped && not_failed {
        if let Some(inner) = map.get("result") {
            let inner = match inner {
                Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| inner.clone()),
                other => other.clone(),
            };
            return match decode(&inner, false) {
                ToolResult::Opaque => ToolResult::Opaque,
                decoded => ToolResult::Wrapped(Box::new(decoded)),
            };
        }
    }

    ToolResult::Opaque
}
