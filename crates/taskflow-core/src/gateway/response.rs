use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Catalog entry describing one remote tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: Value::Object(Default::default()),
        }
    }

    pub fn with_schema(mut self, input_schema: Value) -> Self {
        self.input_schema = input_schema;
        self
    }
}

/// One item of a multi-part tool response.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text(String),
    Other(Value),
}

/// The closed set of response shapes a transport may hand back.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResponse {
    Text(String),
    Content(Vec<ContentItem>),
    Structured(Value),
}

impl ToolResponse {
    /// Collapses the response into a single JSON value.
    ///
    /// The primary text payload is parsed as JSON when it can be, otherwise
    /// returned as a string. Structured and non-text payloads pass through.
    pub fn normalize(self) -> Value {
        match self {
            ToolResponse::Text(text) => parse_text(text),
            ToolResponse::Structured(value) => value,
            ToolResponse::Content(items) => {
                let mut others = Vec::new();
                for item in items {
                    match item {
                        ContentItem::Text(text) => return parse_text(text),
                        ContentItem::Other(value) => others.push(value),
                    }
                }
                match others.len() {
                    0 => Value::Null,
                    1 => others.remove(0),
                    _ => Value::Array(others),
                }
            }
        }
    }
}

fn parse_text(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}
