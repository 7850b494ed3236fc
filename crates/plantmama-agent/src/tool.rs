//! Tool definitions, calls and results exchanged with the model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A function the model may call, described by a JSON Schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Function name.
    pub name: String,
    /// What the function does, shown to the model.
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Id assigned by the model, echoed in the result.
    pub id: String,
    /// Function name.
    pub name: String,
    /// Parsed arguments object.
    pub arguments: Value,
}

impl ToolCall {
    /// Create a call with an explicit id.
    pub fn with_id(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Raw argument value.
    pub fn get_arg(&self, key: &str) -> Option<&Value> {
        self.arguments.get(key)
    }

    /// Required string argument.
    pub fn get_string_arg(&self, key: &str) -> Result<&str, String> {
        match self.arguments.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
            Some(Value::String(_)) => Err(format!("argument '{}' must not be empty", key)),
            Some(_) => Err(format!("argument '{}' must be a string", key)),
            None => Err(format!("missing required argument '{}'", key)),
        }
    }

    /// Optional string argument; blank strings count as absent.
    pub fn get_optional_string_arg(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Optional list of strings; non-string items are skipped.
    pub fn get_string_list_arg(&self, key: &str) -> Vec<String> {
        match self.arguments.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.to_string()],
            _ => Vec::new(),
        }
    }

    /// Optional number, accepting numeric strings too.
    pub fn get_f64_arg(&self, key: &str) -> Option<f64> {
        match self.arguments.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
            _ => None,
        }
    }
}

/// Output of a tool, sent back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the call this answers.
    pub tool_call_id: String,
    /// Text (usually JSON) payload.
    pub content: String,
    /// Whether the call failed.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Successful result carrying a JSON payload.
    pub fn json(tool_call_id: impl Into<String>, value: &impl Serialize) -> Self {
        let content = serde_json::to_string(value).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("failed to encode result: {}", e) }).to_string()
        });
        Self::success(tool_call_id, content)
    }

    pub fn error(tool_call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: serde_json::json!({ "error": message.into() }).to_string(),
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_args() {
        let call = ToolCall::with_id(
            "call-1",
            "add_plant",
            json!({"name": "Monstera", "nickname": "  ", "count": 3}),
        );

        assert_eq!(call.get_string_arg("name").unwrap(), "Monstera");
        assert!(call.get_string_arg("nickname").unwrap_err().contains("empty"));
        assert!(call.get_string_arg("count").unwrap_err().contains("string"));
        assert!(call.get_string_arg("species").unwrap_err().contains("missing"));
        assert_eq!(call.get_optional_string_arg("nickname"), None);
    }

    #[test]
    fn test_list_and_number_args() {
        let call = ToolCall::with_id(
            "call-2",
            "x",
            json!({"issues": ["yellow leaves", 4, "brown tips"], "humidity": "45%", "single": "one"}),
        );

        assert_eq!(call.get_string_list_arg("issues"), vec!["yellow leaves", "brown tips"]);
        assert_eq!(call.get_string_list_arg("single"), vec!["one"]);
        assert!(call.get_string_list_arg("missing").is_empty());
        assert_eq!(call.get_f64_arg("humidity"), Some(45.0));
    }

    #[test]
    fn test_results() {
        let ok = ToolResult::json("call-1", &json!({"saved": true}));
        assert!(!ok.is_error);
        assert_eq!(ok.content, r#"{"saved":true}"#);

        let err = ToolResult::error("call-1", "no image");
        assert!(err.is_error);
        assert_eq!(err.content, r#"{"error":"no image"}"#);
    }
}
