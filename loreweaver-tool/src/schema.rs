//! Tool trait and parameter schema.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON type of one tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// A JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A JSON integer.
    Integer,
    /// A JSON boolean.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl ParamKind {
    /// JSON Schema type name.
    pub fn type_name(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }
}

/// Declaration of one tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    /// Parameter name.
    pub name: String,
    /// JSON type.
    pub kind: ParamKind,
    /// Human-readable description.
    pub description: String,
    /// Whether a call must supply this parameter.
    pub required: bool,
    /// Closed value set, when the parameter is an enum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    /// Default injected when an optional parameter is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameter {
    /// A required parameter.
    pub fn required(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            enum_values: None,
            default: None,
        }
    }

    /// An optional parameter with a default.
    pub fn optional(
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
        default: Value,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
            enum_values: None,
            default: Some(default),
        }
    }

    /// Restrict this parameter to a closed value set.
    #[must_use]
    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Full schema of one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// Parameter declarations.
    pub parameters: Vec<ToolParameter>,
    /// What the tool returns.
    pub returns: String,
}

impl ToolSchema {
    /// Render as a JSON Schema object (the shape providers expect).
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".into(), Value::String(param.kind.type_name().into()));
            prop.insert(
                "description".into(),
                Value::String(param.description.clone()),
            );
            if let Some(values) = &param.enum_values {
                prop.insert("enum".into(), Value::Array(values.clone()));
            }
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A callable with a declared schema.
///
/// Tool instances are shared: registered once, called many times
/// concurrently. Implementations must be internally synchronised if
/// they carry state.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's schema.
    fn schema(&self) -> ToolSchema;

    /// Execute with validated arguments.
    ///
    /// The manager has already checked required parameters and enum
    /// membership; implementations still own type coercion of their
    /// own fields.
    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_schema_carries_required_and_enums() {
        let schema = ToolSchema {
            name: "roll".into(),
            description: "rolls dice".into(),
            parameters: vec![
                ToolParameter::required("dice", ParamKind::String, "dice expression"),
                ToolParameter::optional("kind", ParamKind::String, "roll kind", json!("open"))
                    .with_enum(vec![json!("open"), json!("hidden")]),
            ],
            returns: "roll result".into(),
        };
        let js = schema.to_json_schema();
        assert_eq!(js["type"], "object");
        assert_eq!(js["required"], json!(["dice"]));
        assert_eq!(js["properties"]["kind"]["enum"], json!(["open", "hidden"]));
        assert_eq!(js["properties"]["kind"]["default"], "open");
    }
}
