//! Operation definitions and argument validation.
//!
//! A definition is the wire contract an agent-facing API serializes to the
//! calling model: named parameters with types, required flags, and closed
//! enum sets. Argument maps are validated against the definition's JSON
//! Schema rendering before an operation executes; violations abort the call
//! as argument errors, they are never folded into a structured failure.

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Parameter value types exposed in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    StringList,
}

/// One named parameter of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
    /// Closed value set for enum-constrained string parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

/// Immutable operation definition: created at registration, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn required(self, name: &str, kind: ParamType, description: &str) -> Self {
        self.param(name, kind, description, true, None)
    }

    pub fn optional(self, name: &str, kind: ParamType, description: &str) -> Self {
        self.param(name, kind, description, false, None)
    }

    pub fn enumerated(self, name: &str, allowed: &[&str], required: bool, description: &str) -> Self {
        let allowed = allowed.iter().map(ToString::to_string).collect();
        self.param(name, ParamType::String, description, required, Some(allowed))
    }

    fn param(
        mut self,
        name: &str,
        kind: ParamType,
        description: &str,
        required: bool,
        allowed: Option<Vec<String>>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required,
            allowed,
        });
        self
    }

    /// JSON Schema (Draft 2020-12) rendering of the parameter list.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            let mut prop = match param.kind {
                ParamType::String => json!({"type": "string"}),
                ParamType::Integer => json!({"type": "integer"}),
                ParamType::Boolean => json!({"type": "boolean"}),
                ParamType::StringList => json!({"type": "array", "items": {"type": "string"}}),
            };
            prop["description"] = json!(param.description);
            if let Some(allowed) = &param.allowed {
                prop["enum"] = json!(allowed);
            }
            properties.insert(param.name.clone(), prop);
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Validate an argument map against this definition.
    ///
    /// Required fields are never silently defaulted; every violation is
    /// reported, aggregated into one error.
    pub fn validate_args(&self, args: &Map<String, Value>) -> Result<()> {
        let schema = self.json_schema();
        let compiled = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema)
            .with_context(|| format!("compile schema for '{}'", self.name))?;
        let instance = Value::Object(args.clone());
        let messages: Vec<String> = compiled
            .iter_errors(&instance)
            .map(|err| err.to_string())
            .collect();
        if !messages.is_empty() {
            bail!(
                "invalid arguments for '{}':\n- {}",
                self.name,
                messages.join("\n- ")
            );
        }
        Ok(())
    }
}

/// String argument, if present.
pub fn str_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

/// Required string argument; absence is a caller contract violation.
pub fn required_str<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    str_arg(args, name).ok_or_else(|| anyhow!("missing required argument '{name}'"))
}

pub fn int_arg(args: &Map<String, Value>, name: &str) -> Option<i64> {
    args.get(name).and_then(Value::as_i64)
}

/// Integer argument that must be strictly positive when present.
pub fn positive_arg(args: &Map<String, Value>, name: &str) -> Result<Option<u64>> {
    match int_arg(args, name) {
        None => Ok(None),
        Some(value) if value > 0 => Ok(Some(value as u64)),
        Some(value) => Err(anyhow!("'{name}' must be positive, got {value}")),
    }
}

pub fn bool_arg(args: &Map<String, Value>, name: &str) -> Option<bool> {
    args.get(name).and_then(Value::as_bool)
}

/// String-list argument, if present. Non-string elements are skipped; the
/// schema rejects them before execution.
pub fn list_arg(args: &Map<String, Value>, name: &str) -> Option<Vec<String>> {
    args.get(name).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> ToolDefinition {
        ToolDefinition::new("sample", "Sample operation.")
            .required("path", ParamType::String, "A path.")
            .optional("max_lines", ParamType::Integer, "Line cap.")
            .enumerated("mode", &["fast", "full"], false, "Scan mode.")
    }

    fn args(raw: &str) -> Map<String, Value> {
        match serde_json::from_str(raw).expect("parse args") {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn valid_arguments_pass() {
        let ok = args(r#"{"path": "src/lib.rs", "max_lines": 10, "mode": "fast"}"#);
        definition().validate_args(&ok).expect("validate");
    }

    #[test]
    fn missing_required_argument_fails() {
        let err = definition().validate_args(&args(r#"{}"#)).unwrap_err();
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn wrong_type_fails() {
        let err = definition()
            .validate_args(&args(r#"{"path": 7}"#))
            .unwrap_err();
        assert!(err.to_string().contains("invalid arguments"));
    }

    #[test]
    fn enum_violation_fails() {
        let err = definition()
            .validate_args(&args(r#"{"path": "x", "mode": "turbo"}"#))
            .unwrap_err();
        assert!(err.to_string().contains("turbo") || err.to_string().contains("enum"));
    }

    #[test]
    fn unknown_argument_fails() {
        let err = definition()
            .validate_args(&args(r#"{"path": "x", "bogus": true}"#))
            .unwrap_err();
        assert!(err.to_string().contains("invalid arguments"));
    }

    #[test]
    fn schema_lists_required_fields() {
        let schema = definition().json_schema();
        assert_eq!(schema["required"], json!(["path"]));
        assert_eq!(schema["properties"]["mode"]["enum"], json!(["fast", "full"]));
        assert_eq!(schema["additionalProperties"], json!(false));
    }

    #[test]
    fn positive_arg_rejects_non_positive() {
        let map = args(r#"{"n": 0}"#);
        assert!(positive_arg(&map, "n").is_err());
        let map = args(r#"{"n": 5}"#);
        assert_eq!(positive_arg(&map, "n").expect("positive"), Some(5));
        assert_eq!(positive_arg(&map, "absent").expect("absent"), None);
    }
}
