//! Dual-channel operation results.
//!
//! The text payload feeds the agent's reasoning loop; the optional [`Effect`]
//! is the machine-actionable signal the orchestrator consumes. The two
//! channels are independent: the text is always self-contained, and an effect
//! never requires re-parsing the text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Known signal names.
///
/// The signal set is an open, string-keyed enum owned by the orchestrating
/// state machine; these constants document the names this layer emits and
/// can be extended without changing the contract.
pub mod signals {
    /// A unit of work produced (or already had) commits; move to testing.
    pub const ADVANCE_TO_TESTING: &str = "advance_to_testing";
    /// The task required no code change; the story can close.
    pub const STORY_COMPLETE: &str = "story_complete";
    /// A rendered specification is ready for preview.
    pub const SPEC_PREVIEW: &str = "spec_preview";
    /// A review verdict was recorded.
    pub const REVIEW_COMPLETE: &str = "review_complete";
}

/// Machine-actionable outcome marker attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub signal: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Effect {
    pub fn new(signal: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            data: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Result envelope every operation returns.
///
/// `fields` carries the legacy plain-map shape existing orchestrator-side
/// parsers still read; the names `success`, `error`, `stdout` and `diff` are
/// load-bearing there and must not be renamed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<Effect>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ToolResult {
    /// Successful result with a self-contained text payload.
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            effect: None,
            fields: Map::new(),
        }
    }

    /// Structured runtime failure the caller should reason about rather than
    /// crash on. The message is mirrored into the legacy `error` field.
    pub fn fail(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = Map::new();
        fields.insert("error".to_string(), Value::String(message.clone()));
        Self {
            success: false,
            content: message,
            effect: None,
            fields,
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_mirrors_message_into_error_field() {
        let result = ToolResult::fail("commit failed");
        assert!(!result.success);
        assert_eq!(result.content, "commit failed");
        assert_eq!(result.fields["error"], json!("commit failed"));
    }

    #[test]
    fn legacy_fields_flatten_into_the_envelope() {
        let result = ToolResult::ok("diff ready").with_field("diff", json!("+line"));
        let encoded = serde_json::to_value(&result).expect("serialize");
        assert_eq!(encoded["diff"], json!("+line"));
        assert_eq!(encoded["content"], json!("diff ready"));
        assert!(encoded.get("effect").is_none());
    }

    #[test]
    fn effect_is_consumable_without_the_text() {
        let result = ToolResult::ok("done").with_effect(
            Effect::new(signals::ADVANCE_TO_TESTING).with("summary", "added parser"),
        );
        let effect = result.effect.expect("effect");
        assert_eq!(effect.signal, signals::ADVANCE_TO_TESTING);
        assert_eq!(effect.data["summary"], json!("added parser"));
    }
}
