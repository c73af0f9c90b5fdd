use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// A tool invocation requested by the assistant inside a `requires_action` run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON object text as sent by the assistant service.
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// Loosely typed tool argument value. Objects are rejected at parse time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<ToolValue>),
}

impl ToolValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::String(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Finite numbers only; `"inf"` and `"NaN"` strings are rejected.
    pub fn as_f64(&self) -> Option<f64> {
        let float = match self {
            Self::Number(value) => value.as_f64(),
            Self::String(value) => value.trim().parse().ok(),
            _ => None,
        };
        float.filter(|float| float.is_finite())
    }

    /// Integral numbers only; `3.0` is accepted, `3.5` and out-of-range floats are not.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(value) => value.as_i64().or_else(|| value.as_f64().and_then(whole_i64)),
            Self::String(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ToolValue]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

fn whole_i64(float: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or above it would saturate.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let in_range = float.is_finite() && float >= -LIMIT && float < LIMIT;
    (in_range && float.fract() == 0.0).then_some(float as i64)
}

/// Named arguments of a single tool call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArguments(pub BTreeMap<String, ToolValue>);

impl ToolArguments {
    /// Parses the assistant's argument text. Blank input is treated as `{}`.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }

    pub fn get(&self, name: &str) -> Option<&ToolValue> {
        self.0.get(name).filter(|value| !value.is_null())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ToolValue) {
        self.0.insert(name.into(), value);
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_owned())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Ok,
    Error,
    UnknownTool,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::UnknownTool => "unknown_tool",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ok" => Some(Self::Ok),
            "error" => Some(Self::Error),
            "unknown_tool" => Some(Self::UnknownTool),
            _ => None,
        }
    }
}

/// One journaled tool dispatch, successful or not.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDispatchRecord {
    pub tool_call_id: Option<String>,
    pub tool_name: String,
    pub arguments_json: String,
    pub outcome: DispatchOutcome,
    pub output: String,
    pub recorded_at: DateTime<Utc>,
}
