//! Argument extraction shared by the tool handlers.
//!
//! Models are sloppy with JSON types, so numbers and booleans are also
//! accepted in their string form (`"42"`, `"true"`). `null` counts as absent.

use llmcode_core::error::ToolError;
use serde_json::Value;

fn present<'a>(args: &'a Value, name: &str) -> Option<&'a Value> {
    args.get(name).filter(|v| !v.is_null())
}

pub(crate) fn required_str<'a>(args: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    optional_str(args, name)?
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{name}' argument")))
}

pub(crate) fn optional_str<'a>(args: &'a Value, name: &str) -> Result<Option<&'a str>, ToolError> {
    match present(args, name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "'{name}' must be a string, got {other}"
        ))),
    }
}

pub(crate) fn optional_u64(args: &Value, name: &str) -> Result<Option<u64>, ToolError> {
    let invalid = || ToolError::InvalidArguments(format!("'{name}' must be a non-negative integer"));
    match present(args, name) {
        None => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

pub(crate) fn optional_bool(args: &Value, name: &str) -> Result<Option<bool>, ToolError> {
    let invalid = || ToolError::InvalidArguments(format!("'{name}' must be true or false"));
    match present(args, name) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(invalid()),
        },
        Some(_) => Err(invalid()),
    }
}
