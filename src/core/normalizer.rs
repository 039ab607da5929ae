use crate::domain::answer::GeneratedAnswer;
use serde_json::Value;

/// Removes a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // 第一行可能是語言標記，例如 json
    match body.find('\n') {
        Some(newline) if !body[..newline].contains('{') => body[newline + 1..].trim(),
        _ => body.trim(),
    }
}

/// Always yields a well-formed answer; model non-compliance degrades to `information`.
pub fn normalize(raw: &str) -> GeneratedAnswer {
    let mut fields = match serde_json::from_str::<Value>(strip_code_fence(raw)) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            tracing::warn!("🧹 Generator reply is JSON but not an object ({})", json_kind(&other));
            return GeneratedAnswer::information(raw);
        }
        Err(e) => {
            tracing::warn!("🧹 Failed to parse generator reply: {}", e);
            return GeneratedAnswer::information(raw);
        }
    };

    let kind = fields
        .get("type")
        .and_then(Value::as_str)
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "information".to_string());
    fields.insert("type".to_string(), Value::String(kind));

    let has_content = fields
        .get("content")
        .and_then(Value::as_str)
        .is_some_and(|c| !c.trim().is_empty());
    if !has_content {
        fields.insert("content".to_string(), Value::String(raw.to_string()));
    }

    match serde_json::from_value::<GeneratedAnswer>(Value::Object(fields)) {
        // error 只能由流程本身產生
        Ok(GeneratedAnswer::Error(_)) => {
            tracing::warn!("🧹 Generator reply claims the reserved error type");
            GeneratedAnswer::information(raw)
        }
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!("🧹 Generator reply does not match any answer shape: {}", e);
            GeneratedAnswer::information(raw)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
