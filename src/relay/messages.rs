//! Coercion of client chat input into an ordered message list.

use serde_json::{Map, Value};

/// A role-tagged conversation turn, kept as a raw JSON object so provider
/// specific fields (`name`, `tool_calls`, structured `content`) pass through.
pub type ChatMessage = Map<String, Value>;

/// Normalize heterogeneous chat input into a list of message objects.
///
/// Accepted shapes, first match wins:
/// - a string becomes one `user` message
/// - an array keeps only its object elements, in order
/// - an object with a `messages` array is filtered the same way
/// - an object with a non-empty `text` (else `prompt`) string becomes one `user` message
///
/// Anything else yields an empty list, which callers must reject.
pub fn coerce_messages(data: Option<&Value>) -> Vec<ChatMessage> {
    match data {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => vec![user_message(text)],
        Some(Value::Array(items)) => keep_objects(items),
        Some(Value::Object(obj)) => {
            if let Some(Value::Array(items)) = obj.get("messages") {
                return keep_objects(items);
            }
            match prompt_text(obj) {
                Some(text) => vec![user_message(text)],
                None => Vec::new(),
            }
        }
        Some(_) => Vec::new(),
    }
}

fn keep_objects(items: &[Value]) -> Vec<ChatMessage> {
    items
        .iter()
        .filter_map(|item| item.as_object().cloned())
        .collect()
}

// An empty `text` falls through to `prompt`.
fn prompt_text(obj: &Map<String, Value>) -> Option<&str> {
    let text = obj.get("text").filter(|v| is_truthy(v));
    match text.or_else(|| obj.get("prompt")) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
    }
}

fn user_message(content: &str) -> ChatMessage {
    let mut message = Map::new();
    message.insert("role".to_string(), Value::String("user".to_string()));
    message.insert("content".to_string(), Value::String(content.to_string()));
    message
}
