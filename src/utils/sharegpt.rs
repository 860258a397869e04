//! ShareGPT dataset helpers.

use serde_json::{Map, Value};

/// Default output key for [`extract_first_human_message`].
pub const FIRST_HUMAN_MESSAGE_KEY: &str = "first_human_message";

/// Pull the first `human` turn out of a ShareGPT example.
///
/// Returns `{key: value}`; the value is an empty string when the example has
/// no human turn or no `conversations` array.
pub fn extract_first_human_message(example: &Value, key: &str) -> Map<String, Value> {
    let first = example
        .get("conversations")
        .and_then(Value::as_array)
        .and_then(|turns| {
            turns
                .iter()
                .find(|turn| turn.get("from").and_then(Value::as_str) == Some("human"))
        })
        .and_then(|turn| turn.get("value"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut out = Map::new();
    out.insert(key.to_string(), Value::String(first.to_string()));
    out
}
