use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

// Greedy: from the first `{` to the last `}` across lines
static EMBEDDED_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid embedded object pattern"));

/// Parse model output that is supposed to be a JSON object.
///
/// Tries the whole text first, then the outermost `{...}` block found inside
/// free text (code fences, prose before or after). Returns `None` when
/// neither yields a JSON object.
pub fn parse_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let block = EMBEDDED_OBJECT.find(trimmed)?;
    match serde_json::from_str::<Value>(block.as_str()) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Strip a surrounding markdown code fence (```sql, ```json, ```).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string on the opening fence line
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.trim_end().trim_end_matches("```").trim()
}
