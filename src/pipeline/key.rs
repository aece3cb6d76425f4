use serde_json::Value;

/// Deterministic fingerprint for a request: identical for semantically
/// identical inputs regardless of object key insertion order.
pub fn request_key(url: &str, params: Option<&Value>, body: Option<&Value>) -> String {
    format!("{}-{}-{}", url, stable_stringify(params), stable_stringify(body))
}

/// Serialize with object keys sorted lexicographically at every depth.
/// Absent values and `null` both map to the literal `null`. Pure function.
pub fn stable_stringify(value: Option<&Value>) -> String {
    match value {
        None => "null".to_string(),
        Some(v) => stringify_value(v),
    }
}

fn stringify_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\"")),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(stringify_value).collect();
            format!("[{}]", inner.join(","))
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let inner: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    let quoted = serde_json::to_string(k).unwrap_or_else(|_| format!("\"{k}\""));
                    format!("{}:{}", quoted, stringify_value(&map[k]))
                })
                .collect();
            format!("{{{}}}", inner.join(","))
        }
    }
}
