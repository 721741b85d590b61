use serde_json::Value;

/// Read a numeric field that providers send either as a JSON number or as
/// a string ("12.5"). Placeholders such as "None" or "-" come back as `None`.
pub(crate) fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(obj) => number(obj.get("raw")),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

pub(crate) fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "None" && *s != "-")
        .map(str::to_string)
}
