use crate::Value;

/// Convert parsed JSON into template data. Integral numbers that fit in
/// `i64` become `Int`; all other numbers become `Float`.
pub fn json_to_value(json_val: serde_json::Value) -> Value {
    match json_val {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(json_number) => match json_number.as_i64() {
            Some(n) => Value::Int(n),
            None => Value::Float(json_number.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(array) => Value::list(array.into_iter().map(json_to_value)),
        serde_json::Value::Object(object) => {
            Value::map(object.into_iter().map(|(k, v)| (k, json_to_value(v))))
        }
    }
}
