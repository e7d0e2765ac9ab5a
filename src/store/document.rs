use chrono::DateTime;
use serde_json::Value;

/// Loosely typed field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// A document as returned by the store: its id plus raw fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Looks up a field by path. `a.b` addresses key `b` of map field `a`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.fields, path)
    }
}

pub fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Reads a timestamp stored as epoch milliseconds or as an RFC 3339 string.
pub fn instant_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value as i64)),
        Value::String(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|at| at.timestamp_millis()),
        _ => None,
    }
}

/// Merges `updates` into `target`, partial-update style.
///
/// Plain keys replace the whole top-level value. Dotted keys replace only the
/// addressed nested entry, creating intermediate maps as needed and replacing
/// non-map intermediates. A null at a dotted key removes the nested entry.
pub fn merge_fields(target: &mut Fields, updates: Fields) {
    for (path, value) in updates {
        set_path(target, &path, value);
    }
}

fn set_path(target: &mut Fields, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_owned(), value);
        }
        Some((head, rest)) if value.is_null() => {
            if let Some(Value::Object(nested)) = target.get_mut(head) {
                remove_path(nested, rest);
            }
        }
        Some((head, rest)) => {
            let slot = target
                .entry(head.to_owned())
                .or_insert_with(|| Value::Object(Fields::new()));
            if !slot.is_object() {
                *slot = Value::Object(Fields::new());
            }
            if let Value::Object(nested) = slot {
                set_path(nested, rest, value);
            }
        }
    }
}

fn remove_path(target: &mut Fields, path: &str) {
    match path.split_once('.') {
        None => {
            target.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(nested)) = target.get_mut(head) {
                remove_path(nested, rest);
            }
        }
    }
}
