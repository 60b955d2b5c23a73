use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

pub type Id = String;

/// A single entity record as returned by the data-access layer. Records are
/// opaque JSON objects; the schema describes their shape.
pub type Item = Value;

/// Marker field a form may set on an item to request a partial save.
pub const PARTIAL_MARKER: &str = "__partial__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

/// Extract the identifier of an item. Numeric ids normalize to their decimal
/// string form so cache keys are stable across JSON number/string encodings.
pub fn item_id(item: &Item) -> Option<Id> {
    match item.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Characters kept verbatim when an id is embedded in a URL path segment.
const ID_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode an id for use as a single path segment. Ids are arbitrary
/// strings; one containing `/` or `?` must not change the route it lands in.
pub fn encode_id(id: &str) -> Cow<'_, str> {
    utf8_percent_encode(id, ID_SEGMENT).into()
}

/// Resolve a dotted field path (`address.street`) inside an item.
pub fn get_path<'a>(item: &'a Item, path: &str) -> Option<&'a Value> {
    let mut current = item;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Fallback column header: `loginTime` / `login_time` → `Login Time`.
pub fn start_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    let mut start_of_word = true;
    for c in field.chars() {
        if c == '_' || c == '-' || c == '.' || c == ' ' {
            if !out.ends_with(' ') {
                out.push(' ');
            }
            start_of_word = true;
        } else if c.is_uppercase() {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            out.push(c);
            start_of_word = false;
        } else if start_of_word {
            out.extend(c.to_uppercase());
            start_of_word = false;
        } else {
            out.push(c);
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_id_normalizes_numbers() {
        assert_eq!(item_id(&json!({ "id": 7 })), Some("7".to_string()));
        assert_eq!(item_id(&json!({ "id": "7" })), Some("7".to_string()));
        assert_eq!(item_id(&json!({ "name": "x" })), None);
    }

    #[test]
    fn encode_id_escapes_path_delimiters() {
        assert_eq!(encode_id("7"), "7");
        assert_eq!(encode_id("a-b_c.d"), "a-b_c.d");
        assert_eq!(encode_id("a/b"), "a%2Fb");
        assert_eq!(encode_id("x?y=1"), "x%3Fy%3D1");
    }

    #[test]
    fn get_path_follows_nested_objects() {
        let item = json!({ "address": { "street": "Main" } });
        assert_eq!(get_path(&item, "address.street"), Some(&json!("Main")));
        assert_eq!(get_path(&item, "address.zip"), None);
    }

    #[test]
    fn start_case_handles_camel_and_snake() {
        assert_eq!(start_case("loginTime"), "Login Time");
        assert_eq!(start_case("login_time"), "Login Time");
        assert_eq!(start_case("name"), "Name");
    }
}
