use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Map, Number, Value};

/// One step into an instance: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A single validation failure, shaped like the records ajv v6 emits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// JavaScript accessor path to the failing value: `.a['b-c'][0]`.
    pub data_path: String,
    pub keyword: String,
    pub message: String,
    pub params: Map<String, Value>,
    /// Path into the schema: `#/properties/a/type`.
    pub schema_path: String,
    #[serde(skip)]
    pub instance_path: Vec<PathSegment>,
}

impl ErrorRecord {
    pub fn new(
        instance_path: &[PathSegment],
        keyword: &str,
        schema_path: String,
        message: String,
        params: Map<String, Value>,
    ) -> Self {
        Self {
            data_path: render_data_path(instance_path),
            keyword: keyword.to_string(),
            message,
            params,
            schema_path,
            instance_path: instance_path.to_vec(),
        }
    }
}

/// Render a path the way ajv v6 does with `jsonPointers: false`.
pub fn render_data_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Index(i) => {
                let _ = write!(out, "[{i}]");
            }
            PathSegment::Key(key) if is_identifier(key) => {
                out.push('.');
                out.push_str(key);
            }
            PathSegment::Key(key) => {
                let escaped = key.replace('\\', "\\\\").replace('\'', "\\'");
                let _ = write!(out, "['{escaped}']");
            }
        }
    }
    out
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Unescaped tokens of a JSON pointer.
pub(crate) fn pointer_tokens(pointer: &str) -> impl Iterator<Item = String> + '_ {
    pointer
        .split('/')
        .skip(1)
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
}

pub(crate) fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Escape a key for use inside a schema path: JSON-pointer escaping,
/// then URI-component encoding.
pub(crate) fn escape_fragment(key: &str) -> String {
    let pointer = escape_pointer(key);
    let mut out = String::with_capacity(pointer.len());
    for byte in pointer.bytes() {
        if byte.is_ascii_alphanumeric() || b"-_.!~*'()".contains(&byte) {
            out.push(byte as char);
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

/// Render a JSON pointer into a schema as an ajv `schemaPath`.
pub(crate) fn render_schema_path(pointer: &str) -> String {
    let mut out = String::from("#");
    for token in pointer_tokens(pointer) {
        out.push('/');
        out.push_str(&escape_fragment(&token));
    }
    out
}

/// Split an instance pointer into segments, telling array indexes from
/// numeric object keys by looking at the instance.
pub(crate) fn instance_segments(instance: &Value, pointer: &str) -> Vec<PathSegment> {
    let mut current = Some(instance);
    let mut segments = Vec::new();
    for token in pointer_tokens(pointer) {
        let segment = match current {
            Some(Value::Array(items)) => match token.parse::<usize>() {
                Ok(index) => {
                    current = items.get(index);
                    PathSegment::Index(index)
                }
                Err(_) => {
                    current = None;
                    PathSegment::Key(token)
                }
            },
            Some(Value::Object(map)) => {
                current = map.get(&token);
                PathSegment::Key(token)
            }
            _ => PathSegment::Key(token),
        };
        segments.push(segment);
    }
    segments
}

/// Integral values become integer numbers so they print without `.0`.
pub(crate) fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Print a number the way JavaScript does: `2`, not `2.0`.
pub(crate) fn js_number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < 1e21 => {
            format!("{f:.0}")
        }
        _ => n.to_string(),
    }
}

/// Build a params object from key/value pairs.
pub(crate) fn params<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// JSON equality with numbers compared by value, so `1` equals `1.0`.
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| json_equal(v, other)))
        }
        _ => a == b,
    }
}
