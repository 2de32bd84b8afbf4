//! Turns error records into one-line messages of the form
//! `<scope> <message>`, e.g. `body/type should be equal to one of the
//! allowed values [dog,cat]`.

use serde_json::Value;

use crate::engine::{ErrorRecord, PathSegment};
use crate::facade::Target;

/// Keyword of the record emitted when a body's media type is undeclared.
pub const CONTENT_TYPE_KEYWORD: &str = "contentType";

pub fn beautify(records: &[ErrorRecord], target: Target) -> Vec<String> {
    records.iter().map(|r| beautify_one(r, target)).collect()
}

pub fn beautify_one(record: &ErrorRecord, target: Target) -> String {
    let mut message = format!("{} {}", scope(record, target), record.message);
    if record.keyword == "enum" {
        if let Some(Value::Array(allowed)) = record.params.get("allowedValues") {
            let rendered: Vec<String> = allowed.iter().map(render_value).collect();
            message.push_str(&format!(" [{}]", rendered.join(",")));
        }
    }
    message
}

fn scope(record: &ErrorRecord, target: Target) -> String {
    if record.keyword == CONTENT_TYPE_KEYWORD {
        return "content-type".to_string();
    }

    let segments: Vec<String> = record
        .instance_path
        .iter()
        .map(|segment| match segment {
            PathSegment::Key(key) => key.clone(),
            PathSegment::Index(i) => i.to_string(),
        })
        .collect();

    match target {
        Target::Body if segments.is_empty() => "body".to_string(),
        Target::Body => format!("body/{}", segments.join("/")),
        // The first segment names the request part: query, headers, path or files.
        Target::Parameters => match segments.split_first() {
            None => "parameters".to_string(),
            Some((part, [])) => part.clone(),
            Some((part, rest)) => format!("{part}/{}", rest.join("/")),
        },
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
