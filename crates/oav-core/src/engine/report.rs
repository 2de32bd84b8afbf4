//! Translation of `jsonschema` errors into ajv-shaped records.

use indexmap::IndexMap;
use jsonschema::Validator;
use jsonschema::error::{ValidationError, ValidationErrorKind};
use serde_json::{Map, Value, json};

use super::record::{
    ErrorRecord, PathSegment, escape_fragment, instance_segments, js_number, json_equal, params,
    pointer_tokens, render_schema_path,
};
use super::schema::DiscriminatorSite;

/// Everything needed to turn one validation run into records.
pub(crate) struct Reporter<'a> {
    /// The lowered schema the errors point into.
    pub schema: &'a Value,
    pub discriminators: &'a [DiscriminatorSite],
    /// Member validators of every `anyOf`/`oneOf`, by array pointer.
    pub unions: &'a IndexMap<String, Vec<Validator>>,
    pub instance: &'a Value,
}

impl Reporter<'_> {
    /// Translate `error`, whose paths are relative to the given prefixes.
    pub fn push(
        &self,
        error: &ValidationError<'_>,
        schema_prefix: &str,
        instance_prefix: &str,
        out: &mut Vec<ErrorRecord>,
    ) {
        let schema_pointer = format!("{schema_prefix}{}", error.schema_path);
        let instance_pointer = format!("{instance_prefix}{}", error.instance_path);
        let path = instance_segments(self.instance, &instance_pointer);
        let keyword = pointer_tokens(&schema_pointer).last().unwrap_or_default();
        let schema_path = render_schema_path(self.rebase(&schema_pointer));

        match &error.kind {
            ValidationErrorKind::Required { property } => {
                if let Some(site) = self.tag_site(&schema_pointer) {
                    out.push(self.tag_error(site, path));
                    return;
                }
                let name = property.as_str().unwrap_or_default();
                out.push(ErrorRecord::new(
                    &path,
                    "required",
                    schema_path,
                    format!("should have required property '{name}'"),
                    params([("missingProperty", json!(name))]),
                ));
            }
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                for key in unexpected {
                    out.push(ErrorRecord::new(
                        &path,
                        "additionalProperties",
                        schema_path.clone(),
                        "should NOT have additional properties".to_string(),
                        params([("additionalProperty", json!(key))]),
                    ));
                }
            }
            _ if keyword == "anyOf" || keyword == "oneOf" => {
                self.union(&keyword, &schema_pointer, &instance_pointer, &path, schema_path, out);
            }
            _ => {
                let (message, params) = self.describe(error, &keyword, &schema_pointer, &instance_pointer, &path);
                out.push(ErrorRecord::new(&path, &keyword, schema_path, message, params));
            }
        }
    }

    /// Strip everything up to the innermost discriminator branch, so that
    /// branch errors are rooted at the branch.
    fn rebase<'p>(&self, pointer: &'p str) -> &'p str {
        let mut best = pointer;
        for site in self.discriminators {
            let Some(rest) = pointer
                .strip_prefix(site.pointer.as_str())
                .and_then(|rest| rest.strip_prefix("/allOf/"))
            else {
                continue;
            };
            let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            let Some(after) = rest[digits..].strip_prefix("/then") else {
                continue;
            };
            if digits > 0 && (after.is_empty() || after.starts_with('/')) && after.len() < best.len()
            {
                best = after;
            }
        }
        best
    }

    fn tag_site(&self, schema_pointer: &str) -> Option<&DiscriminatorSite> {
        self.discriminators.iter().find(|site| {
            schema_pointer
                .strip_prefix(site.pointer.as_str())
                .is_some_and(|rest| rest == "/required")
        })
    }

    /// A missing tag reads as a bad value of the tag property.
    fn tag_error(&self, site: &DiscriminatorSite, mut path: Vec<PathSegment>) -> ErrorRecord {
        path.push(PathSegment::Key(site.property_name.clone()));
        ErrorRecord::new(
            &path,
            "enum",
            format!(
                "{}/properties/{}/enum",
                render_schema_path(self.rebase(&site.pointer)),
                escape_fragment(&site.property_name)
            ),
            "should be equal to one of the allowed values".to_string(),
            params([("allowedValues", json!(site.tags))]),
        )
    }

    /// Member errors first, then the combinator's own record.
    fn union(
        &self,
        keyword: &str,
        schema_pointer: &str,
        instance_pointer: &str,
        path: &[PathSegment],
        schema_path: String,
        out: &mut Vec<ErrorRecord>,
    ) {
        let value = self.instance.pointer(instance_pointer).unwrap_or(&Value::Null);
        let members = self
            .unions
            .get(schema_pointer)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let passing: Vec<usize> = members
            .iter()
            .enumerate()
            .filter(|(_, member)| member.is_valid(value))
            .map(|(i, _)| i)
            .take(2)
            .collect();

        if keyword == "anyOf" || passing.is_empty() {
            for (i, member) in members.iter().enumerate() {
                let prefix = format!("{schema_pointer}/{i}");
                for error in member.iter_errors(value) {
                    self.push(&error, &prefix, instance_pointer, out);
                }
            }
        }

        let (message, params) = if keyword == "anyOf" {
            ("should match some schema in anyOf", Map::new())
        } else {
            let passing = if passing.is_empty() {
                Value::Null
            } else {
                json!(passing)
            };
            (
                "should match exactly one schema in oneOf",
                params([("passingSchemas", passing)]),
            )
        };
        out.push(ErrorRecord::new(path, keyword, schema_path, message.to_string(), params));
    }

    fn describe(
        &self,
        error: &ValidationError<'_>,
        keyword: &str,
        schema_pointer: &str,
        instance_pointer: &str,
        path: &[PathSegment],
    ) -> (String, Map<String, Value>) {
        let rule = self.schema.pointer(schema_pointer).cloned().unwrap_or(Value::Null);
        let shown = match rule {
            Value::Number(ref n) => js_number(n),
            Value::String(ref s) => s.clone(),
            ref other => other.to_string(),
        };
        let bound = |comparison: &str, exclusive: bool| {
            (
                format!("should be {comparison} {shown}"),
                params([
                    ("comparison", json!(comparison)),
                    ("limit", rule.clone()),
                    ("exclusive", json!(exclusive)),
                ]),
            )
        };
        let limit = |message: String| (message, params([("limit", rule.clone())]));

        match keyword {
            "type" => {
                let types = match rule {
                    Value::Array(ref types) => types
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(","),
                    _ => shown.clone(),
                };
                (format!("should be {types}"), params([("type", json!(types))]))
            }
            "maximum" => bound("<=", false),
            "exclusiveMaximum" => bound("<", true),
            "minimum" => bound(">=", false),
            "exclusiveMinimum" => bound(">", true),
            "multipleOf" => (
                format!("should be multiple of {shown}"),
                params([("multipleOf", rule.clone())]),
            ),
            "maxLength" => limit(format!("should NOT be longer than {shown} characters")),
            "minLength" => limit(format!("should NOT be shorter than {shown} characters")),
            "maxItems" => limit(format!("should NOT have more than {shown} items")),
            "minItems" => limit(format!("should NOT have fewer than {shown} items")),
            "maxProperties" => limit(format!("should NOT have more than {shown} properties")),
            "minProperties" => limit(format!("should NOT have fewer than {shown} properties")),
            "pattern" => (
                format!("should match pattern \"{shown}\""),
                params([("pattern", rule.clone())]),
            ),
            "format" => (
                format!("should match format \"{shown}\""),
                params([("format", rule.clone())]),
            ),
            "uniqueItems" => {
                let items = self
                    .instance
                    .pointer(instance_pointer)
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let (i, j) = last_duplicate(items).unwrap_or((0, 0));
                (
                    format!("should NOT have duplicate items (items ## {j} and {i} are identical)"),
                    params([("i", json!(i)), ("j", json!(j))]),
                )
            }
            "const" => (
                "should be equal to constant".to_string(),
                params([("allowedValue", rule.clone())]),
            ),
            "enum" => (
                "should be equal to one of the allowed values".to_string(),
                params([("allowedValues", rule.clone())]),
            ),
            "not" => ("should NOT be valid".to_string(), Map::new()),
            "additionalProperties" => {
                let key = match path.last() {
                    Some(PathSegment::Key(key)) => key.clone(),
                    _ => String::new(),
                };
                (
                    "should NOT have additional properties".to_string(),
                    params([("additionalProperty", json!(key))]),
                )
            }
            _ => (error.to_string(), Map::new()),
        }
    }
}

/// `(i, j)` with `j < i` for the last pair of equal items, scanning from
/// the end.
fn last_duplicate(items: &[Value]) -> Option<(usize, usize)> {
    (0..items.len())
        .rev()
        .find_map(|i| (0..i).rev().find(|&j| json_equal(&items[i], &items[j])).map(|j| (i, j)))
}
