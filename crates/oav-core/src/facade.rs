//! The callable surface of a compiled endpoint.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::beautify::{CONTENT_TYPE_KEYWORD, beautify};
use crate::config::ValidatorConfig;
use crate::engine::record::params;
use crate::engine::{ErrorRecord, Validate};
use crate::transform::match_media_type;
use crate::transform::parameters::{FILES, HEADERS, PATH, QUERY};

/// Which part of a request a validator checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Parameters,
    Body,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Parameters => write!(f, "parameters"),
            Target::Body => write!(f, "body"),
        }
    }
}

/// Errors of a failed check, in the shape the config asks for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Errors {
    Raw(Vec<ErrorRecord>),
    Beautified(Vec<String>),
    First(String),
}

/// Result of validating one value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub valid: bool,
    /// `None` exactly when `valid` is true.
    pub errors: Option<Errors>,
}

impl Outcome {
    fn pass() -> Self {
        Self {
            valid: true,
            errors: None,
        }
    }

    fn fail(errors: Errors) -> Self {
        Self {
            valid: false,
            errors: Some(errors),
        }
    }
}

/// How failures are reported, fixed at compile time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reporting {
    pub beautify: bool,
    pub first_error: bool,
}

impl Reporting {
    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self {
            beautify: config.beautify_errors,
            first_error: config.first_error,
        }
    }

    fn report(&self, target: Target, mut records: Vec<ErrorRecord>) -> Errors {
        if self.beautify {
            let mut messages = beautify(&records, target);
            if self.first_error && !messages.is_empty() {
                return Errors::First(messages.swap_remove(0));
            }
            return Errors::Beautified(messages);
        }
        if self.first_error {
            records.truncate(1);
        }
        Errors::Raw(records)
    }
}

/// Anything that can validate a JSON value.
pub trait Check {
    fn check(&self, instance: &mut Value) -> Outcome;
}

/// A compiled schema bound to its target and reporting options.
///
/// Cloning is cheap and clones share the compiled schema; checking from
/// many threads at once is safe.
#[derive(Debug, Clone)]
pub struct TargetValidator {
    target: Target,
    validator: Arc<dyn Validate>,
    reporting: Reporting,
}

impl TargetValidator {
    pub fn new(target: Target, validator: Arc<dyn Validate>, reporting: Reporting) -> Self {
        Self {
            target,
            validator,
            reporting,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn session(&self) -> ValidationSession<Self> {
        ValidationSession::new(self.clone())
    }
}

impl Check for TargetValidator {
    fn check(&self, instance: &mut Value) -> Outcome {
        match self.validator.validate(instance) {
            Ok(()) => Outcome::pass(),
            Err(records) => Outcome::fail(self.reporting.report(self.target, records)),
        }
    }
}

/// Validates request bodies, choosing the schema by content type.
#[derive(Debug, Clone)]
pub struct BodyValidator {
    schemas: Vec<TargetValidator>,
    media_types: IndexMap<String, usize>,
    primary: usize,
    content_type_validation: bool,
    reporting: Reporting,
}

impl BodyValidator {
    pub(crate) fn new(
        schemas: Vec<TargetValidator>,
        media_types: IndexMap<String, usize>,
        primary: usize,
        config: &ValidatorConfig,
    ) -> Self {
        Self {
            schemas,
            media_types,
            primary,
            content_type_validation: config.content_type_validation,
            reporting: Reporting::from_config(config),
        }
    }

    pub fn media_types(&self) -> impl Iterator<Item = &str> {
        self.media_types.keys().map(String::as_str)
    }

    /// Validate a body sent with the given `Content-Type`.
    ///
    /// With content-type validation on, an undeclared media type fails
    /// before the body is looked at. Without a content type the primary
    /// schema applies.
    pub fn check_content(&self, content_type: Option<&str>, instance: &mut Value) -> Outcome {
        let Some(content_type) = content_type else {
            return self.check(instance);
        };
        match match_media_type(self.media_types.keys().map(String::as_str), content_type) {
            Some(media) => {
                let index = self.media_types.get(media).copied().unwrap_or(self.primary);
                self.validator(index).check(instance)
            }
            None if self.content_type_validation => {
                let error = self.content_type_error(content_type);
                Outcome::fail(self.reporting.report(Target::Body, vec![error]))
            }
            None => self.check(instance),
        }
    }

    pub fn session(&self) -> ValidationSession<Self> {
        ValidationSession::new(self.clone())
    }

    fn validator(&self, index: usize) -> &TargetValidator {
        &self.schemas[index.min(self.schemas.len() - 1)]
    }

    fn content_type_error(&self, content_type: &str) -> ErrorRecord {
        let declared: Vec<&str> = self.media_types().collect();
        ErrorRecord::new(
            &[],
            CONTENT_TYPE_KEYWORD,
            "#/content".to_string(),
            format!("should be one of {}", declared.join(", ")),
            params([
                ("contentType", json!(content_type)),
                ("allowedValues", json!(declared)),
            ]),
        )
    }
}

impl Check for BodyValidator {
    fn check(&self, instance: &mut Value) -> Outcome {
        self.validator(self.primary).check(instance)
    }
}

/// The parts of a request that parameters are read from.
///
/// Header names are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParts {
    pub query: Map<String, Value>,
    pub headers: Map<String, Value>,
    pub path: Map<String, Value>,
    pub files: Option<Map<String, Value>>,
}

impl RequestParts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.query.insert(name.to_string(), value.into());
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn path_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.path.insert(name.to_string(), value.into());
        self
    }

    pub fn file(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.files
            .get_or_insert_with(Map::new)
            .insert(name.to_string(), value.into());
        self
    }

    fn into_value(self) -> Value {
        let headers: Map<String, Value> = self
            .headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        let mut root = Map::new();
        root.insert(QUERY.to_string(), Value::Object(self.query));
        root.insert(HEADERS.to_string(), Value::Object(headers));
        root.insert(PATH.to_string(), Value::Object(self.path));
        if let Some(files) = self.files {
            root.insert(FILES.to_string(), Value::Object(files));
        }
        Value::Object(root)
    }

    fn take_back(&mut self, value: Value) {
        let Value::Object(mut root) = value else {
            return;
        };
        let mut part = |name: &str| match root.remove(name) {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };
        self.query = part(QUERY).unwrap_or_default();
        self.headers = part(HEADERS).unwrap_or_default();
        self.path = part(PATH).unwrap_or_default();
        self.files = part(FILES);
    }
}

/// Validates the composite `{query, headers, path, files}` object.
#[derive(Debug, Clone)]
pub struct ParametersValidator {
    inner: TargetValidator,
}

impl ParametersValidator {
    pub(crate) fn new(inner: TargetValidator) -> Self {
        Self { inner }
    }

    /// Validate request parts, writing coerced values back into them.
    pub fn check_parts(&self, parts: &mut RequestParts) -> Outcome {
        let mut value = std::mem::take(parts).into_value();
        let outcome = self.inner.check(&mut value);
        parts.take_back(value);
        outcome
    }

    pub fn session(&self) -> ValidationSession<Self> {
        ValidationSession::new(self.clone())
    }
}

impl Check for ParametersValidator {
    fn check(&self, instance: &mut Value) -> Outcome {
        self.inner.check(instance)
    }
}

/// A validator with a slot for the errors of its latest call.
///
/// Each session is owned by one caller; concurrent callers should each
/// hold their own session or use [`Check::check`] directly.
#[derive(Debug, Clone)]
pub struct ValidationSession<V> {
    validator: V,
    errors: Option<Errors>,
}

impl<V: Check> ValidationSession<V> {
    pub fn new(validator: V) -> Self {
        Self {
            validator,
            errors: None,
        }
    }

    /// Validate and remember the errors, replacing those of the previous
    /// call.
    pub fn validate(&mut self, instance: &mut Value) -> bool {
        let outcome = self.validator.check(instance);
        self.errors = outcome.errors;
        outcome.valid
    }

    pub fn errors(&self) -> Option<&Errors> {
        self.errors.as_ref()
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{AdditionalPolicy, CanonicalSchema, InstanceType, TypedSchema};
    use crate::config::EngineOptions;
    use crate::engine::{BuiltinEngine, FormatTable, SchemaEngine};

    fn dog_validator(reporting: Reporting) -> TargetValidator {
        let bark = CanonicalSchema::typed(TypedSchema::of(vec![InstanceType::String]));
        let dog = TypedSchema::object(
            IndexMap::from([("bark".to_string(), bark)]),
            vec!["bark".to_string()],
            AdditionalPolicy::Allowed,
        );
        let compiled = BuiltinEngine
            .compile(
                &CanonicalSchema::typed(dog),
                &FormatTable::default(),
                &EngineOptions::default(),
            )
            .unwrap();
        TargetValidator::new(Target::Body, compiled, reporting)
    }

    #[test]
    fn test_outcome_valid_has_no_errors() {
        let outcome = dog_validator(Reporting::default()).check(&mut json!({"bark": "woof"}));
        assert!(outcome.valid);
        assert!(outcome.errors.is_none());
    }

    #[test]
    fn test_first_error_beautified() {
        let reporting = Reporting {
            beautify: true,
            first_error: true,
        };
        let outcome = dog_validator(reporting).check(&mut json!({}));
        assert_eq!(
            outcome.errors,
            Some(Errors::First(
                "body should have required property 'bark'".to_string()
            ))
        );
    }

    #[test]
    fn test_session_overwrites_errors() {
        let mut session = dog_validator(Reporting::default()).session();
        assert!(!session.validate(&mut json!({})));
        assert!(session.errors().is_some());
        assert!(session.validate(&mut json!({"bark": "woof"})));
        assert!(session.errors().is_none());
    }

    #[test]
    fn test_errors_serialize_untagged() {
        let errors = Errors::Beautified(vec!["body should be object".to_string()]);
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!(["body should be object"])
        );
    }

    #[test]
    fn test_request_parts_lowercase_headers() {
        let parts = RequestParts::new()
            .header("Public-Key", "1.0")
            .query("page", "2");
        let value = parts.into_value();
        assert_eq!(value["headers"]["public-key"], "1.0");
        assert!(value.get("files").is_none());
    }
}
