use std::sync::LazyLock;

use jsonschema::ValidationOptions;
use regex::Regex;

use crate::canonical::FormatRegistry;
use crate::error::CompileError;

static UUID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:urn:uuid:)?[0-9a-f]{8}-(?:[0-9a-f]{4}-){3}[0-9a-f]{12}$").unwrap()
});

/// Formats `jsonschema` checks itself under draft 7.
const NATIVE: &[&str] = &[
    "date",
    "date-time",
    "time",
    "email",
    "idn-email",
    "hostname",
    "idn-hostname",
    "ipv4",
    "ipv6",
    "uri",
    "uri-reference",
    "iri",
    "iri-reference",
    "uri-template",
    "json-pointer",
    "relative-json-pointer",
    "regex",
];

/// OpenAPI data-type modifiers that describe encoding rather than shape.
const PERMISSIVE: &[&str] = &["int32", "int64", "float", "double", "byte", "binary", "password"];

/// Format rules for one document: custom patterns compiled once, looked up
/// before everything else.
#[derive(Debug, Clone, Default)]
pub struct FormatTable {
    custom: Vec<(String, Regex)>,
}

impl FormatTable {
    pub fn new(registry: &FormatRegistry) -> Result<Self, CompileError> {
        let custom = registry
            .iter()
            .map(|(name, pattern)| {
                Regex::new(pattern)
                    .map(|re| (name.to_string(), re))
                    .map_err(|source| CompileError::InvalidCustomFormat {
                        name: name.to_string(),
                        source,
                    })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { custom })
    }

    /// Whether a schema may use `name` as its `format`.
    pub fn is_known(&self, name: &str) -> bool {
        self.custom(name).is_some()
            || name == "uuid"
            || NATIVE.contains(&name)
            || PERMISSIVE.contains(&name)
    }

    pub fn custom(&self, name: &str) -> Option<&Regex> {
        self.custom.iter().find(|(n, _)| n == name).map(|(_, re)| re)
    }

    /// Install every non-native check on a set of validator options.
    pub(crate) fn register(&self, options: &mut ValidationOptions) {
        for name in PERMISSIVE {
            if self.custom(name).is_none() {
                *options = std::mem::take(options).with_format(*name, |_: &str| true);
            }
        }
        if self.custom("uuid").is_none() {
            *options = std::mem::take(options).with_format("uuid", |value: &str| UUID_REGEX.is_match(value));
        }
        for (name, re) in &self.custom {
            let re = re.clone();
            *options = std::mem::take(options).with_format(name.clone(), move |value: &str| re.is_match(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::FormatDefinition;

    #[test]
    fn test_known_formats() {
        let table = FormatTable::default();
        assert!(table.is_known("date-time"));
        assert!(table.is_known("uuid"));
        assert!(table.is_known("int64"));
        assert!(!table.is_known("color"));
    }

    #[test]
    fn test_custom_format_is_known() {
        let registry = FormatRegistry::from_definitions(&[FormatDefinition::new("color", r"^#[0-9a-f]{6}$")]);
        let table = FormatTable::new(&registry).unwrap();
        assert!(table.is_known("color"));
        assert!(table.custom("color").unwrap().is_match("#00ff00"));
    }

    #[test]
    fn test_invalid_custom_format() {
        let registry = FormatRegistry::from_definitions(&[FormatDefinition::new("bad", "(")]);
        assert!(matches!(
            FormatTable::new(&registry),
            Err(CompileError::InvalidCustomFormat { .. })
        ));
    }
}
