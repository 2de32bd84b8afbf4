use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A user-supplied named format, checked with a regular expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDefinition {
    pub name: String,
    pub pattern: String,
}

impl FormatDefinition {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

/// Custom format rules shared by every schema compiled from one document.
/// A custom entry shadows the engine's built-in format of the same name;
/// later definitions win over earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormatRegistry {
    custom: IndexMap<String, String>,
}

impl FormatRegistry {
    pub fn from_definitions(definitions: &[FormatDefinition]) -> Self {
        let custom = definitions
            .iter()
            .map(|d| (d.name.clone(), d.pattern.clone()))
            .collect();
        Self { custom }
    }

    pub fn custom_pattern(&self, name: &str) -> Option<&str> {
        self.custom.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.custom.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.custom.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_definition_wins() {
        let registry = FormatRegistry::from_definitions(&[
            FormatDefinition::new("int64", r"^\d+$"),
            FormatDefinition::new("int64", r"^\d{1,19}$"),
        ]);
        assert_eq!(registry.custom_pattern("int64"), Some(r"^\d{1,19}$"));
        assert_eq!(registry.iter().count(), 1);
    }
}
