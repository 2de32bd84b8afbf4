use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::canonical::FormatDefinition;
use crate::error::ConfigError;

/// Validator compilation options.
///
/// Consumed at compile time only; the compiled validators never look at
/// it again.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorConfig {
    /// Engine options for body validators.
    pub ajv_config_body: EngineOptions,
    /// Engine options for parameter validators.
    pub ajv_config_params: EngineOptions,
    /// Treat omitted and explicit-`null` optional properties alike.
    pub make_optional_attributes_nullable: bool,
    /// Reject bodies sent with an undeclared content type.
    pub content_type_validation: bool,
    /// Custom `format` rules, shadowing built-in ones.
    pub formats: Vec<FormatDefinition>,
    /// Report errors as readable strings instead of raw records.
    pub beautify_errors: bool,
    /// Keep only the first beautified message.
    pub first_error: bool,
    /// How path templates are keyed in the endpoint map.
    pub path_style: PathStyle,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            ajv_config_body: EngineOptions::default(),
            ajv_config_params: EngineOptions {
                coerce_types: Coercion::Array,
                ..EngineOptions::default()
            },
            make_optional_attributes_nullable: false,
            content_type_validation: false,
            formats: Vec::new(),
            beautify_errors: false,
            first_error: false,
            path_style: PathStyle::OpenApi,
        }
    }
}

/// Options handed through to the validation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineOptions {
    pub coerce_types: Coercion,
    pub remove_additional: RemoveAdditional,
    /// Collect every violation instead of stopping at the first one.
    pub all_errors: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            coerce_types: Coercion::Off,
            remove_additional: RemoveAdditional::Off,
            all_errors: true,
        }
    }
}

/// Type coercion mode: `false`, `true` or `"array"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Coercion {
    #[default]
    Off,
    /// Convert between scalar types when unambiguous.
    Scalars,
    /// Scalars, plus wrapping scalars into arrays and unwrapping
    /// single-element arrays.
    Array,
}

impl Coercion {
    pub fn enabled(&self) -> bool {
        *self != Coercion::Off
    }
}

impl<'de> Deserialize<'de> for Coercion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match BoolOrMode::deserialize(deserializer)? {
            BoolOrMode::Bool(false) => Ok(Coercion::Off),
            BoolOrMode::Bool(true) => Ok(Coercion::Scalars),
            BoolOrMode::Mode(mode) if mode == "array" => Ok(Coercion::Array),
            BoolOrMode::Mode(other) => Err(serde::de::Error::custom(format!(
                "unknown coerceTypes mode '{other}', expected true, false or \"array\""
            ))),
        }
    }
}

/// What to do with undeclared object properties: `false`, `true`,
/// `"all"` or `"failing"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RemoveAdditional {
    #[default]
    Off,
    /// Remove properties where `additionalProperties` is `false`.
    Declared,
    /// Remove every undeclared property of an object schema.
    All,
    /// Remove properties failing the `additionalProperties` schema.
    Failing,
}

impl<'de> Deserialize<'de> for RemoveAdditional {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match BoolOrMode::deserialize(deserializer)? {
            BoolOrMode::Bool(false) => Ok(RemoveAdditional::Off),
            BoolOrMode::Bool(true) => Ok(RemoveAdditional::Declared),
            BoolOrMode::Mode(mode) => match mode.as_str() {
                "all" => Ok(RemoveAdditional::All),
                "failing" => Ok(RemoveAdditional::Failing),
                other => Err(serde::de::Error::custom(format!(
                    "unknown removeAdditional mode '{other}', expected true, false, \"all\" or \"failing\""
                ))),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrMode {
    Bool(bool),
    Mode(String),
}

/// Key style for path templates in the endpoint map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStyle {
    /// Keep document keys: `/pets/{id}`.
    #[default]
    #[serde(rename = "openapi")]
    OpenApi,
    /// Router-style keys: `/pets/:id`.
    Colon,
}

/// Load config from a YAML (or JSON) file. Returns `None` if the file
/// doesn't exist.
pub fn load_config(path: &Path) -> Result<Option<ValidatorConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ValidatorConfig =
        serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ValidatorConfig::default();
        assert_eq!(config.ajv_config_body.coerce_types, Coercion::Off);
        assert_eq!(config.ajv_config_params.coerce_types, Coercion::Array);
        assert!(config.ajv_config_body.all_errors);
        assert!(!config.beautify_errors);
        assert!(!config.first_error);
        assert_eq!(config.path_style, PathStyle::OpenApi);
    }

    #[test]
    fn test_parse_config_yaml() {
        let yaml = r#"
ajvConfigBody:
  coerceTypes: true
  removeAdditional: failing
ajvConfigParams:
  coerceTypes: false
makeOptionalAttributesNullable: true
contentTypeValidation: true
formats:
  - name: int64
    pattern: '^\d{1,19}$'
beautifyErrors: true
firstError: true
pathStyle: colon
"#;
        let config: ValidatorConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.ajv_config_body.coerce_types, Coercion::Scalars);
        assert_eq!(
            config.ajv_config_body.remove_additional,
            RemoveAdditional::Failing
        );
        assert!(config.ajv_config_body.all_errors);
        assert_eq!(config.ajv_config_params.coerce_types, Coercion::Off);
        assert!(config.make_optional_attributes_nullable);
        assert!(config.content_type_validation);
        assert_eq!(config.formats.len(), 1);
        assert_eq!(config.formats[0].pattern, r"^\d{1,19}$");
        assert!(config.beautify_errors);
        assert!(config.first_error);
        assert_eq!(config.path_style, PathStyle::Colon);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: ValidatorConfig =
            serde_json::from_str(r#"{"ajvConfigBody": {"coerceTypes": "array"}}"#).unwrap();
        assert_eq!(config.ajv_config_body.coerce_types, Coercion::Array);
        // Defaults applied
        assert_eq!(config.ajv_config_params.coerce_types, Coercion::Array);
        assert!(!config.content_type_validation);
    }

    #[test]
    fn test_unknown_coercion_mode_is_rejected() {
        let result: Result<EngineOptions, _> =
            serde_json::from_str(r#"{"coerceTypes": "sometimes"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validator.yaml");
        fs::write(&path, "beautifyErrors: true\n").unwrap();
        let loaded = load_config(&path).unwrap().unwrap();
        assert!(loaded.beautify_errors);
    }
}
