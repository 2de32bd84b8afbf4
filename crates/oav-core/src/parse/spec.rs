use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use super::components::Components;
use super::operation::PathItem;
use super::parameter::ParameterOrRef;
use super::schema::SchemaOrRef;

/// Info object describing the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
}

/// Which major revision of the format a document uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecVersion {
    /// Swagger 2.0
    V2,
    /// OpenAPI 3.x
    V3,
}

/// A parsed OpenAPI 3.x or Swagger 2.0 document.
///
/// The typed fields drive endpoint discovery; `raw` keeps the full
/// document so that any local JSON pointer can be followed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(
        default,
        deserialize_with = "version_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub swagger: Option<String>,

    #[serde(
        default,
        deserialize_with = "version_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub openapi: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Info>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub paths: IndexMap<String, PathItem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,

    /// Swagger 2.0 schema definitions.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub definitions: IndexMap<String, SchemaOrRef>,

    /// Swagger 2.0 shared parameters.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, ParameterOrRef>,

    /// Swagger 2.0 default request media types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,

    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl Document {
    pub fn version(&self) -> Option<SpecVersion> {
        if self.swagger.as_deref().is_some_and(|v| v.starts_with("2.")) {
            Some(SpecVersion::V2)
        } else if self.openapi.as_deref().is_some_and(|v| v.starts_with("3.")) {
            Some(SpecVersion::V3)
        } else {
            None
        }
    }

    /// Pointer prefix under which named schemas live.
    pub fn schema_section(&self) -> &'static str {
        match self.version() {
            Some(SpecVersion::V2) => "#/definitions/",
            _ => "#/components/schemas/",
        }
    }
}

/// Unquoted YAML versions (`swagger: 2.0`) arrive as numbers.
fn version_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }))
}
