use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::media_type::MediaType;
use super::schema::{Schema, SchemaOrRef, SchemaType, TypeSet};

/// Parameter location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
    /// Swagger 2.0 request body parameter.
    Body,
    /// Swagger 2.0 form field (`multipart/form-data` or url-encoded).
    FormData,
}

/// Keywords a Swagger 2.0 parameter carries inline instead of in `schema`.
const INLINE_SCHEMA_KEYWORDS: &[&str] = &[
    "type",
    "format",
    "items",
    "enum",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
    "uniqueItems",
    "x-nullable",
];

/// An API parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,

    #[serde(rename = "in")]
    pub location: ParameterLocation,

    #[serde(default)]
    pub required: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaOrRef>,

    /// OpenAPI 3 alternative to `schema`: a single-entry media type map.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub explode: Option<bool>,

    /// Everything else, including Swagger 2.0 inline type keywords.
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl Parameter {
    /// The schema describing this parameter's value, whichever way the
    /// document spells it.
    pub fn value_schema(&self) -> Result<Option<SchemaOrRef>, serde_json::Error> {
        if let Some(schema) = &self.schema {
            return Ok(Some(schema.clone()));
        }
        if let Some(schema) = self.content.values().find_map(|mt| mt.schema.clone()) {
            return Ok(Some(schema));
        }
        let inline: serde_json::Map<String, serde_json::Value> = self
            .extra
            .iter()
            .filter(|(k, _)| INLINE_SCHEMA_KEYWORDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if inline.is_empty() {
            return Ok(None);
        }
        let schema: Schema = serde_json::from_value(serde_json::Value::Object(inline))?;
        Ok(Some(SchemaOrRef::Schema(Box::new(schema))))
    }

    /// Swagger 2.0 `type: file` form field.
    pub fn is_file(&self) -> bool {
        self.extra
            .get("type")
            .and_then(|t| serde_json::from_value::<TypeSet>(t.clone()).ok())
            .is_some_and(|t| t.contains(SchemaType::File))
    }

    /// Whether a query object parameter spreads its properties into the
    /// query string (`style: form`, `explode: true`, the query defaults).
    pub fn is_exploded_form(&self) -> bool {
        self.location == ParameterLocation::Query
            && self.style.as_deref().unwrap_or("form") == "form"
            && self.explode.unwrap_or(true)
    }
}

/// A reference or inline parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterOrRef {
    Ref {
        #[serde(rename = "$ref")]
        ref_path: String,
    },
    Parameter(Box<Parameter>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swagger2_inline_schema() {
        let yaml = r#"
name: limit
in: query
required: true
type: integer
format: int32
maximum: 100
collectionFormat: csv
"#;
        let param: Parameter = serde_yaml_ng::from_str(yaml).unwrap();
        let schema = match param.value_schema().unwrap() {
            Some(SchemaOrRef::Schema(s)) => s,
            other => panic!("expected inline schema, got {other:?}"),
        };
        assert_eq!(
            schema.schema_type,
            Some(TypeSet::Single(SchemaType::Integer))
        );
        assert_eq!(schema.format.as_deref(), Some("int32"));
        assert_eq!(schema.maximum, Some(100.0));
    }

    #[test]
    fn test_openapi3_content_schema() {
        let yaml = r#"
name: filter
in: query
content:
  application/json:
    schema:
      type: object
"#;
        let param: Parameter = serde_yaml_ng::from_str(yaml).unwrap();
        assert!(matches!(
            param.value_schema().unwrap(),
            Some(SchemaOrRef::Schema(_))
        ));
    }

    #[test]
    fn test_file_parameter() {
        let yaml = "name: avatar\nin: formData\ntype: file\n";
        let param: Parameter = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(param.location, ParameterLocation::FormData);
        assert!(param.is_file());
    }

    #[test]
    fn test_exploded_form_defaults() {
        let yaml = "name: q\nin: query\nschema:\n  type: object\n";
        let param: Parameter = serde_yaml_ng::from_str(yaml).unwrap();
        assert!(param.is_exploded_form());
    }
}
