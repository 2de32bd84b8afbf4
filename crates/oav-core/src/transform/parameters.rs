use indexmap::IndexMap;

use super::schema_normalizer::{Normalizer, make_optional_nullable};
use crate::canonical::{AdditionalPolicy, CanonicalSchema, TypedSchema};
use crate::error::NormalizeError;
use crate::parse::parameter::{Parameter, ParameterLocation};
use crate::parse::schema::{AdditionalProperties, Schema, SchemaType};

/// Keys of the composite parameters object, in reporting order.
pub const QUERY: &str = "query";
pub const HEADERS: &str = "headers";
pub const PATH: &str = "path";
pub const FILES: &str = "files";

/// One sub-object of the composite parameters schema.
struct Group {
    properties: IndexMap<String, CanonicalSchema>,
    required: Vec<String>,
    additional: AdditionalPolicy,
}

impl Group {
    fn new(additional: AdditionalPolicy) -> Self {
        Self {
            properties: IndexMap::new(),
            required: Vec::new(),
            additional,
        }
    }

    fn add(&mut self, name: String, node: CanonicalSchema, required: bool) {
        if required && !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.properties.insert(name, node);
    }

    fn into_schema(mut self, optional_nullable: bool) -> CanonicalSchema {
        if optional_nullable {
            make_optional_nullable(&mut self.properties, &self.required, &[]);
        }
        CanonicalSchema::typed(TypedSchema::object(
            self.properties,
            self.required,
            self.additional,
        ))
    }
}

impl Normalizer<'_, '_> {
    /// Build the composite `{query, headers, path, files}` schema for an
    /// endpoint's parameters, or `None` when it declares none that are
    /// validated here.
    pub fn normalize_parameters(
        &mut self,
        parameters: &[Parameter],
    ) -> Result<Option<CanonicalSchema>, NormalizeError> {
        let mut query = Group::new(AdditionalPolicy::Forbidden);
        // Clients and proxies add headers of their own.
        let mut headers = Group::new(AdditionalPolicy::Allowed);
        let mut path = Group::new(AdditionalPolicy::Forbidden);
        let mut files = Group::new(AdditionalPolicy::Forbidden);
        let mut declared = false;

        for param in parameters {
            match param.location {
                ParameterLocation::Cookie => {
                    log::trace!("ignoring cookie parameter '{}'", param.name);
                }
                ParameterLocation::Body => {}
                ParameterLocation::FormData if !param.is_file() => {}
                ParameterLocation::FormData => {
                    declared = true;
                    files.add(param.name.clone(), CanonicalSchema::Any, param.required);
                }
                ParameterLocation::Query => {
                    declared = true;
                    let schema = self.parameter_schema(param)?;
                    match schema {
                        Some(ref s) if param.is_exploded_form() && is_object(s) => {
                            self.spread_into(&mut query, s)?;
                        }
                        _ => {
                            let node = self.parameter_node(schema.as_ref())?;
                            query.add(param.name.clone(), node, param.required);
                        }
                    }
                }
                ParameterLocation::Header => {
                    declared = true;
                    let schema = self.parameter_schema(param)?;
                    let node = self.parameter_node(schema.as_ref())?;
                    headers.add(param.name.to_ascii_lowercase(), node, param.required);
                }
                ParameterLocation::Path => {
                    declared = true;
                    let schema = self.parameter_schema(param)?;
                    let node = self.parameter_node(schema.as_ref())?;
                    path.add(param.name.clone(), node, true);
                }
            }
        }

        if !declared {
            return Ok(None);
        }

        let nullable = self.config.make_optional_attributes_nullable;
        let root = IndexMap::from([
            (QUERY.to_string(), query.into_schema(nullable)),
            (HEADERS.to_string(), headers.into_schema(nullable)),
            (PATH.to_string(), path.into_schema(nullable)),
            (FILES.to_string(), files.into_schema(nullable)),
        ]);
        Ok(Some(CanonicalSchema::typed(TypedSchema::object(
            root,
            Vec::new(),
            AdditionalPolicy::Allowed,
        ))))
    }

    fn parameter_schema(&mut self, param: &Parameter) -> Result<Option<Schema>, NormalizeError> {
        let value_schema = param
            .value_schema()
            .map_err(|source| NormalizeError::InvalidParameter {
                name: param.name.clone(),
                source,
            })?;
        match value_schema {
            Some(ref s) => Ok(Some(self.inline(s)?)),
            None => Ok(None),
        }
    }

    fn parameter_node(&mut self, schema: Option<&Schema>) -> Result<CanonicalSchema, NormalizeError> {
        match schema {
            Some(s) => self.normalize_schema(s),
            None => Ok(CanonicalSchema::Any),
        }
    }

    /// An exploded object parameter contributes its properties directly
    /// to the query string.
    fn spread_into(&mut self, query: &mut Group, schema: &Schema) -> Result<(), NormalizeError> {
        for (name, prop) in &schema.properties {
            let node = self.normalize_schema_or_ref(prop)?;
            query.add(name.clone(), node, schema.required.contains(name));
        }
        query.additional = match schema.additional_properties {
            None | Some(AdditionalProperties::Bool(true)) => AdditionalPolicy::Allowed,
            Some(AdditionalProperties::Bool(false)) => AdditionalPolicy::Forbidden,
            Some(AdditionalProperties::Schema(ref s)) => {
                AdditionalPolicy::Schema(Box::new(self.normalize_schema_or_ref(s)?))
            }
        };
        Ok(())
    }
}

fn is_object(schema: &Schema) -> bool {
    schema
        .schema_type
        .as_ref()
        .is_some_and(|t| t.contains(SchemaType::Object))
        || !schema.properties.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::InstanceType;
    use crate::config::ValidatorConfig;
    use crate::parse;
    use crate::parse::ref_resolve::RefResolver;

    const DOC: &str = r#"
openapi: 3.0.0
info: { title: T, version: "1" }
paths: {}
"#;

    fn normalize(params_yaml: &str) -> Option<CanonicalSchema> {
        normalize_with(params_yaml, &ValidatorConfig::default())
    }

    fn normalize_with(params_yaml: &str, config: &ValidatorConfig) -> Option<CanonicalSchema> {
        let doc = parse::from_yaml(DOC).unwrap();
        let params: Vec<Parameter> = serde_yaml_ng::from_str(params_yaml).unwrap();
        let mut resolver = RefResolver::new(&doc);
        let mut normalizer = Normalizer::new(&mut resolver, config);
        normalizer.normalize_parameters(&params).unwrap()
    }

    fn group(root: &CanonicalSchema, name: &str) -> TypedSchema {
        let CanonicalSchema::Typed(root) = root else {
            panic!("expected typed root");
        };
        match &root.properties[name] {
            CanonicalSchema::Typed(t) => t.as_ref().clone(),
            other => panic!("expected typed group, got {other:?}"),
        }
    }

    #[test]
    fn test_groups_by_location() {
        let root = normalize(
            r#"
- { name: page, in: query, required: true, schema: { type: integer } }
- { name: Public-Key, in: header, required: true, schema: { type: string } }
- { name: name, in: path, schema: { type: string } }
- { name: session, in: cookie, schema: { type: string } }
"#,
        )
        .unwrap();

        let query = group(&root, QUERY);
        assert_eq!(query.required, vec!["page".to_string()]);
        assert_eq!(query.additional, AdditionalPolicy::Forbidden);

        let headers = group(&root, HEADERS);
        assert!(headers.properties.contains_key("public-key"));
        assert_eq!(headers.additional, AdditionalPolicy::Allowed);

        let path = group(&root, PATH);
        assert_eq!(path.required, vec!["name".to_string()]);

        let files = group(&root, FILES);
        assert!(files.properties.is_empty());
    }

    #[test]
    fn test_no_parameters_no_schema() {
        assert!(normalize("[]").is_none());
        assert!(normalize("- { name: s, in: cookie }").is_none());
    }

    #[test]
    fn test_exploded_object_spreads_into_query() {
        let root = normalize(
            r#"
- name: filter
  in: query
  schema:
    type: object
    required: [color]
    properties:
      color: { type: string }
      size: { type: integer }
    additionalProperties: true
"#,
        )
        .unwrap();
        let query = group(&root, QUERY);
        assert_eq!(
            query.properties.keys().collect::<Vec<_>>(),
            vec!["color", "size"]
        );
        assert_eq!(query.required, vec!["color".to_string()]);
        assert_eq!(query.additional, AdditionalPolicy::Allowed);
    }

    #[test]
    fn test_swagger2_file_parameter_goes_to_files() {
        let root = normalize(
            r#"
- { name: avatar, in: formData, type: file, required: true }
- { name: note, in: formData, type: string }
"#,
        )
        .unwrap();
        let files = group(&root, FILES);
        assert_eq!(files.required, vec!["avatar".to_string()]);
        assert!(!files.properties.contains_key("note"));
    }

    #[test]
    fn test_optional_parameters_accept_null() {
        let config = ValidatorConfig {
            make_optional_attributes_nullable: true,
            ..ValidatorConfig::default()
        };
        let root = normalize_with(
            r#"
- { name: page, in: query, required: true, schema: { type: integer } }
- { name: limit, in: query, schema: { type: integer } }
- { name: X-Trace, in: header, schema: { type: string } }
- { name: id, in: path, schema: { type: string } }
"#,
            &config,
        )
        .unwrap();

        let types = |group: &TypedSchema, name: &str| match &group.properties[name] {
            CanonicalSchema::Typed(t) => t.types.clone(),
            other => panic!("expected typed property, got {other:?}"),
        };
        let query = group(&root, QUERY);
        assert_eq!(types(&query, "page"), vec![InstanceType::Integer]);
        assert_eq!(types(&query, "limit"), vec![InstanceType::Integer, InstanceType::Null]);
        let headers = group(&root, HEADERS);
        assert_eq!(types(&headers, "x-trace"), vec![InstanceType::String, InstanceType::Null]);
        let path = group(&root, PATH);
        assert_eq!(types(&path, "id"), vec![InstanceType::String]);
    }
}
