use indexmap::IndexMap;

use crate::canonical::{AdditionalPolicy, CanonicalSchema, InstanceType, TypedSchema};
use crate::config::ValidatorConfig;
use crate::error::NormalizeError;
use crate::parse::ref_resolve::RefResolver;
use crate::parse::schema::{AdditionalProperties, ExclusiveBound, Schema, SchemaOrRef, SchemaType};

/// Rewrites resolved OpenAPI schemas into [`CanonicalSchema`] trees.
///
/// The resolver stays reachable because discriminator mappings may name
/// schemas that no `oneOf` branch mentions.
pub struct Normalizer<'r, 'd> {
    pub(super) resolver: &'r mut RefResolver<'d>,
    pub(super) config: &'r ValidatorConfig,
    /// Origins of discriminated schemas currently being expanded.
    pub(super) dispatching: Vec<String>,
}

impl<'r, 'd> Normalizer<'r, 'd> {
    pub fn new(resolver: &'r mut RefResolver<'d>, config: &'r ValidatorConfig) -> Self {
        Self {
            resolver,
            config,
            dispatching: Vec::new(),
        }
    }

    pub fn normalize_schema_or_ref(
        &mut self,
        schema_or_ref: &SchemaOrRef,
    ) -> Result<CanonicalSchema, NormalizeError> {
        let schema = self.inline(schema_or_ref)?;
        self.normalize_schema(&schema)
    }

    pub fn normalize_schema(&mut self, schema: &Schema) -> Result<CanonicalSchema, NormalizeError> {
        self.normalize_with(schema, &[])
    }

    /// `inherited` lists properties required by sibling `allOf` members;
    /// they count as required when deciding optional-nullability.
    pub(super) fn normalize_with(
        &mut self,
        schema: &Schema,
        inherited: &[String],
    ) -> Result<CanonicalSchema, NormalizeError> {
        if let Some(ref discriminator) = schema.discriminator {
            let suppressed = schema
                .origin
                .as_ref()
                .is_some_and(|o| self.dispatching.contains(o));
            if !suppressed {
                if let Some(node) = self.normalize_discriminated(schema, discriminator)? {
                    return Ok(nullable(schema, node));
                }
            }
        }

        let node = self.normalize_composition(schema, inherited)?;
        Ok(nullable(schema, node))
    }

    /// Everything but the discriminator: own keywords plus `allOf`,
    /// `oneOf`, `anyOf` and `not`, conjoined.
    pub(super) fn normalize_composition(
        &mut self,
        schema: &Schema,
        inherited: &[String],
    ) -> Result<CanonicalSchema, NormalizeError> {
        let mut all_of = Vec::with_capacity(schema.all_of.len());
        for member in &schema.all_of {
            all_of.push(self.inline(member)?);
        }

        let mut required: Vec<String> = inherited.to_vec();
        if !all_of.is_empty() {
            for name in schema
                .required
                .iter()
                .chain(all_of.iter().flat_map(|m| m.required.iter()))
            {
                if !required.contains(name) {
                    required.push(name.clone());
                }
            }
        }

        let mut members = Vec::new();
        let own = self.normalize_typed(schema, &required)?;
        if !own.is_trivial() {
            members.push(CanonicalSchema::typed(own));
        }
        for member in &all_of {
            members.push(self.normalize_with(member, &required)?);
        }
        if !schema.one_of.is_empty() {
            members.push(CanonicalSchema::OneOf(self.normalize_all(&schema.one_of)?));
        }
        if !schema.any_of.is_empty() {
            members.push(CanonicalSchema::AnyOf(self.normalize_all(&schema.any_of)?));
        }
        if let Some(ref not) = schema.not {
            members.push(CanonicalSchema::Not(Box::new(
                self.normalize_schema_or_ref(not)?,
            )));
        }

        Ok(match members.len() {
            0 => CanonicalSchema::Any,
            1 => members.remove(0),
            _ => CanonicalSchema::AllOf(members),
        })
    }

    fn normalize_all(&mut self, schemas: &[SchemaOrRef]) -> Result<Vec<CanonicalSchema>, NormalizeError> {
        schemas
            .iter()
            .map(|s| self.normalize_schema_or_ref(s))
            .collect()
    }

    /// The schema's own keywords as one typed node.
    fn normalize_typed(
        &mut self,
        schema: &Schema,
        inherited: &[String],
    ) -> Result<TypedSchema, NormalizeError> {
        let mut typed = TypedSchema {
            types: schema
                .schema_type
                .as_ref()
                .map(|t| t.to_vec().into_iter().filter_map(instance_type).collect())
                .unwrap_or_default(),
            enum_values: schema.enum_values.clone(),
            const_value: schema.const_value.clone(),
            multiple_of: schema.multiple_of,
            min_length: schema.min_length,
            max_length: schema.max_length,
            pattern: schema.pattern.clone(),
            format: schema.format.clone(),
            min_items: schema.min_items,
            max_items: schema.max_items,
            unique_items: schema.unique_items.unwrap_or(false),
            required: schema.required.clone(),
            min_properties: schema.min_properties,
            max_properties: schema.max_properties,
            ..TypedSchema::default()
        };

        (typed.minimum, typed.exclusive_minimum) =
            split_bound(schema.minimum, schema.exclusive_minimum);
        (typed.maximum, typed.exclusive_maximum) =
            split_bound(schema.maximum, schema.exclusive_maximum);

        if let Some(ref items) = schema.items {
            typed.items = Some(Box::new(self.normalize_schema_or_ref(items)?));
        }

        for (name, prop) in &schema.properties {
            let node = self.normalize_schema_or_ref(prop)?;
            typed.properties.insert(name.clone(), node);
        }

        typed.additional = match schema.additional_properties {
            None | Some(AdditionalProperties::Bool(true)) => AdditionalPolicy::Allowed,
            Some(AdditionalProperties::Bool(false)) => AdditionalPolicy::Forbidden,
            Some(AdditionalProperties::Schema(ref s)) => {
                AdditionalPolicy::Schema(Box::new(self.normalize_schema_or_ref(s)?))
            }
        };

        // Required-ness is settled above; only then may optional
        // properties be widened to accept null.
        if self.config.make_optional_attributes_nullable {
            make_optional_nullable(&mut typed.properties, &typed.required, inherited);
        }

        Ok(typed)
    }

    /// Resolve a leftover reference, or clone an inline schema.
    pub(super) fn inline(&mut self, schema_or_ref: &SchemaOrRef) -> Result<Schema, NormalizeError> {
        match schema_or_ref {
            SchemaOrRef::Schema(schema) => Ok(schema.as_ref().clone()),
            SchemaOrRef::Ref { .. } => Ok(self.resolver.resolve_schema_or_ref(schema_or_ref)?),
        }
    }
}

fn nullable(schema: &Schema, node: CanonicalSchema) -> CanonicalSchema {
    if schema.is_nullable() {
        node.or_null()
    } else {
        node
    }
}

fn instance_type(ty: SchemaType) -> Option<InstanceType> {
    match ty {
        SchemaType::String => Some(InstanceType::String),
        SchemaType::Number => Some(InstanceType::Number),
        SchemaType::Integer => Some(InstanceType::Integer),
        SchemaType::Boolean => Some(InstanceType::Boolean),
        SchemaType::Array => Some(InstanceType::Array),
        SchemaType::Object => Some(InstanceType::Object),
        SchemaType::Null => Some(InstanceType::Null),
        // Uploaded files are shaped by the web framework, not the document.
        SchemaType::File => None,
    }
}

/// Split a bound into its inclusive and exclusive parts.
fn split_bound(limit: Option<f64>, exclusive: Option<ExclusiveBound>) -> (Option<f64>, Option<f64>) {
    match exclusive {
        Some(ExclusiveBound::Flag(true)) => (None, limit),
        Some(ExclusiveBound::Limit(x)) => (limit, Some(x)),
        Some(ExclusiveBound::Flag(false)) | None => (limit, None),
    }
}

pub(super) fn make_optional_nullable(
    properties: &mut IndexMap<String, CanonicalSchema>,
    required: &[String],
    inherited: &[String],
) {
    for (name, node) in properties.iter_mut() {
        if required.contains(name) || inherited.contains(name) {
            continue;
        }
        let widened = std::mem::replace(node, CanonicalSchema::Any).or_null();
        *node = widened;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn normalize(doc_yaml: &str, name: &str, config: &ValidatorConfig) -> CanonicalSchema {
        let doc = parse::from_yaml(doc_yaml).unwrap();
        let mut resolver = RefResolver::new(&doc);
        let schema = resolver
            .lookup_schema(&format!("#/components/schemas/{name}"))
            .unwrap();
        let mut normalizer = Normalizer::new(&mut resolver, config);
        normalizer.normalize_schema(&schema).unwrap()
    }

    const DOC: &str = r#"
openapi: 3.0.0
info: { title: T, version: "1" }
paths: {}
components:
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        name:
          type: string
        age:
          type: integer
          nullable: true
        tag:
          type: string
        price:
          type: number
          minimum: 0
          exclusiveMinimum: true
    Composed:
      allOf:
        - $ref: '#/components/schemas/Base'
        - type: object
          properties:
            extra:
              type: string
    Base:
      type: object
      required: [extra]
      properties:
        id:
          type: string
    NullableRef:
      nullable: true
      allOf:
        - $ref: '#/components/schemas/Base'
"#;

    fn typed(node: &CanonicalSchema) -> &TypedSchema {
        match node {
            CanonicalSchema::Typed(t) => t,
            other => panic!("expected typed node, got {other:?}"),
        }
    }

    #[test]
    fn test_nullable_flattened_into_type_union() {
        let node = normalize(DOC, "Pet", &ValidatorConfig::default());
        let pet = typed(&node);
        let age = typed(&pet.properties["age"]);
        assert_eq!(age.types, vec![InstanceType::Integer, InstanceType::Null]);
        let tag = typed(&pet.properties["tag"]);
        assert_eq!(tag.types, vec![InstanceType::String]);
    }

    #[test]
    fn test_legacy_exclusive_minimum() {
        let node = normalize(DOC, "Pet", &ValidatorConfig::default());
        let price = typed(&typed(&node).properties["price"]);
        assert_eq!(price.minimum, None);
        assert_eq!(price.exclusive_minimum, Some(0.0));
    }

    #[test]
    fn test_optional_attributes_nullable_skips_required() {
        let config = ValidatorConfig {
            make_optional_attributes_nullable: true,
            ..ValidatorConfig::default()
        };
        let node = normalize(DOC, "Pet", &config);
        let pet = typed(&node);
        assert_eq!(
            typed(&pet.properties["name"]).types,
            vec![InstanceType::String]
        );
        assert_eq!(
            typed(&pet.properties["tag"]).types,
            vec![InstanceType::String, InstanceType::Null]
        );
    }

    #[test]
    fn test_optional_nullable_respects_required_from_all_of_sibling() {
        let config = ValidatorConfig {
            make_optional_attributes_nullable: true,
            ..ValidatorConfig::default()
        };
        let node = normalize(DOC, "Composed", &config);
        let members = match node {
            CanonicalSchema::AllOf(m) => m,
            other => panic!("expected allOf, got {other:?}"),
        };
        assert_eq!(members.len(), 2);
        let extra = typed(&typed(&members[1]).properties["extra"]);
        assert_eq!(extra.types, vec![InstanceType::String]);
        let id = typed(&typed(&members[0]).properties["id"]);
        assert_eq!(id.types, vec![InstanceType::String, InstanceType::Null]);
    }

    #[test]
    fn test_nullable_composite_becomes_any_of_null() {
        let node = normalize(DOC, "NullableRef", &ValidatorConfig::default());
        match node {
            CanonicalSchema::AnyOf(members) => {
                assert_eq!(members[0], CanonicalSchema::null());
            }
            other => panic!("expected anyOf, got {other:?}"),
        }
    }
}
