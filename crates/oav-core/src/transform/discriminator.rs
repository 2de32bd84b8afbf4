use indexmap::IndexMap;
use serde_json::Value;

use super::schema_normalizer::Normalizer;
use crate::canonical::{AdditionalPolicy, CanonicalSchema, DiscriminatedSchema, TypedSchema};
use crate::error::{NormalizeError, ResolveError};
use crate::parse::ref_resolve::ref_name;
use crate::parse::schema::{DiscriminatorSpec, Schema};

impl Normalizer<'_, '_> {
    /// Turn a schema carrying a discriminator into a tag-dispatched node.
    ///
    /// Returns `None` when no branch can be enumerated; the caller then
    /// normalizes the schema as if the discriminator were absent.
    pub(super) fn normalize_discriminated(
        &mut self,
        schema: &Schema,
        discriminator: &DiscriminatorSpec,
    ) -> Result<Option<CanonicalSchema>, NormalizeError> {
        if let Some(ref origin) = schema.origin {
            self.dispatching.push(origin.clone());
        }
        let result = self.collect_branches(schema, discriminator);
        if schema.origin.is_some() {
            self.dispatching.pop();
        }

        let branches = result?;
        if branches.is_empty() {
            log::debug!(
                "discriminator '{}' has no enumerable branches, ignoring it",
                discriminator.property_name
            );
            return Ok(None);
        }

        Ok(Some(CanonicalSchema::Discriminated(Box::new(
            DiscriminatedSchema {
                property_name: discriminator.property_name.clone(),
                branches,
            },
        ))))
    }

    fn collect_branches(
        &mut self,
        schema: &Schema,
        discriminator: &DiscriminatorSpec,
    ) -> Result<IndexMap<String, CanonicalSchema>, NormalizeError> {
        let property = discriminator.property_name.as_str();
        let mut branches = IndexMap::new();

        let declared = if schema.one_of.is_empty() {
            &schema.any_of
        } else {
            &schema.one_of
        };

        // Union style: the schema's own keywords hold for every branch.
        let shared = if declared.is_empty() {
            None
        } else {
            let mut own = schema.clone();
            own.discriminator = None;
            own.one_of.clear();
            own.any_of.clear();
            own.nullable = None;
            own.x_nullable = None;
            match self.normalize_composition(&own, &[])? {
                CanonicalSchema::Any => None,
                node => Some(node),
            }
        };

        for (index, member) in declared.iter().enumerate() {
            let branch = self.inline(member)?;
            let Some(ref origin) = branch.origin else {
                return Err(NormalizeError::UntaggedBranch {
                    property: property.to_string(),
                    index,
                });
            };
            let mut tags: Vec<&str> = discriminator
                .mapping
                .iter()
                .filter(|(_, target)| ref_name(target) == *origin)
                .map(|(tag, _)| tag.as_str())
                .collect();
            if tags.is_empty() {
                tags.push(origin.as_str());
            }

            let node = self.normalize_branch(&branch, shared.as_ref())?;
            for tag in tags {
                insert_branch(&mut branches, property, tag, node.clone())?;
            }
        }

        // Mapping entries that no declared branch accounts for.
        for (tag, target) in &discriminator.mapping {
            if branches.contains_key(tag) {
                continue;
            }
            let branch = self.lookup_mapping_target(tag, target)?;
            let node = self.normalize_branch(&branch, shared.as_ref())?;
            insert_branch(&mut branches, property, tag, node)?;
        }

        // Swagger 2.0 style: no mapping, subtypes `allOf` the base.
        if branches.is_empty() {
            if let Some(ref origin) = schema.origin {
                for name in self.implicit_subtypes(origin) {
                    let section = self.resolver.document().schema_section();
                    let pointer = format!("{section}{name}");
                    let branch = self.resolver.lookup_schema(&pointer)?;
                    let node = self.normalize_branch(&branch, None)?;
                    insert_branch(&mut branches, property, &name, node)?;
                }
            }
        }

        Ok(branches)
    }

    fn normalize_branch(
        &mut self,
        branch: &Schema,
        shared: Option<&CanonicalSchema>,
    ) -> Result<CanonicalSchema, NormalizeError> {
        if let Some(ref origin) = branch.origin {
            if self.dispatching.contains(origin) {
                return Err(NormalizeError::CyclicDiscriminator(origin.clone()));
            }
        }
        let node = self.normalize_schema(branch)?;
        Ok(match shared {
            Some(shared) => CanonicalSchema::AllOf(vec![shared.clone(), node]),
            None => node,
        })
    }

    fn lookup_mapping_target(&mut self, tag: &str, target: &str) -> Result<Schema, NormalizeError> {
        let pointer = if target.contains('#') {
            target.to_string()
        } else {
            format!("{}{}", self.resolver.document().schema_section(), target)
        };
        self.resolver.lookup_schema(&pointer).map_err(|e| {
            if matches!(e, ResolveError::UnresolvedReference { .. }) {
                NormalizeError::MissingMappingTarget {
                    tag: tag.to_string(),
                    target: target.to_string(),
                    source: Some(Box::new(e)),
                }
            } else {
                NormalizeError::Resolve(e)
            }
        })
    }

    /// Named schemas whose `allOf` references `base` directly.
    fn implicit_subtypes(&self, base: &str) -> Vec<String> {
        let document = self.resolver.document();
        let section = document.schema_section();
        let base_pointer = format!("{section}{}", base.replace('~', "~0").replace('/', "~1"));
        let fragment = section.trim_start_matches('#').trim_end_matches('/');

        let Some(Value::Object(schemas)) = document.raw.pointer(fragment) else {
            return Vec::new();
        };
        schemas
            .iter()
            .filter(|(_, schema)| {
                schema
                    .get("allOf")
                    .and_then(Value::as_array)
                    .is_some_and(|members| {
                        members.iter().any(|m| {
                            m.get("$ref").and_then(Value::as_str) == Some(base_pointer.as_str())
                        })
                    })
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn insert_branch(
    branches: &mut IndexMap<String, CanonicalSchema>,
    property: &str,
    tag: &str,
    node: CanonicalSchema,
) -> Result<(), NormalizeError> {
    if branches.contains_key(tag) {
        return Err(NormalizeError::DuplicateTag {
            property: property.to_string(),
            tag: tag.to_string(),
        });
    }
    branches.insert(tag.to_string(), pin_tag(node, property, tag));
    Ok(())
}

/// Extend a branch so that it requires the discriminator property and
/// fixes it to `tag`.
fn pin_tag(branch: CanonicalSchema, property: &str, tag: &str) -> CanonicalSchema {
    let constant = CanonicalSchema::typed(TypedSchema {
        const_value: Some(Value::String(tag.to_string())),
        ..TypedSchema::default()
    });

    match branch {
        CanonicalSchema::Typed(mut typed) if typed.is_object() => {
            typed.require(property);
            match typed.properties.get_mut(property) {
                Some(existing) => {
                    let declared = std::mem::replace(existing, CanonicalSchema::Any);
                    *existing = CanonicalSchema::AllOf(vec![declared, constant]);
                }
                None => {
                    typed.properties.insert(property.to_string(), constant);
                }
            }
            CanonicalSchema::Typed(typed)
        }
        other => {
            let pin = TypedSchema::object(
                IndexMap::from([(property.to_string(), constant)]),
                vec![property.to_string()],
                AdditionalPolicy::Allowed,
            );
            CanonicalSchema::AllOf(vec![other, CanonicalSchema::typed(pin)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;
    use crate::parse;
    use crate::parse::ref_resolve::RefResolver;

    fn normalize(doc_yaml: &str, name: &str) -> Result<CanonicalSchema, NormalizeError> {
        let doc = parse::from_yaml(doc_yaml).unwrap();
        let config = ValidatorConfig::default();
        let mut resolver = RefResolver::new(&doc);
        let pointer = format!("{}{name}", doc.schema_section());
        let schema = resolver.lookup_schema(&pointer)?;
        let mut normalizer = Normalizer::new(&mut resolver, &config);
        normalizer.normalize_schema(&schema)
    }

    fn discriminated(node: CanonicalSchema) -> DiscriminatedSchema {
        match node {
            CanonicalSchema::Discriminated(d) => *d,
            other => panic!("expected discriminated node, got {other:?}"),
        }
    }

    const UNION: &str = r#"
openapi: 3.0.0
info: { title: T, version: "1" }
paths: {}
components:
  schemas:
    Pet:
      oneOf:
        - $ref: '#/components/schemas/Dog'
        - $ref: '#/components/schemas/Cat'
      discriminator:
        propertyName: type
    MappedPet:
      oneOf:
        - $ref: '#/components/schemas/Dog'
        - $ref: '#/components/schemas/Cat'
      discriminator:
        propertyName: type
        mapping:
          mapped_dog: '#/components/schemas/Dog'
          mapped_cat: Cat
    BrokenPet:
      oneOf:
        - $ref: '#/components/schemas/Dog'
      discriminator:
        propertyName: type
        mapping:
          ghost: '#/components/schemas/Ghost'
    InlinePet:
      oneOf:
        - type: object
      discriminator:
        propertyName: type
    Dog:
      type: object
      required: [bark]
      properties:
        type: { type: string }
        bark: { type: string }
    Cat:
      type: object
      properties:
        meow: { type: string }
"#;

    #[test]
    fn test_tags_default_to_schema_names() {
        let d = discriminated(normalize(UNION, "Pet").unwrap());
        assert_eq!(d.property_name, "type");
        assert_eq!(d.allowed_tags(), vec!["Dog", "Cat"]);
    }

    #[test]
    fn test_branch_requires_and_pins_tag() {
        let d = discriminated(normalize(UNION, "Pet").unwrap());
        let dog = match &d.branches["Dog"] {
            CanonicalSchema::Typed(t) => t.clone(),
            other => panic!("expected typed branch, got {other:?}"),
        };
        assert_eq!(dog.required, vec!["bark".to_string(), "type".to_string()]);
        assert!(matches!(dog.properties["type"], CanonicalSchema::AllOf(_)));
    }

    #[test]
    fn test_mapping_keys_replace_names() {
        let d = discriminated(normalize(UNION, "MappedPet").unwrap());
        assert_eq!(d.allowed_tags(), vec!["mapped_dog", "mapped_cat"]);
    }

    #[test]
    fn test_missing_mapping_target() {
        let err = normalize(UNION, "BrokenPet").unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::MissingMappingTarget { ref tag, .. } if tag == "ghost"
        ));
    }

    #[test]
    fn test_inline_branch_without_tag() {
        let err = normalize(UNION, "InlinePet").unwrap_err();
        assert!(matches!(err, NormalizeError::UntaggedBranch { index: 0, .. }));
    }

    const INHERITANCE: &str = r#"
swagger: "2.0"
info: { title: T, version: "1" }
paths: {}
definitions:
  Pet:
    type: object
    discriminator: petType
    required: [petType]
    properties:
      petType: { type: string }
  Dog:
    allOf:
      - $ref: '#/definitions/Pet'
      - type: object
        properties:
          bark: { type: string }
  Lizard:
    allOf:
      - $ref: '#/definitions/Pet'
"#;

    #[test]
    fn test_inheritance_subtypes_found_through_all_of() {
        let d = discriminated(normalize(INHERITANCE, "Pet").unwrap());
        assert_eq!(d.property_name, "petType");
        assert_eq!(d.allowed_tags(), vec!["Dog", "Lizard"]);
    }

    const CYCLIC: &str = r#"
openapi: 3.0.0
info: { title: T, version: "1" }
paths: {}
components:
  schemas:
    A:
      type: object
      discriminator:
        propertyName: kind
        mapping:
          b: '#/components/schemas/B'
    B:
      type: object
      discriminator:
        propertyName: kind
        mapping:
          a: '#/components/schemas/A'
"#;

    #[test]
    fn test_cyclic_discriminator() {
        let err = normalize(CYCLIC, "A").unwrap_err();
        assert!(matches!(err, NormalizeError::CyclicDiscriminator(ref name) if name == "A"));
    }
}
