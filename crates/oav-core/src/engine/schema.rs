//! Lowering of canonical schemas into draft-07 JSON Schema documents.
//!
//! Keywords are emitted in the order ajv v6 evaluates them, so records
//! come out in the same order. A discriminated union becomes an object
//! wrapper whose `allOf` holds one `if`/`then` pair per tag; the sites are
//! remembered so that errors inside a branch can be re-rooted later.

use serde_json::{Map, Value};

use super::formats::FormatTable;
use super::record::{escape_pointer, number_value, render_schema_path};
use crate::canonical::{AdditionalPolicy, CanonicalSchema, DiscriminatedSchema, TypedSchema};
use crate::error::CompileError;

/// A lowered schema and the places in it that need special reporting.
#[derive(Debug, Clone)]
pub(crate) struct Lowered {
    pub schema: Value,
    pub discriminators: Vec<DiscriminatorSite>,
    pub unions: Vec<UnionSite>,
}

/// A discriminator wrapper at `pointer`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DiscriminatorSite {
    pub pointer: String,
    pub property_name: String,
    pub tags: Vec<String>,
}

/// An `anyOf` or `oneOf` array at `pointer`, with its members.
#[derive(Debug, Clone)]
pub(crate) struct UnionSite {
    pub pointer: String,
    pub members: Vec<Value>,
}

pub(crate) fn lower(schema: &CanonicalSchema, formats: &FormatTable) -> Result<Lowered, CompileError> {
    let mut lowering = Lowering {
        formats,
        discriminators: Vec::new(),
        unions: Vec::new(),
    };
    let schema = lowering.node(schema, "")?;
    Ok(Lowered {
        schema,
        discriminators: lowering.discriminators,
        unions: lowering.unions,
    })
}

struct Lowering<'a> {
    formats: &'a FormatTable,
    discriminators: Vec<DiscriminatorSite>,
    unions: Vec<UnionSite>,
}

fn child(pointer: &str, token: &str) -> String {
    format!("{pointer}/{}", escape_pointer(token))
}

fn object(entries: Vec<(&str, Value)>) -> Value {
    Value::Object(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

impl Lowering<'_> {
    fn node(&mut self, schema: &CanonicalSchema, pointer: &str) -> Result<Value, CompileError> {
        Ok(match schema {
            CanonicalSchema::Any => Value::Object(Map::new()),
            CanonicalSchema::Typed(typed) => self.typed(typed, pointer)?,
            CanonicalSchema::AllOf(members) if members.is_empty() => Value::Object(Map::new()),
            CanonicalSchema::AllOf(members) => {
                object(vec![("allOf", self.members(members, &child(pointer, "allOf"))?)])
            }
            CanonicalSchema::AnyOf(members) => self.union("anyOf", members, pointer)?,
            CanonicalSchema::OneOf(members) => self.union("oneOf", members, pointer)?,
            CanonicalSchema::Not(inner) => {
                object(vec![("not", self.node(inner, &child(pointer, "not"))?)])
            }
            CanonicalSchema::Discriminated(d) => self.discriminated(d, pointer)?,
        })
    }

    fn members(&mut self, members: &[CanonicalSchema], pointer: &str) -> Result<Value, CompileError> {
        members
            .iter()
            .enumerate()
            .map(|(i, m)| self.node(m, &child(pointer, &i.to_string())))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn union(
        &mut self,
        keyword: &str,
        members: &[CanonicalSchema],
        pointer: &str,
    ) -> Result<Value, CompileError> {
        let site = child(pointer, keyword);
        let lowered = self.members(members, &site)?;
        if let Value::Array(ref items) = lowered {
            self.unions.push(UnionSite {
                pointer: site,
                members: items.clone(),
            });
        }
        Ok(object(vec![(keyword, lowered)]))
    }

    fn discriminated(
        &mut self,
        schema: &DiscriminatedSchema,
        pointer: &str,
    ) -> Result<Value, CompileError> {
        let property = &schema.property_name;
        let tags: Vec<Value> = schema
            .branches
            .keys()
            .map(|tag| Value::String(tag.clone()))
            .collect();

        let mut branches = Vec::with_capacity(schema.branches.len());
        for (i, (tag, branch)) in schema.branches.iter().enumerate() {
            let then = self.node(branch, &format!("{pointer}/allOf/{i}/then"))?;
            let selector = object(vec![
                ("required", Value::Array(vec![Value::String(property.clone())])),
                (
                    "properties",
                    Value::Object(Map::from_iter([(
                        property.clone(),
                        object(vec![("const", Value::String(tag.clone()))]),
                    )])),
                ),
            ]);
            branches.push(object(vec![("if", selector), ("then", then)]));
        }

        self.discriminators.push(DiscriminatorSite {
            pointer: pointer.to_string(),
            property_name: property.clone(),
            tags: schema.branches.keys().cloned().collect(),
        });

        let mut wrapper = Map::new();
        wrapper.insert("type".to_string(), Value::String("object".to_string()));
        wrapper.insert(
            "required".to_string(),
            Value::Array(vec![Value::String(property.clone())]),
        );
        wrapper.insert(
            "properties".to_string(),
            Value::Object(Map::from_iter([(
                property.clone(),
                object(vec![("enum", Value::Array(tags))]),
            )])),
        );
        if !branches.is_empty() {
            wrapper.insert("allOf".to_string(), Value::Array(branches));
        }
        Ok(Value::Object(wrapper))
    }

    fn typed(&mut self, typed: &TypedSchema, pointer: &str) -> Result<Value, CompileError> {
        let mut out = Map::new();
        let mut put = |key: &str, value: Value| {
            out.insert(key.to_string(), value);
        };

        match typed.types.as_slice() {
            [] => {}
            [only] => put("type", Value::String(only.as_str().to_string())),
            many => put(
                "type",
                Value::Array(
                    many.iter()
                        .map(|t| Value::String(t.as_str().to_string()))
                        .collect(),
                ),
            ),
        }

        let bounds = [
            ("maximum", typed.maximum),
            ("exclusiveMaximum", typed.exclusive_maximum),
            ("minimum", typed.minimum),
            ("exclusiveMinimum", typed.exclusive_minimum),
            ("multipleOf", typed.multiple_of),
        ];
        for (keyword, bound) in bounds {
            if let Some(bound) = bound {
                put(keyword, number_value(bound));
            }
        }

        if let Some(max) = typed.max_length {
            put("maxLength", Value::from(max));
        }
        if let Some(min) = typed.min_length {
            put("minLength", Value::from(min));
        }
        if let Some(ref pattern) = typed.pattern {
            put("pattern", Value::String(pattern.clone()));
        }
        if let Some(ref format) = typed.format {
            if !self.formats.is_known(format) {
                return Err(CompileError::UnknownFormat {
                    format: format.clone(),
                    schema_path: render_schema_path(&child(pointer, "format")),
                });
            }
            put("format", Value::String(format.clone()));
        }

        if let Some(max) = typed.max_items {
            put("maxItems", Value::from(max));
        }
        if let Some(min) = typed.min_items {
            put("minItems", Value::from(min));
        }
        if let Some(ref items) = typed.items {
            put("items", self.node(items, &child(pointer, "items"))?);
        }
        if typed.unique_items {
            put("uniqueItems", Value::Bool(true));
        }

        if let Some(max) = typed.max_properties {
            put("maxProperties", Value::from(max));
        }
        if let Some(min) = typed.min_properties {
            put("minProperties", Value::from(min));
        }
        if !typed.required.is_empty() {
            put(
                "required",
                Value::Array(typed.required.iter().cloned().map(Value::String).collect()),
            );
        }
        match typed.additional {
            AdditionalPolicy::Allowed => {}
            AdditionalPolicy::Forbidden => put("additionalProperties", Value::Bool(false)),
            AdditionalPolicy::Schema(ref schema) => {
                let lowered = self.node(schema, &child(pointer, "additionalProperties"))?;
                put("additionalProperties", lowered);
            }
        }
        if !typed.properties.is_empty() {
            let base = child(pointer, "properties");
            let mut properties = Map::new();
            for (name, schema) in &typed.properties {
                properties.insert(name.clone(), self.node(schema, &child(&base, name))?);
            }
            put("properties", Value::Object(properties));
        }

        if let Some(ref constant) = typed.const_value {
            put("const", constant.clone());
        }
        if !typed.enum_values.is_empty() {
            put("enum", Value::Array(typed.enum_values.clone()));
        }

        Ok(Value::Object(out))
    }
}
