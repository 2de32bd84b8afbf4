//! The schema-validation engine behind every compiled validator.
//!
//! [`SchemaEngine`] is the seam: the compiler hands it canonical schemas
//! and gets back opaque [`Validate`] objects. [`BuiltinEngine`] lowers the
//! canonical tree to draft-07 JSON Schema, validates with the `jsonschema`
//! crate and reports records in the shape ajv v6 uses, so that they look
//! the same as in the JavaScript ecosystem.

pub mod coerce;
pub mod formats;
mod prepare;
pub mod record;
mod report;
mod schema;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use jsonschema::{Draft, ValidationOptions, Validator};
use serde_json::Value;

use crate::canonical::CanonicalSchema;
use crate::config::{EngineOptions, RemoveAdditional};
use crate::error::CompileError;

pub use formats::FormatTable;
pub use record::{ErrorRecord, PathSegment};

use record::render_schema_path;
use report::Reporter;
use schema::DiscriminatorSite;

/// A compiled schema. Validation may coerce or prune `instance` in place,
/// depending on the options it was compiled with.
pub trait Validate: Send + Sync + fmt::Debug {
    fn validate(&self, instance: &mut Value) -> Result<(), Vec<ErrorRecord>>;
}

/// Compiles canonical schemas into validators.
pub trait SchemaEngine {
    fn compile(
        &self,
        schema: &CanonicalSchema,
        formats: &FormatTable,
        options: &EngineOptions,
    ) -> Result<Arc<dyn Validate>, CompileError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEngine;

impl SchemaEngine for BuiltinEngine {
    fn compile(
        &self,
        schema: &CanonicalSchema,
        formats: &FormatTable,
        options: &EngineOptions,
    ) -> Result<Arc<dyn Validate>, CompileError> {
        let lowered = schema::lower(schema, formats)?;

        let mut validation = jsonschema::options()
            .with_draft(Draft::Draft7)
            .should_validate_formats(true);
        formats.register(&mut validation);

        let validator = build(&validation, &lowered.schema, "")?;
        let mut unions = IndexMap::with_capacity(lowered.unions.len());
        for site in lowered.unions {
            let members = site
                .members
                .iter()
                .enumerate()
                .map(|(i, member)| build(&validation, member, &format!("{}/{i}", site.pointer)))
                .collect::<Result<Vec<_>, _>>()?;
            unions.insert(site.pointer, members);
        }

        Ok(Arc::new(CompiledSchema {
            canonical: schema.clone(),
            schema: lowered.schema,
            validator,
            discriminators: lowered.discriminators,
            unions,
            options: *options,
        }))
    }
}

fn build(validation: &ValidationOptions, schema: &Value, pointer: &str) -> Result<Validator, CompileError> {
    validation.build(schema).map_err(|e| CompileError::InvalidSchema {
        schema_path: render_schema_path(&format!("{pointer}{}", e.schema_path)),
        message: e.to_string(),
    })
}

struct CompiledSchema {
    canonical: CanonicalSchema,
    schema: Value,
    validator: Validator,
    discriminators: Vec<DiscriminatorSite>,
    unions: IndexMap<String, Vec<Validator>>,
    options: EngineOptions,
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("schema", &self.schema)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CompiledSchema {
    fn report(&self, instance: &Value) -> Vec<ErrorRecord> {
        let reporter = Reporter {
            schema: &self.schema,
            discriminators: &self.discriminators,
            unions: &self.unions,
            instance,
        };
        let mut records = Vec::new();
        for error in self.validator.iter_errors(instance) {
            reporter.push(&error, "", "", &mut records);
        }
        records
    }

    /// Drop properties that fail their `additionalProperties` schema until
    /// none is left.
    fn remove_failing(&self, instance: &mut Value) {
        loop {
            let targets: Vec<(String, String)> = self
                .validator
                .iter_errors(instance)
                .filter_map(|e| {
                    prepare::failing_property(&e.schema_path.to_string(), &e.instance_path.to_string())
                })
                .collect();

            let mut removed = false;
            for (parent, key) in targets {
                if let Some(Value::Object(map)) = instance.pointer_mut(&parent) {
                    removed |= map.remove(&key).is_some();
                }
            }
            if !removed {
                return;
            }
        }
    }
}

impl Validate for CompiledSchema {
    fn validate(&self, instance: &mut Value) -> Result<(), Vec<ErrorRecord>> {
        if prepare::is_needed(&self.options) {
            prepare::prepare(&self.canonical, instance, &self.options);
        }
        if self.options.remove_additional == RemoveAdditional::Failing {
            self.remove_failing(instance);
        }
        if self.validator.is_valid(instance) {
            return Ok(());
        }

        let mut errors = self.report(instance);
        if !self.options.all_errors {
            errors.truncate(1);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
