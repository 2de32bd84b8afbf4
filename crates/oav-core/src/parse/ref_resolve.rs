use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use super::media_type::MediaType;
use super::operation::{HttpMethod, Operation, PathItem};
use super::parameter::{Parameter, ParameterOrRef};
use super::request_body::{RequestBody, RequestBodyOrRef};
use super::schema::{AdditionalProperties, Schema, SchemaOrRef};
use super::spec::Document;
use crate::error::ResolveError;

/// One operation with every `$ref` expanded in place.
///
/// Path-level parameters are merged in; the operation's own definition
/// wins when both declare the same `(name, in)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOperation {
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    /// Swagger 2.0 `consumes`, operation-level or inherited from the document.
    pub consumes: Vec<String>,
}

/// Resolves `$ref` pointers against the raw document, producing
/// self-contained fragments. Each pointer being expanded sits on an
/// explicit stack; meeting it again is a circular reference.
pub struct RefResolver<'a> {
    document: &'a Document,
    stack: Vec<String>,
    origin: String,
}

impl<'a> RefResolver<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self {
            document,
            stack: Vec::new(),
            origin: "#".to_string(),
        }
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// Resolve everything one endpoint needs.
    pub fn resolve_operation(
        &mut self,
        path: &str,
        method: HttpMethod,
        item: &PathItem,
        op: &Operation,
    ) -> Result<ResolvedOperation, ResolveError> {
        self.origin = format!("#/paths/{}/{}", escape_token(path), method);
        self.stack.clear();

        let mut parameters: Vec<Parameter> = Vec::new();
        for p in item.parameters.iter().chain(&op.parameters) {
            let resolved = self.resolve_parameter_or_ref(p)?;
            match parameters
                .iter_mut()
                .find(|e| e.name == resolved.name && e.location == resolved.location)
            {
                Some(existing) => *existing = resolved,
                None => parameters.push(resolved),
            }
        }

        let request_body = match op.request_body {
            Some(ref body) => Some(self.resolve_request_body_or_ref(body)?),
            None => None,
        };

        let consumes = op
            .consumes
            .clone()
            .unwrap_or_else(|| self.document.consumes.clone());

        Ok(ResolvedOperation {
            parameters,
            request_body,
            consumes,
        })
    }

    pub fn resolve_schema_or_ref(
        &mut self,
        schema_or_ref: &SchemaOrRef,
    ) -> Result<Schema, ResolveError> {
        match schema_or_ref {
            SchemaOrRef::Ref { ref_path } => self.lookup_schema(ref_path),
            SchemaOrRef::Schema(schema) => self.resolve_schema(schema),
        }
    }

    /// Follow a schema pointer and expand it. The result remembers the
    /// name it was referenced by.
    pub fn lookup_schema(&mut self, ref_path: &str) -> Result<Schema, ResolveError> {
        self.check_cycle(ref_path)?;
        let target: SchemaOrRef = self.fetch(ref_path, "schema")?;
        self.stack.push(ref_path.to_string());
        let result = self.resolve_schema_or_ref(&target);
        self.stack.pop();

        let mut schema = result?;
        schema.origin = Some(ref_name(ref_path));
        Ok(schema)
    }

    fn resolve_schema(&mut self, schema: &Schema) -> Result<Schema, ResolveError> {
        let mut resolved = schema.clone();

        let mut resolved_props = IndexMap::new();
        for (name, prop) in &schema.properties {
            let prop = self.resolve_schema_or_ref(prop)?;
            resolved_props.insert(name.clone(), inline(prop));
        }
        resolved.properties = resolved_props;

        if let Some(ref items) = schema.items {
            resolved.items = Some(Box::new(inline(self.resolve_schema_or_ref(items)?)));
        }

        resolved.all_of = self.resolve_all(&schema.all_of)?;
        resolved.one_of = self.resolve_all(&schema.one_of)?;
        resolved.any_of = self.resolve_all(&schema.any_of)?;

        if let Some(ref not) = schema.not {
            resolved.not = Some(Box::new(inline(self.resolve_schema_or_ref(not)?)));
        }

        if let Some(AdditionalProperties::Schema(ref s)) = schema.additional_properties {
            resolved.additional_properties = Some(AdditionalProperties::Schema(Box::new(
                inline(self.resolve_schema_or_ref(s)?),
            )));
        }

        Ok(resolved)
    }

    fn resolve_all(&mut self, schemas: &[SchemaOrRef]) -> Result<Vec<SchemaOrRef>, ResolveError> {
        schemas
            .iter()
            .map(|s| self.resolve_schema_or_ref(s).map(inline))
            .collect()
    }

    fn resolve_parameter_or_ref(
        &mut self,
        param: &ParameterOrRef,
    ) -> Result<Parameter, ResolveError> {
        match param {
            ParameterOrRef::Ref { ref_path } => {
                self.check_cycle(ref_path)?;
                let target: ParameterOrRef = self.fetch(ref_path, "parameter")?;
                self.stack.push(ref_path.clone());
                let result = self.resolve_parameter_or_ref(&target);
                self.stack.pop();
                result
            }
            ParameterOrRef::Parameter(p) => {
                let mut resolved = p.as_ref().clone();
                if let Some(ref s) = p.schema {
                    resolved.schema = Some(inline(self.resolve_schema_or_ref(s)?));
                }
                self.resolve_media_types(&mut resolved.content)?;
                Ok(resolved)
            }
        }
    }

    fn resolve_request_body_or_ref(
        &mut self,
        body: &RequestBodyOrRef,
    ) -> Result<RequestBody, ResolveError> {
        match body {
            RequestBodyOrRef::Ref { ref_path } => {
                self.check_cycle(ref_path)?;
                let target: RequestBodyOrRef = self.fetch(ref_path, "request body")?;
                self.stack.push(ref_path.clone());
                let result = self.resolve_request_body_or_ref(&target);
                self.stack.pop();
                result
            }
            RequestBodyOrRef::RequestBody(rb) => {
                let mut resolved = rb.clone();
                self.resolve_media_types(&mut resolved.content)?;
                Ok(resolved)
            }
        }
    }

    fn resolve_media_types(
        &mut self,
        content: &mut IndexMap<String, MediaType>,
    ) -> Result<(), ResolveError> {
        for media_type in content.values_mut() {
            if let Some(ref s) = media_type.schema {
                media_type.schema = Some(inline(self.resolve_schema_or_ref(s)?));
            }
        }
        Ok(())
    }

    fn check_cycle(&self, pointer: &str) -> Result<(), ResolveError> {
        if let Some(pos) = self.stack.iter().position(|p| p == pointer) {
            let mut chain: Vec<&str> = self.stack[pos..].iter().map(String::as_str).collect();
            chain.push(pointer);
            return Err(ResolveError::CircularReference {
                chain: chain.join(" -> "),
            });
        }
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        pointer: &str,
        expected: &'static str,
    ) -> Result<T, ResolveError> {
        let fragment = local_fragment(pointer)?;
        let value = self.document.raw.pointer(&fragment).ok_or_else(|| {
            ResolveError::UnresolvedReference {
                pointer: pointer.to_string(),
                origin: self
                    .stack
                    .last()
                    .cloned()
                    .unwrap_or_else(|| self.origin.clone()),
            }
        })?;
        serde_json::from_value(value.clone()).map_err(|source| ResolveError::InvalidTarget {
            pointer: pointer.to_string(),
            expected,
            source,
        })
    }
}

fn inline(schema: Schema) -> SchemaOrRef {
    SchemaOrRef::Schema(Box::new(schema))
}

/// Split `#/a/b` into the JSON pointer `/a/b`, rejecting references into
/// other documents.
fn local_fragment(ref_path: &str) -> Result<String, ResolveError> {
    match ref_path.split_once('#') {
        Some(("", fragment)) if fragment.is_empty() || fragment.starts_with('/') => {
            Ok(percent_decode(fragment))
        }
        Some(("", _)) => Err(ResolveError::InvalidReference(ref_path.to_string())),
        _ => Err(ResolveError::ExternalReference(ref_path.to_string())),
    }
}

/// The last pointer segment, e.g. `Dog` for `#/components/schemas/Dog`.
pub fn ref_name(ref_path: &str) -> String {
    let last = ref_path.rsplit('/').next().unwrap_or(ref_path);
    percent_decode(last).replace("~1", "/").replace("~0", "~")
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
