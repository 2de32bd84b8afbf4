//! Compiles every operation of a document into its request validators.

use indexmap::IndexMap;

use crate::canonical::{CanonicalBody, FormatRegistry};
use crate::config::ValidatorConfig;
use crate::engine::{BuiltinEngine, FormatTable, SchemaEngine};
use crate::error::{CompileError, EndpointError, EndpointFailure};
use crate::facade::{BodyValidator, ParametersValidator, Reporting, Target, TargetValidator};
use crate::parse::operation::{HttpMethod, Operation, PathItem};
use crate::parse::parameter::ParameterLocation;
use crate::parse::ref_resolve::{RefResolver, ResolvedOperation};
use crate::parse::spec::Document;
use crate::transform::Normalizer;
use crate::transform::path_key::{path_key, template_params};

/// The validators of one operation. A target the operation doesn't
/// declare has no validator.
#[derive(Debug, Clone, Default)]
pub struct CompiledEndpoint {
    pub parameters: Option<ParametersValidator>,
    pub body: Option<BodyValidator>,
}

/// Compiled validators keyed by path key, then method.
///
/// Immutable once built; share it freely between threads.
#[derive(Debug, Default)]
pub struct EndpointMap {
    endpoints: IndexMap<String, IndexMap<HttpMethod, CompiledEndpoint>>,
    failures: Vec<EndpointError>,
}

impl EndpointMap {
    pub fn get(&self, path: &str, method: HttpMethod) -> Option<&CompiledEndpoint> {
        self.endpoints.get(path)?.get(&method)
    }

    pub fn methods(&self, path: &str) -> Option<&IndexMap<HttpMethod, CompiledEndpoint>> {
        self.endpoints.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, HttpMethod, &CompiledEndpoint)> {
        self.endpoints.iter().flat_map(|(path, methods)| {
            methods
                .iter()
                .map(move |(method, endpoint)| (path.as_str(), *method, endpoint))
        })
    }

    /// Number of compiled endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Endpoints that failed to compile; they are absent from the map.
    pub fn failures(&self) -> &[EndpointError] {
        &self.failures
    }
}

/// Compile a document with the built-in engine.
pub fn compile_document(document: &Document, config: &ValidatorConfig) -> EndpointMap {
    compile_document_with(document, config, &BuiltinEngine)
}

/// Compile a document with a custom engine.
///
/// A fault in one endpoint is recorded in [`EndpointMap::failures`] and
/// never stops the others from compiling.
pub fn compile_document_with(
    document: &Document,
    config: &ValidatorConfig,
    engine: &dyn SchemaEngine,
) -> EndpointMap {
    let compiler = Compiler {
        document,
        config,
        engine,
        formats: FormatTable::new(&FormatRegistry::from_definitions(&config.formats)),
        reporting: Reporting::from_config(config),
    };

    if let Err(ref e) = compiler.formats {
        log::warn!("custom formats are unusable, every schema will fail: {e}");
    }

    let mut map = EndpointMap::default();
    for (path, item) in &document.paths {
        let key = path_key(path, config.path_style);
        for (method, op) in item.operations() {
            match compiler.compile_endpoint(path, method, item, op) {
                Ok(endpoint) => {
                    log::debug!(
                        "compiled {method} {key} (parameters: {}, body: {})",
                        endpoint.parameters.is_some(),
                        endpoint.body.is_some()
                    );
                    map.endpoints
                        .entry(key.clone())
                        .or_default()
                        .insert(method, endpoint);
                }
                Err((target, source)) => {
                    let error = EndpointError {
                        path: path.clone(),
                        method,
                        target,
                        source,
                    };
                    log::warn!("skipping endpoint: {error}");
                    map.failures.push(error);
                }
            }
        }
    }
    map
}

type Failure = (Option<Target>, EndpointFailure);

fn failed<E: Into<EndpointFailure>>(target: Option<Target>) -> impl FnOnce(E) -> Failure {
    move |e| (target, e.into())
}

struct Compiler<'a> {
    document: &'a Document,
    config: &'a ValidatorConfig,
    engine: &'a dyn SchemaEngine,
    /// Built once per document; a bad custom format fails every target.
    formats: Result<FormatTable, CompileError>,
    reporting: Reporting,
}

impl Compiler<'_> {
    fn compile_endpoint(
        &self,
        path: &str,
        method: HttpMethod,
        item: &PathItem,
        op: &Operation,
    ) -> Result<CompiledEndpoint, Failure> {
        // Each endpoint gets its own resolver so a cycle stays local.
        let mut resolver = RefResolver::new(self.document);
        let resolved = resolver
            .resolve_operation(path, method, item, op)
            .map_err(failed(None))?;
        warn_undeclared_path_params(path, method, &resolved);

        let mut normalizer = Normalizer::new(&mut resolver, self.config);

        let parameters = normalizer
            .normalize_parameters(&resolved.parameters)
            .map_err(failed(Some(Target::Parameters)))?;
        let parameters = match parameters {
            Some(schema) => {
                let validator = self
                    .formats()
                    .and_then(|formats| {
                        self.engine
                            .compile(&schema, formats, &self.config.ajv_config_params)
                    })
                    .map_err(failed(Some(Target::Parameters)))?;
                Some(ParametersValidator::new(TargetValidator::new(
                    Target::Parameters,
                    validator,
                    self.reporting,
                )))
            }
            None => None,
        };

        let body = normalizer
            .normalize_body(&resolved)
            .map_err(failed(Some(Target::Body)))?;
        let body = match body {
            Some(body) => Some(self.compile_body(body).map_err(failed(Some(Target::Body)))?),
            None => None,
        };

        Ok(CompiledEndpoint { parameters, body })
    }

    fn formats(&self) -> Result<&FormatTable, CompileError> {
        self.formats.as_ref().map_err(Clone::clone)
    }

    fn compile_body(&self, body: CanonicalBody) -> Result<BodyValidator, EndpointFailure> {
        let formats = self.formats()?;
        let mut schemas = Vec::with_capacity(body.schemas.len());
        for schema in &body.schemas {
            let validator = self
                .engine
                .compile(schema, formats, &self.config.ajv_config_body)?;
            schemas.push(TargetValidator::new(Target::Body, validator, self.reporting));
        }
        Ok(BodyValidator::new(
            schemas,
            body.media_types,
            body.primary,
            self.config,
        ))
    }
}

fn warn_undeclared_path_params(path: &str, method: HttpMethod, resolved: &ResolvedOperation) {
    for name in template_params(path) {
        let declared = resolved
            .parameters
            .iter()
            .any(|p| p.location == ParameterLocation::Path && p.name == name);
        if !declared {
            log::debug!("{method} {path}: path variable '{name}' has no parameter definition");
        }
    }
}
