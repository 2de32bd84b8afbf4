pub mod beautify;
pub mod canonical;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod parse;
pub mod transform;

use std::fs;
use std::path::{Path, PathBuf};

pub use compiler::{CompiledEndpoint, EndpointMap, compile_document, compile_document_with};
pub use config::ValidatorConfig;
pub use error::{EndpointError, LoadError};
pub use facade::{
    BodyValidator, Check, Errors, Outcome, ParametersValidator, RequestParts, Target,
    TargetValidator, ValidationSession,
};
pub use parse::operation::HttpMethod;

use parse::spec::Document;

/// Where an OpenAPI document comes from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A file; `.json` files are read as JSON, anything else as YAML.
    Path(PathBuf),
    Yaml(String),
    Json(String),
    /// An already parsed document tree.
    Value(serde_json::Value),
}

/// Load a document and compile a validator for every endpoint.
pub fn get_schema(
    source: DocumentSource,
    config: &ValidatorConfig,
) -> Result<EndpointMap, LoadError> {
    let document = parse_source(source)?;
    Ok(compile_document(&document, config))
}

/// Like [`get_schema`], reading files without blocking the runtime.
#[cfg(feature = "tokio")]
pub async fn get_schema_async(
    source: DocumentSource,
    config: &ValidatorConfig,
) -> Result<EndpointMap, LoadError> {
    let document = match source {
        DocumentSource::Path(path) => {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| LoadError::Read {
                    path: path.clone(),
                    source,
                })?;
            parse_file(&path, &content)?
        }
        other => parse_source(other)?,
    };
    Ok(compile_document(&document, config))
}

fn parse_file(path: &Path, content: &str) -> Result<Document, LoadError> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let document = if is_json {
        parse::from_json(content)?
    } else {
        parse::from_yaml(content)?
    };
    Ok(document)
}

fn parse_source(source: DocumentSource) -> Result<Document, LoadError> {
    let document = match source {
        DocumentSource::Path(path) => {
            let content = fs::read_to_string(&path).map_err(|source| LoadError::Read {
                path: path.clone(),
                source,
            })?;
            parse_file(&path, &content)?
        }
        DocumentSource::Yaml(text) => parse::from_yaml(&text)?,
        DocumentSource::Json(text) => parse::from_json(&text)?,
        DocumentSource::Value(value) => parse::from_value(value)?,
    };
    Ok(document)
}
