use std::path::PathBuf;

use thiserror::Error;

use crate::facade::Target;
use crate::parse::operation::HttpMethod;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported OpenAPI version: {0}")]
    UnsupportedVersion(String),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unresolved reference {pointer} (referenced from {origin})")]
    UnresolvedReference { pointer: String, origin: String },

    #[error("circular reference detected: {chain}")]
    CircularReference { chain: String },

    #[error("invalid reference format: {0}")]
    InvalidReference(String),

    #[error("external references are not supported: {0}")]
    ExternalReference(String),

    #[error("reference {pointer} does not point at a valid {expected}: {source}")]
    InvalidTarget {
        pointer: String,
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("discriminator mapping '{tag}' targets {target}, which does not resolve")]
    MissingMappingTarget {
        tag: String,
        target: String,
        #[source]
        source: Option<Box<ResolveError>>,
    },

    #[error("cannot derive a discriminator value for inline oneOf branch #{index} of '{property}'")]
    UntaggedBranch { property: String, index: usize },

    #[error("discriminator value '{tag}' of '{property}' is used by more than one branch")]
    DuplicateTag { property: String, tag: String },

    #[error("cyclic discriminator graph through '{0}'")]
    CyclicDiscriminator(String),

    #[error("parameter '{name}' has an unreadable schema: {source}")]
    InvalidParameter {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),
}

#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("invalid schema at {schema_path}: {message}")]
    InvalidSchema { schema_path: String, message: String },

    #[error("unknown format \"{format}\" is used in schema at {schema_path}")]
    UnknownFormat { format: String, schema_path: String },

    #[error("custom format '{name}' has an invalid pattern: {source}")]
    InvalidCustomFormat {
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// The stage at which an endpoint failed to build.
#[derive(Debug, Error)]
pub enum EndpointFailure {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// A compile-time fault localized to one endpoint. Sibling endpoints are
/// unaffected.
#[derive(Debug, Error)]
#[error("{method} {path}{}: {source}", .target.map(|t| format!(" ({t})")).unwrap_or_default())]
pub struct EndpointError {
    pub path: String,
    pub method: HttpMethod,
    /// `None` when resolution failed before any target was built.
    pub target: Option<Target>,
    #[source]
    pub source: EndpointFailure,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
}

/// Failure to turn a document source into an endpoint map.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}
