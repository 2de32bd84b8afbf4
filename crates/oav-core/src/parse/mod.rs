pub mod components;
pub mod media_type;
pub mod operation;
pub mod parameter;
pub mod ref_resolve;
pub mod request_body;
pub mod schema;
pub mod spec;

use crate::error::ParseError;
use spec::Document;

/// Parse an OpenAPI/Swagger document from YAML.
pub fn from_yaml(input: &str) -> Result<Document, ParseError> {
    let raw: serde_json::Value = serde_yaml_ng::from_str(input)?;
    from_value(raw)
}

/// Parse an OpenAPI/Swagger document from JSON.
pub fn from_json(input: &str) -> Result<Document, ParseError> {
    let raw: serde_json::Value = serde_json::from_str(input)?;
    from_value(raw)
}

/// Build a document from an already parsed structural value.
pub fn from_value(raw: serde_json::Value) -> Result<Document, ParseError> {
    let mut document: Document = serde_json::from_value(raw.clone())?;
    document.raw = raw;
    validate_version(&document)?;
    Ok(document)
}

fn validate_version(document: &Document) -> Result<(), ParseError> {
    if document.version().is_none() {
        let declared = document
            .openapi
            .clone()
            .or_else(|| document.swagger.clone())
            .unwrap_or_else(|| "<missing>".to_string());
        return Err(ParseError::UnsupportedVersion(declared));
    }
    Ok(())
}
