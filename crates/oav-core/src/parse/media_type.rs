use serde::{Deserialize, Serialize};

use super::schema::SchemaOrRef;

/// A media type object. Only the schema matters for request validation;
/// examples and encodings are ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaType {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaOrRef>,
}
