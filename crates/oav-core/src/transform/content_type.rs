use indexmap::IndexMap;

use super::schema_normalizer::Normalizer;
use crate::canonical::{AdditionalPolicy, CanonicalBody, CanonicalSchema, TypedSchema};
use crate::error::NormalizeError;
use crate::parse::parameter::ParameterLocation;
use crate::parse::ref_resolve::ResolvedOperation;

const JSON: &str = "application/json";
const JSON_TYPES: &[&str] = &[JSON];
const FORM_TYPES: &[&str] = &["application/x-www-form-urlencoded", "multipart/form-data"];

impl Normalizer<'_, '_> {
    /// Collect the body schemas of an operation, one per distinct schema,
    /// keyed by every media type that selects it.
    pub fn normalize_body(
        &mut self,
        operation: &ResolvedOperation,
    ) -> Result<Option<CanonicalBody>, NormalizeError> {
        let mut declared: Vec<(String, CanonicalSchema)> = Vec::new();

        if let Some(ref body) = operation.request_body {
            for (media, media_type) in &body.content {
                let node = match media_type.schema {
                    Some(ref s) => self.normalize_schema_or_ref(s)?,
                    None => CanonicalSchema::Any,
                };
                declared.push((media.clone(), node));
            }
        } else if let Some((node, defaults)) = self.swagger2_body(operation)? {
            let media_types = if operation.consumes.is_empty() {
                defaults.iter().map(|m| m.to_string()).collect()
            } else {
                operation.consumes.clone()
            };
            for media in media_types {
                declared.push((media, node.clone()));
            }
        }

        if declared.is_empty() {
            return Ok(None);
        }

        let mut schemas: Vec<CanonicalSchema> = Vec::new();
        let mut media_types = IndexMap::new();
        for (media, node) in declared {
            let index = match schemas.iter().position(|s| *s == node) {
                Some(index) => index,
                None => {
                    schemas.push(node);
                    schemas.len() - 1
                }
            };
            media_types.insert(media, index);
        }

        let primary = media_types
            .iter()
            .find(|(media, _)| essence(media) == JSON)
            .or_else(|| media_types.iter().find(|(media, _)| essence(media).ends_with("+json")))
            .or_else(|| media_types.first())
            .map(|(_, index)| *index)
            .unwrap_or(0);

        Ok(Some(CanonicalBody {
            schemas,
            media_types,
            primary,
        }))
    }

    /// The Swagger 2.0 body: an `in: body` parameter, or an object built
    /// from the non-file `formData` fields. Returned with the media types
    /// assumed when nothing is consumed explicitly.
    fn swagger2_body(
        &mut self,
        operation: &ResolvedOperation,
    ) -> Result<Option<(CanonicalSchema, &'static [&'static str])>, NormalizeError> {
        if let Some(param) = operation
            .parameters
            .iter()
            .find(|p| p.location == ParameterLocation::Body)
        {
            let node = match param.schema {
                Some(ref s) => self.normalize_schema_or_ref(s)?,
                None => CanonicalSchema::Any,
            };
            return Ok(Some((node, JSON_TYPES)));
        }

        let mut properties = IndexMap::new();
        let mut required = Vec::new();
        for param in &operation.parameters {
            if param.location != ParameterLocation::FormData || param.is_file() {
                continue;
            }
            let value_schema = param
                .value_schema()
                .map_err(|source| NormalizeError::InvalidParameter {
                    name: param.name.clone(),
                    source,
                })?;
            let node = match value_schema {
                Some(ref s) => self.normalize_schema_or_ref(s)?,
                None => CanonicalSchema::Any,
            };
            if param.required {
                required.push(param.name.clone());
            }
            properties.insert(param.name.clone(), node);
        }
        if properties.is_empty() {
            return Ok(None);
        }

        let form = TypedSchema::object(properties, required, AdditionalPolicy::Allowed);
        Ok(Some((CanonicalSchema::typed(form), FORM_TYPES)))
    }
}

/// `type/subtype` without parameters, lower-cased.
pub fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Pick the declared media type a request's `Content-Type` selects.
///
/// Parameters such as `charset` are ignored and comparison is
/// case-insensitive. An exact declaration beats `type/*`, which beats
/// `*/*`.
pub fn match_media_type<'a, I>(declared: I, content_type: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: Clone,
{
    let wanted = essence(content_type);
    let (wanted_type, _) = wanted.split_once('/')?;
    let declared = declared.into_iter();

    declared
        .clone()
        .find(|d| essence(d) == wanted)
        .or_else(|| {
            declared.clone().find(|d| {
                essence(d)
                    .strip_suffix("/*")
                    .is_some_and(|t| t == wanted_type)
            })
        })
        .or_else(|| declared.clone().find(|d| essence(d) == "*/*"))
}
