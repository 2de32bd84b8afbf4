use crate::config::PathStyle;

/// Render a path template as an endpoint-map key.
///
/// Examples:
/// - `/pets/{petId}` with [`PathStyle::OpenApi`] → `/pets/{petId}`
/// - `/pets/{petId}` with [`PathStyle::Colon`] → `/pets/:petId`
/// - `/files/{name}.{ext}` with [`PathStyle::Colon`] → `/files/:name.:ext`
pub fn path_key(path: &str, style: PathStyle) -> String {
    match style {
        PathStyle::OpenApi => path.to_string(),
        PathStyle::Colon => to_colon_style(path),
    }
}

fn to_colon_style(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push(':');
        out.push_str(&rest[start + 1..start + len]);
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}

/// Names of the template variables in a path, in order.
pub fn template_params(path: &str) -> Vec<&str> {
    path.split('/')
        .flat_map(|seg| seg.split('{').skip(1))
        .filter_map(|part| part.split_once('}').map(|(name, _)| name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_style_is_identity() {
        assert_eq!(path_key("/pets/{petId}", PathStyle::OpenApi), "/pets/{petId}");
    }

    #[test]
    fn test_colon_style() {
        assert_eq!(path_key("/pets/{petId}", PathStyle::Colon), "/pets/:petId");
        assert_eq!(
            path_key("/users/{userId}/messages/{id}", PathStyle::Colon),
            "/users/:userId/messages/:id"
        );
        assert_eq!(
            path_key("/files/{name}.{ext}", PathStyle::Colon),
            "/files/:name.:ext"
        );
        assert_eq!(path_key("/pets", PathStyle::Colon), "/pets");
    }

    #[test]
    fn test_unterminated_brace_kept() {
        assert_eq!(path_key("/odd/{x", PathStyle::Colon), "/odd/{x");
    }

    #[test]
    fn test_template_params() {
        assert_eq!(
            template_params("/users/{userId}/files/{name}.{ext}"),
            vec!["userId", "name", "ext"]
        );
        assert!(template_params("/pets").is_empty());
    }
}
