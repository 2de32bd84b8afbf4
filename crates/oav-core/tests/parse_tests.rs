use oav_core::parse;
use oav_core::parse::operation::HttpMethod;
use oav_core::parse::parameter::ParameterLocation;
use oav_core::parse::ref_resolve::RefResolver;
use oav_core::parse::spec::SpecVersion;

const PETS: &str = include_str!("fixtures/pets.yaml");
const PETS_SWAGGER: &str = include_str!("fixtures/pets-swagger.yaml");

#[test]
fn parse_openapi3_yaml() {
    let doc = parse::from_yaml(PETS).expect("should parse pets.yaml");
    assert_eq!(doc.version(), Some(SpecVersion::V3));
    assert_eq!(doc.schema_section(), "#/components/schemas/");
    assert!(doc.paths.contains_key("/pets-path/{name}"));

    let put = doc.paths["/pets"].put.as_ref().expect("should have PUT");
    let body = put.request_body.as_ref().expect("should have a request body");
    match body {
        parse::request_body::RequestBodyOrRef::RequestBody(rb) => {
            let media: Vec<&str> = rb.content.keys().map(String::as_str).collect();
            assert_eq!(media, vec!["application/json", "text/plain"]);
        }
        _ => panic!("expected inline request body"),
    }
}

#[test]
fn parse_swagger2_yaml() {
    let doc = parse::from_yaml(PETS_SWAGGER).expect("should parse pets-swagger.yaml");
    assert_eq!(doc.version(), Some(SpecVersion::V2));
    assert_eq!(doc.schema_section(), "#/definitions/");
    assert_eq!(doc.consumes, vec!["application/json"]);
    assert_eq!(doc.definitions.len(), 4);
}

#[test]
fn resolve_merges_path_level_parameters() {
    let doc = parse::from_yaml(PETS_SWAGGER).expect("should parse");
    let item = &doc.paths["/pets/{petId}"];
    let get = item.get.as_ref().expect("should have GET");

    let mut resolver = RefResolver::new(&doc);
    let resolved = resolver
        .resolve_operation("/pets/{petId}", HttpMethod::Get, item, get)
        .expect("should resolve");
    let names: Vec<(&str, ParameterLocation)> = resolved
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), p.location))
        .collect();
    assert_eq!(
        names,
        vec![
            ("petId", ParameterLocation::Path),
            ("fields", ParameterLocation::Query),
        ]
    );
    assert_eq!(resolved.consumes, vec!["application/json"]);
}

#[test]
fn resolve_remembers_origin_names() {
    let doc = parse::from_yaml(PETS).expect("should parse");
    let mut resolver = RefResolver::new(&doc);
    let schema = resolver
        .lookup_schema("#/components/schemas/PetDiscriminator")
        .expect("should resolve");
    assert_eq!(schema.origin.as_deref(), Some("PetDiscriminator"));

    let branches: Vec<Option<&str>> = schema
        .one_of
        .iter()
        .map(|b| match b {
            parse::schema::SchemaOrRef::Schema(s) => s.origin.as_deref(),
            parse::schema::SchemaOrRef::Ref { .. } => None,
        })
        .collect();
    assert_eq!(branches, vec![Some("dog_object"), Some("cat_object")]);
}

#[test]
fn reject_unknown_version() {
    let err = parse::from_yaml("swagger: '1.2'\npaths: {}\n").unwrap_err();
    assert!(err.to_string().contains("1.2"));
}
