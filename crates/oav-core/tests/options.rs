use std::fs;

use oav_core::config::{Coercion, EngineOptions, PathStyle, RemoveAdditional, load_config};
use oav_core::error::LoadError;
use oav_core::{
    Check, DocumentSource, EndpointMap, Errors, HttpMethod, ValidatorConfig, get_schema,
};
use serde_json::json;

const PETS: &str = include_str!("fixtures/pets.yaml");

fn endpoints(config: &ValidatorConfig) -> EndpointMap {
    get_schema(DocumentSource::Yaml(PETS.to_string()), config).expect("pets.yaml should compile")
}

#[test]
fn body_coercion_is_passed_to_the_engine() {
    let config = ValidatorConfig {
        ajv_config_body: EngineOptions {
            coerce_types: Coercion::Scalars,
            ..EngineOptions::default()
        },
        ..ValidatorConfig::default()
    };
    let map = endpoints(&config);
    let pets = map
        .get("/pets", HttpMethod::Put)
        .and_then(|e| e.body.as_ref())
        .expect("put /pets body");

    let mut instance = json!([{"name": 1, "tag": "tag", "test": {"field1": "enum1"}}]);
    let outcome = pets.check(&mut instance);
    assert!(outcome.valid);
    assert!(outcome.errors.is_none());
    assert_eq!(instance[0]["name"], "1");
}

#[test]
fn no_body_coercion_by_default() {
    let map = endpoints(&ValidatorConfig::default());
    let pets = map
        .get("/pets", HttpMethod::Put)
        .and_then(|e| e.body.as_ref())
        .expect("put /pets body");
    assert!(!pets.check(&mut json!([{"name": 1}])).valid);
}

#[test]
fn optional_attributes_nullable() {
    let body = json!({"name": "rex", "age": null, "test": {"field1": "enum1", "field2": null}});

    let map = endpoints(&ValidatorConfig::default());
    let pet = map
        .get("/pet", HttpMethod::Post)
        .and_then(|e| e.body.as_ref())
        .expect("post /pet body");
    assert!(!pet.check(&mut body.clone()).valid);

    let config = ValidatorConfig {
        make_optional_attributes_nullable: true,
        ..ValidatorConfig::default()
    };
    let map = endpoints(&config);
    let pet = map
        .get("/pet", HttpMethod::Post)
        .and_then(|e| e.body.as_ref())
        .expect("post /pet body");
    assert!(pet.check(&mut body.clone()).valid);
    // Required properties stay non-nullable.
    assert!(!pet.check(&mut json!({"name": null})).valid);
}

#[test]
fn content_type_selects_the_schema() {
    let map = endpoints(&ValidatorConfig::default());
    let pets = map
        .get("/pets", HttpMethod::Put)
        .and_then(|e| e.body.as_ref())
        .expect("put /pets body");

    assert!(pets.check_content(Some("text/plain; charset=utf-8"), &mut json!("short")).valid);
    assert!(!pets.check_content(Some("text/plain"), &mut json!("much too long")).valid);
    assert!(pets.check_content(Some("application/json"), &mut json!([{"name": "rex"}])).valid);
    // Undeclared media types fall back to the JSON schema.
    assert!(pets.check_content(Some("application/xml"), &mut json!([{"name": "rex"}])).valid);
}

#[test]
fn content_type_validation_rejects_undeclared_types() {
    let config = ValidatorConfig {
        content_type_validation: true,
        beautify_errors: true,
        ..ValidatorConfig::default()
    };
    let map = endpoints(&config);
    let pets = map
        .get("/pets", HttpMethod::Put)
        .and_then(|e| e.body.as_ref())
        .expect("put /pets body");

    let outcome = pets.check_content(Some("application/xml"), &mut json!([{"name": "rex"}]));
    assert_eq!(
        outcome.errors,
        Some(Errors::Beautified(vec![
            "content-type should be one of application/json, text/plain".to_string()
        ]))
    );
    assert!(pets.check_content(Some("Application/JSON"), &mut json!([{"name": "rex"}])).valid);
    assert!(pets.check_content(None, &mut json!([{"name": "rex"}])).valid);
}

#[test]
fn first_error_keeps_one_beautified_message() {
    let config = ValidatorConfig {
        beautify_errors: true,
        first_error: true,
        ..ValidatorConfig::default()
    };
    let map = endpoints(&config);
    let pets = map
        .get("/pet-discriminator-mapping", HttpMethod::Post)
        .and_then(|e| e.body.as_ref())
        .expect("mapping body");

    let Some(Errors::First(message)) = pets.check(&mut json!({"type": "mapped_dog"})).errors
    else {
        panic!("expected a single message");
    };
    insta::assert_snapshot!(message, @"body should have required property 'max_length'");
}

#[test]
fn beautified_messages_for_nested_discriminator() {
    let config = ValidatorConfig {
        beautify_errors: true,
        ..ValidatorConfig::default()
    };
    let map = endpoints(&config);
    let pets = map
        .get("/pet-discriminator-multiple", HttpMethod::Post)
        .and_then(|e| e.body.as_ref())
        .expect("multiple body");

    let Some(Errors::Beautified(messages)) = pets
        .check(&mut json!({"type": "dog_multiple", "model": "small_dog"}))
        .errors
    else {
        panic!("expected beautified messages");
    };
    insta::assert_snapshot!(messages.join("\n"), @r"
    body should have required property 'max_length'
    body should have required property 'name'
    body should have required property 'dog_age'
    ");
}

#[test]
fn remove_additional_prunes_the_instance() {
    let config = ValidatorConfig {
        ajv_config_body: EngineOptions {
            remove_additional: RemoveAdditional::All,
            ..EngineOptions::default()
        },
        ..ValidatorConfig::default()
    };
    let map = endpoints(&config);
    let dog = map
        .get("/dog", HttpMethod::Post)
        .and_then(|e| e.body.as_ref())
        .expect("dog body");

    let mut instance = json!({"bark": "woof", "color": "brown"});
    assert!(dog.check(&mut instance).valid);
    assert_eq!(instance, json!({"bark": "woof"}));
}

#[test]
fn colon_path_style() {
    let config = ValidatorConfig {
        path_style: PathStyle::Colon,
        ..ValidatorConfig::default()
    };
    let map = endpoints(&config);
    assert!(map.get("/pets-path/:name", HttpMethod::Get).is_some());
    assert!(map.get("/pets-path/{name}", HttpMethod::Get).is_none());
}

#[test]
fn custom_formats() {
    let doc = r#"
openapi: 3.0.0
info: { title: Formats, version: "1" }
paths:
  /ids:
    post:
      requestBody:
        content:
          application/json:
            schema:
              type: object
              properties:
                id: { type: string, format: int64 }
                code: { type: string, format: color }
      responses: {}
"#;
    let map = get_schema(
        DocumentSource::Yaml(doc.to_string()),
        &ValidatorConfig::default(),
    )
    .expect("document should load");
    // An unknown format fails the endpoint.
    assert!(map.get("/ids", HttpMethod::Post).is_none());
    assert_eq!(map.failures().len(), 1);

    let config: ValidatorConfig = serde_json::from_value(json!({
        "formats": [
            {"name": "int64", "pattern": "^\\d{1,19}$"},
            {"name": "color", "pattern": "^#[0-9a-f]{6}$"}
        ]
    }))
    .expect("config should parse");
    let map = get_schema(DocumentSource::Yaml(doc.to_string()), &config).expect("document should load");
    let ids = map
        .get("/ids", HttpMethod::Post)
        .and_then(|e| e.body.as_ref())
        .expect("ids body");
    assert!(ids.check(&mut json!({"id": "123", "code": "#00ff00"})).valid);
    assert!(!ids.check(&mut json!({"id": "12a"})).valid);
    assert!(!ids.check(&mut json!({"code": "green"})).valid);
}

#[test]
fn load_document_and_config_from_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let document = dir.path().join("pets.yaml");
    fs::write(&document, PETS)?;
    let config_path = dir.path().join("validator.yaml");
    fs::write(&config_path, "beautifyErrors: true\nfirstError: true\n")?;

    let config = load_config(&config_path)?.unwrap_or_default();
    let map = get_schema(DocumentSource::Path(document), &config)?;
    let dog = map
        .get("/dog", HttpMethod::Post)
        .and_then(|e| e.body.as_ref())
        .expect("dog body");
    assert_eq!(
        dog.check(&mut json!({})).errors,
        Some(Errors::First(
            "body should have required property 'bark'".to_string()
        ))
    );
    Ok(())
}

#[test]
fn missing_document_is_a_load_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = get_schema(
        DocumentSource::Path(dir.path().join("absent.yaml")),
        &ValidatorConfig::default(),
    );
    assert!(matches!(result, Err(LoadError::Read { .. })));
}

#[test]
fn unsupported_version_is_a_load_error() {
    let result = get_schema(
        DocumentSource::Json(r#"{"openapi": "4.0.0", "paths": {}}"#.to_string()),
        &ValidatorConfig::default(),
    );
    assert!(matches!(result, Err(LoadError::Parse(_))));
}

#[cfg(feature = "tokio")]
#[tokio::test]
async fn load_document_asynchronously() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let document = dir.path().join("pets.yaml");
    tokio::fs::write(&document, PETS).await?;

    let map = oav_core::get_schema_async(DocumentSource::Path(document), &ValidatorConfig::default())
        .await?;
    assert!(map.get("/dog", HttpMethod::Post).is_some());
    Ok(())
}
