use std::io::Write;

use interaction::schema::{self, CompiledSchema, FieldType};
use interaction::{Definition, Interaction, Record, ValidationError};
use serde_json::{Value, json};

const SIGNUP_SCHEMA: &str = r#"{
    "name":  { "type": "string", "required": true },
    "email": { "type": "string", "required": true, "pattern": "^[^@]+@[^@]+\\.[^@]+$",
               "message": "Email must look like name@host.tld" },
    "age":   { "type": "integer" }
}"#;

fn write_schema(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[test]
fn load_reads_rules_from_file() {
    let file = write_schema(SIGNUP_SCHEMA);
    let rules = schema::load(file.path()).unwrap();

    assert_eq!(rules.len(), 3);
    assert!(rules["name"].required);
    assert_eq!(rules["age"].kind, FieldType::Integer);
    assert!(!rules["age"].required);
    assert_eq!(
        rules["email"].message.as_deref(),
        Some("Email must look like name@host.tld")
    );
}

#[test]
fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = schema::load(dir.path().join("missing.json")).unwrap_err();
    assert!(err.to_string().contains("failed to read schema file"));
}

#[test]
fn load_reports_bad_json() {
    let file = write_schema("{ not json");
    let err = schema::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("failed to parse schema file"));
}

#[test]
fn load_rejects_unknown_type() {
    let file = write_schema(r#"{ "x": { "type": "date" } }"#);
    assert!(schema::load(file.path()).is_err());
}

#[test]
fn compiled_fields_are_listed() {
    let file = write_schema(SIGNUP_SCHEMA);
    let compiled = CompiledSchema::compile(&schema::load(file.path()).unwrap()).unwrap();
    let fields: Vec<_> = compiled.fields().collect();
    assert_eq!(fields, vec!["age", "email", "name"]);
}

#[test]
fn flat_report_carries_field_and_message() {
    let file = write_schema(SIGNUP_SCHEMA);
    let compiled = CompiledSchema::compile(&schema::load(file.path()).unwrap()).unwrap();

    let tokens = compiled.violations(&record(json!({"name": "Bob", "email": "bob", "age": "old"})));

    assert_eq!(
        tokens,
        vec![
            "age||age is invalid.".to_string(),
            "email||Email must look like name@host.tld".to_string(),
        ]
    );
}

#[tokio::test]
async fn interaction_from_schema_file() {
    let file = write_schema(SIGNUP_SCHEMA);
    let signup = Interaction::define(
        "Signup",
        Definition::new(|data: Record, done| {
            done.resolve(Value::Object(data));
            Ok(())
        })
        .inputs(schema::load(file.path()).unwrap()),
    )
    .unwrap();

    assert_eq!(signup.fields(), vec!["age", "email", "name"]);

    let ok = signup
        .call(record(json!({"name": "Ann", "email": "ann@x.io", "role": "admin"})))
        .await
        .unwrap();
    assert_eq!(ok, json!({"name": "Ann", "email": "ann@x.io"}));

    let err = signup
        .call(record(json!({"name": 7, "email": "ann@x.io", "age": 30})))
        .await
        .unwrap_err();
    let invalid = ValidationError::from_error(&err).unwrap();
    assert_eq!(invalid.errors().len(), 1);
    assert_eq!(invalid.field("name")[0].message, "name is invalid.");
}
