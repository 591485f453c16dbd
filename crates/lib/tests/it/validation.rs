//! Schema validation tests
//!
//! Validation runs whenever a document writes itself into its host. These
//! tests cover how failures surface from save, assignment, and the update
//! helpers.

use docmap::{
    Document, DocumentType, Registry,
    validation::{FieldErrors, SchemaValidator, Validator},
};
use serde_json::{Value, json};

use crate::helpers::*;

#[test]
fn test_schema_validator_collects_every_error() {
    let schema = json!({
        "type": "object",
        "required": ["vin", "year"],
        "properties": {
            "vin": {"type": "string", "pattern": "^[A-Z0-9]+$"},
            "year": {"type": "integer"},
            "tags": {"type": "array", "items": {"enum": ["fast", "red"]}}
        },
        "additionalProperties": false
    });
    let doc = json!({"vin": "lower", "tags": ["fast", "slow"], "extra": 1});

    let errors = SchemaValidator::new()
        .validate(&doc, &schema)
        .expect_err("document should be invalid");

    assert_eq!(errors["year"], vec!["is required".to_string()]);
    assert!(errors.contains_key("vin"));
    assert!(errors.contains_key("tags.1"));
    assert!(errors.contains_key("extra"));
}

#[test]
fn test_save_propagates_validation_errors() {
    let registry = fixture_registry();
    let root = memory_root(json!({"car": {"vin": "V1"}}));
    let car = Document::linked(&registry, "Car", root.clone(), "car").unwrap();

    car.set("year", 1700).unwrap();
    let err = car.save().unwrap_err();
    assert!(err.is_validation_error());

    let field_errors = err.validation_errors().expect("field errors");
    assert_eq!(field_errors["year"], vec!["must be at least 1886".to_string()]);

    assert_eq!(root.save_count(), 0);
    assert_eq!(root.attribute("car"), Some(json!({"vin": "V1"})));
}

#[test]
fn test_nested_failures_stop_the_parent_save() {
    let registry = fixture_registry();
    let root = memory_root(json!({"garage": {"cars": [{"vin": "V1"}]}}));
    let garage = Document::linked(&registry, "Garage", root.clone(), "garage").unwrap();
    let car = garage.collection("cars").unwrap().unwrap().find("V1").unwrap();

    car.set("vin", "").unwrap();
    let err = garage.save().unwrap_err();
    assert!(err.is_validation_error());
    assert_eq!(root.save_count(), 0);

    // Validation can also be run without saving.
    let err = garage.validate_or_throw().unwrap_err();
    assert!(err.to_string().contains("Validation failed for 'Car'"));
}

#[test]
fn test_assigning_an_invalid_document_changes_nothing() {
    let registry = Registry::builder()
        .register(
            DocumentType::new("Owner")
                .link("car", docmap::LinkedAttribute::document("Car", "car")),
        )
        .unwrap()
        .register(DocumentType::new("Car").schema(json!({"required": ["vin"]})))
        .unwrap()
        .build()
        .unwrap();

    let owner = Document::new(&registry, "Owner", json!({"name": "Ada"})).unwrap();
    let err = owner.set("car", json!({"year": 2001})).unwrap_err();
    assert!(err.is_validation_error());
    assert_eq!(owner.to_value(), json!({"name": "Ada"}));
}

#[test]
fn test_update_is_all_or_nothing_on_validation() {
    let registry = fixture_registry();
    let root = memory_root(json!({"car": {"vin": "V1", "year": 2001}}));
    let car = Document::linked(&registry, "Car", root.clone(), "car").unwrap();

    let err = car
        .update(object(json!({"colour": "red", "year": 1500})))
        .unwrap_err();
    assert!(err.is_validation_error());
    assert_eq!(root.attribute("car"), Some(json!({"vin": "V1", "year": 2001})));
}

#[test]
fn test_safe_update_rolls_back_only_invalid_keys() {
    let registry = fixture_registry();
    let root = memory_root(json!({"car": {"vin": "V1", "year": 2001}}));
    let car = Document::linked(&registry, "Car", root.clone(), "car").unwrap();

    let saved = car
        .safe_update(object(json!({
            "colour": "red",
            "year": 1500,
            "vin": "",
            "doors": 3
        })))
        .unwrap();
    assert!(saved);

    assert_eq!(
        root.attribute("car"),
        Some(json!({"vin": "V1", "year": 2001, "colour": "red", "doors": 3}))
    );
}

#[test]
fn test_safe_update_unsets_keys_that_were_absent() {
    let registry = Registry::builder()
        .register(DocumentType::new("Flag").schema(json!({
            "properties": {"level": {"type": "integer", "maximum": 3}}
        })))
        .unwrap()
        .build()
        .unwrap();
    let root = memory_root(json!({"flag": {"on": true}}));
    let flag = Document::linked(&registry, "Flag", root.clone(), "flag").unwrap();

    flag.safe_update(object(json!({"level": 9}))).unwrap();
    assert_eq!(flag.value("level").unwrap(), Value::Null);
    assert_eq!(root.attribute("flag"), Some(json!({"on": true})));
}

struct RejectEverything;

impl Validator for RejectEverything {
    fn validate(&self, _document: &Value, _schema: &Value) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.insert(String::new(), vec!["rejected".to_string()]);
        Err(errors)
    }
}

#[test]
fn test_custom_validator_replaces_schema_checks() {
    let registry = Registry::builder()
        .register(DocumentType::new("Note").schema(json!({})))
        .unwrap()
        .validator(RejectEverything)
        .build()
        .unwrap();
    let root = memory_root(json!({}));
    let note = Document::linked(&registry, "Note", root, "note").unwrap();

    let err = note.save().unwrap_err();
    assert_eq!(err.validation_errors().unwrap()[""], vec!["rejected".to_string()]);
}
