//! Registry and configuration tests

use std::io::Write;

use docmap::{
    Document, LifecycleEvent, Registry,
    registry::{DEFAULT_TYPE, RegistryConfig, RegistryError},
};
use serde_json::json;

use crate::helpers::*;

const CONFIG: &str = r#"{
    "types": {
        "Garage": {
            "linked": {
                "owner": ["Person", "owner"],
                "address": ["Address", "details", "address"],
                "cars": ["Car", "cars", null, true, "vin"]
            },
            "casts": {"capacity": "int"}
        },
        "Car": {
            "casts": {"year": "int"},
            "schema": {"type": "object", "required": ["vin"]}
        },
        "Person": {"nullable_when_empty": true},
        "Address": {}
    }
}"#;

#[test]
fn test_registry_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(CONFIG.as_bytes()).expect("Failed to write config");

    let config = RegistryConfig::from_path(file.path()).expect("Failed to read config");
    let registry = Registry::from_config(&config).expect("Failed to build registry");

    assert_eq!(
        registry.type_names(),
        vec!["Address", "Car", "Garage", "Person", DEFAULT_TYPE]
    );

    let garage = registry.document_type("Garage").unwrap();
    let cars = garage.linked_attribute("cars").unwrap();
    assert!(cars.is_collection);
    assert_eq!(cars.primary_key.as_deref(), Some("vin"));
    let address = garage.linked_attribute("address").unwrap();
    assert_eq!(address.host_attribute, "details");
    assert_eq!(address.host_sub_key.as_deref(), Some("address"));

    // Configured types behave like the ones declared in code.
    let doc = Document::new(&registry, "Garage", json!({"cars": [{"vin": "V1"}]})).unwrap();
    doc.set("capacity", "4").unwrap();
    assert_eq!(doc.value("capacity").unwrap(), json!(4));
    assert_eq!(doc.collection("cars").unwrap().unwrap().len(), 1);
}

#[test]
fn test_malformed_tuple_names_type_and_attribute() {
    let config = RegistryConfig::from_json_str(
        r#"{"types": {"Garage": {"linked": {"cars": ["Car"]}}, "Car": {}}}"#,
    )
    .unwrap();
    let err = Registry::from_config(&config).unwrap_err();
    assert!(err.is_config_error());

    let message = err.to_string();
    assert!(message.contains("'cars'"), "{message}");
    assert!(message.contains("'Garage'"), "{message}");
}

#[test]
fn test_links_to_unregistered_types_are_rejected() {
    let config = RegistryConfig::from_json_str(
        r#"{"types": {"Garage": {"linked": {"cars": ["Car", "cars", null, true]}}}}"#,
    )
    .unwrap();
    let err = Registry::from_config(&config).unwrap_err();
    assert!(matches!(
        err,
        docmap::Error::Registry(RegistryError::UnknownChildType { .. })
    ));
}

#[test]
fn test_invalid_config_json_is_a_serialization_error() {
    let err = RegistryConfig::from_json_str(r#"{"types": []}"#).unwrap_err();
    assert_eq!(err.module(), "serialize");

    let err = RegistryConfig::from_path("/definitely/not/here.json").unwrap_err();
    assert!(err.is_io_error());
}

#[test]
fn test_hooks_attach_to_registered_types_only() {
    let err = fixture_builder()
        .on("Boat", LifecycleEvent::Saving, |_doc: &Document| {})
        .err()
        .expect("unknown type should be rejected");
    assert!(err.is_config_error());

    let registry = fixture_builder()
        .on("Car", LifecycleEvent::Saving, |_doc: &Document| false)
        .unwrap()
        .build()
        .unwrap();
    let car_type = registry.document_type("Car").unwrap();
    assert!(car_type.dispatcher().has_listeners(LifecycleEvent::Saving));
    assert!(!car_type.dispatcher().has_listeners(LifecycleEvent::Saved));
}

#[test]
fn test_default_type_is_always_available() {
    let registry = Registry::builder().build().unwrap();
    let doc = Document::new(&registry, DEFAULT_TYPE, json!({"free": "form"})).unwrap();
    assert_eq!(doc.type_name(), DEFAULT_TYPE);
    assert!(!doc.doc_type().has_linked_attributes());
    assert!(!doc.doc_type().supports_validation());
}

#[test]
fn test_linked_attribute_resolution() {
    let registry = fixture_registry();
    let car = registry.document_type("Car").unwrap();
    assert!(car.is_linked_attribute("engine"));
    assert!(!car.is_linked_attribute("vin"));
    assert!(car.supports_validation());

    let person = registry.document_type("Person").unwrap();
    assert!(person.is_nullable_when_empty());

    let err = registry.document_type("Boat").unwrap_err();
    assert!(err.is_not_found());
}
