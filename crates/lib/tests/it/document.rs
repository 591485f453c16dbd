//! Document construction, attribute access and serialization tests

use std::rc::Rc;

use chrono::{TimeZone, Utc};
use docmap::{Attribute, Document, Root};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::helpers::*;

#[test]
fn test_transient_round_trip() {
    let registry = fixture_registry();
    let samples = [
        json!({}),
        json!({"a": 1, "b": "two", "c": null, "d": true}),
        json!({"nested": {"deep": {"list": [1, {"x": []}, "s"], "empty": {}}}, "n": -1.5}),
        json!({"unicode": "ünïcødé ✓", "arr": [[], [[]], [{}]]}),
    ];

    for sample in samples {
        let doc = Document::new(&registry, "document", sample.clone()).expect("Failed to build document");
        assert_canonical_eq(&doc.to_value(), &sample);
    }
}

#[test]
fn test_write_through_isolation() {
    let registry = fixture_registry();
    let root = memory_root(json!({"car": {"vin": "V1", "year": 1999}}));
    let car = Document::linked(&registry, "Car", root.clone(), "car").expect("Failed to link car");

    car.set("year", 2001).expect("Failed to set year");
    assert_eq!(root.attribute("car"), Some(json!({"vin": "V1", "year": 1999})));
    assert_eq!(root.save_count(), 0);

    assert!(car.save().expect("Failed to save"));
    assert_eq!(root.attribute("car"), Some(car.to_value()));
    assert_eq!(root.save_count(), 1);
}

#[test]
fn test_partial_attribute_write_preserves_siblings() {
    let registry = fixture_registry();
    let root = memory_root(json!({"a": {"x": 1, "keep": "me"}, "b": 2}));
    let doc = Document::linked(&registry, "document", root.clone(), "a").expect("Failed to link");

    doc.set("x", 10).expect("Failed to set x");
    doc.save().expect("Failed to save");

    assert_eq!(root.snapshot(), json!({"a": {"x": 10, "keep": "me"}, "b": 2}));
}

#[test]
fn test_sub_key_write_preserves_sibling_keys() {
    let registry = fixture_registry();
    let root = memory_root(json!({"a": {"inner": {"k": 1}, "other": 3}, "b": 2}));
    let doc = Document::linked_at(&registry, "document", root.clone(), "a", "inner")
        .expect("Failed to link");
    assert_eq!(doc.to_value(), json!({"k": 1}));

    doc.set("k", 2).expect("Failed to set k");
    doc.save().expect("Failed to save");

    assert_eq!(
        root.snapshot(),
        json!({"a": {"inner": {"k": 2}, "other": 3}, "b": 2})
    );
}

#[test]
fn test_linked_attribute_reads_return_cached_instance() {
    let registry = fixture_registry();
    let car = Document::new(&registry, "Car", json!({"vin": "V1"})).expect("Failed to build car");

    let first = car.document("engine").unwrap().expect("engine should hydrate");
    let second = car.document("engine").unwrap().expect("engine should hydrate");
    assert!(first.ptr_eq(&second));

    // Edits accumulate on the cached instance.
    first.set("hp", 120).unwrap();
    assert_eq!(second.value("hp").unwrap(), json!(120));
    assert_eq!(car.to_value(), json!({"vin": "V1", "engine": {"hp": 120}}));

    car.unset("engine");
    let third = car.document("engine").unwrap().expect("engine should hydrate");
    assert!(!third.ptr_eq(&first));
    assert!(third.is_empty());
}

#[test]
fn test_empty_document_serializes_as_object() {
    let registry = fixture_registry();

    let doc = Document::new(&registry, "document", Value::Null).unwrap();
    assert!(doc.is_empty());
    assert_eq!(doc.to_json(), "{}");
    assert_eq!(serde_json::to_string(&doc).unwrap(), "{}");

    // A car whose only content is an empty engine is empty too.
    let car = Document::new(&registry, "Car", json!({"engine": {}})).unwrap();
    assert!(car.document("engine").unwrap().is_some());
    assert!(car.is_empty());
    assert_eq!(car.to_json(), "{}");
}

#[test]
fn test_casts_apply_on_set_and_failures_change_nothing() {
    let registry = fixture_registry();
    let car = Document::new(&registry, "Car", json!({"vin": "V1"})).unwrap();

    car.set("year", "1999").unwrap();
    assert_eq!(car.value("year").unwrap(), json!(1999));

    let err = car.set("year", "last year").unwrap_err();
    assert!(err.is_type_error());
    assert_eq!(car.value("year").unwrap(), json!(1999));
}

#[test]
fn test_typed_reads() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Trim {
        doors: u8,
        colour: String,
    }

    let registry = fixture_registry();
    let doc = Document::new(
        &registry,
        "document",
        json!({"trim": {"doors": 3, "colour": "red"}, "built": 0, "bad": "soon"}),
    )
    .unwrap();

    assert_eq!(
        doc.get_as::<Trim>("trim").unwrap(),
        Trim {
            doors: 3,
            colour: "red".into()
        }
    );
    assert_eq!(
        doc.get_datetime("built").unwrap(),
        Some(Utc.timestamp_opt(0, 0).unwrap())
    );
    assert_eq!(doc.get_datetime("missing").unwrap(), None);
    assert!(doc.get_datetime("bad").unwrap_err().is_type_error());
}

#[test]
fn test_set_document_attribute_checks_type_and_identity() {
    let registry = fixture_registry();
    let car = Document::new(&registry, "Car", json!({"vin": "V1"})).unwrap();

    let person = Document::new(&registry, "Person", json!({"name": "Ada"})).unwrap();
    let err = car.set("engine", person).unwrap_err();
    assert!(err.is_type_error());

    let err = car.set("engine", car.clone()).unwrap_err();
    assert!(err.is_type_error());

    let err = car.set("engine", 5).unwrap_err();
    assert!(err.is_type_error());

    // Documents can not be stored in plain attributes.
    let engine = Document::new(&registry, "Engine", json!({"hp": 90})).unwrap();
    let err = car.set("colour", engine).unwrap_err();
    assert!(err.is_type_error());

    assert_eq!(car.to_value(), json!({"vin": "V1"}));
}

#[test]
fn test_set_document_attribute_links_and_writes_locally() {
    let registry = fixture_registry();
    let root = memory_root(json!({"car": {"vin": "V1"}}));
    let car = Document::linked(&registry, "Car", root.clone(), "car").unwrap();

    car.set("engine", json!({"hp": 150})).unwrap();

    let engine = car.document("engine").unwrap().expect("engine cached");
    assert!(engine.is_linked());
    assert!(engine.is_linked_to_instance_of("Car"));
    assert_eq!(engine.value("hp").unwrap(), json!(150));

    // Written into the car, not the root.
    assert_eq!(car.original("engine"), None);
    assert_eq!(root.attribute("car"), Some(json!({"vin": "V1"})));

    car.save().unwrap();
    assert_eq!(root.attribute("car"), Some(json!({"vin": "V1", "engine": {"hp": 150}})));
}

#[test]
fn test_nullable_child_reads_as_null_until_it_has_data() {
    let registry = fixture_registry();
    let root = memory_root(json!({"garage": {"name": "North"}}));
    let garage = Document::linked(&registry, "Garage", root.clone(), "garage").unwrap();

    assert!(garage.get("owner").unwrap().is_null());
    assert!(!garage.has("owner").unwrap());

    garage.set("owner", json!({"name": "Ada"})).unwrap();
    assert!(garage.has("owner").unwrap());
    let owner = garage.document("owner").unwrap().expect("owner cached");
    assert_eq!(owner.value("name").unwrap(), json!("Ada"));

    garage.set("owner", Value::Null).unwrap();
    assert!(garage.get("owner").unwrap().is_null());
    assert_eq!(garage.to_value(), json!({"name": "North"}));
}

#[test]
fn test_sub_key_attribute_unset_keeps_sibling_keys() {
    let registry = fixture_registry();
    let garage = Document::new(
        &registry,
        "Garage",
        json!({"details": {"address": {"city": "Oslo"}, "phone": "555"}}),
    )
    .unwrap();

    let address = garage.document("address").unwrap().expect("address hydrated");
    assert_eq!(address.value("city").unwrap(), json!("Oslo"));
    assert!(address.is_linked_to_instance_of("Garage"));

    garage.unset("address");
    assert_eq!(garage.to_value(), json!({"details": {"phone": "555"}}));
}

#[test]
fn test_has_checks_resolved_values() {
    let registry = fixture_registry();
    let car = Document::new(&registry, "Car", json!({"vin": "V1", "note": null})).unwrap();
    assert!(car.has("vin").unwrap());
    assert!(!car.has("note").unwrap());
    assert!(!car.has("missing").unwrap());
    assert!(!car.has("engine").unwrap());

    car.document("engine").unwrap().unwrap().set("hp", 1).unwrap();
    assert!(car.has("engine").unwrap());
}

#[test]
fn test_has_reports_hydration_faults() {
    let registry = fixture_registry();
    let garage = Document::new(&registry, "Garage", json!({"name": "North"})).unwrap();

    // `details` is a plain attribute; only its `address` key is linked.
    garage.set("details", json!({"address": 5})).unwrap();
    garage.with_json_model_attributes(&["cars"]).unwrap();

    let err = garage.has("address").unwrap_err();
    assert!(err.is_type_error());
}

#[test]
fn test_dirty_tracking_follows_saves() {
    let registry = fixture_registry();
    let root = memory_root(json!({"car": {"vin": "V1", "year": 1999}}));
    let car = Document::linked(&registry, "Car", root, "car").unwrap();
    assert!(car.dirty_keys().is_empty());

    car.set("year", 2000).unwrap();
    car.set("colour", "blue").unwrap();
    assert!(car.is_dirty("year"));
    assert!(!car.is_dirty("vin"));
    assert_eq!(car.dirty_keys(), vec!["colour".to_string(), "year".to_string()]);
    assert_eq!(car.original("year"), Some(json!(1999)));

    car.save().unwrap();
    assert!(car.dirty_keys().is_empty());
    assert_eq!(car.original("year"), Some(json!(2000)));
}

#[test]
fn test_json_model_attribute_dirty_compares_serialized_children() {
    let registry = fixture_registry();
    let root = memory_root(json!({"car": {"vin": "V1", "engine": {"hp": 90}}}));
    let car = Document::linked(&registry, "Car", root, "car").unwrap();
    assert!(!car.is_json_model_attribute_dirty("engine").unwrap());

    // Re-assigning the stored value is not a change.
    let engine = car.document("engine").unwrap().unwrap();
    engine.set("hp", 90).unwrap();
    assert!(!car.is_json_model_attribute_dirty("engine").unwrap());

    engine.set("hp", 91).unwrap();
    assert!(car.is_json_model_attribute_dirty("engine").unwrap());

    car.save().unwrap();
    assert!(!car.is_json_model_attribute_dirty("engine").unwrap());

    let err = car.is_json_model_attribute_dirty("vin").unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn test_empty_and_absent_children_are_not_dirty() {
    let registry = fixture_registry();
    let root = memory_root(json!({"car": {"vin": "V1"}}));
    let car = Document::linked(&registry, "Car", root, "car").unwrap();

    // Hydrating an absent child yields an empty one: still clean.
    car.document("engine").unwrap();
    assert!(!car.is_json_model_attribute_dirty("engine").unwrap());
}

#[test]
fn test_with_json_model_attributes_rehydrates_requested_only() {
    let registry = fixture_registry();
    let garage = Document::new(
        &registry,
        "Garage",
        json!({"owner": {"name": "Ada"}, "details": {"address": {"city": "Oslo"}}}),
    )
    .unwrap();
    let owner = garage.document("owner").unwrap().unwrap();
    owner.set("name", "Grace").unwrap();

    garage.with_json_model_attributes(&["address"]).unwrap();

    // The unsaved owner edit was in the dropped cache.
    let reloaded = garage.document("owner").unwrap().unwrap();
    assert!(!reloaded.ptr_eq(&owner));
    assert_eq!(reloaded.value("name").unwrap(), json!("Ada"));

    let err = garage.with_json_model_attributes(&["name"]).unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn test_ancestor_navigation_through_collections() {
    let registry = fixture_registry();
    let root = memory_root(json!({
        "garage": {"cars": [{"vin": "V1", "engine": {"hp": 90}}]}
    }));
    let garage = Document::linked(&registry, "Garage", root.clone(), "garage").unwrap();
    let car = garage.collection("cars").unwrap().unwrap().find("V1").unwrap();
    let engine = car.document("engine").unwrap().unwrap();

    assert!(engine.is_linked_to_instance_of("Car"));
    assert!(!engine.is_linked_to_instance_of("Garage"));
    assert!(car.is_linked_to_instance_of("Garage"));

    let found = engine.get_ancestor_of_type("Garage").expect("garage ancestor");
    assert!(found.ptr_eq(&garage));
    assert!(engine.get_ancestor_of_type("Person").is_none());

    let top = engine.root().expect("root at the top");
    let expected: Rc<dyn Root> = root;
    assert!(Rc::ptr_eq(&top, &expected));
}

#[test]
fn test_dropped_host_is_a_link_error() {
    let registry = fixture_registry();
    let engine = {
        let car = Document::new(&registry, "Car", json!({"engine": {"hp": 1}})).unwrap();
        car.document("engine").unwrap().unwrap()
    };

    assert!(engine.is_linked());
    assert!(engine.get_linked_data().unwrap_err().is_link_error());
    assert!(engine.save().unwrap_err().is_link_error());
}

#[test]
fn test_invalid_host_data_is_rejected() {
    let registry = fixture_registry();
    let root = memory_root(json!({"car": "not an object"}));
    let err = Document::linked(&registry, "Car", root, "car").unwrap_err();
    assert!(err.is_type_error());

    let err = Document::new(&registry, "Boat", json!({})).unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn test_attribute_conversions() {
    let registry = fixture_registry();
    let doc = Document::new(&registry, "document", Value::Null).unwrap();
    doc.set("s", "text").unwrap();
    doc.set("n", 3_i64).unwrap();
    doc.set("f", 0.5).unwrap();
    doc.set("b", false).unwrap();
    doc.set("v", json!([1])).unwrap();
    assert_eq!(doc.to_value(), json!({"s": "text", "n": 3, "f": 0.5, "b": false, "v": [1]}));

    assert!(matches!(doc.get("n").unwrap(), Attribute::Value(v) if v == json!(3)));
}
