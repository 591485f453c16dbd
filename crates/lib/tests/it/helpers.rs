use std::{cell::RefCell, rc::Rc};

use docmap::{
    Document, DocumentType, LifecycleEvent, LinkedAttribute, MemoryRoot, Registry,
    attributes::Cast,
    registry::RegistryBuilder,
};
use serde_json::{Map, Value, json};

// ==========================
// HOOK RECORDING
// ==========================

/// Records hook calls as `"Type:event"` in firing order.
#[derive(Clone, Default)]
pub struct HookLog {
    calls: Rc<RefCell<Vec<String>>>,
}

impl HookLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Calls recorded for one type, e.g. `["saving", "saved"]`.
    pub fn calls_for(&self, type_name: &str) -> Vec<String> {
        let prefix = format!("{type_name}:");
        self.calls()
            .into_iter()
            .filter_map(|call| call.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.borrow().iter().filter(|c| *c == call).count()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    /// Attaches a recorder for every lifecycle event to each listed type.
    pub fn attach(&self, mut builder: RegistryBuilder, types: &[&str]) -> RegistryBuilder {
        for type_name in types {
            for event in LifecycleEvent::ALL {
                let log = self.clone();
                let call = format!("{type_name}:{event}");
                builder = builder
                    .on(type_name, event, move |_doc: &Document| log.record(call.clone()))
                    .expect("Failed to attach hook recorder");
            }
        }
        builder
    }
}

// ==========================
// FIXTURE REGISTRIES
// ==========================

pub const ALL_TYPES: &[&str] = &[
    "Garage", "Car", "Engine", "Person", "Address", "Parent", "Holder", "Child",
];

/// Unfinished registry with every fixture type declared:
///
/// * `Garage`: `owner` (nullable `Person`), `address` (`Address` at
///   `details.address`), `cars` (`Car` collection keyed by `vin`)
/// * `Car`: `engine` (`Engine`), `year` cast to int, schema requiring `vin`
/// * `Parent`: children `a` and `b`, in that order
/// * `Holder`: a single child `child`
pub fn fixture_builder() -> RegistryBuilder {
    Registry::builder()
        .register(
            DocumentType::new("Garage")
                .link("owner", LinkedAttribute::document("Person", "owner"))
                .link(
                    "address",
                    LinkedAttribute::document("Address", "details").sub_key("address"),
                )
                .link(
                    "cars",
                    LinkedAttribute::collection("Car", "cars").primary_key("vin"),
                ),
        )
        .expect("Failed to register Garage")
        .register(
            DocumentType::new("Car")
                .link("engine", LinkedAttribute::document("Engine", "engine"))
                .cast("year", Cast::Int)
                .schema(json!({
                    "type": "object",
                    "required": ["vin"],
                    "properties": {
                        "vin": {"type": "string", "minLength": 1},
                        "year": {"type": "integer", "minimum": 1886}
                    }
                })),
        )
        .expect("Failed to register Car")
        .register(DocumentType::new("Engine").cast("hp", Cast::Int))
        .expect("Failed to register Engine")
        .register(DocumentType::new("Person").nullable_when_empty(true))
        .expect("Failed to register Person")
        .register(DocumentType::new("Address"))
        .expect("Failed to register Address")
        .register(
            DocumentType::new("Parent")
                .link("a", LinkedAttribute::document("Child", "a"))
                .link("b", LinkedAttribute::document("Child", "b")),
        )
        .expect("Failed to register Parent")
        .register(DocumentType::new("Holder").link("child", LinkedAttribute::document("Child", "child")))
        .expect("Failed to register Holder")
        .register(DocumentType::new("Child"))
        .expect("Failed to register Child")
}

pub fn fixture_registry() -> Registry {
    fixture_builder()
        .build()
        .expect("Failed to build fixture registry")
}

/// Fixture registry with a [`HookLog`] recorder on every type.
pub fn recorded_registry() -> (Registry, HookLog) {
    let log = HookLog::new();
    let registry = log
        .attach(fixture_builder(), ALL_TYPES)
        .build()
        .expect("Failed to build fixture registry");
    (registry, log)
}

// ==========================
// DATA HELPERS
// ==========================

pub fn memory_root(data: Value) -> Rc<MemoryRoot> {
    Rc::new(MemoryRoot::from_value(data).expect("Failed to create memory root"))
}

/// Unwraps a `json!` object literal into a map.
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object literal, got {other}"),
    }
}

pub fn assert_canonical_eq(actual: &Value, expected: &Value) {
    assert!(
        docmap::canonical::canonical_eq(actual, expected),
        "expected {expected}, got {actual}"
    );
}
