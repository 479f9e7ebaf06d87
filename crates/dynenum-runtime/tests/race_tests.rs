//! Concurrency tests for the guarded extension path
//!
//! The guarded `extend` holds a per-class lock across its whole
//! read-modify-publish sequence, so simultaneous extenders serialize
//! instead of losing each other's appends. These tests drive real threads
//! through that path; the unguarded lost-update interleaving is exercised
//! deterministically in the extender's unit tests.

use dynenum_runtime::runtime::{ClassRegistry, ConstructedState, EnumBuilder, FieldSpec};
use dynenum_runtime::{extend, extend_unguarded, TypeTag, Value};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

fn status_enum(registry: &ClassRegistry) -> dynenum_runtime::runtime::ClassId {
    EnumBuilder::new("Status")
        .payload(FieldSpec::new("label", TypeTag::Str).as_private())
        .constructor(vec![TypeTag::Str], |args| {
            let label = args[0].as_str().ok_or("label must be a string")?;
            Ok(ConstructedState {
                constant_name: Some(label.to_uppercase()),
                fields: vec![args[0].clone()],
            })
        })
        .constant(vec![Value::str("active")])
        .constant(vec![Value::str("inactive")])
        .register(registry)
        .unwrap()
}

#[test]
fn test_two_guarded_extenders_both_land() {
    let registry = Arc::new(ClassRegistry::new());
    let status = status_enum(&registry);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|label| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                extend(&registry, status, &[TypeTag::Str], &[Value::str(label)])
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let values = registry.enum_values(status).unwrap();
    assert_eq!(values.len(), 4);

    // Whichever order the threads won, ordinals are distinct and dense
    let ordinals: HashSet<_> = values
        .iter()
        .map(|v| v.as_instance().unwrap().ordinal().unwrap())
        .collect();
    assert_eq!(ordinals, (0..4).collect());

    let names: HashSet<_> = values
        .iter()
        .map(|v| v.as_instance().unwrap().constant_name().unwrap())
        .collect();
    assert!(names.contains("LEFT"));
    assert!(names.contains("RIGHT"));
}

#[test]
fn test_many_guarded_extenders_lose_nothing() {
    let registry = Arc::new(ClassRegistry::new());
    let status = status_enum(&registry);
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                extend(
                    &registry,
                    status,
                    &[TypeTag::Str],
                    &[Value::str(&format!("state-{i}"))],
                )
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let values = registry.enum_values(status).unwrap();
    assert_eq!(values.len(), 2 + threads);
    let ordinals: HashSet<_> = values
        .iter()
        .map(|v| v.as_instance().unwrap().ordinal().unwrap())
        .collect();
    assert_eq!(ordinals.len(), values.len());
}

#[test]
fn test_guarded_extenders_of_different_classes_do_not_contend() {
    let registry = Arc::new(ClassRegistry::new());
    let status = status_enum(&registry);
    let level = EnumBuilder::new("Level")
        .constructor(vec![TypeTag::Str], |args| {
            Ok(ConstructedState {
                constant_name: args[0].as_str().map(str::to_string),
                fields: vec![],
            })
        })
        .constant(vec![Value::str("LOW")])
        .register(&registry)
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [(status, "extra"), (level, "HIGH")]
        .into_iter()
        .map(|(class, label)| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                extend(&registry, class, &[TypeTag::Str], &[Value::str(label)])
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(registry.enum_values(status).unwrap().len(), 3);
    assert_eq!(registry.enum_values(level).unwrap().len(), 2);
}

#[test]
fn test_unguarded_extension_is_correct_when_serialized() {
    let registry = ClassRegistry::new();
    let status = status_enum(&registry);

    extend_unguarded(&registry, status, &[TypeTag::Str], &[Value::str("a")]).unwrap();
    extend_unguarded(&registry, status, &[TypeTag::Str], &[Value::str("b")]).unwrap();

    let values = registry.enum_values(status).unwrap();
    assert_eq!(values.len(), 4);
    assert_eq!(
        values[3].as_instance().unwrap().constant_name().as_deref(),
        Some("B")
    );
    assert_eq!(values[3].as_instance().unwrap().ordinal(), Some(3));
}
