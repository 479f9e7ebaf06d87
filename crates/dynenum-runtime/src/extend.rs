//! Enumeration extender
//!
//! Appends exactly one new constant to an enumeration class's backing
//! `$VALUES` list: read the current list, build a one-longer copy off to
//! the side, construct the new instance through the low-level constructor
//! accessor, and publish the new list through the read-only bypass write.
//!
//! Because the new list is assembled aside and swapped in as the last
//! step, any failure leaves the live list untouched: callers observe
//! either the full extension or nothing.

use crate::reflect::{
    invoke_enum_constructor, read_static_field, resolve_constructor, resolve_field,
    write_static_field_bypassing_immutability, ReflectError, ReflectResult,
};
use crate::runtime::object::VALUES_FIELD;
use crate::runtime::registry::ClassRegistry;
use crate::runtime::value::{ClassId, TypeTag, Value};

/// Append one constant to an enumeration class, serialized per class
///
/// Holds the class's extension lock across the whole read-modify-publish
/// sequence, so concurrent extensions of the same class cannot lose each
/// other's appends. The lock is released on every exit path.
///
/// Explicitly not idempotent: calling twice with identical arguments
/// appends two distinct constants.
pub fn extend(
    registry: &ClassRegistry,
    class_id: ClassId,
    params: &[TypeTag],
    args: &[Value],
) -> ReflectResult<()> {
    let lock = registry.extension_lock(class_id);
    let _guard = lock.lock();
    extend_sequence(registry, class_id, params, args)
}

/// Append one constant without the per-class extension lock
///
/// Exposes the documented lost-update hazard: two unguarded extenders can
/// both read the same old `$VALUES`, each build an independent one-longer
/// copy, and the second publish silently overwrites the first — one
/// successfully constructed constant disappears. Use [`extend`] unless
/// every extension of the class is serialized externally.
pub fn extend_unguarded(
    registry: &ClassRegistry,
    class_id: ClassId,
    params: &[TypeTag],
    args: &[Value],
) -> ReflectResult<()> {
    extend_sequence(registry, class_id, params, args)
}

/// The read-modify-publish sequence shared by both entry points
fn extend_sequence(
    registry: &ClassRegistry,
    class_id: ClassId,
    params: &[TypeTag],
    args: &[Value],
) -> ReflectResult<()> {
    let class = registry
        .get(class_id)
        .ok_or_else(|| ReflectError::MemberNotFound {
            class: format!("#{class_id}"),
            member: VALUES_FIELD.to_string(),
        })?;
    if !class.is_enum() {
        return Err(ReflectError::InvocationFailure(format!(
            "`{}` is not an enumeration class",
            class.name
        )));
    }

    // 1. Read the current backing list through the facility
    let values_handle = resolve_field(registry, class_id, VALUES_FIELD)?;
    let current = read_static_field(registry, &values_handle)?;
    let old = current.as_list().ok_or_else(|| {
        ReflectError::UnsupportedRuntimeInternals(format!(
            "`{}` of `{}` does not hold a list",
            VALUES_FIELD, class.name
        ))
    })?;

    // 2. One-longer copy, existing elements in order
    let mut items = Vec::with_capacity(old.len() + 1);
    items.extend(old.iter().cloned());

    // 3. Construct the new instance through the bypass path
    let ctor = resolve_constructor(registry, class_id, params)?;
    let instance = invoke_enum_constructor(registry, &ctor, args)?;

    // 4. Place it at the final position
    items.push(Value::Instance(instance));

    // 5. Publish; a single list swap under the slot's lock
    write_static_field_bypassing_immutability(registry, class_id, VALUES_FIELD, Value::list(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::builder::{EnumBuilder, FieldSpec};
    use crate::runtime::object::ConstructedState;
    use std::sync::Arc;

    fn status_enum(registry: &ClassRegistry) -> ClassId {
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
    fn test_extend_appends_at_end() {
        let registry = ClassRegistry::new();
        let id = status_enum(&registry);
        let before = registry.enum_values(id).unwrap();

        extend(&registry, id, &[TypeTag::Str], &[Value::str("archived")]).unwrap();

        let after = registry.enum_values(id).unwrap();
        assert_eq!(after.len(), before.len() + 1);
        // Prior elements keep their identity
        for (old, new) in before.iter().zip(after.iter()) {
            assert_eq!(old, new);
        }
        let added = after[2].as_instance().unwrap();
        assert_eq!(added.constant_name().as_deref(), Some("ARCHIVED"));
        assert_eq!(added.ordinal(), Some(2));
    }

    #[test]
    fn test_extend_is_not_idempotent() {
        let registry = ClassRegistry::new();
        let id = status_enum(&registry);

        extend(&registry, id, &[TypeTag::Str], &[Value::str("archived")]).unwrap();
        extend(&registry, id, &[TypeTag::Str], &[Value::str("archived")]).unwrap();

        let values = registry.enum_values(id).unwrap();
        assert_eq!(values.len(), 4);
        let a = values[2].as_instance().unwrap();
        let b = values[3].as_instance().unwrap();
        assert_eq!(a.constant_name(), b.constant_name());
        assert_ne!(a.object_id, b.object_id);
        assert_eq!(b.ordinal(), Some(3));
    }

    #[test]
    fn test_unknown_signature_leaves_no_trace() {
        let registry = ClassRegistry::new();
        let id = status_enum(&registry);
        let before = registry.enum_values(id).unwrap();

        let err = extend(&registry, id, &[TypeTag::Int], &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, ReflectError::MemberNotFound { .. }));

        let after = registry.enum_values(id).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_extend_refuses_non_enum() {
        let registry = ClassRegistry::new();
        let err = extend(
            &registry,
            registry.enum_base_id(),
            &[],
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, ReflectError::InvocationFailure(_)));
    }

    #[test]
    fn test_manual_interleaving_loses_one_update() {
        // The documented unguarded race, replayed deterministically: both
        // extenders read the same old list before either publishes.
        let registry = ClassRegistry::new();
        let id = status_enum(&registry);
        let handle = resolve_field(&registry, id, VALUES_FIELD).unwrap();
        let ctor = resolve_constructor(&registry, id, &[TypeTag::Str]).unwrap();

        let old = read_static_field(&registry, &handle).unwrap();
        let old = old.as_list().unwrap();

        let mut first = old.as_ref().clone();
        let mut second = old.as_ref().clone();
        first.push(Value::Instance(
            invoke_enum_constructor(&registry, &ctor, &[Value::str("left")]).unwrap(),
        ));
        second.push(Value::Instance(
            invoke_enum_constructor(&registry, &ctor, &[Value::str("right")]).unwrap(),
        ));

        write_static_field_bypassing_immutability(&registry, id, VALUES_FIELD, Value::list(first))
            .unwrap();
        write_static_field_bypassing_immutability(&registry, id, VALUES_FIELD, Value::list(second))
            .unwrap();

        // Both constructions succeeded, but only the second publish survived
        let values = registry.enum_values(id).unwrap();
        assert_eq!(values.len(), old.len() + 1);
        let last = values.last().unwrap().as_instance().unwrap();
        assert_eq!(last.constant_name().as_deref(), Some("RIGHT"));
    }
}
