//! Forced constructor invocation
//!
//! The high-level path refuses enumeration classes, mirroring hosts that
//! forbid reflective creation of enum constants. The bypass path reaches
//! for the constructor's low-level accessor — lazily attached and cached on
//! the constructor metadata — and invokes it directly, skipping that
//! restriction. The enumeration extender is built on the bypass.

use std::sync::Arc;

use crate::reflect::access::{AccessOverride, ConstructorAccessor};
use crate::reflect::policy::ReflectionPolicy;
use crate::reflect::{ReflectError, ReflectResult};
use crate::runtime::object::{Class, ConstructorDef, Visibility};
use crate::runtime::registry::ClassRegistry;
use crate::runtime::value::{ClassId, Instance, TypeTag, Value};

/// Resolved reference to a constructor
#[derive(Debug, Clone)]
pub struct ConstructorHandle {
    /// Declaring class
    pub class_id: ClassId,
    /// Index into the declaring class's constructor table
    pub index: usize,
}

/// Resolve a constructor by exact parameter signature
///
/// Constructors are not inherited: only the class's own declarations are
/// searched.
pub fn resolve_constructor(
    registry: &ClassRegistry,
    class_id: ClassId,
    params: &[TypeTag],
) -> ReflectResult<ConstructorHandle> {
    let class = registry.get(class_id).ok_or_else(|| ReflectError::MemberNotFound {
        class: format!("#{class_id}"),
        member: "<init>".to_string(),
    })?;
    let index = class
        .find_constructor(params)
        .ok_or_else(|| ReflectError::MemberNotFound {
            class: class.name.clone(),
            member: format!("<init>({params:?})"),
        })?;
    Ok(ConstructorHandle { class_id, index })
}

/// Instantiate through a constructor, forcing access for the call
///
/// Refuses enumeration classes: their constants may only be created
/// through [`invoke_enum_constructor`].
pub fn invoke_constructor(
    registry: &ClassRegistry,
    handle: &ConstructorHandle,
    args: &[Value],
) -> ReflectResult<Arc<Instance>> {
    let (class, _) = constructor(registry, handle)?;
    if class.is_enum() {
        return Err(ReflectError::InvocationFailure(format!(
            "cannot create constants of enumeration `{}` through normal instantiation",
            class.name
        )));
    }
    invoke_through_accessor(registry, &class, handle, args)
}

/// Instantiate through the low-level constructor accessor, bypassing the
/// enumeration instantiation restriction
///
/// Checks whether an accessor is already cached on the constructor; if
/// not, triggers its lazy attachment and re-reads it, then invokes it
/// directly with the supplied arguments.
pub fn invoke_enum_constructor(
    registry: &ClassRegistry,
    handle: &ConstructorHandle,
    args: &[Value],
) -> ReflectResult<Arc<Instance>> {
    let (class, _) = constructor(registry, handle)?;
    invoke_through_accessor(registry, &class, handle, args)
}

fn invoke_through_accessor(
    registry: &ClassRegistry,
    class: &Arc<Class>,
    handle: &ConstructorHandle,
    args: &[Value],
) -> ReflectResult<Arc<Instance>> {
    check_constructor_policy(registry, class, handle)?;

    let def: &ConstructorDef = class.constructor_at(handle.index).ok_or_else(|| {
        ReflectError::UnsupportedRuntimeInternals(format!(
            "constructor #{} of `{}` disappeared",
            handle.index, class.name
        ))
    })?;
    if args.len() != def.params.len() {
        return Err(ReflectError::InvocationFailure(format!(
            "constructor of `{}` takes {} arguments, {} given",
            class.name,
            def.params.len(),
            args.len()
        )));
    }

    let _access = AccessOverride::force(def.accessible_flag());
    let accessor = cached_or_acquired_accessor(def, handle)?;
    accessor.new_instance(registry, args)
}

/// Read the cached accessor, attaching one first if none is present
fn cached_or_acquired_accessor(
    def: &ConstructorDef,
    handle: &ConstructorHandle,
) -> ReflectResult<Arc<ConstructorAccessor>> {
    if let Some(accessor) = def.constructor_accessor() {
        return Ok(accessor);
    }
    def.acquire_constructor_accessor(handle.class_id, handle.index);
    def.constructor_accessor().ok_or_else(|| {
        ReflectError::UnsupportedRuntimeInternals(
            "constructor accessor missing after acquisition".to_string(),
        )
    })
}

fn constructor(
    registry: &ClassRegistry,
    handle: &ConstructorHandle,
) -> ReflectResult<(Arc<Class>, usize)> {
    let class = registry.get(handle.class_id).ok_or_else(|| {
        ReflectError::UnsupportedRuntimeInternals(format!(
            "constructor handle refers to unregistered class #{}",
            handle.class_id
        ))
    })?;
    if class.constructor_at(handle.index).is_none() {
        return Err(ReflectError::UnsupportedRuntimeInternals(format!(
            "constructor handle refers to a missing constructor of `{}`",
            class.name
        )));
    }
    Ok((class, handle.index))
}

fn check_constructor_policy(
    registry: &ClassRegistry,
    class: &Arc<Class>,
    handle: &ConstructorHandle,
) -> ReflectResult<()> {
    let policy = registry.policy();
    if !policy.contains(ReflectionPolicy::CREATE_INSTANCES) {
        return Err(ReflectError::AccessDenied(format!(
            "policy rejects forced instantiation of `{}`",
            class.name
        )));
    }
    let private = class
        .constructor_at(handle.index)
        .map(|c| c.visibility == Visibility::Private)
        .unwrap_or(false);
    if private && !policy.contains(ReflectionPolicy::INVOKE_PRIVATE) {
        return Err(ReflectError::AccessDenied(format!(
            "policy rejects invocation of a private constructor of `{}`",
            class.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::builder::{ClassBuilder, EnumBuilder, FieldSpec};
    use crate::runtime::object::ConstructedState;

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
            .register(registry)
            .unwrap()
    }

    #[test]
    fn test_resolve_unknown_signature() {
        let registry = ClassRegistry::new();
        let id = status_enum(&registry);
        let err = resolve_constructor(&registry, id, &[TypeTag::Int]).unwrap_err();
        assert!(matches!(err, ReflectError::MemberNotFound { .. }));
    }

    #[test]
    fn test_normal_instantiation_of_enum_refused() {
        let registry = ClassRegistry::new();
        let id = status_enum(&registry);
        let handle = resolve_constructor(&registry, id, &[TypeTag::Str]).unwrap();
        let err = invoke_constructor(&registry, &handle, &[Value::str("x")]).unwrap_err();
        assert!(matches!(err, ReflectError::InvocationFailure(_)));
    }

    #[test]
    fn test_bypass_constructs_enum_instance() {
        let registry = ClassRegistry::new();
        let id = status_enum(&registry);
        let handle = resolve_constructor(&registry, id, &[TypeTag::Str]).unwrap();

        let inst = invoke_enum_constructor(&registry, &handle, &[Value::str("archived")]).unwrap();
        assert_eq!(inst.constant_name().as_deref(), Some("ARCHIVED"));
        // Ordinal is the next unused one; the constant is not yet published
        assert_eq!(inst.ordinal(), Some(1));
        assert_eq!(registry.enum_values(id).unwrap().len(), 1);
    }

    #[test]
    fn test_accessor_cached_across_invocations() {
        let registry = ClassRegistry::new();
        let id = status_enum(&registry);
        let handle = resolve_constructor(&registry, id, &[TypeTag::Str]).unwrap();
        let class = registry.get(id).unwrap();
        let def = class.constructor_at(handle.index).unwrap();

        // Initialization of the ACTIVE constant already attached one
        let first = def.constructor_accessor().unwrap();
        invoke_enum_constructor(&registry, &handle, &[Value::str("a")]).unwrap();
        let second = def.constructor_accessor().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_plain_class_instantiation() {
        let registry = ClassRegistry::new();
        let id = ClassBuilder::new("Pair")
            .field(FieldSpec::new("a", TypeTag::Int))
            .field(FieldSpec::new("b", TypeTag::Int))
            .constructor(vec![TypeTag::Int, TypeTag::Int], |args| {
                Ok(ConstructedState {
                    constant_name: None,
                    fields: vec![args[0].clone(), args[1].clone()],
                })
            })
            .register(&registry)
            .unwrap();

        let handle = resolve_constructor(&registry, id, &[TypeTag::Int, TypeTag::Int]).unwrap();
        let inst = invoke_constructor(&registry, &handle, &[Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(inst.field(0), Some(Value::Int(1)));
        assert_eq!(inst.field(1), Some(Value::Int(2)));
    }

    #[test]
    fn test_constructor_body_error_maps_to_invocation_failure() {
        let registry = ClassRegistry::new();
        let id = status_enum(&registry);
        let handle = resolve_constructor(&registry, id, &[TypeTag::Str]).unwrap();
        // Arity matches, so the body runs and rejects the non-string label
        let err = invoke_enum_constructor(&registry, &handle, &[Value::Int(7)]).unwrap_err();
        assert!(matches!(err, ReflectError::InvocationFailure(_)));
    }

    #[test]
    fn test_policy_gates_forced_instantiation() {
        let registry = ClassRegistry::new();
        let id = status_enum(&registry);
        let handle = resolve_constructor(&registry, id, &[TypeTag::Str]).unwrap();

        registry.set_policy(ReflectionPolicy::ALL.difference(ReflectionPolicy::CREATE_INSTANCES));
        let err = invoke_enum_constructor(&registry, &handle, &[Value::str("x")]).unwrap_err();
        assert!(matches!(err, ReflectError::AccessDenied(_)));

        registry.set_policy(ReflectionPolicy::ALL.difference(ReflectionPolicy::INVOKE_PRIVATE));
        let err = invoke_enum_constructor(&registry, &handle, &[Value::str("x")]).unwrap_err();
        assert!(matches!(err, ReflectError::AccessDenied(_)));
    }
}
