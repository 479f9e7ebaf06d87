//! Forced method invocation
//!
//! Same by-name resolution with ancestor fallback and scoped forced-access
//! pattern as field access, for behavior invocation rather than state.

use std::sync::Arc;

use crate::reflect::access::AccessOverride;
use crate::reflect::policy::ReflectionPolicy;
use crate::reflect::{ReflectError, ReflectResult};
use crate::runtime::object::Visibility;
use crate::runtime::registry::ClassRegistry;
use crate::runtime::value::{ClassId, Instance, TypeTag, Value};

/// Resolved reference to a method
#[derive(Debug, Clone)]
pub struct MethodHandle {
    /// Declaring class (may be an ancestor of the lookup class)
    pub class_id: ClassId,
    /// Method name
    pub name: String,
    /// Index into the declaring class's method table
    pub index: usize,
}

/// Resolve a method by name and exact parameter signature, walking the
/// ancestor chain
pub fn resolve_method(
    registry: &ClassRegistry,
    class_id: ClassId,
    name: &str,
    params: &[TypeTag],
) -> ReflectResult<MethodHandle> {
    let ancestry = registry.ancestry(class_id);
    for class in &ancestry {
        if let Some(index) = class.find_method(name, params) {
            return Ok(MethodHandle {
                class_id: class.id,
                name: name.to_string(),
                index,
            });
        }
    }
    Err(ReflectError::MemberNotFound {
        class: ancestry
            .first()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("#{class_id}")),
        member: name.to_string(),
    })
}

/// Invoke a method, forcing access for the duration of the call
///
/// `receiver` is required for instance methods and ignored for static
/// methods. A body error maps to `InvocationFailure`.
pub fn invoke_method(
    registry: &ClassRegistry,
    receiver: Option<&Arc<Instance>>,
    handle: &MethodHandle,
    args: &[Value],
) -> ReflectResult<Value> {
    let class = registry.get(handle.class_id).ok_or_else(|| {
        ReflectError::UnsupportedRuntimeInternals(format!(
            "handle for `{}` refers to unregistered class #{}",
            handle.name, handle.class_id
        ))
    })?;
    let def = class.method_at(handle.index).ok_or_else(|| {
        ReflectError::UnsupportedRuntimeInternals(format!(
            "handle for `{}` refers to a missing method of `{}`",
            handle.name, class.name
        ))
    })?;

    if def.visibility == Visibility::Private
        && !registry.policy().contains(ReflectionPolicy::INVOKE_PRIVATE)
    {
        return Err(ReflectError::AccessDenied(format!(
            "policy rejects invocation of private method `{}`",
            def.name
        )));
    }
    if args.len() != def.params.len() {
        return Err(ReflectError::InvocationFailure(format!(
            "method `{}` takes {} arguments, {} given",
            def.name,
            def.params.len(),
            args.len()
        )));
    }

    let receiver = if def.is_static {
        None
    } else {
        let recv = receiver.ok_or_else(|| {
            ReflectError::InvocationFailure(format!(
                "method `{}` requires a receiver",
                def.name
            ))
        })?;
        if !registry.is_subclass_of(recv.class_id, class.id) {
            return Err(ReflectError::InvocationFailure(format!(
                "receiver of class #{} is not an instance of `{}`",
                recv.class_id, class.name
            )));
        }
        Some(recv)
    };

    let _access = AccessOverride::force(def.accessible_flag());
    (def.body())(receiver, args).map_err(ReflectError::InvocationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::builder::{ClassBuilder, EnumBuilder, MethodSpec};
    use crate::runtime::object::ConstructedState;

    fn color_enum(registry: &ClassRegistry) -> ClassId {
        EnumBuilder::new("Color")
            .constructor(vec![TypeTag::Str], |args| {
                Ok(ConstructedState {
                    constant_name: args[0].as_str().map(str::to_string),
                    fields: vec![],
                })
            })
            .constant(vec![Value::str("RED")])
            .constant(vec![Value::str("GREEN")])
            .register(registry)
            .unwrap()
    }

    #[test]
    fn test_inherited_methods_resolve_and_invoke() {
        let registry = ClassRegistry::new();
        let id = color_enum(&registry);
        let green = registry.enum_values(id).unwrap()[1]
            .as_instance()
            .unwrap()
            .clone();

        // name() and ordinal() are declared on the implicit Enum base
        let name = resolve_method(&registry, id, "name", &[]).unwrap();
        assert_eq!(name.class_id, registry.enum_base_id());
        assert_eq!(
            invoke_method(&registry, Some(&green), &name, &[]).unwrap(),
            Value::str("GREEN")
        );

        let ordinal = resolve_method(&registry, id, "ordinal", &[]).unwrap();
        assert_eq!(
            invoke_method(&registry, Some(&green), &ordinal, &[]).unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn test_unknown_method_is_member_not_found() {
        let registry = ClassRegistry::new();
        let id = color_enum(&registry);
        let err = resolve_method(&registry, id, "luminance", &[]).unwrap_err();
        assert!(matches!(err, ReflectError::MemberNotFound { .. }));

        // Known name, wrong signature
        let err = resolve_method(&registry, id, "name", &[TypeTag::Int]).unwrap_err();
        assert!(matches!(err, ReflectError::MemberNotFound { .. }));
    }

    #[test]
    fn test_private_method_forced_then_restored() {
        let registry = ClassRegistry::new();
        let id = ClassBuilder::new("Widget")
            .method(
                MethodSpec::new("area", vec![], |_recv, _args| Ok(Value::Int(42))).as_private().as_static(),
            )
            .register(&registry)
            .unwrap();
        let class = registry.get(id).unwrap();

        let handle = resolve_method(&registry, id, "area", &[]).unwrap();
        assert_eq!(
            invoke_method(&registry, None, &handle, &[]).unwrap(),
            Value::Int(42)
        );
        assert!(!class.method_at(handle.index).unwrap().is_accessible());

        registry.set_policy(ReflectionPolicy::ALL.difference(ReflectionPolicy::INVOKE_PRIVATE));
        let err = invoke_method(&registry, None, &handle, &[]).unwrap_err();
        assert!(matches!(err, ReflectError::AccessDenied(_)));
    }

    #[test]
    fn test_receiver_required_for_instance_methods() {
        let registry = ClassRegistry::new();
        let id = color_enum(&registry);
        let handle = resolve_method(&registry, id, "name", &[]).unwrap();
        let err = invoke_method(&registry, None, &handle, &[]).unwrap_err();
        assert!(matches!(err, ReflectError::InvocationFailure(_)));
    }

    #[test]
    fn test_arity_mismatch() {
        let registry = ClassRegistry::new();
        let id = color_enum(&registry);
        let red = registry.enum_values(id).unwrap()[0]
            .as_instance()
            .unwrap()
            .clone();
        let handle = resolve_method(&registry, id, "name", &[]).unwrap();
        let err = invoke_method(&registry, Some(&red), &handle, &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, ReflectError::InvocationFailure(_)));
    }
}
