//! Forced field access
//!
//! By-name field resolution with ancestor-chain fallback, forced reads and
//! writes under scoped accessibility overrides, and the read-only bypass
//! for sealed static fields.

use std::sync::Arc;

use crate::reflect::access::{AccessOverride, ReadOnlyOverride};
use crate::reflect::policy::ReflectionPolicy;
use crate::reflect::{ReflectError, ReflectResult};
use crate::runtime::object::{Class, Visibility};
use crate::runtime::registry::ClassRegistry;
use crate::runtime::value::{ClassId, Instance, Value};

/// Resolved reference to a field
#[derive(Debug, Clone)]
pub struct FieldHandle {
    /// Declaring class (may be an ancestor of the lookup class)
    pub class_id: ClassId,
    /// Field name
    pub name: String,
    /// Instance or static, with the declaring class's member index
    pub kind: FieldKind,
}

/// Which member table a field handle points into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Instance field, by index into the declaring class's field table
    Instance {
        /// Member index
        index: usize,
    },
    /// Static field, by index into the declaring class's static table
    Static {
        /// Member index
        index: usize,
    },
}

/// Resolve a field by name, walking the ancestor chain
///
/// Returns the first declaration found, starting at `class_id` and moving
/// up through parents. Instance and static fields share the namespace.
pub fn resolve_field(
    registry: &ClassRegistry,
    class_id: ClassId,
    name: &str,
) -> ReflectResult<FieldHandle> {
    let ancestry = registry.ancestry(class_id);
    for class in &ancestry {
        if let Some((index, _)) = class.declared_field(name) {
            return Ok(FieldHandle {
                class_id: class.id,
                name: name.to_string(),
                kind: FieldKind::Instance { index },
            });
        }
        if let Some((index, _)) = class.declared_static(name) {
            return Ok(FieldHandle {
                class_id: class.id,
                name: name.to_string(),
                kind: FieldKind::Static { index },
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

/// Read an instance field, forcing access for the duration of the read
pub fn read_field(
    registry: &ClassRegistry,
    instance: &Arc<Instance>,
    handle: &FieldHandle,
) -> ReflectResult<Value> {
    let (class, index) = instance_field(registry, handle)?;
    let def = member(&class, class.field_at(index), handle)?;
    check_receiver(registry, instance, &class)?;
    check_policy(
        registry,
        def.visibility,
        ReflectionPolicy::READ_PRIVATE,
        "read of private field",
        &def.name,
    )?;

    let _access = AccessOverride::force(def.accessible_flag());
    instance.field(def.slot).ok_or_else(|| {
        ReflectError::InvocationFailure(format!(
            "field `{}` slot {} out of bounds for receiver",
            def.name, def.slot
        ))
    })
}

/// Overwrite an instance field, forcing access for the duration of the write
///
/// Final instance fields are refused: only the dedicated static bypass may
/// cross immutability.
pub fn write_field(
    registry: &ClassRegistry,
    instance: &Arc<Instance>,
    handle: &FieldHandle,
    value: Value,
) -> ReflectResult<()> {
    let (class, index) = instance_field(registry, handle)?;
    let def = member(&class, class.field_at(index), handle)?;
    check_receiver(registry, instance, &class)?;
    if def.is_final {
        return Err(ReflectError::AccessDenied(format!(
            "field `{}` of `{}` is final",
            def.name, class.name
        )));
    }
    check_policy(
        registry,
        def.visibility,
        ReflectionPolicy::WRITE_PRIVATE,
        "write of private field",
        &def.name,
    )?;

    let _access = AccessOverride::force(def.accessible_flag());
    instance
        .set_field(def.slot, value)
        .map_err(ReflectError::InvocationFailure)
}

/// Read a static field, forcing access for the duration of the read
pub fn read_static_field(registry: &ClassRegistry, handle: &FieldHandle) -> ReflectResult<Value> {
    let (class, index) = static_field(registry, handle)?;
    let def = member(&class, class.static_at(index), handle)?;
    check_policy(
        registry,
        def.visibility,
        ReflectionPolicy::READ_PRIVATE,
        "read of private static field",
        &def.name,
    )?;

    let _access = AccessOverride::force(def.accessible_flag());
    Ok(def.peek())
}

/// Overwrite a non-final static field, forcing access for the write
pub fn write_static_field(
    registry: &ClassRegistry,
    handle: &FieldHandle,
    value: Value,
) -> ReflectResult<()> {
    let (class, index) = static_field(registry, handle)?;
    let def = member(&class, class.static_at(index), handle)?;
    if def.is_final {
        return Err(ReflectError::AccessDenied(format!(
            "static field `{}` of `{}` is final; use the read-only bypass",
            def.name, class.name
        )));
    }
    check_policy(
        registry,
        def.visibility,
        ReflectionPolicy::WRITE_PRIVATE,
        "write of private static field",
        &def.name,
    )?;

    let _access = AccessOverride::force(def.accessible_flag());
    def.store(value).map_err(ReflectError::InvocationFailure)
}

/// Overwrite a static field even if it is sealed read-only
///
/// Locates the storage's internal accessor object and performs the write
/// under two nested scoped overrides: the member's accessibility flag and
/// the accessor's read-only flag, both restored on every exit path. Fails
/// loudly with `UnsupportedRuntimeInternals` when the storage exposes no
/// accessor — never a silent no-op.
pub fn write_static_field_bypassing_immutability(
    registry: &ClassRegistry,
    class_id: ClassId,
    name: &str,
    value: Value,
) -> ReflectResult<()> {
    let handle = resolve_field(registry, class_id, name)?;
    let (class, index) = static_field(registry, &handle)?;
    let def = member(&class, class.static_at(index), &handle)?;

    check_policy(
        registry,
        def.visibility,
        ReflectionPolicy::WRITE_PRIVATE,
        "write of private static field",
        &def.name,
    )?;
    if def.is_final && !registry.policy().contains(ReflectionPolicy::WRITE_FINAL) {
        return Err(ReflectError::AccessDenied(format!(
            "policy withholds WRITE_FINAL for static field `{}` of `{}`",
            def.name, class.name
        )));
    }

    let accessor = def.accessor().ok_or_else(|| {
        ReflectError::UnsupportedRuntimeInternals(format!(
            "static field `{}` of `{}` has no reflective accessor; its storage cannot be rewritten",
            def.name, class.name
        ))
    })?;

    let _access = AccessOverride::force(def.accessible_flag());
    let _read_only = ReadOnlyOverride::lift(accessor.read_only_flag());
    def.store(value).map_err(ReflectError::InvocationFailure)
}

fn declaring_class(registry: &ClassRegistry, handle: &FieldHandle) -> ReflectResult<Arc<Class>> {
    registry.get(handle.class_id).ok_or_else(|| {
        ReflectError::UnsupportedRuntimeInternals(format!(
            "handle for `{}` refers to unregistered class #{}",
            handle.name, handle.class_id
        ))
    })
}

/// Fetch a member by index off a declaring class, mapping a stale handle
/// to `UnsupportedRuntimeInternals`
fn member<'c, T>(
    class: &'c Arc<Class>,
    found: Option<&'c T>,
    handle: &FieldHandle,
) -> ReflectResult<&'c T> {
    found.ok_or_else(|| {
        ReflectError::UnsupportedRuntimeInternals(format!(
            "handle for `{}` refers to a missing member of `{}`",
            handle.name, class.name
        ))
    })
}

fn instance_field(
    registry: &ClassRegistry,
    handle: &FieldHandle,
) -> ReflectResult<(Arc<Class>, usize)> {
    let class = declaring_class(registry, handle)?;
    match handle.kind {
        FieldKind::Instance { index } => Ok((class, index)),
        FieldKind::Static { .. } => Err(ReflectError::InvocationFailure(format!(
            "field `{}` of `{}` is static; use the static accessors",
            handle.name, class.name
        ))),
    }
}

fn static_field(
    registry: &ClassRegistry,
    handle: &FieldHandle,
) -> ReflectResult<(Arc<Class>, usize)> {
    let class = declaring_class(registry, handle)?;
    match handle.kind {
        FieldKind::Static { index } => Ok((class, index)),
        FieldKind::Instance { .. } => Err(ReflectError::InvocationFailure(format!(
            "field `{}` of `{}` is an instance field; a receiver is required",
            handle.name, class.name
        ))),
    }
}

fn check_receiver(
    registry: &ClassRegistry,
    instance: &Arc<Instance>,
    declaring: &Arc<Class>,
) -> ReflectResult<()> {
    if registry.is_subclass_of(instance.class_id, declaring.id) {
        Ok(())
    } else {
        Err(ReflectError::InvocationFailure(format!(
            "receiver of class #{} is not an instance of `{}`",
            instance.class_id, declaring.name
        )))
    }
}

fn check_policy(
    registry: &ClassRegistry,
    visibility: Visibility,
    needed: ReflectionPolicy,
    what: &str,
    member: &str,
) -> ReflectResult<()> {
    if visibility == Visibility::Private && !registry.policy().contains(needed) {
        return Err(ReflectError::AccessDenied(format!(
            "policy rejects {what} `{member}`"
        )));
    }
    Ok(())
}
