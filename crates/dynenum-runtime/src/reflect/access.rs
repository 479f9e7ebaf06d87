//! Scoped access overrides and low-level member accessors
//!
//! Every forced access in this crate goes through a guard from this module.
//! The guards are RAII: the flag they flip is restored to its previous
//! state when the guard drops, on every exit path including panics, so a
//! failed operation can never leave class metadata more permissive than it
//! found it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::reflect::{ReflectError, ReflectResult};
use crate::runtime::object::{ClassKind, VALUES_FIELD};
use crate::runtime::registry::ClassRegistry;
use crate::runtime::value::{ClassId, Instance, Value, ENUM_NAME_SLOT, ENUM_ORDINAL_SLOT};

/// Scoped accessibility override on a member's `accessible` flag
///
/// Forces the flag to `true` for the guard's lifetime and restores the
/// previous state on drop.
pub struct AccessOverride<'a> {
    flag: &'a AtomicBool,
    previous: bool,
}

impl<'a> AccessOverride<'a> {
    /// Force the member accessible, remembering its previous state
    pub(crate) fn force(flag: &'a AtomicBool) -> Self {
        let previous = flag.swap(true, Ordering::AcqRel);
        Self { flag, previous }
    }
}

impl Drop for AccessOverride<'_> {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::Release);
    }
}

/// Scoped override on a static accessor's `read_only` flag
///
/// Lifts the flag (sets it to writable) for the guard's lifetime and
/// restores the previous state on drop. Nested beneath an
/// [`AccessOverride`] by the read-only bypass write path.
pub struct ReadOnlyOverride<'a> {
    flag: &'a AtomicBool,
    previous: bool,
}

impl<'a> ReadOnlyOverride<'a> {
    /// Make the accessor writable, remembering its previous state
    pub(crate) fn lift(flag: &'a AtomicBool) -> Self {
        let previous = flag.swap(false, Ordering::AcqRel);
        Self { flag, previous }
    }
}

impl Drop for ReadOnlyOverride<'_> {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::Release);
    }
}

/// Internal accessor object attached to a static field's storage
///
/// Owns the `read_only` flag that gates writes to the slot after class
/// initialization seals it. The bypass write path locates this object,
/// lifts the flag under a [`ReadOnlyOverride`], writes, and restores.
#[derive(Debug)]
pub struct StaticFieldAccessor {
    read_only: AtomicBool,
}

impl StaticFieldAccessor {
    pub(crate) fn new() -> Self {
        Self {
            read_only: AtomicBool::new(false),
        }
    }

    /// Current state of the read-only flag
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    pub(crate) fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
    }

    pub(crate) fn read_only_flag(&self) -> &AtomicBool {
        &self.read_only
    }
}

/// Low-level constructor accessor
///
/// Invokes a constructor body and assembles the instance directly, without
/// the visibility and enum-instantiation checks of the high-level path.
/// Attached lazily to a [`ConstructorDef`](crate::runtime::object::ConstructorDef)
/// and cached there for reuse.
#[derive(Debug)]
pub struct ConstructorAccessor {
    class_id: ClassId,
    index: usize,
}

impl ConstructorAccessor {
    pub(crate) fn new(class_id: ClassId, index: usize) -> Self {
        Self { class_id, index }
    }

    /// Class whose constructor this accessor invokes
    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    /// Run the constructor body and assemble the instance
    ///
    /// For enumeration classes the constructor body must assign a constant
    /// name, and the accessor fills the inherited slots: the assigned name
    /// and the next unused ordinal (the current `$VALUES` length).
    pub fn new_instance(
        &self,
        registry: &ClassRegistry,
        args: &[Value],
    ) -> ReflectResult<Arc<Instance>> {
        let class = registry.get(self.class_id).ok_or_else(|| {
            ReflectError::UnsupportedRuntimeInternals(format!(
                "constructor accessor refers to unregistered class #{}",
                self.class_id
            ))
        })?;
        let ctor = class.constructor_at(self.index).ok_or_else(|| {
            ReflectError::UnsupportedRuntimeInternals(format!(
                "constructor accessor refers to missing constructor #{} of `{}`",
                self.index, class.name
            ))
        })?;

        let state = (ctor.body())(args).map_err(ReflectError::InvocationFailure)?;
        if state.fields.len() != class.declared_field_count() {
            return Err(ReflectError::InvocationFailure(format!(
                "constructor of `{}` produced {} field values, class declares {}",
                class.name,
                state.fields.len(),
                class.declared_field_count()
            )));
        }

        let mut slots = vec![Value::Null; class.field_count];
        if class.kind == ClassKind::Enum {
            let name = state.constant_name.ok_or_else(|| {
                ReflectError::InvocationFailure(format!(
                    "constructor of enumeration `{}` assigned no constant name",
                    class.name
                ))
            })?;
            let (_, values) = class.declared_static(VALUES_FIELD).ok_or_else(|| {
                ReflectError::UnsupportedRuntimeInternals(format!(
                    "enumeration `{}` has no `{}` storage",
                    class.name, VALUES_FIELD
                ))
            })?;
            let ordinal = values
                .peek()
                .as_list()
                .map(|items| items.len())
                .ok_or_else(|| {
                    ReflectError::UnsupportedRuntimeInternals(format!(
                        "`{}` of enumeration `{}` does not hold a list",
                        VALUES_FIELD, class.name
                    ))
                })?;
            slots[ENUM_NAME_SLOT] = Value::str(&name);
            slots[ENUM_ORDINAL_SLOT] = Value::Int(ordinal as i64);
        }

        let base = class.field_base();
        for (offset, value) in state.fields.into_iter().enumerate() {
            slots[base + offset] = value;
        }

        Ok(Arc::new(Instance::with_fields(class.id, slots)))
    }
}
