//! Class metadata and member definitions
//!
//! A [`Class`] is immutable after registration except for its interior
//! mutable pieces: static slot storage, per-member accessibility flags, the
//! read-only flag on each static's accessor, and the lazily attached
//! low-level constructor accessors. Those are exactly the pieces the
//! reflection layer manipulates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::reflect::access::{ConstructorAccessor, StaticFieldAccessor};
use crate::runtime::value::{ClassId, TypeTag, Value};

/// Name of the backing constant list static on enumeration classes
pub const VALUES_FIELD: &str = "$VALUES";

/// Kind of a registered class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Ordinary class
    Object,
    /// Enumeration class: constants live in the `$VALUES` static
    Enum,
}

/// Declared member visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Visible to all callers
    Public,
    /// Requires a forced-access override to touch reflectively
    Private,
}

/// Native method body: receiver (None for static methods) plus arguments
pub type MethodFn =
    Arc<dyn Fn(Option<&Arc<crate::runtime::value::Instance>>, &[Value]) -> Result<Value, String> + Send + Sync>;

/// Native constructor body: arguments in, constructed field state out
pub type ConstructorFn = Arc<dyn Fn(&[Value]) -> Result<ConstructedState, String> + Send + Sync>;

/// What a constructor body produces
///
/// `constant_name` is the name-assignment contract for enumeration
/// constructors: the target class's own constructor decides the name of the
/// constant it builds. `fields` covers the class's declared (non-inherited)
/// field slots, in declaration order.
pub struct ConstructedState {
    /// Constant name, required when constructing enumeration instances
    pub constant_name: Option<String>,
    /// Declared field values, in declaration order
    pub fields: Vec<Value>,
}

/// Declared instance field
#[derive(Debug)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: TypeTag,
    /// Declared visibility
    pub visibility: Visibility,
    /// Whether the field is final (write-once)
    pub is_final: bool,
    /// Absolute slot index (inherited slots come first)
    pub slot: usize,
    /// Live accessibility override flag
    accessible: AtomicBool,
}

impl FieldDef {
    pub(crate) fn new(
        name: String,
        ty: TypeTag,
        visibility: Visibility,
        is_final: bool,
        slot: usize,
    ) -> Self {
        let accessible = visibility == Visibility::Public;
        Self {
            name,
            ty,
            visibility,
            is_final,
            slot,
            accessible: AtomicBool::new(accessible),
        }
    }

    /// Current state of the accessibility override flag
    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Acquire)
    }

    pub(crate) fn accessible_flag(&self) -> &AtomicBool {
        &self.accessible
    }
}

/// Declared static (class-level) field with its storage
#[derive(Debug)]
pub struct StaticField {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: TypeTag,
    /// Declared visibility
    pub visibility: Visibility,
    /// Whether the field is final after class initialization
    pub is_final: bool,
    /// Live accessibility override flag
    accessible: AtomicBool,
    /// Slot storage
    value: RwLock<Value>,
    /// Internal accessor; `None` models storage with no reflective accessor
    accessor: Option<StaticFieldAccessor>,
}

impl StaticField {
    pub(crate) fn new(
        name: String,
        ty: TypeTag,
        visibility: Visibility,
        is_final: bool,
        initial: Value,
        with_accessor: bool,
    ) -> Self {
        let accessible = visibility == Visibility::Public;
        Self {
            name,
            ty,
            visibility,
            is_final,
            accessible: AtomicBool::new(accessible),
            value: RwLock::new(initial),
            accessor: with_accessor.then(StaticFieldAccessor::new),
        }
    }

    /// Current state of the accessibility override flag
    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Acquire)
    }

    pub(crate) fn accessible_flag(&self) -> &AtomicBool {
        &self.accessible
    }

    /// The internal accessor object, if this static's storage exposes one
    pub fn accessor(&self) -> Option<&StaticFieldAccessor> {
        self.accessor.as_ref()
    }

    /// Read the slot directly (registry-internal readers)
    pub(crate) fn peek(&self) -> Value {
        self.value.read().clone()
    }

    /// Write the slot during class initialization, before sealing
    pub(crate) fn initialize(&self, value: Value) {
        *self.value.write() = value;
    }

    /// Seal the slot: from here on writes must go through the accessor
    pub(crate) fn seal(&self) {
        if let Some(acc) = &self.accessor {
            acc.set_read_only(true);
        }
    }

    /// Write the slot through the accessor-gated path
    ///
    /// Refused while the accessor's read-only flag is set; final fields
    /// whose storage has no accessor cannot be written at all.
    pub(crate) fn store(&self, value: Value) -> Result<(), String> {
        match &self.accessor {
            Some(acc) if acc.is_read_only() => Err(format!(
                "static field `{}` is read-only; its accessor flag is set",
                self.name
            )),
            Some(_) => {
                *self.value.write() = value;
                Ok(())
            }
            None if self.is_final => Err(format!(
                "static field `{}` is final and its storage exposes no accessor",
                self.name
            )),
            None => {
                *self.value.write() = value;
                Ok(())
            }
        }
    }
}

/// Declared method
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Parameter signature
    pub params: Vec<TypeTag>,
    /// Declared visibility
    pub visibility: Visibility,
    /// Whether the method is static (no receiver)
    pub is_static: bool,
    /// Live accessibility override flag
    accessible: AtomicBool,
    body: MethodFn,
}

impl MethodDef {
    pub(crate) fn new(
        name: String,
        params: Vec<TypeTag>,
        visibility: Visibility,
        is_static: bool,
        body: MethodFn,
    ) -> Self {
        let accessible = visibility == Visibility::Public;
        Self {
            name,
            params,
            visibility,
            is_static,
            accessible: AtomicBool::new(accessible),
            body,
        }
    }

    /// Current state of the accessibility override flag
    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Acquire)
    }

    pub(crate) fn accessible_flag(&self) -> &AtomicBool {
        &self.accessible
    }

    pub(crate) fn body(&self) -> &MethodFn {
        &self.body
    }
}

/// Declared constructor
pub struct ConstructorDef {
    /// Parameter signature
    pub params: Vec<TypeTag>,
    /// Declared visibility
    pub visibility: Visibility,
    /// Live accessibility override flag
    accessible: AtomicBool,
    body: ConstructorFn,
    /// Lazily attached low-level accessor
    accessor: OnceCell<Arc<ConstructorAccessor>>,
}

impl ConstructorDef {
    pub(crate) fn new(params: Vec<TypeTag>, visibility: Visibility, body: ConstructorFn) -> Self {
        let accessible = visibility == Visibility::Public;
        Self {
            params,
            visibility,
            accessible: AtomicBool::new(accessible),
            body,
            accessor: OnceCell::new(),
        }
    }

    /// Current state of the accessibility override flag
    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Acquire)
    }

    pub(crate) fn accessible_flag(&self) -> &AtomicBool {
        &self.accessible
    }

    pub(crate) fn body(&self) -> &ConstructorFn {
        &self.body
    }

    /// The cached low-level accessor, if one has been attached
    pub fn constructor_accessor(&self) -> Option<Arc<ConstructorAccessor>> {
        self.accessor.get().cloned()
    }

    /// Attach the low-level accessor if none is cached yet
    pub(crate) fn acquire_constructor_accessor(&self, class_id: ClassId, index: usize) {
        self.accessor
            .get_or_init(|| Arc::new(ConstructorAccessor::new(class_id, index)));
    }
}

/// Class definition metadata
pub struct Class {
    /// Class ID (index into the registry)
    pub id: ClassId,
    /// Class name
    pub name: String,
    /// Parent class ID (None for root classes)
    pub parent_id: Option<ClassId>,
    /// Whether this is an ordinary class or an enumeration class
    pub kind: ClassKind,
    /// Total instance field slots, including inherited
    pub field_count: usize,
    fields: Vec<FieldDef>,
    field_indices: FxHashMap<String, usize>,
    statics: Vec<StaticField>,
    static_indices: FxHashMap<String, usize>,
    methods: Vec<MethodDef>,
    constructors: Vec<ConstructorDef>,
}

impl Class {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ClassId,
        name: String,
        parent_id: Option<ClassId>,
        kind: ClassKind,
        inherited_slots: usize,
        fields: Vec<FieldDef>,
        statics: Vec<StaticField>,
        methods: Vec<MethodDef>,
        constructors: Vec<ConstructorDef>,
    ) -> Self {
        let field_indices = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        let static_indices = statics
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        let field_count = inherited_slots + fields.len();
        Self {
            id,
            name,
            parent_id,
            kind,
            field_count,
            fields,
            field_indices,
            statics,
            static_indices,
            methods,
            constructors,
        }
    }

    /// Whether this is an enumeration class
    pub fn is_enum(&self) -> bool {
        self.kind == ClassKind::Enum
    }

    /// First slot index of fields declared on this class
    pub fn field_base(&self) -> usize {
        self.field_count - self.fields.len()
    }

    /// Look up an instance field declared on this class (no ancestor walk)
    pub fn declared_field(&self, name: &str) -> Option<(usize, &FieldDef)> {
        let index = *self.field_indices.get(name)?;
        Some((index, &self.fields[index]))
    }

    /// Look up a static field declared on this class (no ancestor walk)
    pub fn declared_static(&self, name: &str) -> Option<(usize, &StaticField)> {
        let index = *self.static_indices.get(name)?;
        Some((index, &self.statics[index]))
    }

    /// Instance field by index
    pub fn field_at(&self, index: usize) -> Option<&FieldDef> {
        self.fields.get(index)
    }

    /// Static field by index
    pub fn static_at(&self, index: usize) -> Option<&StaticField> {
        self.statics.get(index)
    }

    /// All statics declared on this class
    pub fn statics(&self) -> &[StaticField] {
        &self.statics
    }

    /// Method by index
    pub fn method_at(&self, index: usize) -> Option<&MethodDef> {
        self.methods.get(index)
    }

    /// Constructor by index
    pub fn constructor_at(&self, index: usize) -> Option<&ConstructorDef> {
        self.constructors.get(index)
    }

    /// Find a method declared on this class by name and exact signature
    pub fn find_method(&self, name: &str, params: &[TypeTag]) -> Option<usize> {
        self.methods
            .iter()
            .position(|m| m.name == name && m.params == params)
    }

    /// Find a constructor declared on this class by exact signature
    pub fn find_constructor(&self, params: &[TypeTag]) -> Option<usize> {
        self.constructors.iter().position(|c| c.params == params)
    }

    /// Number of declared instance fields
    pub fn declared_field_count(&self) -> usize {
        self.fields.len()
    }
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent_id", &self.parent_id)
            .field("kind", &self.kind)
            .field("field_count", &self.field_count)
            .finish()
    }
}
