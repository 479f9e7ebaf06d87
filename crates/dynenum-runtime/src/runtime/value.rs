//! Runtime value representation and heap instances
//!
//! Values are plain tagged data rather than a packed encoding: nothing in
//! this runtime is hot enough to justify bit-level tricks, and identity
//! semantics fall out of `Arc` sharing for free.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Class ID (index into the class registry)
pub type ClassId = usize;

/// Slot index of the inherited `name` field on enumeration instances
pub const ENUM_NAME_SLOT: usize = 0;
/// Slot index of the inherited `ordinal` field on enumeration instances
pub const ENUM_ORDINAL_SLOT: usize = 1;

/// Global counter for generating unique object IDs
static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a new unique object ID
fn generate_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Type descriptor used in field declarations and call signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// Boolean
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// Immutable string
    Str,
    /// Immutable list
    List,
    /// Instance of a registered class
    Class(ClassId),
}

/// Dynamic runtime value
///
/// Lists are immutable snapshots: replacing a `List` stored in a static
/// slot is a single value swap, never an in-place edit. Instances compare
/// by pointer identity.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absence of a value
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// Immutable string
    Str(Arc<str>),
    /// Immutable list of values
    List(Arc<Vec<Value>>),
    /// Heap instance of a registered class
    Instance(Arc<Instance>),
}

impl Value {
    /// Create a string value
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    /// Create a list value from a vector
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    /// Whether this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Interpret as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Interpret as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Interpret as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret as a list
    pub fn as_list(&self) -> Option<&Arc<Vec<Value>>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Interpret as an instance
    pub fn as_instance(&self) -> Option<&Arc<Instance>> {
        match self {
            Value::Instance(inst) => Some(inst),
            _ => None,
        }
    }

    /// The type tag this value matches in a signature, if any
    ///
    /// `Null` matches no tag; signatures are resolved from concrete values.
    pub fn type_tag(&self) -> Option<TypeTag> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(TypeTag::Bool),
            Value::Int(_) => Some(TypeTag::Int),
            Value::Float(_) => Some(TypeTag::Float),
            Value::Str(_) => Some(TypeTag::Str),
            Value::List(_) => Some(TypeTag::List),
            Value::Instance(inst) => Some(TypeTag::Class(inst.class_id)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // Instances have identity, not structure
            (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Heap-allocated instance of a registered class
///
/// Field slots are ordered inherited-first: for enumeration classes, slot 0
/// holds the constant name and slot 1 the ordinal (both inherited from the
/// implicit `Enum` base class), followed by declared payload fields.
#[derive(Debug)]
pub struct Instance {
    /// Unique object ID (assigned on creation)
    pub object_id: u64,
    /// Class this is an instance of
    pub class_id: ClassId,
    /// Field slot storage
    fields: Vec<RwLock<Value>>,
}

impl Instance {
    /// Create an instance with the given field slot values
    pub(crate) fn with_fields(class_id: ClassId, fields: Vec<Value>) -> Self {
        Self {
            object_id: generate_object_id(),
            class_id,
            fields: fields.into_iter().map(RwLock::new).collect(),
        }
    }

    /// Read a field slot
    pub fn field(&self, slot: usize) -> Option<Value> {
        self.fields.get(slot).map(|f| f.read().clone())
    }

    /// Overwrite a field slot
    pub(crate) fn set_field(&self, slot: usize, value: Value) -> Result<(), String> {
        match self.fields.get(slot) {
            Some(f) => {
                *f.write() = value;
                Ok(())
            }
            None => Err(format!(
                "field slot {} out of bounds (instance has {} slots)",
                slot,
                self.fields.len()
            )),
        }
    }

    /// Number of field slots
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// The constant name, for instances of enumeration classes
    pub fn constant_name(&self) -> Option<String> {
        self.field(ENUM_NAME_SLOT)?
            .as_str()
            .map(|s| s.to_string())
    }

    /// The ordinal position, for instances of enumeration classes
    pub fn ordinal(&self) -> Option<i64> {
        self.field(ENUM_ORDINAL_SLOT)?.as_int()
    }
}
