//! Class runtime: values, class metadata, the registry, and builders
//!
//! Classes are immutable after registration except for the interior state
//! the reflection layer is allowed to touch: member accessibility flags,
//! static slot contents, and lazily attached accessor objects.

pub mod builder;
pub mod object;
pub mod registry;
pub mod value;

pub use builder::{ClassBuilder, EnumBuilder, FieldSpec, MethodSpec, StaticSpec};
pub use object::{
    Class, ClassKind, ConstructedState, ConstructorDef, FieldDef, MethodDef, StaticField,
    Visibility, VALUES_FIELD,
};
pub use registry::{ClassRegistry, DefineError};
pub use value::{ClassId, Instance, TypeTag, Value};
