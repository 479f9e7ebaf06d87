//! Runtime extension of closed enumeration classes
//!
//! This crate hosts a small reflective class runtime and the machinery to
//! append new constants to enumeration classes that were registered as
//! closed. An enumeration's constants live in a private, sealed `$VALUES`
//! static; its constructors cannot be invoked through the normal
//! instantiation path. Both restrictions are real and enforced — and both
//! can be pierced through the introspection facility, exactly the way a
//! managed host's reflection layer pierces its own rules.
//!
//! The two halves:
//!
//! - [`reflect`]: resolve members by name across the ancestor chain, then
//!   read, write, or invoke them under scoped accessibility overrides.
//!   Sealed statics are rewritten through their internal accessor object;
//!   enumeration constructors through a lazily cached constructor accessor.
//! - [`extend`](fn@extend): read `$VALUES`, build a one-longer copy,
//!   construct the new constant through the bypass, and publish the new
//!   list in a single swap.
//!
//! ```
//! use dynenum_runtime::runtime::{ClassRegistry, ConstructedState, EnumBuilder, FieldSpec};
//! use dynenum_runtime::runtime::{TypeTag, Value};
//!
//! let registry = ClassRegistry::new();
//! let status = EnumBuilder::new("Status")
//!     .payload(FieldSpec::new("label", TypeTag::Str).as_private())
//!     .constructor(vec![TypeTag::Str], |args| {
//!         let label = args[0].as_str().ok_or("label must be a string")?;
//!         Ok(ConstructedState {
//!             constant_name: Some(label.to_uppercase()),
//!             fields: vec![args[0].clone()],
//!         })
//!     })
//!     .constant(vec![Value::str("active")])
//!     .constant(vec![Value::str("inactive")])
//!     .register(&registry)?;
//!
//! dynenum_runtime::extend(&registry, status, &[TypeTag::Str], &[Value::str("archived")])?;
//!
//! let values = registry.enum_values(status).unwrap();
//! assert_eq!(values.len(), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod extend;
pub mod reflect;
pub mod runtime;

pub use extend::{extend, extend_unguarded};
pub use reflect::{ReflectError, ReflectResult, ReflectionPolicy};
pub use runtime::{ClassRegistry, DefineError, Instance, TypeTag, Value};
