//! Forced-access introspection facility
//!
//! Stateless operations for locating and forcibly operating on class
//! members by name: field reads and writes, method invocation, and
//! constructor invocation, regardless of declared visibility. Writes to
//! sealed (final) statics go through a dedicated bypass that manipulates
//! the storage's internal accessor object.
//!
//! Every forced operation follows the same shape:
//!
//! 1. Consult the registry's [`ReflectionPolicy`]; a withheld capability
//!    fails with [`ReflectError::AccessDenied`] before anything is touched.
//! 2. Take a scoped override on the member's accessibility flag (and, for
//!    the read-only bypass, a nested override on the accessor's flag).
//! 3. Perform the access.
//! 4. Restore the overridden flags — guaranteed by RAII on every exit
//!    path, including errors and panics.

pub mod access;
pub mod constructors;
pub mod fields;
pub mod methods;
pub mod policy;

pub use access::{AccessOverride, ConstructorAccessor, ReadOnlyOverride, StaticFieldAccessor};
pub use constructors::{
    invoke_constructor, invoke_enum_constructor, resolve_constructor, ConstructorHandle,
};
pub use fields::{
    read_field, read_static_field, resolve_field, write_field, write_static_field,
    write_static_field_bypassing_immutability, FieldHandle, FieldKind,
};
pub use methods::{invoke_method, resolve_method, MethodHandle};
pub use policy::ReflectionPolicy;

/// Introspection errors
///
/// Every failure is structural or environmental — a wrong name, a rejected
/// capability, a raising constructor, or runtime internals that do not
/// match the expected shape. None of them are transient, so there is no
/// retry logic anywhere in this crate.
#[derive(Debug, thiserror::Error)]
pub enum ReflectError {
    /// Member name unresolved through the class and its full ancestor chain
    #[error("member `{member}` not found in class `{class}` or its ancestors")]
    MemberNotFound {
        /// Class the lookup started from
        class: String,
        /// Member name that failed to resolve
        member: String,
    },

    /// The access override itself was rejected by the active reflection policy
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The underlying constructor or method raised during execution
    #[error("invocation failed: {0}")]
    InvocationFailure(String),

    /// Runtime internals do not match the shape a bypass path expects
    #[error("unsupported runtime internals: {0}")]
    UnsupportedRuntimeInternals(String),
}

/// Introspection result
pub type ReflectResult<T> = Result<T, ReflectError>;
