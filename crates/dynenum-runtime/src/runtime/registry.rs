//! Process-wide class registry
//!
//! The registry is the single source of truth for which classes exist and,
//! for enumeration classes, which constants exist. Classes are registered
//! once and never removed while the process runs; the only post-registration
//! mutations are the ones the reflection layer performs through class
//! interior state.
//!
//! The registry also owns the per-class extension locks (serializing the
//! read-modify-publish sequence of the enumeration extender) and the active
//! reflection policy.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::reflect::policy::ReflectionPolicy;
use crate::runtime::object::{
    Class, ClassKind, FieldDef, MethodDef, MethodFn, Visibility, VALUES_FIELD,
};
use crate::runtime::value::{ClassId, TypeTag, Value, ENUM_NAME_SLOT, ENUM_ORDINAL_SLOT};

/// Class definition errors
#[derive(Debug, thiserror::Error)]
pub enum DefineError {
    /// A class with this name is already registered
    #[error("class `{0}` is already registered")]
    DuplicateClassName(String),

    /// The declared parent class does not exist
    #[error("parent class #{0} is not registered")]
    UnknownParentClass(ClassId),

    /// No declared constructor matches the given argument types
    #[error("no constructor of `{class}` matches arguments ({args})")]
    NoMatchingConstructor {
        /// Class being defined
        class: String,
        /// Description of the offending argument list
        args: String,
    },

    /// A constant's constructor raised during class initialization
    #[error("initializing constant of `{class}` failed: {reason}")]
    ConstantInitFailed {
        /// Class being defined
        class: String,
        /// Underlying failure
        reason: String,
    },
}

/// Process-wide registry of classes
pub struct ClassRegistry {
    /// Classes indexed by ID
    classes: RwLock<Vec<Arc<Class>>>,
    /// Class name to ID mapping
    name_to_id: RwLock<FxHashMap<String, ClassId>>,
    /// Per-class extension locks, created on first use
    extension_locks: DashMap<ClassId, Arc<Mutex<()>>>,
    /// Active reflection policy bits
    policy: AtomicU8,
    /// ID of the implicit `Enum` base class
    enum_base_id: ClassId,
}

impl ClassRegistry {
    /// Create a registry with the implicit `Enum` base class installed
    pub fn new() -> Self {
        let registry = Self {
            classes: RwLock::new(Vec::new()),
            name_to_id: RwLock::new(FxHashMap::default()),
            extension_locks: DashMap::new(),
            policy: AtomicU8::new(ReflectionPolicy::ALL.bits()),
            enum_base_id: 0,
        };
        let base = registry
            .register("Enum", enum_base_class)
            .unwrap_or_else(|_| unreachable!("empty registry cannot hold a duplicate name"));
        debug_assert_eq!(base.id, registry.enum_base_id);
        registry
    }

    /// ID of the implicit `Enum` base class
    pub fn enum_base_id(&self) -> ClassId {
        self.enum_base_id
    }

    /// Register a new class under `name`, assigning it the next dense ID
    pub(crate) fn register(
        &self,
        name: &str,
        make: impl FnOnce(ClassId) -> Class,
    ) -> Result<Arc<Class>, DefineError> {
        let mut classes = self.classes.write();
        let mut names = self.name_to_id.write();
        if names.contains_key(name) {
            return Err(DefineError::DuplicateClassName(name.to_string()));
        }
        let id = classes.len();
        let class = Arc::new(make(id));
        names.insert(class.name.clone(), id);
        classes.push(Arc::clone(&class));
        Ok(class)
    }

    /// Get class by ID
    pub fn get(&self, id: ClassId) -> Option<Arc<Class>> {
        self.classes.read().get(id).cloned()
    }

    /// Get class by name
    pub fn get_by_name(&self, name: &str) -> Option<Arc<Class>> {
        let id = *self.name_to_id.read().get(name)?;
        self.get(id)
    }

    /// Number of registered classes
    pub fn class_count(&self) -> usize {
        self.classes.read().len()
    }

    /// The ancestor chain starting at `id`: the class itself first, then
    /// each parent up to the root. Empty if `id` is unknown.
    pub fn ancestry(&self, id: ClassId) -> Vec<Arc<Class>> {
        let classes = self.classes.read();
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            match classes.get(id) {
                Some(class) => {
                    chain.push(Arc::clone(class));
                    current = class.parent_id;
                }
                None => break,
            }
        }
        chain
    }

    /// Whether `sub` is `sup` or one of its descendants
    pub fn is_subclass_of(&self, sub: ClassId, sup: ClassId) -> bool {
        self.ancestry(sub).iter().any(|class| class.id == sup)
    }

    /// The current constant list of an enumeration class
    ///
    /// This is the ordinary reader surface: it observes whatever the
    /// `$VALUES` storage holds at the moment of the call.
    pub fn enum_values(&self, id: ClassId) -> Option<Arc<Vec<Value>>> {
        let class = self.get(id)?;
        if !class.is_enum() {
            return None;
        }
        let (_, values) = class.declared_static(VALUES_FIELD)?;
        values.peek().as_list().cloned()
    }

    /// The active reflection policy
    pub fn policy(&self) -> ReflectionPolicy {
        ReflectionPolicy::from_bits(self.policy.load(Ordering::Acquire))
    }

    /// Replace the active reflection policy
    pub fn set_policy(&self, policy: ReflectionPolicy) {
        self.policy.store(policy.bits(), Ordering::Release);
    }

    /// The extension lock for a class, created on first use
    ///
    /// Held across the whole read-modify-publish sequence of a guarded
    /// extension; see [`crate::extend`].
    pub(crate) fn extension_lock(&self, id: ClassId) -> Arc<Mutex<()>> {
        self.extension_locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the implicit `Enum` base class
///
/// Declares the private final `name` and `ordinal` instance fields every
/// enumeration instance carries, and the public accessors for them.
fn enum_base_class(id: ClassId) -> Class {
    let name_body: MethodFn = Arc::new(|recv, _args| {
        let recv = recv.ok_or("name() requires a receiver")?;
        recv.field(ENUM_NAME_SLOT)
            .ok_or_else(|| "receiver has no name slot".to_string())
    });
    let ordinal_body: MethodFn = Arc::new(|recv, _args| {
        let recv = recv.ok_or("ordinal() requires a receiver")?;
        recv.field(ENUM_ORDINAL_SLOT)
            .ok_or_else(|| "receiver has no ordinal slot".to_string())
    });

    Class::new(
        id,
        "Enum".to_string(),
        None,
        ClassKind::Object,
        0,
        vec![
            FieldDef::new(
                "name".to_string(),
                TypeTag::Str,
                Visibility::Private,
                true,
                ENUM_NAME_SLOT,
            ),
            FieldDef::new(
                "ordinal".to_string(),
                TypeTag::Int,
                Visibility::Private,
                true,
                ENUM_ORDINAL_SLOT,
            ),
        ],
        vec![],
        vec![
            MethodDef::new(
                "name".to_string(),
                vec![],
                Visibility::Public,
                false,
                name_body,
            ),
            MethodDef::new(
                "ordinal".to_string(),
                vec![],
                Visibility::Public,
                false,
                ordinal_body,
            ),
        ],
        vec![],
    )
}
