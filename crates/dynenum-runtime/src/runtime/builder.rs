//! Runtime class definition
//!
//! Builders for registering classes without hand-assembling metadata.
//! [`EnumBuilder`] performs the equivalent of enumeration class
//! initialization: it registers the class with an empty `$VALUES` list,
//! constructs each initial constant through the low-level constructor
//! accessor (assigning ordinals in declaration order), and then seals
//! `$VALUES` read-only.

use std::sync::Arc;

use crate::runtime::object::{
    Class, ClassKind, ConstructedState, ConstructorDef, ConstructorFn, FieldDef, MethodDef,
    MethodFn, StaticField, Visibility, VALUES_FIELD,
};
use crate::runtime::registry::{ClassRegistry, DefineError};
use crate::runtime::value::{ClassId, Instance, TypeTag, Value};

/// Definition for an instance field on a class under construction
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    ty: TypeTag,
    visibility: Visibility,
    is_final: bool,
}

impl FieldSpec {
    /// A public, writable field
    pub fn new(name: &str, ty: TypeTag) -> Self {
        Self {
            name: name.to_string(),
            ty,
            visibility: Visibility::Public,
            is_final: false,
        }
    }

    /// Mark as private
    pub fn as_private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Mark as final (write-once)
    pub fn as_readonly(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// Definition for a static field on a class under construction
#[derive(Debug, Clone)]
pub struct StaticSpec {
    name: String,
    ty: TypeTag,
    visibility: Visibility,
    is_final: bool,
    initial: Value,
}

impl StaticSpec {
    /// A public, writable static with an initial value
    pub fn new(name: &str, ty: TypeTag, initial: Value) -> Self {
        Self {
            name: name.to_string(),
            ty,
            visibility: Visibility::Public,
            is_final: false,
            initial,
        }
    }

    /// Mark as private
    pub fn as_private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Mark as final: sealed read-only once the class is registered
    pub fn as_readonly(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// Definition for a method on a class under construction
pub struct MethodSpec {
    name: String,
    params: Vec<TypeTag>,
    visibility: Visibility,
    is_static: bool,
    body: MethodFn,
}

impl MethodSpec {
    /// A public instance method
    pub fn new<F>(name: &str, params: Vec<TypeTag>, body: F) -> Self
    where
        F: Fn(Option<&Arc<Instance>>, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            params,
            visibility: Visibility::Public,
            is_static: false,
            body: Arc::new(body),
        }
    }

    /// Mark as private
    pub fn as_private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Mark as static (invoked without a receiver)
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }
}

struct CtorSpec {
    params: Vec<TypeTag>,
    visibility: Visibility,
    body: ConstructorFn,
}

/// Builder for an ordinary class
pub struct ClassBuilder {
    name: String,
    parent: Option<ClassId>,
    fields: Vec<FieldSpec>,
    statics: Vec<StaticSpec>,
    methods: Vec<MethodSpec>,
    constructors: Vec<CtorSpec>,
    opaque_statics: bool,
}

impl ClassBuilder {
    /// Start building a class
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            fields: Vec::new(),
            statics: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            opaque_statics: false,
        }
    }

    /// Set the parent class
    pub fn parent(mut self, parent: ClassId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Add an instance field
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Add a static field
    pub fn static_field(mut self, spec: StaticSpec) -> Self {
        self.statics.push(spec);
        self
    }

    /// Add a method
    pub fn method(mut self, spec: MethodSpec) -> Self {
        self.methods.push(spec);
        self
    }

    /// Add a public constructor
    pub fn constructor<F>(mut self, params: Vec<TypeTag>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<ConstructedState, String> + Send + Sync + 'static,
    {
        self.constructors.push(CtorSpec {
            params,
            visibility: Visibility::Public,
            body: Arc::new(body),
        });
        self
    }

    /// Add a private constructor
    pub fn private_constructor<F>(mut self, params: Vec<TypeTag>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<ConstructedState, String> + Send + Sync + 'static,
    {
        self.constructors.push(CtorSpec {
            params,
            visibility: Visibility::Private,
            body: Arc::new(body),
        });
        self
    }

    /// Register static storage without reflective accessors
    ///
    /// Models runtimes whose static slots expose no accessor object (for
    /// example ahead-of-time frozen classes). Final statics on such a
    /// class cannot be rewritten even through the read-only bypass, which
    /// fails with `UnsupportedRuntimeInternals`.
    pub fn opaque_statics(mut self) -> Self {
        self.opaque_statics = true;
        self
    }

    /// Register the class
    pub fn register(self, registry: &ClassRegistry) -> Result<ClassId, DefineError> {
        let inherited_slots = match self.parent {
            Some(parent) => {
                registry
                    .get(parent)
                    .ok_or(DefineError::UnknownParentClass(parent))?
                    .field_count
            }
            None => 0,
        };
        let with_accessor = !self.opaque_statics;

        let fields = build_fields(self.fields, inherited_slots);
        let statics = build_statics(self.statics, with_accessor);
        let methods = build_methods(self.methods);
        let constructors = build_constructors(self.constructors);

        let parent = self.parent;
        let name = self.name;
        let class = registry.register(&name.clone(), move |id| {
            Class::new(
                id,
                name,
                parent,
                ClassKind::Object,
                inherited_slots,
                fields,
                statics,
                methods,
                constructors,
            )
        })?;

        seal_finals(&class);
        Ok(class.id)
    }
}

/// Builder for an enumeration class
///
/// The class always descends from the implicit `Enum` base; its constants
/// live in the private final `$VALUES` static. Constructors are private,
/// as on any enumeration type, and their bodies own the name-assignment
/// contract via [`ConstructedState::constant_name`].
pub struct EnumBuilder {
    name: String,
    payload: Vec<FieldSpec>,
    constructors: Vec<CtorSpec>,
    constants: Vec<Vec<Value>>,
    opaque_statics: bool,
}

impl EnumBuilder {
    /// Start building an enumeration class
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            payload: Vec::new(),
            constructors: Vec::new(),
            constants: Vec::new(),
            opaque_statics: false,
        }
    }

    /// Add a payload field carried by every constant
    pub fn payload(mut self, spec: FieldSpec) -> Self {
        self.payload.push(spec);
        self
    }

    /// Add a constructor (private, as enumeration constructors are)
    pub fn constructor<F>(mut self, params: Vec<TypeTag>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<ConstructedState, String> + Send + Sync + 'static,
    {
        self.constructors.push(CtorSpec {
            params,
            visibility: Visibility::Private,
            body: Arc::new(body),
        });
        self
    }

    /// Declare an initial constant by its constructor arguments
    ///
    /// Constants are constructed in declaration order at registration
    /// time, receiving ordinals `0..n`.
    pub fn constant(mut self, args: Vec<Value>) -> Self {
        self.constants.push(args);
        self
    }

    /// Register static storage without reflective accessors (see
    /// [`ClassBuilder::opaque_statics`])
    pub fn opaque_statics(mut self) -> Self {
        self.opaque_statics = true;
        self
    }

    /// Register the class and initialize its constants
    pub fn register(self, registry: &ClassRegistry) -> Result<ClassId, DefineError> {
        let base_id = registry.enum_base_id();
        let inherited_slots = registry
            .get(base_id)
            .ok_or(DefineError::UnknownParentClass(base_id))?
            .field_count;
        let with_accessor = !self.opaque_statics;

        let fields = build_fields(self.payload, inherited_slots);
        let statics = vec![StaticField::new(
            VALUES_FIELD.to_string(),
            TypeTag::List,
            Visibility::Private,
            true,
            Value::list(Vec::new()),
            with_accessor,
        )];
        let constructors = build_constructors(self.constructors);

        let name = self.name;
        let class = registry.register(&name.clone(), move |id| {
            Class::new(
                id,
                name,
                Some(base_id),
                ClassKind::Enum,
                inherited_slots,
                fields,
                statics,
                Vec::new(),
                constructors,
            )
        })?;

        for args in self.constants {
            init_constant(registry, &class, &args)?;
        }
        seal_finals(&class);
        Ok(class.id)
    }
}

fn build_fields(specs: Vec<FieldSpec>, base_slot: usize) -> Vec<FieldDef> {
    specs
        .into_iter()
        .enumerate()
        .map(|(i, spec)| {
            FieldDef::new(
                spec.name,
                spec.ty,
                spec.visibility,
                spec.is_final,
                base_slot + i,
            )
        })
        .collect()
}

fn build_statics(specs: Vec<StaticSpec>, with_accessor: bool) -> Vec<StaticField> {
    specs
        .into_iter()
        .map(|spec| {
            StaticField::new(
                spec.name,
                spec.ty,
                spec.visibility,
                spec.is_final,
                spec.initial,
                with_accessor,
            )
        })
        .collect()
}

fn build_methods(specs: Vec<MethodSpec>) -> Vec<MethodDef> {
    specs
        .into_iter()
        .map(|spec| {
            MethodDef::new(
                spec.name,
                spec.params,
                spec.visibility,
                spec.is_static,
                spec.body,
            )
        })
        .collect()
}

fn build_constructors(specs: Vec<CtorSpec>) -> Vec<ConstructorDef> {
    specs
        .into_iter()
        .map(|spec| ConstructorDef::new(spec.params, spec.visibility, spec.body))
        .collect()
}

/// Construct one initial constant and append it to the unsealed `$VALUES`
fn init_constant(
    registry: &ClassRegistry,
    class: &Arc<Class>,
    args: &[Value],
) -> Result<(), DefineError> {
    let tags = args
        .iter()
        .map(Value::type_tag)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| DefineError::NoMatchingConstructor {
            class: class.name.clone(),
            args: format!("{} values including null", args.len()),
        })?;
    let index =
        class
            .find_constructor(&tags)
            .ok_or_else(|| DefineError::NoMatchingConstructor {
                class: class.name.clone(),
                args: format!("{tags:?}"),
            })?;
    let ctor = class
        .constructor_at(index)
        .ok_or_else(|| DefineError::ConstantInitFailed {
            class: class.name.clone(),
            reason: "constructor table inconsistent".to_string(),
        })?;

    ctor.acquire_constructor_accessor(class.id, index);
    let accessor =
        ctor.constructor_accessor()
            .ok_or_else(|| DefineError::ConstantInitFailed {
                class: class.name.clone(),
                reason: "constructor accessor not attached".to_string(),
            })?;
    let instance =
        accessor
            .new_instance(registry, args)
            .map_err(|e| DefineError::ConstantInitFailed {
                class: class.name.clone(),
                reason: e.to_string(),
            })?;

    let (_, values) =
        class
            .declared_static(VALUES_FIELD)
            .ok_or_else(|| DefineError::ConstantInitFailed {
                class: class.name.clone(),
                reason: format!("no {VALUES_FIELD} storage"),
            })?;
    let mut items = values
        .peek()
        .as_list()
        .map(|list| list.as_ref().clone())
        .unwrap_or_default();
    items.push(Value::Instance(instance));
    values.initialize(Value::list(items));
    Ok(())
}

/// Seal every final static's accessor after initialization
fn seal_finals(class: &Arc<Class>) {
    for sf in class.statics() {
        if sf.is_final {
            sf.seal();
        }
    }
}
