//! Injection-point declarations and metadata extraction.
//!
//! Classes are not discovered through runtime reflection: each injectable
//! class self-registers its constructor, property and method injection
//! points through the fluent [`ClassBuilder`] API. The
//! [`MetadataExtractor`] trait is the stable seam between "how metadata is
//! declared" and "how it is consumed" — the resolver and the compiler both
//! consume the extracted [`ClassMetadata`] shape and nothing else.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::{ContainerError, Input, Instance, Value};

/// Method body registered for a class.
pub type MethodFn =
    Arc<dyn Fn(&Arc<Instance>, &[Value]) -> Result<Value, ContainerError> + Send + Sync>;

/// Custom construction closure registered for a class.
pub type ConstructFn =
    Arc<dyn Fn(&[Value]) -> Result<Arc<Instance>, ContainerError> + Send + Sync>;

pub(crate) type MethodTable = BTreeMap<String, MethodFn>;

/// Declared type of a parameter or property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclaredType {
    /// Concrete class type; infers an entry name equal to the class id.
    Class(String),
    /// Scalar or builtin type; never participates in inference.
    Scalar,
}

/// Explicit value attached to an injection point.
///
/// `Undefined` means "not yet known", which is distinct from a declared
/// `Null`: an undefined point still falls back to type inference or a
/// default, while a defined null is injected as-is.
#[derive(Clone, Debug, Default)]
pub enum PointValue {
    /// No explicit value was declared.
    #[default]
    Undefined,
    /// An explicit value or nested definition was declared.
    Defined(Input),
}

impl PointValue {
    /// Returns `true` when no explicit value was declared.
    pub fn is_undefined(&self) -> bool {
        matches!(self, PointValue::Undefined)
    }
}

/// Declaration of a single constructor parameter, property or method
/// parameter.
#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub(crate) name: String,
    pub(crate) ty: Option<DeclaredType>,
    pub(crate) entry: Option<String>,
    pub(crate) value: PointValue,
    pub(crate) default: Option<Value>,
    pub(crate) variadic: bool,
}

/// Declares an injection point with the given member name.
pub fn param(name: impl Into<String>) -> ParamSpec {
    ParamSpec {
        name: name.into(),
        ty: None,
        entry: None,
        value: PointValue::Undefined,
        default: None,
        variadic: false,
    }
}

impl ParamSpec {
    /// Declares a concrete class type, enabling inference.
    pub fn of_class(mut self, class: impl Into<String>) -> Self {
        self.ty = Some(DeclaredType::Class(class.into()));
        self
    }

    /// Declares a scalar or builtin type.
    pub fn scalar(mut self) -> Self {
        self.ty = Some(DeclaredType::Scalar);
        self
    }

    /// Declares an explicit entry name, overriding inference.
    pub fn entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    /// Declares an explicit value or nested definition.
    pub fn value(mut self, input: impl Into<Input>) -> Self {
        self.value = PointValue::Defined(input.into());
        self
    }

    /// Declares a default used when no value can be resolved.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Shorthand for a null default on an optional point.
    pub fn nullable(self) -> Self {
        self.default(Value::Null)
    }

    /// Marks the parameter variadic; it consumes all remaining positional
    /// overrides and never infers a type.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

/// Registered declaration of an injectable class.
///
/// Produced by [`ClassBuilder::finish`] and stored in the
/// [`ClassRegistry`]. The record owns the construction closure and method
/// bodies; the injection-point declarations are turned into
/// [`ClassMetadata`] by the extractor.
pub struct ClassRecord {
    class: String,
    lazy: bool,
    instantiable: bool,
    constructor: Vec<ParamSpec>,
    properties: Vec<ParamSpec>,
    methods: Vec<(String, Vec<ParamSpec>)>,
    construct: Option<ConstructFn>,
    method_table: MethodTable,
}

impl ClassRecord {
    /// Class id.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// `true` if the class-level lazy marker is set.
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// `false` for interface-like declarations that only carry metadata.
    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    /// Constructs an instance from already-resolved constructor arguments.
    ///
    /// The default constructor assigns each argument as a property named
    /// after its parameter; a trailing variadic parameter receives the
    /// remaining arguments as an array. A custom closure registered with
    /// [`ClassBuilder::construct_with`] replaces the default entirely.
    pub fn instantiate(&self, args: &[Value]) -> Result<Arc<Instance>, ContainerError> {
        if let Some(construct) = &self.construct {
            return construct(args);
        }
        let instance = Instance::new(self.class.clone());
        let mut args = args.iter();
        for spec in &self.constructor {
            if spec.variadic {
                let rest: crate::Array = args.by_ref().cloned().collect();
                instance.set(spec.name.clone(), Value::Array(rest));
                break;
            }
            let value = args.next().cloned().unwrap_or(Value::Null);
            instance.set(spec.name.clone(), value);
        }
        Ok(instance)
    }

    /// Invokes a registered method body on an instance.
    pub fn call_method(
        &self,
        instance: &Arc<Instance>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, ContainerError> {
        let body = self.method_table.get(method).ok_or_else(|| {
            ContainerError::invalid(
                self.class.clone(),
                format!("class has no method '{method}'"),
            )
        })?;
        body(instance, args)
    }

    /// Returns `true` if a method body is registered under `method`.
    pub fn has_method(&self, method: &str) -> bool {
        self.method_table.contains_key(method)
    }
}

impl std::fmt::Debug for ClassRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassRecord")
            .field("class", &self.class)
            .field("lazy", &self.lazy)
            .field("instantiable", &self.instantiable)
            .finish_non_exhaustive()
    }
}

/// Fluent declaration of an injectable class.
pub struct ClassBuilder {
    record: ClassRecord,
}

impl ClassBuilder {
    /// Starts a declaration for the given class id.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            record: ClassRecord {
                class: class.into(),
                lazy: false,
                instantiable: true,
                constructor: Vec::new(),
                properties: Vec::new(),
                methods: Vec::new(),
                construct: None,
                method_table: MethodTable::new(),
            },
        }
    }

    /// Sets the class-level lazy marker: entries of this class default to
    /// deferred construction behind a proxy.
    pub fn lazy(mut self) -> Self {
        self.record.lazy = true;
        self
    }

    /// Marks the class as carrying metadata only (interface, abstract).
    pub fn not_instantiable(mut self) -> Self {
        self.record.instantiable = false;
        self
    }

    /// Declares the ordered constructor parameters.
    pub fn constructor(mut self, params: impl IntoIterator<Item = ParamSpec>) -> Self {
        self.record.constructor = params.into_iter().collect();
        self
    }

    /// Declares a property injection point.
    pub fn property(mut self, spec: ParamSpec) -> Self {
        self.record.properties.push(spec);
        self
    }

    /// Declares a method injection point with its ordered parameters.
    pub fn inject_method(
        mut self,
        name: impl Into<String>,
        params: impl IntoIterator<Item = ParamSpec>,
    ) -> Self {
        self.record
            .methods
            .push((name.into(), params.into_iter().collect()));
        self
    }

    /// Registers a method body.
    pub fn method(
        mut self,
        name: impl Into<String>,
        body: impl Fn(&Arc<Instance>, &[Value]) -> Result<Value, ContainerError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.record.method_table.insert(name.into(), Arc::new(body));
        self
    }

    /// Replaces the default constructor with a custom closure.
    pub fn construct_with(
        mut self,
        construct: impl Fn(&[Value]) -> Result<Arc<Instance>, ContainerError> + Send + Sync + 'static,
    ) -> Self {
        self.record.construct = Some(Arc::new(construct));
        self
    }

    /// Validates the declaration and produces the registrable record.
    ///
    /// Malformed declarations fail with [`ContainerError::Declaration`].
    pub fn finish(self) -> Result<ClassRecord, ContainerError> {
        let record = self.record;
        let class = record.class.clone();
        if class.is_empty() {
            return Err(ContainerError::declaration("", "class id must not be empty"));
        }
        let mut seen = BTreeSet::new();
        for (index, spec) in record.constructor.iter().enumerate() {
            if !seen.insert(spec.name.as_str()) {
                return Err(ContainerError::declaration(
                    class.clone(),
                    format!("duplicate constructor parameter '{}'", spec.name),
                ));
            }
            if spec.variadic && index + 1 != record.constructor.len() {
                return Err(ContainerError::declaration(
                    class.clone(),
                    format!("variadic parameter '{}' must be declared last", spec.name),
                ));
            }
        }
        let mut seen = BTreeSet::new();
        for spec in &record.properties {
            if !seen.insert(spec.name.as_str()) {
                return Err(ContainerError::declaration(
                    class.clone(),
                    format!("duplicate property '{}'", spec.name),
                ));
            }
            if spec.variadic {
                return Err(ContainerError::declaration(
                    class.clone(),
                    format!("property '{}' cannot be variadic", spec.name),
                ));
            }
        }
        let mut seen = BTreeSet::new();
        for (method, params) in &record.methods {
            if !seen.insert(method.as_str()) {
                return Err(ContainerError::declaration(
                    class.clone(),
                    format!("duplicate method injection '{method}'"),
                ));
            }
            if !record.method_table.contains_key(method) {
                return Err(ContainerError::declaration(
                    class.clone(),
                    format!("injected method '{method}' has no registered body"),
                ));
            }
            for (index, spec) in params.iter().enumerate() {
                if spec.variadic && index + 1 != params.len() {
                    return Err(ContainerError::declaration(
                        class,
                        format!(
                            "variadic parameter '{}' of method '{method}' must be declared last",
                            spec.name
                        ),
                    ));
                }
            }
        }
        Ok(record)
    }
}

/// Extracted injection point, the stable shape consumed by the resolver and
/// the compiler.
#[derive(Clone, Debug)]
pub struct InjectionPoint {
    name: String,
    entry: Option<String>,
    value: PointValue,
    default: Option<Value>,
    variadic: bool,
}

impl InjectionPoint {
    /// Member name of the point.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target entry name: the explicit declaration when present, the
    /// inferred class type otherwise.
    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    /// Explicit value declared on the point.
    pub fn value(&self) -> &PointValue {
        &self.value
    }

    /// Declared default value.
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// `true` for a trailing variadic parameter.
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub(crate) fn from_spec(spec: &ParamSpec) -> Self {
        let entry = spec.entry.clone().or_else(|| {
            if spec.variadic {
                return None;
            }
            match &spec.ty {
                Some(DeclaredType::Class(class)) => Some(class.clone()),
                _ => None,
            }
        });
        Self {
            name: spec.name.clone(),
            entry,
            value: spec.value.clone(),
            default: spec.default.clone(),
            variadic: spec.variadic,
        }
    }
}

/// Injection metadata extracted for one class.
#[derive(Clone, Debug)]
pub struct ClassMetadata {
    class: String,
    lazy: bool,
    constructor: Vec<InjectionPoint>,
    properties: Vec<InjectionPoint>,
    methods: Vec<(String, Vec<InjectionPoint>)>,
}

impl ClassMetadata {
    /// Class id the metadata belongs to.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Class-level lazy marker.
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Ordered constructor injection points.
    pub fn constructor(&self) -> &[InjectionPoint] {
        &self.constructor
    }

    /// Property injection points.
    pub fn properties(&self) -> &[InjectionPoint] {
        &self.properties
    }

    /// Method injection points in declaration order.
    pub fn methods(&self) -> &[(String, Vec<InjectionPoint>)] {
        &self.methods
    }

    fn from_record(record: &ClassRecord) -> Self {
        Self {
            class: record.class.clone(),
            lazy: record.lazy,
            constructor: record.constructor.iter().map(InjectionPoint::from_spec).collect(),
            properties: record.properties.iter().map(InjectionPoint::from_spec).collect(),
            methods: record
                .methods
                .iter()
                .map(|(name, params)| {
                    (
                        name.clone(),
                        params.iter().map(InjectionPoint::from_spec).collect(),
                    )
                })
                .collect(),
        }
    }
}

/// Seam between metadata declaration and consumption.
///
/// The resolver and the compiler only depend on this capability, so an
/// alternative declaration surface (code generation, a derive macro) can be
/// substituted without touching either.
pub trait MetadataExtractor: Send + Sync {
    /// Returns the injection metadata of a class.
    fn extract(&self, class: &str) -> Result<Arc<ClassMetadata>, ContainerError>;
}

/// Registry of injectable class declarations.
///
/// Extraction is a pure function of the registered record, so metadata is
/// cached by class id on first extraction.
#[derive(Default)]
pub struct ClassRegistry {
    classes: DashMap<String, Arc<ClassRecord>>,
    metadata: DashMap<String, Arc<ClassMetadata>>,
}

impl ClassRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a finished class record.
    ///
    /// Registering the same class id twice fails with
    /// [`ContainerError::Declaration`]: records are immutable once visible.
    pub fn register(&self, record: ClassRecord) -> Result<(), ContainerError> {
        let class = record.class().to_string();
        match self.classes.entry(class.clone()) {
            Entry::Occupied(_) => Err(ContainerError::declaration(
                class,
                "class is already registered",
            )),
            Entry::Vacant(v) => {
                v.insert(Arc::new(record));
                Ok(())
            }
        }
    }

    /// Returns the record registered under a class id.
    pub fn record(&self, class: &str) -> Option<Arc<ClassRecord>> {
        self.classes.get(class).map(|v| v.value().clone())
    }

    /// Returns `true` if a class id is registered.
    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }
}

impl MetadataExtractor for ClassRegistry {
    fn extract(&self, class: &str) -> Result<Arc<ClassMetadata>, ContainerError> {
        if let Some(meta) = self.metadata.get(class) {
            return Ok(meta.value().clone());
        }
        let record = self
            .record(class)
            .ok_or_else(|| ContainerError::NotFound(class.to_string()))?;
        let meta = Arc::new(ClassMetadata::from_record(&record));
        self.metadata.insert(class.to_string(), meta.clone());
        Ok(meta)
    }
}
