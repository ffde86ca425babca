use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{Container, ContainerError, Value};

/// Callable invoked by factory definitions.
///
/// Receives the container and the already-resolved parameter values.
pub type FactoryFn =
    Arc<dyn Fn(&Container, &[Value]) -> Result<Value, ContainerError> + Send + Sync>;

/// Callable invoked by decorator definitions.
///
/// Receives the container, the resolved value being decorated, and the
/// resolved extra parameters.
pub type DecoratorFn =
    Arc<dyn Fn(&Container, Value, &[Value]) -> Result<Value, ContainerError> + Send + Sync>;

/// Scalar cast applied to a resolved environment variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cast {
    /// Coerce to [`Value::Int`].
    Int,
    /// Coerce to [`Value::Float`].
    Float,
    /// Coerce to [`Value::Bool`].
    Bool,
}

/// Lifetime of a resolved object entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scope {
    /// One instance per container lifetime, memoized on first resolution.
    #[default]
    Singleton,
    /// A fresh instance on every resolution.
    Prototype,
}

/// Either a plain value or a nested definition.
///
/// Every nested position of a definition (factory parameters, array
/// elements, environment defaults, constructor arguments, ...) holds an
/// `Input`, so literals and further definitions mix freely.
#[derive(Clone, Debug)]
pub enum Input {
    /// Literal value, used as-is.
    Value(Value),
    /// Nested definition, resolved recursively.
    Definition(Definition),
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Definition> for Input {
    fn from(value: Definition) -> Self {
        Self::Definition(value)
    }
}

macro_rules! input_from_scalar {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Input {
            fn from(value: $ty) -> Self {
                Self::Value(value.into())
            }
        }
    )*};
}

input_from_scalar!(bool, i32, i64, f64, &str, String);

/// A construction recipe bound to an entry name.
///
/// Definitions are immutable value objects: they are built during
/// configuration, stamped with their entry name when registered into a
/// [`DefinitionMap`](crate::DefinitionMap), and only read afterwards. The
/// single sanctioned mutation is [`Definition::replace_nested`], used by
/// caching layers to substitute already-computed sub-results in place.
#[derive(Clone, Debug)]
pub enum Definition {
    /// Fixed literal value.
    Value(ValueDefinition),
    /// Alias resolving to another entry.
    Reference(ReferenceDefinition),
    /// Callable with resolved parameters.
    Factory(FactoryDefinition),
    /// Callable layered on top of a previously defined entry.
    Decorator(DecoratorDefinition),
    /// Ordered collection, possibly extending a previous array.
    Array(ArrayDefinition),
    /// Environment variable read with default and cast.
    Env(EnvDefinition),
    /// Autowired object construction.
    Object(ObjectDefinition),
}

impl Definition {
    /// Entry name this definition is registered under.
    ///
    /// Anonymous nested definitions have an empty name; diagnostics label
    /// them with a synthesized `parent[key]` path instead.
    pub fn name(&self) -> &str {
        match self {
            Definition::Value(v) => &v.name,
            Definition::Reference(v) => &v.name,
            Definition::Factory(v) => &v.name,
            Definition::Decorator(v) => &v.name,
            Definition::Array(v) => &v.name,
            Definition::Env(v) => &v.name,
            Definition::Object(v) => &v.name,
        }
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        let slot = match self {
            Definition::Value(v) => &mut v.name,
            Definition::Reference(v) => &mut v.name,
            Definition::Factory(v) => &mut v.name,
            Definition::Decorator(v) => &mut v.name,
            Definition::Array(v) => &mut v.name,
            Definition::Env(v) => &mut v.name,
            Definition::Object(v) => &mut v.name,
        };
        if slot.is_empty() {
            *slot = name.to_string();
        }
    }

    /// Scope of the resolved value.
    ///
    /// Only object definitions can opt out of memoization; every other
    /// variant is singleton-scoped.
    pub fn scope(&self) -> Scope {
        match self {
            Definition::Object(v) => v.scope,
            _ => Scope::Singleton,
        }
    }

    /// Applies `f` to every direct nested input of this definition.
    ///
    /// This is the explicit "replace nested definitions" pass: caching
    /// layers use it to swap sub-definitions for already-cached values.
    /// It does not recurse into replaced inputs.
    pub fn replace_nested(&mut self, f: &mut dyn FnMut(&mut Input)) {
        match self {
            Definition::Value(_) | Definition::Reference(_) => {}
            Definition::Factory(v) => {
                for input in &mut v.parameters {
                    f(input);
                }
            }
            Definition::Decorator(v) => {
                for input in &mut v.parameters {
                    f(input);
                }
            }
            Definition::Array(v) => {
                for (_, input) in &mut v.items {
                    f(input);
                }
            }
            Definition::Env(v) => {
                if let Some(default) = &mut v.default {
                    f(default);
                }
            }
            Definition::Object(v) => {
                for input in &mut v.positional {
                    f(input);
                }
                for input in v.named.values_mut() {
                    f(input);
                }
                for (_, input) in &mut v.properties {
                    f(input);
                }
                for call in &mut v.methods {
                    for input in &mut call.positional {
                        f(input);
                    }
                    for input in call.named.values_mut() {
                        f(input);
                    }
                }
            }
        }
    }
}

/// Fixed literal value bound to an entry name.
#[derive(Clone, Debug)]
pub struct ValueDefinition {
    pub(crate) name: String,
    pub(crate) value: Value,
}

impl ValueDefinition {
    /// The literal value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Alias to another entry, resolved by recursive lookup.
#[derive(Clone, Debug)]
pub struct ReferenceDefinition {
    pub(crate) name: String,
    pub(crate) target: String,
}

impl ReferenceDefinition {
    /// Entry name this reference points at.
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Callable plus parameter definitions.
#[derive(Clone)]
pub struct FactoryDefinition {
    pub(crate) name: String,
    pub(crate) factory: FactoryFn,
    pub(crate) parameters: Vec<Input>,
}

impl FactoryDefinition {
    /// The callable.
    pub fn factory(&self) -> &FactoryFn {
        &self.factory
    }

    /// Parameter inputs, resolved before invocation.
    pub fn parameters(&self) -> &[Input] {
        &self.parameters
    }
}

impl std::fmt::Debug for FactoryDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryDefinition")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Callable that wraps the value previously bound to the same entry name.
#[derive(Clone)]
pub struct DecoratorDefinition {
    pub(crate) name: String,
    pub(crate) decorator: DecoratorFn,
    pub(crate) parameters: Vec<Input>,
    pub(crate) decorated: Option<Box<Definition>>,
}

impl DecoratorDefinition {
    /// The callable.
    pub fn decorator(&self) -> &DecoratorFn {
        &self.decorator
    }

    /// Extra parameter inputs, resolved before invocation.
    pub fn parameters(&self) -> &[Input] {
        &self.parameters
    }

    /// The definition this decorator layers on, attached by the source chain.
    pub fn decorated(&self) -> Option<&Definition> {
        self.decorated.as_deref()
    }
}

impl std::fmt::Debug for DecoratorDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoratorDefinition")
            .field("name", &self.name)
            .field("decorated", &self.decorated)
            .finish_non_exhaustive()
    }
}

/// Ordered collection whose elements may be nested definitions.
#[derive(Clone, Debug)]
pub struct ArrayDefinition {
    pub(crate) name: String,
    pub(crate) items: Vec<(Option<String>, Input)>,
    pub(crate) extension: bool,
    pub(crate) base: Option<Box<Definition>>,
}

impl ArrayDefinition {
    /// Elements in declaration order.
    pub fn items(&self) -> &[(Option<String>, Input)] {
        &self.items
    }

    /// `true` if this definition extends a previously defined array.
    pub fn is_extension(&self) -> bool {
        self.extension
    }

    /// The extended base definition, attached by the source chain.
    pub fn base(&self) -> Option<&Definition> {
        self.base.as_deref()
    }
}

/// Environment variable read.
#[derive(Clone, Debug)]
pub struct EnvDefinition {
    pub(crate) name: String,
    pub(crate) variable: String,
    pub(crate) optional: bool,
    pub(crate) default: Option<Box<Input>>,
    pub(crate) cast: Option<Cast>,
}

impl EnvDefinition {
    /// Variable name read from the environment.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// `true` if a missing variable falls back to the default.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Default input, resolved when the variable is absent.
    pub fn default(&self) -> Option<&Input> {
        self.default.as_deref()
    }

    /// Declared scalar cast.
    pub fn cast(&self) -> Option<Cast> {
        self.cast
    }
}

/// A single method-injection call on an object definition.
#[derive(Clone, Debug, Default)]
pub struct MethodCall {
    pub(crate) method: String,
    pub(crate) positional: Vec<Input>,
    pub(crate) named: BTreeMap<String, Input>,
}

impl MethodCall {
    /// Method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Positional parameter overrides.
    pub fn positional(&self) -> &[Input] {
        &self.positional
    }

    /// Keyword parameter overrides.
    pub fn named(&self) -> &BTreeMap<String, Input> {
        &self.named
    }
}

/// Autowired object construction recipe.
#[derive(Clone, Debug)]
pub struct ObjectDefinition {
    pub(crate) name: String,
    pub(crate) class: Option<String>,
    pub(crate) positional: Vec<Input>,
    pub(crate) named: BTreeMap<String, Input>,
    pub(crate) properties: Vec<(String, Input)>,
    pub(crate) methods: Vec<MethodCall>,
    pub(crate) lazy: Option<bool>,
    pub(crate) scope: Scope,
}

impl ObjectDefinition {
    /// Class id to construct; the entry name when not set explicitly.
    pub fn class(&self) -> &str {
        self.class.as_deref().unwrap_or(&self.name)
    }

    /// Positional constructor overrides.
    pub fn positional(&self) -> &[Input] {
        &self.positional
    }

    /// Keyword constructor overrides.
    pub fn named(&self) -> &BTreeMap<String, Input> {
        &self.named
    }

    /// Property injections declared on the definition.
    pub fn properties(&self) -> &[(String, Input)] {
        &self.properties
    }

    /// Method injections declared on the definition.
    pub fn methods(&self) -> &[MethodCall] {
        &self.methods
    }

    /// Definition-level lazy override; `None` defers to the class marker.
    pub fn lazy(&self) -> Option<bool> {
        self.lazy
    }

    /// Scope of the constructed object.
    pub fn scope(&self) -> Scope {
        self.scope
    }
}

/// Wraps a literal so it is never mistaken for a nested definition.
pub fn value(value: impl Into<Value>) -> Input {
    Input::Value(value.into())
}

/// References another entry by name.
pub fn get(target: impl Into<String>) -> Definition {
    Definition::Reference(ReferenceDefinition {
        name: String::new(),
        target: target.into(),
    })
}

/// Defines an entry produced by a callable.
pub fn factory(
    f: impl Fn(&Container, &[Value]) -> Result<Value, ContainerError> + Send + Sync + 'static,
) -> FactoryBuilder {
    FactoryBuilder {
        factory: Arc::new(f),
        parameters: Vec::new(),
    }
}

/// Builder for [`FactoryDefinition`].
#[derive(Clone)]
pub struct FactoryBuilder {
    factory: FactoryFn,
    parameters: Vec<Input>,
}

impl FactoryBuilder {
    /// Appends a parameter input, resolved before the callable runs.
    pub fn parameter(mut self, input: impl Into<Input>) -> Self {
        self.parameters.push(input.into());
        self
    }
}

impl From<FactoryBuilder> for Definition {
    fn from(builder: FactoryBuilder) -> Self {
        Definition::Factory(FactoryDefinition {
            name: String::new(),
            factory: builder.factory,
            parameters: builder.parameters,
        })
    }
}

impl From<FactoryBuilder> for Input {
    fn from(builder: FactoryBuilder) -> Self {
        Input::Definition(builder.into())
    }
}

/// Decorates the value previously bound to the same entry name.
pub fn decorate(
    f: impl Fn(&Container, Value, &[Value]) -> Result<Value, ContainerError> + Send + Sync + 'static,
) -> DecoratorBuilder {
    DecoratorBuilder {
        decorator: Arc::new(f),
        parameters: Vec::new(),
    }
}

/// Builder for [`DecoratorDefinition`].
#[derive(Clone)]
pub struct DecoratorBuilder {
    decorator: DecoratorFn,
    parameters: Vec<Input>,
}

impl DecoratorBuilder {
    /// Appends an extra parameter input.
    pub fn parameter(mut self, input: impl Into<Input>) -> Self {
        self.parameters.push(input.into());
        self
    }
}

impl From<DecoratorBuilder> for Definition {
    fn from(builder: DecoratorBuilder) -> Self {
        Definition::Decorator(DecoratorDefinition {
            name: String::new(),
            decorator: builder.decorator,
            parameters: builder.parameters,
            decorated: None,
        })
    }
}

impl From<DecoratorBuilder> for Input {
    fn from(builder: DecoratorBuilder) -> Self {
        Input::Definition(builder.into())
    }
}

/// Defines an array entry from positional elements.
pub fn array(items: impl IntoIterator<Item = impl Into<Input>>) -> ArrayBuilder {
    ArrayBuilder {
        items: items.into_iter().map(|v| (None, v.into())).collect(),
        extension: false,
    }
}

/// Extends a previously defined array entry with more elements.
pub fn add(items: impl IntoIterator<Item = impl Into<Input>>) -> ArrayBuilder {
    ArrayBuilder {
        items: items.into_iter().map(|v| (None, v.into())).collect(),
        extension: true,
    }
}

/// Builder for [`ArrayDefinition`].
#[derive(Clone, Debug)]
pub struct ArrayBuilder {
    items: Vec<(Option<String>, Input)>,
    extension: bool,
}

impl ArrayBuilder {
    /// Appends a keyed element.
    pub fn entry(mut self, key: impl Into<String>, input: impl Into<Input>) -> Self {
        self.items.push((Some(key.into()), input.into()));
        self
    }
}

impl From<ArrayBuilder> for Definition {
    fn from(builder: ArrayBuilder) -> Self {
        Definition::Array(ArrayDefinition {
            name: String::new(),
            items: builder.items,
            extension: builder.extension,
            base: None,
        })
    }
}

impl From<ArrayBuilder> for Input {
    fn from(builder: ArrayBuilder) -> Self {
        Input::Definition(builder.into())
    }
}

/// Reads an environment variable; required unless a default is declared.
pub fn env(variable: impl Into<String>) -> EnvBuilder {
    EnvBuilder {
        variable: variable.into(),
        optional: false,
        default: None,
        cast: None,
    }
}

/// Builder for [`EnvDefinition`].
#[derive(Clone, Debug)]
pub struct EnvBuilder {
    variable: String,
    optional: bool,
    default: Option<Box<Input>>,
    cast: Option<Cast>,
}

impl EnvBuilder {
    /// Marks the variable optional; absence resolves to the default, or
    /// [`Value::Null`] when no default is declared.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Declares the fallback used when the variable is absent. Implies
    /// [`EnvBuilder::optional`].
    pub fn default(mut self, input: impl Into<Input>) -> Self {
        self.optional = true;
        self.default = Some(Box::new(input.into()));
        self
    }

    /// Applies a scalar cast to the resolved value.
    pub fn cast(mut self, cast: Cast) -> Self {
        self.cast = Some(cast);
        self
    }
}

impl From<EnvBuilder> for Definition {
    fn from(builder: EnvBuilder) -> Self {
        Definition::Env(EnvDefinition {
            name: String::new(),
            variable: builder.variable,
            optional: builder.optional,
            default: builder.default,
            cast: builder.cast,
        })
    }
}

impl From<EnvBuilder> for Input {
    fn from(builder: EnvBuilder) -> Self {
        Input::Definition(builder.into())
    }
}

/// Defines an autowired object of an explicit class.
pub fn create(class: impl Into<String>) -> ObjectBuilder {
    ObjectBuilder {
        class: Some(class.into()),
        ..ObjectBuilder::default()
    }
}

/// Defines an autowired object whose class is the entry name itself.
pub fn autowire() -> ObjectBuilder {
    ObjectBuilder::default()
}

/// Builder for [`ObjectDefinition`].
#[derive(Clone, Debug, Default)]
pub struct ObjectBuilder {
    class: Option<String>,
    positional: Vec<Input>,
    named: BTreeMap<String, Input>,
    properties: Vec<(String, Input)>,
    methods: Vec<MethodCall>,
    lazy: Option<bool>,
    scope: Scope,
}

impl ObjectBuilder {
    /// Supplies positional constructor overrides, replacing any set before.
    pub fn constructor(mut self, inputs: impl IntoIterator<Item = impl Into<Input>>) -> Self {
        self.positional = inputs.into_iter().map(Into::into).collect();
        self
    }

    /// Supplies a keyword constructor override.
    pub fn constructor_param(mut self, name: impl Into<String>, input: impl Into<Input>) -> Self {
        self.named.insert(name.into(), input.into());
        self
    }

    /// Declares a property injection.
    pub fn property(mut self, name: impl Into<String>, input: impl Into<Input>) -> Self {
        self.properties.push((name.into(), input.into()));
        self
    }

    /// Declares a method injection with positional overrides.
    pub fn method(
        mut self,
        name: impl Into<String>,
        inputs: impl IntoIterator<Item = impl Into<Input>>,
    ) -> Self {
        self.methods.push(MethodCall {
            method: name.into(),
            positional: inputs.into_iter().map(Into::into).collect(),
            named: BTreeMap::new(),
        });
        self
    }

    /// Supplies a keyword override for a method declared with
    /// [`ObjectBuilder::method`].
    pub fn method_param(
        mut self,
        method: impl Into<String>,
        param: impl Into<String>,
        input: impl Into<Input>,
    ) -> Self {
        let method = method.into();
        if let Some(call) = self.methods.iter_mut().find(|c| c.method == method) {
            call.named.insert(param.into(), input.into());
        } else {
            let mut named = BTreeMap::new();
            named.insert(param.into(), input.into());
            self.methods.push(MethodCall {
                method,
                positional: Vec::new(),
                named,
            });
        }
        self
    }

    /// Defers construction behind a proxy until first use.
    pub fn lazy(mut self) -> Self {
        self.lazy = Some(true);
        self
    }

    /// Forces eager construction even if the class is marked lazy.
    pub fn eager(mut self) -> Self {
        self.lazy = Some(false);
        self
    }

    /// Resolves to a fresh instance on every lookup.
    pub fn prototype(mut self) -> Self {
        self.scope = Scope::Prototype;
        self
    }
}

impl From<ObjectBuilder> for Definition {
    fn from(builder: ObjectBuilder) -> Self {
        Definition::Object(ObjectDefinition {
            name: String::new(),
            class: builder.class,
            positional: builder.positional,
            named: builder.named,
            properties: builder.properties,
            methods: builder.methods,
            lazy: builder.lazy,
            scope: builder.scope,
        })
    }
}

impl From<ObjectBuilder> for Input {
    fn from(builder: ObjectBuilder) -> Self {
        Input::Definition(builder.into())
    }
}
