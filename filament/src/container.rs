use std::collections::BTreeMap;
use std::mem::take;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::meta::InjectionPoint;
use crate::{
    ClassBuilder, ClassRegistry, ContainerError, Definition, EnvReader, FactoryFn, Input,
    ParamSpec, Resolver, ResolveContext, Scope, StdEnv, Value, autowire,
};

/// Provider of definitions for a set of entry names.
///
/// Sources are consulted in registration order; the first definition found
/// for a name wins, except that decorators and array extensions from later
/// sources layer on top of the earlier definition.
pub trait DefinitionSource: Send + Sync {
    /// Returns the definition registered under a name.
    fn get(&self, name: &str) -> Option<Definition>;

    /// Returns all entry names this source defines.
    fn names(&self) -> Vec<String>;
}

/// Map-backed definition source, the in-memory form of a configuration
/// entry map.
#[derive(Debug, Default)]
pub struct DefinitionMap {
    definitions: BTreeMap<String, Definition>,
}

impl DefinitionMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition under an entry name, stamping the name onto
    /// the definition.
    ///
    /// # Panics
    ///
    /// Panics if the name is already defined in this map; layering belongs
    /// to separate sources, not to one map.
    pub fn add(&mut self, name: impl Into<String>, definition: impl Into<Input>) -> &mut Self {
        let name = name.into();
        let mut definition = match definition.into() {
            Input::Value(value) => {
                Definition::Value(crate::ValueDefinition {
                    name: String::new(),
                    value,
                })
            }
            Input::Definition(definition) => definition,
        };
        definition.set_name(&name);
        if self.definitions.insert(name.clone(), definition).is_some() {
            panic!("Entry {name} already defined");
        }
        self
    }
}

impl DefinitionSource for DefinitionMap {
    fn get(&self, name: &str) -> Option<Definition> {
        self.definitions.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }
}

struct ContainerInner {
    sources: Vec<Box<dyn DefinitionSource>>,
    registry: Arc<ClassRegistry>,
    env: Arc<dyn EnvReader>,
    singletons: DashMap<String, Arc<OnceCell<Value>>>,
}

/// Dependency injection container.
///
/// Looks up definitions through an ordered source chain, resolves them with
/// the per-variant [`Resolver`], and memoizes singleton-scoped values for
/// its own lifetime. Cloning the container clones a handle to the same
/// caches, which is what lazy proxies capture.
///
/// # Examples
///
/// ```rust
/// use filament::{Container, DefinitionMap, value, get};
///
/// let mut definitions = DefinitionMap::new();
/// definitions.add("greeting", value("Hello"));
/// definitions.add("message", get("greeting"));
///
/// let mut builder = Container::builder();
/// builder.add_definitions(definitions);
/// let container = builder.build();
///
/// assert_eq!(container.get("message").unwrap().as_str(), Some("Hello"));
/// assert!(!container.has("missing"));
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// Creates a builder for configuring a container.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder {
            sources: Vec::new(),
            registry: Arc::new(ClassRegistry::new()),
            env: Arc::new(StdEnv),
        }
    }

    /// Resolves the entry registered under a name.
    ///
    /// Singleton-scoped entries are memoized: repeated calls return a handle
    /// to the identical value without re-running the resolver, and
    /// concurrent first accesses run the construction logic exactly once.
    /// Unknown names fail with [`ContainerError::NotFound`].
    pub fn get(&self, name: &str) -> Result<Value, ContainerError> {
        self.get_inner(name, &mut ResolveContext::new())
    }

    /// Returns `true` if a definition or injectable class exists for a name.
    pub fn has(&self, name: &str) -> bool {
        matches!(self.lookup_definition(name), Ok(Some(_)))
    }

    /// Invokes a callable, resolving its parameters with the same rules as
    /// method injection: explicit arguments win, typed parameters autowire,
    /// defaults fill the rest.
    pub fn call(&self, callable: &Callable, args: &Args) -> Result<Value, ContainerError> {
        let mut ctx = ResolveContext::new();
        let resolver = Resolver::new(self);
        let owner = format!("callable '{}'", callable.name);
        let params = resolver.resolve_parameters(
            &callable.name,
            &owner,
            &callable.points,
            &args.positional,
            &args.named,
            &mut ctx,
        )?;
        (callable.body)(self, &params)
    }

    /// Registry of injectable class declarations.
    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.inner.registry
    }

    /// Environment variable source used by env definitions.
    pub fn env_reader(&self) -> &Arc<dyn EnvReader> {
        &self.inner.env
    }

    /// All explicitly configured entry names, in source order.
    pub fn entry_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for source in &self.inner.sources {
            for name in source.names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Looks up the layered definition for a name without resolving it.
    ///
    /// Walks the source chain, attaching decorators and array extensions to
    /// the definition they wrap. Names with no definition that match a
    /// registered instantiable class fall back to implicit autowiring.
    pub fn lookup_definition(&self, name: &str) -> Result<Option<Definition>, ContainerError> {
        let mut result: Option<Definition> = None;
        for source in &self.inner.sources {
            let Some(mut definition) = source.get(name) else {
                continue;
            };
            definition.set_name(name);
            result = Some(match result.take() {
                None => definition,
                Some(base) => match definition {
                    Definition::Decorator(mut decorator) => {
                        decorator.decorated = Some(Box::new(base));
                        Definition::Decorator(decorator)
                    }
                    Definition::Array(mut array) if array.extension => {
                        array.base = Some(Box::new(base));
                        Definition::Array(array)
                    }
                    // First-registered source wins.
                    _ => base,
                },
            });
        }
        if let Some(Definition::Decorator(decorator)) = &result {
            if decorator.decorated.is_none() {
                return Err(ContainerError::invalid(
                    name,
                    "decorator has nothing to decorate",
                ));
            }
        }
        if result.is_none() {
            if let Some(record) = self.inner.registry.record(name) {
                if record.is_instantiable() {
                    let mut definition: Definition = autowire().into();
                    definition.set_name(name);
                    return Ok(Some(definition));
                }
            }
        }
        Ok(result)
    }

    /// Memoizes a singleton value under an entry name.
    ///
    /// Compiled containers share these cells with the interpreted path so
    /// both produce the identical instance for a singleton entry. The
    /// initializer runs at most once per name, also under concurrency.
    pub fn memoize(
        &self,
        name: &str,
        init: impl FnOnce() -> Result<Value, ContainerError>,
    ) -> Result<Value, ContainerError> {
        let cell = self
            .inner
            .singletons
            .entry(name.to_string())
            .or_default()
            .value()
            .clone();
        cell.get_or_try_init(init).cloned()
    }

    pub(crate) fn get_inner(
        &self,
        name: &str,
        ctx: &mut ResolveContext,
    ) -> Result<Value, ContainerError> {
        if ctx.contains(name) {
            return Err(ContainerError::CircularDependency {
                entry: name.to_string(),
                chain: ctx.chain_with(name),
            });
        }
        if let Some(cell) = self.inner.singletons.get(name) {
            if let Some(value) = cell.get() {
                return Ok(value.clone());
            }
        }
        let definition = self
            .lookup_definition(name)?
            .ok_or_else(|| ContainerError::NotFound(name.to_string()))?;
        ctx.push(name);
        let result = match definition.scope() {
            Scope::Prototype => Resolver::new(self).resolve(&definition, ctx),
            Scope::Singleton => self.memoize(name, || {
                tracing::debug!(entry = name, "resolving singleton entry");
                Resolver::new(self).resolve(&definition, ctx)
            }),
        };
        ctx.pop();
        result
    }
}

/// Builder for a [`Container`].
///
/// Sources, class declarations and the environment reader are configured
/// here; the built container is immutable configuration-wise.
pub struct ContainerBuilder {
    sources: Vec<Box<dyn DefinitionSource>>,
    registry: Arc<ClassRegistry>,
    env: Arc<dyn EnvReader>,
}

impl ContainerBuilder {
    /// Appends a definition source to the chain.
    pub fn add_source(&mut self, source: impl DefinitionSource + 'static) -> &mut Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Appends a definition map to the source chain.
    pub fn add_definitions(&mut self, definitions: DefinitionMap) -> &mut Self {
        self.add_source(definitions)
    }

    /// Registers an injectable class declaration.
    ///
    /// # Panics
    ///
    /// Panics if the declaration is malformed or the class is already
    /// registered; use [`ClassBuilder::finish`] and
    /// [`ClassRegistry::register`] for fallible registration.
    pub fn register_class(&mut self, builder: ClassBuilder) -> &mut Self {
        let record = match builder.finish() {
            Ok(record) => record,
            Err(err) => panic!("Invalid class declaration: {err}"),
        };
        if let Err(err) = self.registry.register(record) {
            panic!("Invalid class declaration: {err}");
        }
        self
    }

    /// Registry the built container will use, for fallible registration.
    pub fn classes(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    /// Replaces the environment variable source.
    pub fn with_env_reader(&mut self, reader: impl EnvReader + 'static) -> &mut Self {
        self.env = Arc::new(reader);
        self
    }

    /// Builds the container.
    pub fn build(&mut self) -> Container {
        Container {
            inner: Arc::new(ContainerInner {
                sources: take(&mut self.sources),
                registry: self.registry.clone(),
                env: self.env.clone(),
                singletons: DashMap::new(),
            }),
        }
    }
}

/// An arbitrary callable invocable through [`Container::call`].
///
/// Parameters are declared the same way as constructor parameters, so the
/// container applies identical resolution rules.
#[derive(Clone)]
pub struct Callable {
    name: String,
    points: Vec<InjectionPoint>,
    body: FactoryFn,
}

impl Callable {
    /// Wraps a closure under a diagnostic name.
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&Container, &[Value]) -> Result<Value, ContainerError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Declares the next parameter of the callable.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.points.push(InjectionPoint::from_spec(&spec));
        self
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("points", &self.points)
            .finish_non_exhaustive()
    }
}

/// Explicit arguments for [`Container::call`].
#[derive(Clone, Debug, Default)]
pub struct Args {
    positional: Vec<Input>,
    named: BTreeMap<String, Input>,
}

impl Args {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, input: impl Into<Input>) -> Self {
        self.positional.push(input.into());
        self
    }

    /// Sets a keyword argument.
    pub fn named(mut self, name: impl Into<String>, input: impl Into<Input>) -> Self {
        self.named.insert(name.into(), input.into());
        self
    }
}
