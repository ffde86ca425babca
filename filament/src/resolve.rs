use std::collections::BTreeMap;
use std::sync::Arc;

use crate::env::apply_cast;
use crate::meta::MetadataExtractor as _;
use crate::{
    Array, ArrayDefinition, Container, ContainerError, DecoratorDefinition, Definition,
    EnvDefinition, FactoryDefinition, InjectionPoint, Input, Instance, Object, ObjectDefinition,
    PointValue, Proxy, Value,
};

/// Chain of entry names currently being resolved.
///
/// Used for two things: explicit cycle detection (resolving an entry that is
/// already on the chain fails with [`ContainerError::CircularDependency`]
/// instead of recursing until stack exhaustion), and annotating dependency
/// failures with the path that led to them.
#[derive(Debug, Default)]
pub struct ResolveContext {
    chain: Vec<String>,
}

impl ResolveContext {
    /// Creates an empty context, the root of a `get` call.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.chain.iter().any(|v| v == name)
    }

    pub(crate) fn push(&mut self, name: &str) {
        self.chain.push(name.to_string());
    }

    pub(crate) fn pop(&mut self) {
        self.chain.pop();
    }

    pub(crate) fn chain_with(&self, name: &str) -> Vec<String> {
        let mut chain = self.chain.clone();
        chain.push(name.to_string());
        chain
    }
}

/// Per-variant definition resolution against a container.
pub struct Resolver<'a> {
    container: &'a Container,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver bound to a container.
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    /// Resolves a definition to a runtime value.
    pub fn resolve(
        &self,
        definition: &Definition,
        ctx: &mut ResolveContext,
    ) -> Result<Value, ContainerError> {
        match definition {
            Definition::Value(def) => Ok(def.value.clone()),
            Definition::Reference(def) => self.container.get_inner(&def.target, ctx),
            Definition::Factory(def) => self.resolve_factory(def, ctx),
            Definition::Decorator(def) => self.resolve_decorator(def, ctx),
            Definition::Array(def) => self.resolve_array(def, ctx),
            Definition::Env(def) => self.resolve_env(def, ctx),
            Definition::Object(def) => self.resolve_object(def, ctx),
        }
    }

    /// Returns `true` if resolving the definition can possibly succeed.
    pub fn is_resolvable(&self, definition: &Definition) -> bool {
        match definition {
            Definition::Reference(def) => self.container.has(&def.target),
            Definition::Env(def) => {
                def.optional || self.container.env_reader().get(&def.variable).is_some()
            }
            Definition::Object(def) => self
                .container
                .registry()
                .record(def.class())
                .map(|record| record.is_instantiable())
                .unwrap_or(false),
            _ => true,
        }
    }

    fn resolve_input(&self, input: &Input, ctx: &mut ResolveContext) -> Result<Value, ContainerError> {
        match input {
            Input::Value(value) => Ok(value.clone()),
            Input::Definition(definition) => self.resolve(definition, ctx),
        }
    }

    fn resolve_factory(
        &self,
        def: &FactoryDefinition,
        ctx: &mut ResolveContext,
    ) -> Result<Value, ContainerError> {
        let entry = display_name(&def.name, "<factory>");
        let mut params = Vec::with_capacity(def.parameters.len());
        for (index, input) in def.parameters.iter().enumerate() {
            let value = self
                .resolve_input(input, ctx)
                .map_err(|e| e.into_dependency(entry, format!("factory parameter {index}")))?;
            params.push(value);
        }
        (def.factory)(self.container, &params)
    }

    fn resolve_decorator(
        &self,
        def: &DecoratorDefinition,
        ctx: &mut ResolveContext,
    ) -> Result<Value, ContainerError> {
        let entry = display_name(&def.name, "<decorator>");
        let decorated = def.decorated.as_deref().ok_or_else(|| {
            ContainerError::invalid(entry, "decorator has nothing to decorate")
        })?;
        let decorated = self
            .resolve(decorated, ctx)
            .map_err(|e| e.into_dependency(entry, "decorated value"))?;
        let mut params = Vec::with_capacity(def.parameters.len());
        for (index, input) in def.parameters.iter().enumerate() {
            let value = self
                .resolve_input(input, ctx)
                .map_err(|e| e.into_dependency(entry, format!("decorator parameter {index}")))?;
            params.push(value);
        }
        (def.decorator)(self.container, decorated, &params)
    }

    fn resolve_array(
        &self,
        def: &ArrayDefinition,
        ctx: &mut ResolveContext,
    ) -> Result<Value, ContainerError> {
        let entry = display_name(&def.name, "<array>");
        let mut result = match def.base.as_deref() {
            Some(base) => {
                let base = self
                    .resolve(base, ctx)
                    .map_err(|e| e.into_dependency(entry, "extended array"))?;
                match base {
                    Value::Array(v) => v,
                    other => {
                        return Err(ContainerError::invalid(
                            entry,
                            format!("cannot extend non-array value {other:?}"),
                        ));
                    }
                }
            }
            None => Array::new(),
        };
        for (key, input) in &def.items {
            let label = match key {
                Some(key) => format!("{entry}[{key}]"),
                None => format!("{entry}[{}]", result.len()),
            };
            let value = self
                .resolve_input(input, ctx)
                .map_err(|e| e.into_dependency(entry, label))?;
            match key {
                Some(key) => result.insert(key.clone(), value),
                None => result.push(value),
            }
        }
        Ok(Value::Array(result))
    }

    fn resolve_env(
        &self,
        def: &EnvDefinition,
        ctx: &mut ResolveContext,
    ) -> Result<Value, ContainerError> {
        let entry = display_name(&def.name, "<env>");
        match self.container.env_reader().get(&def.variable) {
            Some(raw) => apply_cast(Value::Str(raw), def.cast, entry),
            None if !def.optional => Err(ContainerError::MissingEnvironmentVariable {
                variable: def.variable.clone(),
                entry: entry.to_string(),
            }),
            None => {
                let default = match def.default.as_deref() {
                    Some(input) => self.resolve_input(input, ctx).map_err(|e| {
                        e.into_dependency(entry, format!("default of variable '{}'", def.variable))
                    })?,
                    None => Value::Null,
                };
                apply_cast(default, def.cast, entry)
            }
        }
    }

    fn resolve_object(
        &self,
        def: &ObjectDefinition,
        ctx: &mut ResolveContext,
    ) -> Result<Value, ContainerError> {
        let class = def.class();
        let entry = display_name(&def.name, class).to_string();
        let registry = self.container.registry();
        let record = registry
            .record(class)
            .ok_or_else(|| ContainerError::NotFound(class.to_string()))?;
        if !record.is_instantiable() {
            return Err(ContainerError::invalid(
                entry,
                format!("class '{class}' is not instantiable"),
            ));
        }
        let meta = registry.extract(class)?;
        let lazy = def.lazy.unwrap_or_else(|| meta.is_lazy());
        if lazy {
            let container = self.container.clone();
            let def = def.clone();
            let proxy = Proxy::new(class, move || {
                let resolver = Resolver::new(&container);
                resolver.construct_object(&def, &mut ResolveContext::new())
            });
            return Ok(Value::Object(Object::Lazy(proxy)));
        }
        Ok(Value::Object(Object::Real(
            self.construct_object(def, ctx)?,
        )))
    }

    /// Runs the full construction sequence of an object definition:
    /// constructor, then property injections, then method injections.
    pub(crate) fn construct_object(
        &self,
        def: &ObjectDefinition,
        ctx: &mut ResolveContext,
    ) -> Result<Arc<Instance>, ContainerError> {
        let class = def.class();
        let entry = display_name(&def.name, class).to_string();
        let registry = self.container.registry();
        let record = registry
            .record(class)
            .ok_or_else(|| ContainerError::NotFound(class.to_string()))?;
        let meta = registry.extract(class)?;
        tracing::trace!(entry = %entry, class = %class, "constructing object");

        let args = self.resolve_parameters(
            &entry,
            &format!("constructor of class '{class}'"),
            meta.constructor(),
            &def.positional,
            &def.named,
            ctx,
        )?;
        let instance = record
            .instantiate(&args)
            .map_err(|e| e.into_dependency(entry.clone(), format!("constructor of class '{class}'")))?;

        // Class-level property points first; definition-level values win.
        for point in meta.properties() {
            if def.properties.iter().any(|(name, _)| name == point.name()) {
                continue;
            }
            let label = format!("property '{}' of class '{class}'", point.name());
            let value = self.resolve_point(&entry, &label, point, ctx)?;
            instance.set(point.name().to_string(), value);
        }
        for (name, input) in &def.properties {
            let label = format!("property '{name}' of class '{class}'");
            let value = self
                .resolve_input(input, ctx)
                .map_err(|e| e.into_dependency(entry.clone(), label))?;
            instance.set(name.clone(), value);
        }

        for (method, points) in meta.methods() {
            let call = def.methods.iter().find(|c| &c.method == method);
            let empty_positional = Vec::new();
            let empty_named = BTreeMap::new();
            let (positional, named) = match call {
                Some(call) => (&call.positional, &call.named),
                None => (&empty_positional, &empty_named),
            };
            let args = self.resolve_parameters(
                &entry,
                &format!("method '{method}' of class '{class}'"),
                points,
                positional,
                named,
                ctx,
            )?;
            record
                .call_method(&instance, method, &args)
                .map_err(|e| {
                    e.into_dependency(entry.clone(), format!("method '{method}' of class '{class}'"))
                })?;
        }
        // Definition-level method calls with no class declaration: only the
        // supplied positional values are available.
        for call in &def.methods {
            if meta.methods().iter().any(|(name, _)| name == &call.method) {
                continue;
            }
            if !call.named.is_empty() {
                return Err(ContainerError::invalid(
                    entry.clone(),
                    format!(
                        "method '{}' of class '{class}' has no declared parameters for named arguments",
                        call.method
                    ),
                ));
            }
            let mut args = Vec::with_capacity(call.positional.len());
            for (index, input) in call.positional.iter().enumerate() {
                let label =
                    format!("parameter {index} of method '{}' of class '{class}'", call.method);
                let value = self
                    .resolve_input(input, ctx)
                    .map_err(|e| e.into_dependency(entry.clone(), label))?;
                args.push(value);
            }
            record
                .call_method(&instance, &call.method, &args)
                .map_err(|e| {
                    e.into_dependency(
                        entry.clone(),
                        format!("method '{}' of class '{class}'", call.method),
                    )
                })?;
        }
        Ok(instance)
    }

    /// Resolves an ordered parameter list against injection points.
    ///
    /// Precedence per point: positional override, keyword override, declared
    /// point value, target entry lookup, declared default. A trailing
    /// variadic point consumes all remaining positional overrides.
    pub(crate) fn resolve_parameters(
        &self,
        entry: &str,
        owner: &str,
        points: &[InjectionPoint],
        positional: &[Input],
        named: &BTreeMap<String, Input>,
        ctx: &mut ResolveContext,
    ) -> Result<Vec<Value>, ContainerError> {
        let mut args = Vec::with_capacity(points.len());
        let mut cursor = 0usize;
        for point in points {
            if point.is_variadic() {
                while cursor < positional.len() {
                    let label = format!("variadic parameter '{}' of {owner}", point.name());
                    let value = self
                        .resolve_input(&positional[cursor], ctx)
                        .map_err(|e| e.into_dependency(entry.to_string(), label))?;
                    args.push(value);
                    cursor += 1;
                }
                break;
            }
            let label = format!("parameter '{}' of {owner}", point.name());
            let value = if cursor < positional.len() {
                let input = &positional[cursor];
                cursor += 1;
                self.resolve_input(input, ctx)
                    .map_err(|e| e.into_dependency(entry.to_string(), label))?
            } else if let Some(input) = named.get(point.name()) {
                self.resolve_input(input, ctx)
                    .map_err(|e| e.into_dependency(entry.to_string(), label))?
            } else {
                self.resolve_point(entry, &label, point, ctx)?
            };
            args.push(value);
        }
        if cursor < positional.len() && !points.iter().any(|p| p.is_variadic()) {
            return Err(ContainerError::invalid(
                entry,
                format!(
                    "{owner} takes {} parameters, {} positional values given",
                    points.len(),
                    positional.len()
                ),
            ));
        }
        // A keyword override that matches no declared point is a typo, not
        // something to drop on the floor.
        for name in named.keys() {
            if !points.iter().any(|p| p.name() == name) {
                return Err(ContainerError::invalid(
                    entry,
                    format!("{owner} has no parameter '{name}' to override"),
                ));
            }
        }
        Ok(args)
    }

    /// Resolves one injection point with no call-site overrides.
    fn resolve_point(
        &self,
        entry: &str,
        label: &str,
        point: &InjectionPoint,
        ctx: &mut ResolveContext,
    ) -> Result<Value, ContainerError> {
        if let PointValue::Defined(input) = point.value() {
            return self
                .resolve_input(input, ctx)
                .map_err(|e| e.into_dependency(entry.to_string(), label.to_string()));
        }
        if let Some(target) = point.entry() {
            if self.container.has(target) {
                return self
                    .container
                    .get_inner(target, ctx)
                    .map_err(|e| e.into_dependency(entry.to_string(), label.to_string()));
            }
            // An unresolvable target is only an error when the point has no
            // declared fallback.
            if let Some(default) = point.default() {
                return Ok(default.clone());
            }
            return Err(ContainerError::NotFound(target.to_string())
                .into_dependency(entry.to_string(), label.to_string()));
        }
        if let Some(default) = point.default() {
            return Ok(default.clone());
        }
        Err(ContainerError::invalid(
            entry,
            format!("{label} has no value defined and cannot be guessed"),
        ))
    }
}

fn display_name<'n>(name: &'n str, fallback: &'n str) -> &'n str {
    if name.is_empty() { fallback } else { name }
}
