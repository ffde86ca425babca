use std::collections::{BTreeMap, BTreeSet, VecDeque};

use filament::{
    ArrayDefinition, Container, ContainerError, Definition, EnvDefinition, InjectionPoint, Input,
    MetadataExtractor as _, ObjectDefinition, PointValue, Value,
};

use crate::plan::{CompiledEntry, EnvPlan, NewPlan, Plan};
use crate::{CompileError, CompiledContainer};

/// Ahead-of-time compiler lowering container definitions into [`Plan`]s.
///
/// Compilation starts from the explicitly configured entry names and follows
/// references and inferred constructor types to transitively discovered
/// entries. Discovered entries are speculative: a failure to compile one is
/// silenced and the entry stays dynamic, while a failure on an explicitly
/// configured entry fails the whole build.
pub struct Compiler<'a> {
    container: &'a Container,
    entries: BTreeMap<String, CompiledEntry>,
    queue: VecDeque<(String, bool)>,
    seen: BTreeSet<String>,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler for a configured container.
    pub fn new(container: &'a Container) -> Self {
        Self {
            container,
            entries: BTreeMap::new(),
            queue: VecDeque::new(),
            seen: BTreeSet::new(),
        }
    }

    /// Compiles every reachable entry and returns the compiled container.
    pub fn compile(mut self) -> Result<CompiledContainer, CompileError> {
        for name in self.container.entry_names() {
            if self.seen.insert(name.clone()) {
                self.queue.push_back((name, false));
            }
        }
        while let Some((name, speculative)) = self.queue.pop_front() {
            match self.compile_entry(&name) {
                Ok(Some(entry)) => {
                    self.entries.insert(name, entry);
                }
                Ok(None) => {}
                Err(source) if speculative => {
                    tracing::debug!(entry = %name, error = %source, "skipping discovered entry");
                }
                Err(source) => {
                    return Err(CompileError::Entry {
                        entry: name,
                        source,
                    });
                }
            }
        }
        Ok(CompiledContainer::new(
            self.container.clone(),
            self.entries,
        ))
    }

    fn enqueue(&mut self, name: &str) {
        if self.seen.insert(name.to_string()) {
            self.queue.push_back((name.to_string(), true));
        }
    }

    fn compile_entry(&mut self, name: &str) -> Result<Option<CompiledEntry>, ContainerError> {
        let Some(definition) = self.container.lookup_definition(name)? else {
            return Ok(None);
        };
        let scope = definition.scope();
        let plan = self
            .lower_definition(&definition, name)?
            .unwrap_or(Plan::Dynamic);
        Ok(Some(CompiledEntry::Plan { plan, scope }))
    }

    /// Lowers a definition, or returns `None` when the entry must stay
    /// dynamic.
    fn lower_definition(
        &mut self,
        definition: &Definition,
        entry: &str,
    ) -> Result<Option<Plan>, ContainerError> {
        match definition {
            Definition::Value(def) => {
                if contains_object(def.value()) {
                    // Live objects cannot be shared with a generated artifact.
                    return Ok(None);
                }
                Ok(Some(Plan::Literal(def.value().clone())))
            }
            Definition::Reference(def) => {
                self.enqueue(def.target());
                Ok(Some(Plan::Entry(def.target().to_string())))
            }
            Definition::Factory(_) => Ok(None),
            Definition::Decorator(def) => {
                if def.decorated().is_none() {
                    return Err(ContainerError::InvalidDefinition {
                        name: entry.to_string(),
                        reason: "decorator has nothing to decorate".to_string(),
                    });
                }
                Ok(None)
            }
            Definition::Array(def) => self.lower_array(def, entry),
            Definition::Env(def) => self.lower_env(def, entry),
            Definition::Object(def) => self.lower_object(def, entry),
        }
    }

    fn lower_input(&mut self, input: &Input, entry: &str) -> Result<Option<Plan>, ContainerError> {
        match input {
            Input::Value(value) => {
                if contains_object(value) {
                    return Ok(None);
                }
                Ok(Some(Plan::Literal(value.clone())))
            }
            Input::Definition(definition) => self.lower_definition(definition, entry),
        }
    }

    fn lower_array(
        &mut self,
        def: &ArrayDefinition,
        entry: &str,
    ) -> Result<Option<Plan>, ContainerError> {
        let mut items: Vec<(Option<String>, Plan)> = match def.base() {
            Some(base) => match self.lower_definition(base, entry)? {
                Some(Plan::Array(items)) => items,
                Some(Plan::Literal(Value::Array(base))) => base
                    .iter()
                    .map(|(k, v)| (k.map(str::to_string), Plan::Literal(v.clone())))
                    .collect(),
                Some(Plan::Literal(_)) => {
                    return Err(ContainerError::InvalidDefinition {
                        name: entry.to_string(),
                        reason: "cannot extend a non-array value".to_string(),
                    });
                }
                // The base shape is only known at runtime (a reference, an
                // environment read); the entry stays dynamic and the
                // interpreted overlay applies.
                Some(_) => return Ok(None),
                None => return Ok(None),
            },
            None => Vec::new(),
        };
        for (key, input) in def.items() {
            let Some(plan) = self.lower_input(input, entry)? else {
                return Ok(None);
            };
            match key {
                // Extension values win on key collision, in place.
                Some(key) => {
                    match items.iter_mut().find(|(k, _)| k.as_deref() == Some(key)) {
                        Some(slot) => slot.1 = plan,
                        None => items.push((Some(key.clone()), plan)),
                    }
                }
                None => items.push((None, plan)),
            }
        }
        Ok(Some(Plan::Array(items)))
    }

    fn lower_env(
        &mut self,
        def: &EnvDefinition,
        entry: &str,
    ) -> Result<Option<Plan>, ContainerError> {
        let default = match def.default() {
            Some(input) => match self.lower_input(input, entry)? {
                Some(plan) => Some(Box::new(plan)),
                None => return Ok(None),
            },
            None => None,
        };
        Ok(Some(Plan::Env(EnvPlan {
            variable: def.variable().to_string(),
            entry: entry.to_string(),
            optional: def.is_optional(),
            default,
            cast: def.cast(),
        })))
    }

    fn lower_object(
        &mut self,
        def: &ObjectDefinition,
        entry: &str,
    ) -> Result<Option<Plan>, ContainerError> {
        let class = def.class();
        let registry = self.container.registry().clone();
        let record = registry
            .record(class)
            .ok_or_else(|| ContainerError::NotFound(class.to_string()))?;
        if !record.is_instantiable() {
            return Err(ContainerError::InvalidDefinition {
                name: entry.to_string(),
                reason: format!("class '{class}' is not instantiable"),
            });
        }
        let meta = registry.extract(class)?;
        let lazy = def.lazy().unwrap_or_else(|| meta.is_lazy());

        let args = match self.lower_parameters(
            meta.constructor(),
            def.positional(),
            Some(def.named()),
            &format!("constructor of class '{class}'"),
            entry,
        )? {
            Some(args) => args,
            None => return Ok(None),
        };

        let mut properties = Vec::new();
        for point in meta.properties() {
            if def.properties().iter().any(|(name, _)| name == point.name()) {
                continue;
            }
            let label = format!("property '{}' of class '{class}'", point.name());
            let Some(plan) = self.lower_point(point, &label, entry)? else {
                return Ok(None);
            };
            properties.push((point.name().to_string(), plan));
        }
        for (name, input) in def.properties() {
            let Some(plan) = self.lower_input(input, entry)? else {
                return Ok(None);
            };
            properties.push((name.clone(), plan));
        }

        let mut methods = Vec::new();
        for (method, points) in meta.methods() {
            let call = def.methods().iter().find(|c| c.method() == method);
            let empty = [];
            let positional = call.map(|c| c.positional()).unwrap_or(&empty);
            let named = call.map(|c| c.named());
            let params = match self.lower_parameters(
                points,
                positional,
                named,
                &format!("method '{method}' of class '{class}'"),
                entry,
            )? {
                Some(params) => params,
                None => return Ok(None),
            };
            methods.push((method.clone(), params));
        }
        for call in def.methods() {
            if meta.methods().iter().any(|(name, _)| name == call.method()) {
                continue;
            }
            if !record.has_method(call.method()) {
                return Err(ContainerError::InvalidDefinition {
                    name: entry.to_string(),
                    reason: format!("class '{class}' has no method '{}'", call.method()),
                });
            }
            if !call.named().is_empty() {
                return Err(ContainerError::InvalidDefinition {
                    name: entry.to_string(),
                    reason: format!(
                        "method '{}' of class '{class}' has no declared parameters for named arguments",
                        call.method()
                    ),
                });
            }
            let mut params = Vec::with_capacity(call.positional().len());
            for input in call.positional() {
                let Some(plan) = self.lower_input(input, entry)? else {
                    return Ok(None);
                };
                params.push(plan);
            }
            methods.push((call.method().to_string(), params));
        }

        Ok(Some(Plan::New(NewPlan {
            class: class.to_string(),
            lazy,
            args,
            properties,
            methods,
        })))
    }

    /// Lowers an ordered parameter list with the resolver's precedence:
    /// positional override, keyword override, declared point value, target
    /// entry, declared default.
    fn lower_parameters(
        &mut self,
        points: &[InjectionPoint],
        positional: &[Input],
        named: Option<&BTreeMap<String, Input>>,
        owner: &str,
        entry: &str,
    ) -> Result<Option<Vec<Plan>>, ContainerError> {
        let mut params = Vec::with_capacity(points.len());
        let mut cursor = 0usize;
        for point in points {
            if point.is_variadic() {
                while cursor < positional.len() {
                    let Some(plan) = self.lower_input(&positional[cursor], entry)? else {
                        return Ok(None);
                    };
                    params.push(plan);
                    cursor += 1;
                }
                break;
            }
            let plan = if cursor < positional.len() {
                let input = &positional[cursor];
                cursor += 1;
                self.lower_input(input, entry)?
            } else if let Some(input) = named.and_then(|named| named.get(point.name())) {
                self.lower_input(input, entry)?
            } else {
                let label = format!("parameter '{}' of {owner}", point.name());
                self.lower_point(point, &label, entry)?
            };
            let Some(plan) = plan else {
                return Ok(None);
            };
            params.push(plan);
        }
        if cursor < positional.len() && !points.iter().any(|p| p.is_variadic()) {
            return Err(ContainerError::InvalidDefinition {
                name: entry.to_string(),
                reason: format!(
                    "{owner} takes {} parameters, {} positional values given",
                    points.len(),
                    positional.len()
                ),
            });
        }
        if let Some(named) = named {
            for name in named.keys() {
                if !points.iter().any(|p| p.name() == name) {
                    return Err(ContainerError::InvalidDefinition {
                        name: entry.to_string(),
                        reason: format!("{owner} has no parameter '{name}' to override"),
                    });
                }
            }
        }
        Ok(Some(params))
    }

    fn lower_point(
        &mut self,
        point: &InjectionPoint,
        label: &str,
        entry: &str,
    ) -> Result<Option<Plan>, ContainerError> {
        if let PointValue::Defined(input) = point.value() {
            return self.lower_input(input, entry);
        }
        if let Some(target) = point.entry() {
            if self.container.has(target) {
                self.enqueue(target);
                return Ok(Some(Plan::Entry(target.to_string())));
            }
            if let Some(default) = point.default() {
                return Ok(Some(Plan::Literal(default.clone())));
            }
            return Err(ContainerError::NotFound(target.to_string()));
        }
        if let Some(default) = point.default() {
            return Ok(Some(Plan::Literal(default.clone())));
        }
        Err(ContainerError::InvalidDefinition {
            name: entry.to_string(),
            reason: format!("{label} has no value defined and cannot be guessed"),
        })
    }
}

fn contains_object(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(array) => array.iter().any(|(_, v)| contains_object(v)),
        _ => false,
    }
}
