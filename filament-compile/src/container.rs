use std::collections::BTreeMap;
use std::sync::Arc;

use filament::{
    Array, Container, ContainerError, Instance, Object, Proxy, Scope, Value, apply_cast,
};

use crate::Artifact;
use crate::plan::{CompiledEntry, EnvPlan, NewPlan, Plan};

struct Inner {
    delegate: Container,
    entries: BTreeMap<String, CompiledEntry>,
}

/// Container backed by compiled plans, falling back to a delegate.
///
/// Compiled entries execute their [`Plan`] directly; everything else — entries
/// the compiler skipped and entries that stayed dynamic — goes through the
/// delegate container. Singleton values are memoized in the delegate's own
/// cells, so the compiled and the interpreted path hand out the identical
/// instance for the same entry.
#[derive(Clone)]
pub struct CompiledContainer {
    inner: Arc<Inner>,
}

impl CompiledContainer {
    pub(crate) fn new(delegate: Container, entries: BTreeMap<String, CompiledEntry>) -> Self {
        Self {
            inner: Arc::new(Inner { delegate, entries }),
        }
    }

    /// Builds a compiled container from a loaded artifact.
    ///
    /// The artifact's producers run against the delegate, and shared entries
    /// are memoized in the delegate's singleton cells.
    pub fn from_artifact(delegate: Container, artifact: Artifact) -> Self {
        let entries = artifact
            .iter()
            .map(|entry| {
                (
                    entry.name().to_string(),
                    CompiledEntry::Producer {
                        shared: entry.is_shared(),
                        producer: entry.producer(),
                    },
                )
            })
            .collect();
        Self::new(delegate, entries)
    }

    /// Resolves an entry, preferring its compiled plan.
    pub fn get(&self, name: &str) -> Result<Value, ContainerError> {
        self.get_chain(name, &mut Vec::new())
    }

    /// Returns `true` if the entry is compiled or resolvable by the delegate.
    pub fn has(&self, name: &str) -> bool {
        self.inner.entries.contains_key(name) || self.inner.delegate.has(name)
    }

    /// The container compiled plans fall back to.
    pub fn delegate(&self) -> &Container {
        &self.inner.delegate
    }

    /// Names of entries with a compiled plan or producer, in sorted order.
    ///
    /// Entries that stayed dynamic are included: they are compiled to an
    /// explicit delegate fallback.
    pub fn compiled_names(&self) -> Vec<String> {
        self.inner.entries.keys().cloned().collect()
    }

    pub(crate) fn entries(&self) -> &BTreeMap<String, CompiledEntry> {
        &self.inner.entries
    }

    fn get_chain(&self, name: &str, chain: &mut Vec<String>) -> Result<Value, ContainerError> {
        let Some(entry) = self.inner.entries.get(name) else {
            return self.inner.delegate.get(name);
        };
        if chain.iter().any(|v| v == name) {
            let mut cycle = chain.clone();
            cycle.push(name.to_string());
            return Err(ContainerError::CircularDependency {
                entry: name.to_string(),
                chain: cycle,
            });
        }
        match entry {
            CompiledEntry::Plan {
                plan: Plan::Dynamic,
                ..
            } => self.inner.delegate.get(name),
            CompiledEntry::Plan { plan, scope } => {
                chain.push(name.to_string());
                let result = match scope {
                    Scope::Prototype => self.execute(plan, name, chain),
                    Scope::Singleton => self
                        .inner
                        .delegate
                        .memoize(name, || self.execute(plan, name, chain)),
                };
                chain.pop();
                result
            }
            CompiledEntry::Producer { shared, producer } => {
                let producer = *producer;
                if *shared {
                    self.inner
                        .delegate
                        .memoize(name, || producer(&self.inner.delegate))
                } else {
                    producer(&self.inner.delegate)
                }
            }
        }
    }

    fn execute(
        &self,
        plan: &Plan,
        entry: &str,
        chain: &mut Vec<String>,
    ) -> Result<Value, ContainerError> {
        match plan {
            Plan::Literal(value) => Ok(value.clone()),
            Plan::Entry(target) => self.get_chain(target, chain),
            Plan::Env(plan) => self.execute_env(plan, entry, chain),
            Plan::Array(items) => {
                let mut array = Array::new();
                for (key, plan) in items {
                    let value = self.execute(plan, entry, chain)?;
                    match key {
                        Some(key) => array.insert(key.clone(), value),
                        None => array.push(value),
                    }
                }
                Ok(Value::Array(array))
            }
            Plan::New(plan) if plan.lazy => {
                let this = self.clone();
                let plan = plan.clone();
                let entry = entry.to_string();
                let proxy = Proxy::new(plan.class.clone(), move || {
                    this.construct(&plan, &entry, &mut Vec::new())
                });
                Ok(Value::Object(Object::Lazy(proxy)))
            }
            Plan::New(plan) => Ok(Value::object(self.construct(plan, entry, chain)?)),
            Plan::Dynamic => self.inner.delegate.get(entry),
        }
    }

    fn execute_env(
        &self,
        plan: &EnvPlan,
        entry: &str,
        chain: &mut Vec<String>,
    ) -> Result<Value, ContainerError> {
        match self.inner.delegate.env_reader().get(&plan.variable) {
            Some(raw) => apply_cast(Value::Str(raw), plan.cast, &plan.entry),
            None if !plan.optional => Err(ContainerError::MissingEnvironmentVariable {
                variable: plan.variable.clone(),
                entry: plan.entry.clone(),
            }),
            None => {
                let default = match &plan.default {
                    Some(plan) => self.execute(plan, entry, chain)?,
                    None => Value::Null,
                };
                apply_cast(default, plan.cast, &plan.entry)
            }
        }
    }

    fn construct(
        &self,
        plan: &NewPlan,
        entry: &str,
        chain: &mut Vec<String>,
    ) -> Result<Arc<Instance>, ContainerError> {
        let registry = self.inner.delegate.registry();
        let record = registry
            .record(&plan.class)
            .ok_or_else(|| ContainerError::NotFound(plan.class.clone()))?;
        let mut args = Vec::with_capacity(plan.args.len());
        for arg in &plan.args {
            args.push(self.execute(arg, entry, chain)?);
        }
        let instance = record.instantiate(&args)?;
        for (name, plan) in &plan.properties {
            let value = self.execute(plan, entry, chain)?;
            instance.set(name.clone(), value);
        }
        for (method, params) in &plan.methods {
            let mut args = Vec::with_capacity(params.len());
            for param in params {
                args.push(self.execute(param, entry, chain)?);
            }
            record.call_method(&instance, method, &args)?;
        }
        Ok(instance)
    }
}

impl std::fmt::Debug for CompiledContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledContainer")
            .field("entries", &self.inner.entries.len())
            .finish_non_exhaustive()
    }
}
