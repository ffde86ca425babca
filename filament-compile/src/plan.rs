use filament::{Cast, Scope, Value};

use crate::ProducerFn;

/// Lowered resolution plan for one entry.
///
/// A plan is what remains of a definition after the compiler has folded in
/// class metadata and resolved every injection point: executing it performs
/// no metadata extraction and no definition lookups. Entries the compiler
/// cannot lower (factory and decorator closures, live object values) become
/// [`Plan::Dynamic`] and are resolved through the delegate container at
/// runtime.
#[derive(Clone, Debug)]
pub enum Plan {
    /// Literal value known at compile time.
    Literal(Value),
    /// Lookup of another entry by name.
    Entry(String),
    /// Environment variable read.
    Env(EnvPlan),
    /// Array built element by element; keys are static.
    Array(Vec<(Option<String>, Plan)>),
    /// Object construction with metadata folded in.
    New(NewPlan),
    /// Entry left to the delegate container.
    Dynamic,
}

/// Environment variable read with its cast and default folded in.
#[derive(Clone, Debug)]
pub struct EnvPlan {
    pub(crate) variable: String,
    pub(crate) entry: String,
    pub(crate) optional: bool,
    pub(crate) default: Option<Box<Plan>>,
    pub(crate) cast: Option<Cast>,
}

/// Object construction sequence with every injection point resolved.
///
/// Argument, property and method-parameter plans are in final call order;
/// nothing is inferred at execution time.
#[derive(Clone, Debug)]
pub struct NewPlan {
    pub(crate) class: String,
    pub(crate) lazy: bool,
    pub(crate) args: Vec<Plan>,
    pub(crate) properties: Vec<(String, Plan)>,
    pub(crate) methods: Vec<(String, Vec<Plan>)>,
}

#[derive(Clone, Debug)]
pub(crate) enum CompiledEntry {
    Plan { plan: Plan, scope: Scope },
    Producer { shared: bool, producer: ProducerFn },
}
