use std::io::Write as _;
use std::path::Path;

use filament::{Cast, Scope, Value};

use crate::plan::{CompiledEntry, EnvPlan, NewPlan, Plan};
use crate::{CompileError, CompiledContainer};

impl CompiledContainer {
    /// Writes the generated artifact source to `path`.
    ///
    /// The artifact is a Rust source file whose `load()` function returns the
    /// producer table of every emittable compiled entry; dynamic entries and
    /// lazy objects are left out and keep resolving through the delegate. The
    /// write is atomic: the source lands in a temporary file in the target
    /// directory and is renamed into place. An already existing file makes
    /// the emission a no-op returning `false`.
    pub fn emit(&self, path: impl AsRef<Path>) -> Result<bool, CompileError> {
        let path = path.as_ref();
        if path.try_exists()? {
            tracing::debug!(path = %path.display(), "artifact already exists");
            return Ok(false);
        }
        let source = self.render();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(source.as_bytes())?;
        file.persist(path).map_err(|e| CompileError::Io(e.error))?;
        tracing::debug!(path = %path.display(), "artifact written");
        Ok(true)
    }

    /// Renders the artifact source without writing it.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        let mut uses_value = false;
        for (name, entry) in self.entries() {
            let CompiledEntry::Plan { plan, scope } = entry else {
                continue;
            };
            let mut uses = Uses::default();
            let Some(expr) = plan_expr(plan, &mut uses) else {
                continue;
            };
            let shared = matches!(scope, Scope::Singleton);
            let param = if uses.container {
                "container"
            } else {
                "_container"
            };
            uses_value |= uses.value;
            lines.push(format!(
                "        ArtifactEntry::new({name:?}, {shared}, |{param}| Ok({expr})),"
            ));
        }
        let mut out = String::new();
        out.push_str("// Generated by filament-compile. Do not edit.\n\n");
        if uses_value {
            out.push_str("use filament::Value;\n");
        }
        out.push_str("use filament_compile::{Artifact, ArtifactEntry};\n\n");
        out.push_str("pub fn load() -> Artifact {\n");
        out.push_str("    Artifact::new(vec![\n");
        for line in &lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("    ])\n");
        out.push_str("}\n");
        out
    }
}

/// What a rendered expression refers to, tracked so the generated source
/// names its closure parameter and imports exactly what it uses.
#[derive(Default)]
struct Uses {
    container: bool,
    value: bool,
}

/// Renders a plan as an expression of type `Value`, or `None` when the plan
/// cannot be represented in generated source.
fn plan_expr(plan: &Plan, uses: &mut Uses) -> Option<String> {
    match plan {
        Plan::Literal(value) => value_expr(value, uses),
        Plan::Entry(target) => {
            uses.container = true;
            Some(format!("container.get({target:?})?"))
        }
        Plan::Env(plan) => env_expr(plan, uses),
        Plan::Array(items) => {
            uses.value = true;
            let mut out = String::from("{ let mut array = filament::Array::new(); ");
            for (key, plan) in items {
                let expr = plan_expr(plan, uses)?;
                match key {
                    Some(key) => out.push_str(&format!("array.insert({key:?}, {expr}); ")),
                    None => out.push_str(&format!("array.push({expr}); ")),
                }
            }
            out.push_str("Value::Array(array) }");
            Some(out)
        }
        Plan::New(plan) => new_expr(plan, uses),
        Plan::Dynamic => None,
    }
}

fn env_expr(plan: &EnvPlan, uses: &mut Uses) -> Option<String> {
    uses.container = true;
    uses.value = true;
    let cast = cast_expr(plan.cast);
    let variable = &plan.variable;
    let entry = &plan.entry;
    let absent = if plan.optional {
        let default = match &plan.default {
            Some(plan) => plan_expr(plan, uses)?,
            None => String::from("Value::Null"),
        };
        format!("filament::apply_cast({default}, {cast}, {entry:?})")
    } else {
        format!(
            "Err(filament::ContainerError::MissingEnvironmentVariable {{ variable: {variable:?}.into(), entry: {entry:?}.into() }})"
        )
    };
    Some(format!(
        "(match container.env_reader().get({variable:?}) {{ Some(raw) => filament::apply_cast(Value::Str(raw), {cast}, {entry:?}), None => {absent} }})?"
    ))
}

fn new_expr(plan: &NewPlan, uses: &mut Uses) -> Option<String> {
    // Deferred construction needs a proxy closure, which a plain producer
    // table cannot carry; lazy entries stay with the delegate.
    if plan.lazy {
        return None;
    }
    uses.container = true;
    let mut args = Vec::with_capacity(plan.args.len());
    for arg in &plan.args {
        args.push(plan_expr(arg, uses)?);
    }
    let mut properties = Vec::with_capacity(plan.properties.len());
    for (name, plan) in &plan.properties {
        properties.push(format!("({name:?}, {})", plan_expr(plan, uses)?));
    }
    let mut methods = Vec::with_capacity(plan.methods.len());
    for (method, params) in &plan.methods {
        let mut exprs = Vec::with_capacity(params.len());
        for param in params {
            exprs.push(plan_expr(param, uses)?);
        }
        methods.push(format!("({method:?}, vec![{}])", exprs.join(", ")));
    }
    Some(format!(
        "filament_compile::runtime::new_object(container, {:?}, vec![{}], vec![{}], vec![{}])?",
        plan.class,
        args.join(", "),
        properties.join(", "),
        methods.join(", "),
    ))
}

fn value_expr(value: &Value, uses: &mut Uses) -> Option<String> {
    uses.value = true;
    match value {
        Value::Null => Some(String::from("Value::Null")),
        Value::Bool(v) => Some(format!("Value::Bool({v})")),
        Value::Int(v) => Some(format!("Value::Int({v}i64)")),
        Value::Float(v) if v.is_finite() => Some(format!("Value::Float({v:?}f64)")),
        Value::Float(_) => None,
        Value::Str(v) => Some(format!("Value::Str({v:?}.into())")),
        Value::Array(array) => {
            let mut out = String::from("{ let mut array = filament::Array::new(); ");
            for (key, value) in array.iter() {
                let expr = value_expr(value, uses)?;
                match key {
                    Some(key) => out.push_str(&format!("array.insert({key:?}, {expr}); ")),
                    None => out.push_str(&format!("array.push({expr}); ")),
                }
            }
            out.push_str("Value::Array(array) }");
            Some(out)
        }
        Value::Object(_) => None,
    }
}

fn cast_expr(cast: Option<Cast>) -> &'static str {
    match cast {
        None => "None",
        Some(Cast::Int) => "Some(filament::Cast::Int)",
        Some(Cast::Float) => "Some(filament::Cast::Float)",
        Some(Cast::Bool) => "Some(filament::Cast::Bool)",
    }
}
