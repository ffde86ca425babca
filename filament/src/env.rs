use crate::{Cast, ContainerError, Value};

/// Source of environment variable values.
///
/// The container reads the process environment by default; tests and
/// compiled containers can substitute any other source.
pub trait EnvReader: Send + Sync {
    /// Returns the raw value of a variable, or `None` when unset.
    fn get(&self, name: &str) -> Option<String>;
}

/// Reader backed by [`std::env::var`].
#[derive(Clone, Copy, Debug, Default)]
pub struct StdEnv;

impl EnvReader for StdEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Applies a declared scalar cast to a resolved value.
///
/// Cast failures are reproduced as [`ContainerError::InvalidDefinition`]
/// instead of silently coercing to a zero value: a non-numeric default cast
/// to int is an error the caller must see.
pub fn apply_cast(value: Value, cast: Option<Cast>, entry: &str) -> Result<Value, ContainerError> {
    let Some(cast) = cast else {
        return Ok(value);
    };
    // An absent optional variable without default stays null.
    if matches!(value, Value::Null) {
        return Ok(value);
    }
    match (cast, value) {
        (Cast::Int, Value::Int(v)) => Ok(Value::Int(v)),
        (Cast::Int, Value::Bool(v)) => Ok(Value::Int(v.into())),
        (Cast::Int, Value::Float(v)) => Ok(Value::Int(v as i64)),
        (Cast::Int, Value::Str(v)) => match v.trim().parse::<i64>() {
            Ok(v) => Ok(Value::Int(v)),
            Err(_) => Err(ContainerError::invalid(
                entry,
                format!("cannot cast '{v}' to int"),
            )),
        },
        (Cast::Float, Value::Float(v)) => Ok(Value::Float(v)),
        (Cast::Float, Value::Int(v)) => Ok(Value::Float(v as f64)),
        (Cast::Float, Value::Str(v)) => match v.trim().parse::<f64>() {
            Ok(v) => Ok(Value::Float(v)),
            Err(_) => Err(ContainerError::invalid(
                entry,
                format!("cannot cast '{v}' to float"),
            )),
        },
        (Cast::Bool, Value::Bool(v)) => Ok(Value::Bool(v)),
        (Cast::Bool, Value::Int(v)) => Ok(Value::Bool(v != 0)),
        (Cast::Bool, Value::Str(v)) => match parse_bool(&v) {
            Some(v) => Ok(Value::Bool(v)),
            None => Err(ContainerError::invalid(
                entry,
                format!("cannot cast '{v}' to bool"),
            )),
        },
        (cast, value) => Err(ContainerError::invalid(
            entry,
            format!("cannot cast {value:?} to {cast:?}"),
        )),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
