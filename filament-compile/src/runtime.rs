//! Support functions called by generated artifacts.

use filament::{Container, ContainerError, Value};

/// Constructs an object from pre-resolved arguments, properties and method
/// parameters.
///
/// The class record still comes from the container's registry: method bodies
/// and custom constructors are code, not data, and cannot be baked into a
/// generated source file.
pub fn new_object(
    container: &Container,
    class: &str,
    args: Vec<Value>,
    properties: Vec<(&str, Value)>,
    methods: Vec<(&str, Vec<Value>)>,
) -> Result<Value, ContainerError> {
    let record = container
        .registry()
        .record(class)
        .ok_or_else(|| ContainerError::NotFound(class.to_string()))?;
    let instance = record.instantiate(&args)?;
    for (name, value) in properties {
        instance.set(name, value);
    }
    for (method, args) in methods {
        record.call_method(&instance, method, &args)?;
    }
    Ok(Value::object(instance))
}
