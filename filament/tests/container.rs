use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use filament::{
    Args, Callable, ClassBuilder, Container, ContainerError, DefinitionMap, Value, add, array,
    create, decorate, factory, get, param, value,
};

fn build(definitions: DefinitionMap) -> Container {
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.build()
}

#[test]
fn test_value_entries() {
    let mut definitions = DefinitionMap::new();
    definitions.add("name", value("filament"));
    definitions.add("port", value(8080));
    let container = build(definitions);
    assert_eq!(container.get("name").unwrap().as_str(), Some("filament"));
    assert_eq!(container.get("port").unwrap().as_int(), Some(8080));
    assert!(container.has("name"));
    assert!(!container.has("missing"));
    assert!(matches!(
        container.get("missing"),
        Err(ContainerError::NotFound(_))
    ));
}

#[test]
#[should_panic]
fn test_duplicate_entry_panics() {
    let mut definitions = DefinitionMap::new();
    definitions.add("name", value("a"));
    definitions.add("name", value("b"));
}

#[test]
fn test_references_follow_chains() {
    let mut definitions = DefinitionMap::new();
    definitions.add("greeting", value("Hello"));
    definitions.add("message", get("greeting"));
    definitions.add("alias", get("message"));
    let container = build(definitions);
    assert_eq!(container.get("alias").unwrap().as_str(), Some("Hello"));
}

#[test]
fn test_singleton_identity() {
    let mut definitions = DefinitionMap::new();
    definitions.add("service", create("Service"));
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(ClassBuilder::new("Service"));
    let container = builder.build();
    let first = container.get("service").unwrap();
    let second = container.get("service").unwrap();
    assert!(first.same_object(&second));
}

#[test]
fn test_prototype_scope() {
    let mut definitions = DefinitionMap::new();
    definitions.add("service", create("Service").prototype());
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(ClassBuilder::new("Service"));
    let container = builder.build();
    let first = container.get("service").unwrap();
    let second = container.get("service").unwrap();
    assert!(!first.same_object(&second));
    // Distinct instances, same observable contents.
    assert_eq!(first, second);
}

#[test]
fn test_factory_runs_once_per_container() {
    let counter = Arc::new(AtomicUsize::new(0));
    let calls = counter.clone();
    let mut definitions = DefinitionMap::new();
    definitions.add(
        "id",
        factory(move |_container, _args| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Int(7))
        }),
    );
    let container = build(definitions);
    assert_eq!(container.get("id").unwrap().as_int(), Some(7));
    assert_eq!(container.get("id").unwrap().as_int(), Some(7));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_factory_parameters() {
    let mut definitions = DefinitionMap::new();
    definitions.add("base", value(40));
    definitions.add(
        "total",
        factory(|_container, args| {
            let base = args[0].as_int().unwrap_or(0);
            let extra = args[1].as_int().unwrap_or(0);
            Ok(Value::Int(base + extra))
        })
        .parameter(get("base"))
        .parameter(value(2)),
    );
    let container = build(definitions);
    assert_eq!(container.get("total").unwrap().as_int(), Some(42));
}

#[test]
fn test_decorator_wraps_earlier_source() {
    let mut base = DefinitionMap::new();
    base.add("greeting", value("hello"));
    let mut overlay = DefinitionMap::new();
    overlay.add(
        "greeting",
        decorate(|_container, decorated, _args| match decorated.as_str() {
            Some(inner) => Ok(Value::Str(format!("{inner}!"))),
            None => Ok(Value::Null),
        }),
    );
    let mut builder = Container::builder();
    builder.add_definitions(base);
    builder.add_definitions(overlay);
    let container = builder.build();
    assert_eq!(container.get("greeting").unwrap().as_str(), Some("hello!"));
}

#[test]
fn test_decorators_stack_in_source_order() {
    let mut first = DefinitionMap::new();
    first.add("word", value("a"));
    let mut second = DefinitionMap::new();
    second.add(
        "word",
        decorate(|_container, decorated, _args| match decorated.as_str() {
            Some(inner) => Ok(Value::Str(format!("{inner}b"))),
            None => Ok(Value::Null),
        }),
    );
    let mut third = DefinitionMap::new();
    third.add(
        "word",
        decorate(|_container, decorated, _args| match decorated.as_str() {
            Some(inner) => Ok(Value::Str(format!("{inner}c"))),
            None => Ok(Value::Null),
        }),
    );
    let mut builder = Container::builder();
    builder.add_definitions(first);
    builder.add_definitions(second);
    builder.add_definitions(third);
    let container = builder.build();
    assert_eq!(container.get("word").unwrap().as_str(), Some("abc"));
}

#[test]
fn test_first_source_wins_for_plain_overrides() {
    let mut base = DefinitionMap::new();
    base.add("port", value(1));
    let mut overlay = DefinitionMap::new();
    overlay.add("port", value(2));
    let mut builder = Container::builder();
    builder.add_definitions(base);
    builder.add_definitions(overlay);
    let container = builder.build();
    assert_eq!(container.get("port").unwrap().as_int(), Some(1));
}

#[test]
fn test_array_extension_appends() {
    let mut base = DefinitionMap::new();
    base.add("plugins", array(["a"]));
    let mut overlay = DefinitionMap::new();
    overlay.add("plugins", add(["b"]));
    let mut builder = Container::builder();
    builder.add_definitions(base);
    builder.add_definitions(overlay);
    let container = builder.build();
    let plugins = container.get("plugins").unwrap();
    let plugins = plugins.as_array().unwrap().clone();
    assert_eq!(plugins.len(), 2);
    assert_eq!(plugins.get_index(0).and_then(Value::as_str), Some("a"));
    assert_eq!(plugins.get_index(1).and_then(Value::as_str), Some("b"));
}

#[test]
fn test_array_extension_replaces_keys_in_place() {
    let mut base = DefinitionMap::new();
    base.add("config", array(["head"]).entry("level", value(1)));
    let mut overlay = DefinitionMap::new();
    overlay.add("config", add(Vec::<i32>::new()).entry("level", value(2)));
    let mut builder = Container::builder();
    builder.add_definitions(base);
    builder.add_definitions(overlay);
    let container = builder.build();
    let config = container.get("config").unwrap();
    let config = config.as_array().unwrap().clone();
    assert_eq!(config.len(), 2);
    assert_eq!(config.get_index(0).and_then(Value::as_str), Some("head"));
    assert_eq!(config.get("level").and_then(Value::as_int), Some(2));
}

#[test]
fn test_decorator_without_target() {
    let mut definitions = DefinitionMap::new();
    definitions.add("orphan", decorate(|_container, decorated, _args| Ok(decorated)));
    let container = build(definitions);
    assert!(matches!(
        container.get("orphan"),
        Err(ContainerError::InvalidDefinition { .. })
    ));
    assert!(!container.has("orphan"));
}

#[test]
fn test_circular_dependency() {
    let mut definitions = DefinitionMap::new();
    definitions.add("a", get("b"));
    definitions.add("b", get("a"));
    let container = build(definitions);
    let err = container.get("a").unwrap_err();
    assert!(matches!(
        err.root_cause(),
        ContainerError::CircularDependency { .. }
    ));
}

#[test]
fn test_call_resolves_parameters() {
    let mut definitions = DefinitionMap::new();
    definitions.add("prefix", value("db-"));
    let container = build(definitions);
    let callable = Callable::new("make_name", |_container, args| {
        let prefix = args[0].as_str().unwrap_or_default();
        let suffix = args[1].as_str().unwrap_or_default();
        Ok(Value::Str(format!("{prefix}{suffix}")))
    })
    .param(param("prefix").entry("prefix"))
    .param(param("suffix").default("main"));
    let result = container.call(&callable, &Args::new()).unwrap();
    assert_eq!(result.as_str(), Some("db-main"));
    let result = container
        .call(&callable, &Args::new().named("suffix", "other"))
        .unwrap();
    assert_eq!(result.as_str(), Some("db-other"));
    let result = container
        .call(&callable, &Args::new().arg("a").arg("b"))
        .unwrap();
    assert_eq!(result.as_str(), Some("ab"));
}

#[test]
fn test_concurrent_singleton_single_flight() {
    let counter = Arc::new(AtomicUsize::new(0));
    let calls = counter.clone();
    let mut definitions = DefinitionMap::new();
    definitions.add(
        "service",
        factory(move |_container, _args| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Int(7))
        }),
    );
    let container = build(definitions);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let container = container.clone();
        handles.push(std::thread::spawn(move || {
            container.get("service").unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.join().unwrap().as_int(), Some(7));
    }
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
