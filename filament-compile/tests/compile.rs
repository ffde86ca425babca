use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use filament::test::MapEnv;
use filament::{
    Cast, ClassBuilder, Container, ContainerError, DefinitionMap, Value, add, array, create,
    decorate, env, factory, get, param, value,
};
use filament_compile::{Artifact, ArtifactEntry, CompileError, CompiledContainer, Compiler};

fn build(definitions: DefinitionMap) -> Container {
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.build()
}

#[test]
fn test_compiled_matches_interpreted() {
    let mut definitions = DefinitionMap::new();
    definitions.add("greeting", value("Hello"));
    definitions.add("message", get("greeting"));
    definitions.add(
        "port",
        env("APP_PORT").default("8080").cast(Cast::Int),
    );
    definitions.add("Service", create("Service"));
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.with_env_reader(MapEnv::new());
    builder.register_class(
        ClassBuilder::new("Service").constructor([param("message").entry("message")]),
    );
    let container = builder.build();

    let compiled = Compiler::new(&container).compile().unwrap();
    assert_eq!(compiled.get("message").unwrap().as_str(), Some("Hello"));
    assert_eq!(compiled.get("port").unwrap().as_int(), Some(8080));

    // Singleton identity is shared with the interpreted path.
    let from_compiled = compiled.get("Service").unwrap();
    let from_delegate = container.get("Service").unwrap();
    assert!(from_compiled.same_object(&from_delegate));
}

#[test]
fn test_transitive_discovery() {
    let mut definitions = DefinitionMap::new();
    definitions.add("Service", create("Service"));
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(ClassBuilder::new("Logger"));
    builder.register_class(
        ClassBuilder::new("Service").constructor([param("logger").of_class("Logger")]),
    );
    let container = builder.build();

    let compiled = Compiler::new(&container).compile().unwrap();
    // Logger was never configured explicitly; the compiler discovered it
    // through the constructor type.
    assert!(compiled.compiled_names().contains(&"Logger".to_string()));
    let service = compiled.get("Service").unwrap();
    let logger = service.as_object().unwrap().get("logger").unwrap().unwrap();
    assert!(logger.same_object(&compiled.get("Logger").unwrap()));
}

#[test]
fn test_factory_stays_dynamic() {
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
    let compiled = Compiler::new(&container).compile().unwrap();

    assert_eq!(compiled.get("id").unwrap().as_int(), Some(7));
    // Memoization still happens in the shared delegate cells.
    assert_eq!(container.get("id").unwrap().as_int(), Some(7));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    // Dynamic entries never reach the artifact.
    assert!(!compiled.render().contains("\"id\""));
}

#[test]
fn test_dangling_decorator_fails_build() {
    let mut definitions = DefinitionMap::new();
    definitions.add(
        "orphan",
        decorate(|_container, decorated, _args| Ok(decorated)),
    );
    let container = build(definitions);
    assert!(matches!(
        Compiler::new(&container).compile(),
        Err(CompileError::Entry { .. })
    ));
}

#[test]
fn test_unguessable_parameter_fails_build() {
    let mut definitions = DefinitionMap::new();
    definitions.add("Service", create("Service"));
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(
        ClassBuilder::new("Service").constructor([param("timeout").scalar()]),
    );
    let container = builder.build();
    let err = Compiler::new(&container).compile().unwrap_err();
    let CompileError::Entry { entry, source } = err else {
        panic!("expected a compile failure");
    };
    assert_eq!(entry, "Service");
    assert!(matches!(source, ContainerError::InvalidDefinition { .. }));
}

#[test]
fn test_speculative_failure_is_silenced() {
    let mut definitions = DefinitionMap::new();
    definitions.add("alias", get("missing"));
    let container = build(definitions);
    // The dangling reference compiles; the failure surfaces at runtime.
    let compiled = Compiler::new(&container).compile().unwrap();
    assert!(matches!(
        compiled.get("alias").unwrap_err().root_cause(),
        ContainerError::NotFound(_)
    ));
}

#[test]
fn test_array_extension_compiles() {
    let mut base = DefinitionMap::new();
    base.add("plugins", array(["a"]).entry("level", value(1)));
    let mut overlay = DefinitionMap::new();
    overlay.add("plugins", add(["b"]).entry("level", value(2)));
    let mut builder = Container::builder();
    builder.add_definitions(base);
    builder.add_definitions(overlay);
    let container = builder.build();

    let compiled = Compiler::new(&container).compile().unwrap();
    assert_eq!(compiled.get("plugins").unwrap(), container.get("plugins").unwrap());
    let plugins = compiled.get("plugins").unwrap();
    let plugins = plugins.as_array().unwrap();
    assert_eq!(plugins.get("level").and_then(Value::as_int), Some(2));
}

#[test]
fn test_extension_of_reference_base_stays_dynamic() {
    let mut base = DefinitionMap::new();
    base.add("list", array(["a"]));
    base.add("plugins", get("list"));
    let mut overlay = DefinitionMap::new();
    overlay.add("plugins", add(["b"]));
    let mut builder = Container::builder();
    builder.add_definitions(base);
    builder.add_definitions(overlay);
    let container = builder.build();

    // The base shape is only known at runtime, so the entry is not lowered;
    // it still resolves like the interpreted path does.
    let compiled = Compiler::new(&container).compile().unwrap();
    let plugins = compiled.get("plugins").unwrap();
    assert_eq!(plugins, container.get("plugins").unwrap());
    let plugins = plugins.as_array().unwrap();
    assert_eq!(plugins.get_index(0).and_then(Value::as_str), Some("a"));
    assert_eq!(plugins.get_index(1).and_then(Value::as_str), Some("b"));
    assert!(!compiled.render().contains("\"plugins\""));
}

#[test]
fn test_extension_of_non_array_literal_fails_build() {
    let mut base = DefinitionMap::new();
    base.add("plugins", value("not-an-array"));
    let mut overlay = DefinitionMap::new();
    overlay.add("plugins", add(["b"]));
    let mut builder = Container::builder();
    builder.add_definitions(base);
    builder.add_definitions(overlay);
    let container = builder.build();
    assert!(matches!(
        Compiler::new(&container).compile(),
        Err(CompileError::Entry { .. })
    ));
}

#[test]
fn test_unknown_named_override_fails_build() {
    let mut definitions = DefinitionMap::new();
    definitions.add("Service", create("Service").constructor_param("dns", value("x")));
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(
        ClassBuilder::new("Service").constructor([param("dsn").value(value("default"))]),
    );
    let container = builder.build();
    let err = Compiler::new(&container).compile().unwrap_err();
    let CompileError::Entry { entry, source } = err else {
        panic!("expected a compile failure");
    };
    assert_eq!(entry, "Service");
    match source {
        ContainerError::InvalidDefinition { reason, .. } => {
            assert!(reason.contains("dns"), "got: {reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_prototype_scope_survives_compilation() {
    let mut definitions = DefinitionMap::new();
    definitions.add("service", create("Service").prototype());
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(ClassBuilder::new("Service"));
    let container = builder.build();

    let compiled = Compiler::new(&container).compile().unwrap();
    let first = compiled.get("service").unwrap();
    let second = compiled.get("service").unwrap();
    assert!(!first.same_object(&second));
}

#[test]
fn test_lazy_entries_stay_lazy() {
    let counter = Arc::new(AtomicUsize::new(0));
    let calls = counter.clone();
    let mut definitions = DefinitionMap::new();
    definitions.add("service", create("Service").lazy());
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(ClassBuilder::new("Service").construct_with(move |_args| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(filament::Instance::new("Service"))
    }));
    let container = builder.build();

    let compiled = Compiler::new(&container).compile().unwrap();
    let service = compiled.get("service").unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    service.as_object().unwrap().instance().unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    // Lazy construction cannot be represented in a producer table.
    assert!(!compiled.render().contains("\"service\""));
}

#[test]
fn test_circular_reference_detected_at_runtime() {
    let mut definitions = DefinitionMap::new();
    definitions.add("a", get("b"));
    definitions.add("b", get("a"));
    let container = build(definitions);
    let compiled = Compiler::new(&container).compile().unwrap();
    assert!(matches!(
        compiled.get("a").unwrap_err().root_cause(),
        ContainerError::CircularDependency { .. }
    ));
}

#[test]
fn test_emit_is_atomic_and_idempotent() {
    let mut definitions = DefinitionMap::new();
    definitions.add("greeting", value("Hello"));
    definitions.add("message", get("greeting"));
    let container = build(definitions);
    let compiled = Compiler::new(&container).compile().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("container.rs");
    assert!(compiled.emit(&path).unwrap());
    let first = std::fs::read_to_string(&path).unwrap();
    assert!(first.contains("pub fn load() -> Artifact"));
    assert!(first.contains("\"greeting\""));
    assert!(first.contains("\"message\""));

    // A second emission is a no-op that leaves the file untouched.
    assert!(!compiled.emit(&path).unwrap());
    let second = std::fs::read_to_string(&path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_artifact_round_trip() {
    let mut definitions = DefinitionMap::new();
    definitions.add("greeting", value("Hello"));
    definitions.add("message", get("greeting"));
    let container = build(definitions);

    // The shape a generated artifact's load() function produces.
    let artifact = Artifact::new(vec![
        ArtifactEntry::new("greeting", true, |_container| {
            Ok(Value::Str("Hello".into()))
        }),
        ArtifactEntry::new("message", true, |container| Ok(container.get("greeting")?)),
    ]);
    let compiled = CompiledContainer::from_artifact(container.clone(), artifact);
    assert_eq!(compiled.get("message").unwrap().as_str(), Some("Hello"));
    assert!(compiled.has("greeting"));
    // Shared producers memoize into the delegate's cells.
    assert_eq!(container.get("greeting").unwrap().as_str(), Some("Hello"));
}

#[test]
fn test_render_marks_unused_closure_params() {
    let mut definitions = DefinitionMap::new();
    // The entry name contains "container" but the literal never touches one.
    definitions.add("container.mode", value("dev"));
    definitions.add("alias", get("container.mode"));
    let container = build(definitions);
    let compiled = Compiler::new(&container).compile().unwrap();

    let rendered = compiled.render();
    assert!(rendered.contains("ArtifactEntry::new(\"container.mode\", true, |_container|"));
    assert!(rendered.contains("ArtifactEntry::new(\"alias\", true, |container|"));
}

#[test]
fn test_env_entries_compile() {
    let mut definitions = DefinitionMap::new();
    definitions.add("port", env("APP_PORT").cast(Cast::Int));
    definitions.add("host", env("APP_HOST").default("localhost"));
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.with_env_reader(MapEnv::new().set("APP_PORT", "9090"));
    let container = builder.build();

    let compiled = Compiler::new(&container).compile().unwrap();
    assert_eq!(compiled.get("port").unwrap().as_int(), Some(9090));
    assert_eq!(compiled.get("host").unwrap().as_str(), Some("localhost"));

    let rendered = compiled.render();
    assert!(rendered.contains("APP_PORT"));
    assert!(rendered.contains("filament::Cast::Int"));
}
