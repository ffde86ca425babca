use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use filament::{
    ClassBuilder, Container, ContainerError, DefinitionMap, Instance, Object, Value, create, param,
};

fn counted_class(name: &'static str, counter: Arc<AtomicUsize>) -> ClassBuilder {
    ClassBuilder::new(name).construct_with(move |_args| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Instance::new(name))
    })
}

#[test]
fn test_lazy_defers_construction() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut definitions = DefinitionMap::new();
    definitions.add("service", create("Service").lazy());
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(counted_class("Service", counter.clone()));
    let container = builder.build();

    let service = container.get("service").unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    let object = service.as_object().unwrap();
    // The class id is known without initializing.
    assert_eq!(object.class(), "Service");
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    object.get("anything").unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    object.get("anything").unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_class_level_lazy_marker() {
    let mut definitions = DefinitionMap::new();
    definitions.add("deferred", create("Service"));
    definitions.add("forced", create("Service").eager().prototype());
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(ClassBuilder::new("Service").lazy());
    let container = builder.build();

    let deferred = container.get("deferred").unwrap();
    assert!(matches!(deferred.as_object(), Some(Object::Lazy(_))));
    let forced = container.get("forced").unwrap();
    assert!(matches!(forced.as_object(), Some(Object::Real(_))));
}

#[test]
fn test_proxy_initialization_is_single_flight() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut definitions = DefinitionMap::new();
    definitions.add("service", create("Service").lazy());
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(counted_class("Service", counter.clone()));
    let container = builder.build();

    let service = container.get("service").unwrap();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        handles.push(std::thread::spawn(move || {
            service.as_object().unwrap().instance().unwrap()
        }));
    }
    let instances: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }
}

#[test]
fn test_proxy_state_is_observable() {
    let mut definitions = DefinitionMap::new();
    definitions.add("service", create("Service").lazy());
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(ClassBuilder::new("Service"));
    let container = builder.build();

    let service = container.get("service").unwrap();
    let Some(Object::Lazy(proxy)) = service.as_object() else {
        panic!("expected a lazy object");
    };
    assert!(!proxy.is_initialized());
    proxy.instance().unwrap();
    assert!(proxy.is_initialized());
}

#[test]
fn test_clone_contents_forces_initialization() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut definitions = DefinitionMap::new();
    definitions.add("service", create("Service").lazy());
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(counted_class("Service", counter.clone()));
    let container = builder.build();

    let service = container.get("service").unwrap();
    let object = service.as_object().unwrap();
    let copy = object.clone_contents().unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    // The copy is a detached instance with equal contents.
    let original = object.instance().unwrap();
    let copied = copy.instance().unwrap();
    assert!(!Arc::ptr_eq(&original, &copied));
    assert_eq!(original.properties(), copied.properties());
}

#[test]
fn test_failed_initialization_is_not_retried() {
    let mut definitions = DefinitionMap::new();
    definitions.add("service", create("Service").lazy());
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(
        ClassBuilder::new("Service").constructor([param("dep").entry("missing")]),
    );
    let container = builder.build();

    let service = container.get("service").unwrap();
    let object = service.as_object().unwrap();
    assert!(object.instance().is_err());
    // The construction closure is consumed; later accesses keep failing.
    assert!(matches!(
        object.instance(),
        Err(ContainerError::InvalidDefinition { .. })
    ));
}

#[test]
fn test_lazy_singleton_shares_one_proxy() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut definitions = DefinitionMap::new();
    definitions.add("service", create("Service").lazy());
    let mut builder = Container::builder();
    builder.add_definitions(definitions);
    builder.register_class(counted_class("Service", counter.clone()));
    let container = builder.build();

    let first = container.get("service").unwrap();
    let second = container.get("service").unwrap();
    assert!(first.same_object(&second));
    first.as_object().unwrap().instance().unwrap();
    // The second handle observes the same initialized instance.
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(
        second
            .as_object()
            .unwrap()
            .instance()
            .unwrap()
            .class()
            == "Service"
    );
}
