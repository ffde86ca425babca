//! Dependency injection container with autowiring, lazy proxies and
//! ahead-of-time compilation support.
//!
//! Entries are configured as [`Definition`]s: plain values, references to
//! other entries, factories, decorators, arrays, environment variables and
//! autowired objects. The [`Container`] resolves entries on demand and
//! memoizes singleton-scoped values for its lifetime. Injectable classes
//! declare their constructor, property and method injection points through
//! [`ClassBuilder`]; the resolver fills undeclared parameters by type
//! inference.
//!
//! # Examples
//!
//! ```rust
//! use filament::{ClassBuilder, Container, DefinitionMap, create, get, param, value, Value};
//!
//! let mut definitions = DefinitionMap::new();
//! definitions.add("db.dsn", value("postgres://localhost"));
//! definitions.add(
//!     "Database",
//!     create("Database").constructor_param("dsn", get("db.dsn")),
//! );
//!
//! let mut builder = Container::builder();
//! builder.add_definitions(definitions);
//! builder.register_class(ClassBuilder::new("Database").constructor([param("dsn").scalar()]));
//! let container = builder.build();
//!
//! let database = container.get("Database").unwrap();
//! let object = database.as_object().unwrap();
//! assert_eq!(
//!     object.get("dsn").unwrap(),
//!     Some(Value::Str("postgres://localhost".into())),
//! );
//! // Singleton scope: the same instance every time.
//! assert!(database.same_object(&container.get("Database").unwrap()));
//! ```

mod container;
mod definition;
mod env;
mod error;
mod meta;
mod proxy;
mod resolve;
mod value;

pub use container::{
    Args, Callable, Container, ContainerBuilder, DefinitionMap, DefinitionSource,
};
pub use definition::{
    ArrayBuilder, ArrayDefinition, Cast, DecoratorBuilder, DecoratorDefinition, DecoratorFn,
    Definition, EnvBuilder, EnvDefinition, FactoryBuilder, FactoryDefinition, FactoryFn, Input,
    MethodCall, ObjectBuilder, ObjectDefinition, ReferenceDefinition, Scope, ValueDefinition, add,
    array, autowire, create, decorate, env, factory, get, value,
};
pub use env::{EnvReader, StdEnv, apply_cast};
pub use error::ContainerError;
pub use meta::{
    ClassBuilder, ClassMetadata, ClassRecord, ClassRegistry, ConstructFn, DeclaredType,
    InjectionPoint, MetadataExtractor, MethodFn, ParamSpec, PointValue, param,
};
pub use proxy::Proxy;
pub use resolve::{ResolveContext, Resolver};
pub use value::{Array, Instance, Object, Value};
