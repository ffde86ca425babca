//! Ahead-of-time compiler for [`filament`] containers.
//!
//! [`Compiler`] lowers a configured container's definitions into
//! metadata-free resolution [`Plan`]s; the resulting [`CompiledContainer`]
//! resolves compiled entries without touching definitions or class metadata
//! and falls back to the original container for everything else. Plans can
//! additionally be emitted as a Rust source artifact whose `load()` function
//! returns a producer table ([`Artifact`]) loadable into a compiled
//! container.
//!
//! # Examples
//!
//! ```rust
//! use filament::{Container, DefinitionMap, get, value};
//! use filament_compile::Compiler;
//!
//! let mut definitions = DefinitionMap::new();
//! definitions.add("greeting", value("Hello"));
//! definitions.add("message", get("greeting"));
//!
//! let mut builder = Container::builder();
//! builder.add_definitions(definitions);
//! let container = builder.build();
//!
//! let compiled = Compiler::new(&container).compile().unwrap();
//! assert_eq!(compiled.get("message").unwrap().as_str(), Some("Hello"));
//! ```

mod artifact;
mod compiler;
mod container;
mod emit;
mod error;
mod plan;
pub mod runtime;

pub use artifact::{Artifact, ArtifactEntry, ProducerFn};
pub use compiler::Compiler;
pub use container::CompiledContainer;
pub use error::CompileError;
pub use plan::{EnvPlan, NewPlan, Plan};
