use thiserror::Error;

/// Errors produced while looking up or resolving container entries.
///
/// Failures that occur while resolving a dependency of some other entry are
/// wrapped in [`ContainerError::Dependency`], which annotates the root cause
/// with the entry name and the injection point where resolution broke. The
/// root cause stays reachable through [`std::error::Error::source`] and
/// [`ContainerError::root_cause`].
#[derive(Debug, Error)]
pub enum ContainerError {
    /// No entry or class was found for the requested name.
    #[error("no entry or class found for '{0}'")]
    NotFound(String),
    /// A definition is structurally unusable.
    #[error("invalid definition for entry '{name}': {reason}")]
    InvalidDefinition {
        /// Entry name the definition is bound to.
        name: String,
        /// Human-readable description of the defect.
        reason: String,
    },
    /// A required environment variable is not set.
    #[error("environment variable '{variable}' required by entry '{entry}' is not set")]
    MissingEnvironmentVariable {
        /// Name of the missing variable.
        variable: String,
        /// Entry whose definition reads the variable.
        entry: String,
    },
    /// The resolution chain visited the same entry twice.
    #[error("circular dependency detected while resolving '{entry}': {}", chain.join(" -> "))]
    CircularDependency {
        /// Entry that closed the cycle.
        entry: String,
        /// Entry names in resolution order, ending with the repeated entry.
        chain: Vec<String>,
    },
    /// A failure occurred while resolving a dependency of another entry.
    #[error("error while resolving {point} of entry '{entry}': {source}")]
    Dependency {
        /// Entry whose resolution triggered the failure.
        entry: String,
        /// Injection point (class/property/method/parameter) that failed.
        point: String,
        /// Underlying failure.
        #[source]
        source: Box<ContainerError>,
    },
    /// An injection-point declaration is malformed.
    #[error("invalid injection declaration for class '{class}': {reason}")]
    Declaration {
        /// Class the declaration belongs to.
        class: String,
        /// Human-readable description of the defect.
        reason: String,
    },
}

impl ContainerError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn declaration(class: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Declaration {
            class: class.into(),
            reason: reason.into(),
        }
    }

    /// Wraps this error as a dependency failure of `entry` at `point`.
    ///
    /// Existing [`ContainerError::Dependency`] wrappers are kept so the full
    /// chain of injection points stays visible in the rendered message.
    pub fn into_dependency(self, entry: impl Into<String>, point: impl Into<String>) -> Self {
        Self::Dependency {
            entry: entry.into(),
            point: point.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error of a [`ContainerError::Dependency`] chain.
    pub fn root_cause(&self) -> &ContainerError {
        match self {
            Self::Dependency { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
