use filament::ContainerError;
use thiserror::Error;

/// Errors produced while compiling a container or emitting its artifact.
#[derive(Debug, Error)]
pub enum CompileError {
    /// An explicitly configured entry cannot be compiled.
    ///
    /// Speculatively discovered entries never produce this: their failures
    /// are silenced and the entry stays dynamic.
    #[error("failed to compile entry '{entry}': {source}")]
    Entry {
        /// Entry that failed to compile.
        entry: String,
        /// Underlying resolution failure.
        #[source]
        source: ContainerError,
    },
    /// Writing the artifact failed.
    #[error("failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
}
