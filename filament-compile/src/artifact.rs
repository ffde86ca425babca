use filament::{Container, ContainerError, Value};

/// Producer of one compiled entry, as generated in an artifact.
pub type ProducerFn = fn(&Container) -> Result<Value, ContainerError>;

/// One entry of a generated artifact.
#[derive(Clone, Debug)]
pub struct ArtifactEntry {
    name: &'static str,
    shared: bool,
    producer: ProducerFn,
}

impl ArtifactEntry {
    /// Creates an entry; `shared` marks singleton-scoped entries.
    pub fn new(name: &'static str, shared: bool, producer: ProducerFn) -> Self {
        Self {
            name,
            shared,
            producer,
        }
    }

    /// Entry name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `true` when the produced value is memoized per container lifetime.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// The producer function.
    pub fn producer(&self) -> ProducerFn {
        self.producer
    }
}

/// Producer table returned by a generated artifact's `load()` function.
///
/// Load it into a [`CompiledContainer`](crate::CompiledContainer) with
/// [`CompiledContainer::from_artifact`](crate::CompiledContainer::from_artifact).
#[derive(Clone, Debug, Default)]
pub struct Artifact {
    entries: Vec<ArtifactEntry>,
}

impl Artifact {
    /// Wraps a producer table.
    pub fn new(entries: Vec<ArtifactEntry>) -> Self {
        Self { entries }
    }

    /// Iterates entries in generation order.
    pub fn iter(&self) -> impl Iterator<Item = &ArtifactEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the artifact holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
