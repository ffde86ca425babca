use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;

use crate::{ContainerError, Instance};

type InitFn = Box<dyn FnOnce() -> Result<Arc<Instance>, ContainerError> + Send>;

/// Lazy stand-in for a not-yet-constructed instance.
///
/// The proxy holds the construction closure of a lazy entry and runs it on
/// the first access through [`Proxy::instance`] (or any property access on
/// the wrapping [`Object`](crate::Object)). Initialization is single-flight:
/// concurrent first accesses block until the one running construction
/// finishes, and all of them observe the same instance. After that, accesses
/// forward to the cached `Arc` without touching the closure slot again.
pub struct Proxy {
    class: String,
    cell: OnceCell<Arc<Instance>>,
    init: Mutex<Option<InitFn>>,
}

impl Proxy {
    /// Wraps a construction closure for the given class.
    pub fn new(
        class: impl Into<String>,
        init: impl FnOnce() -> Result<Arc<Instance>, ContainerError> + Send + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            class: class.into(),
            cell: OnceCell::new(),
            init: Mutex::new(Some(Box::new(init))),
        })
    }

    /// Class id of the deferred instance.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Returns `true` once construction has completed.
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Returns the real instance, running construction on first access.
    ///
    /// A failed construction consumes the closure: later accesses keep
    /// failing with [`ContainerError::InvalidDefinition`] instead of
    /// re-running a constructor with partially applied side effects.
    pub fn instance(&self) -> Result<Arc<Instance>, ContainerError> {
        self.cell
            .get_or_try_init(|| {
                let init = self
                    .init
                    .lock()
                    .unwrap()
                    .take()
                    .ok_or_else(|| {
                        ContainerError::invalid(
                            self.class.clone(),
                            "lazy initialization already failed",
                        )
                    })?;
                tracing::trace!(class = %self.class, "initializing lazy proxy");
                init()
            })
            .cloned()
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("class", &self.class)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
