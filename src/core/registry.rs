//! Component registry for resolving task type references.
//!
//! Units of work that carry a type reference instead of a live task instance
//! are resolved through a [`TaskRegistry`] immediately before execution.
//! This is how a task gets its dependencies injected fresh on every run,
//! including after a restart, when a live instance could not have been
//! serialized meaningfully.

use std::collections::HashMap;

use crate::core::unit::Task;
use crate::core::AppResult;

/// Resolves a task kind and its constructor arguments into a ready-to-run
/// task instance.
pub trait TaskRegistry: Send + Sync {
    /// Construct a task of the given `kind` from its serialized arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind is unknown or the arguments cannot be
    /// turned into an instance. The failure counts as a task execution
    /// failure for the unit that referenced the kind; it never affects
    /// other units.
    fn resolve(&self, kind: &str, args: &serde_json::Value) -> AppResult<Box<dyn Task>>;
}

/// Factory function constructing a task from its serialized arguments.
pub type TaskFactory = Box<dyn Fn(&serde_json::Value) -> AppResult<Box<dyn Task>> + Send + Sync>;

/// Map-backed [`TaskRegistry`].
///
/// The host registers one factory per task kind at startup; factories
/// typically capture the collaborators the task needs, so every resolution
/// yields an instance with fresh dependencies.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, TaskFactory>,
}

impl FactoryRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `kind`, replacing any previous registration.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> AppResult<Box<dyn Task>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    /// Builder-style variant of [`register`](Self::register).
    #[must_use]
    pub fn with<F>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&serde_json::Value) -> AppResult<Box<dyn Task>> + Send + Sync + 'static,
    {
        self.register(kind, factory);
        self
    }
}

impl TaskRegistry for FactoryRegistry {
    fn resolve(&self, kind: &str, args: &serde_json::Value) -> AppResult<Box<dyn Task>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| anyhow::anyhow!("no task factory registered for kind `{kind}`"))?;
        factory(args)
    }
}
