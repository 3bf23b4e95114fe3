//! Units of work: the immutable scheduling records the queue admits,
//! dispatches, and persists.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::identity::{IdentityBinder, Principal};
use crate::core::registry::TaskRegistry;
use crate::core::resource::Resource;
use crate::core::AppResult;

/// An executable task body.
///
/// Tasks that should survive a process restart return their self-describing
/// serialized form from [`snapshot`](Task::snapshot); the default of `None`
/// marks the task as process-local. A process-local task is still perfectly
/// runnable, it is just silently skipped when the pending set is persisted.
pub trait Task: Send {
    /// Execute the task. Errors are logged by the worker and finalize the
    /// unit exactly like a successful run; there is no retry.
    fn run(&self) -> AppResult<()>;

    /// Serialized form of this task, if it has one.
    fn snapshot(&self) -> Option<TaskSnapshot> {
        None
    }
}

impl<F> Task for F
where
    F: Fn() -> AppResult<()> + Send,
{
    fn run(&self) -> AppResult<()> {
        self()
    }
}

/// Self-describing serialized form of a task: a registered kind plus the
/// constructor arguments the registry needs to rebuild an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task kind, resolved through the [`TaskRegistry`].
    pub kind: String,
    /// Constructor arguments, passed to the registered factory.
    pub args: serde_json::Value,
}

impl TaskSnapshot {
    /// Create a snapshot for a registered task kind.
    pub fn new(kind: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            args,
        }
    }
}

/// Reference to the executable part of a unit of work.
pub enum TaskRef {
    /// An already-constructed task instance, run as-is.
    Direct(Box<dyn Task>),
    /// A type reference resolved through the registry immediately before
    /// each execution, so dependencies are injected fresh on every run.
    Injected(TaskSnapshot),
}

impl TaskRef {
    /// Wrap an already-constructed task instance.
    pub fn direct(task: impl Task + 'static) -> Self {
        Self::Direct(Box::new(task))
    }

    /// Reference a registered task kind with its constructor arguments.
    pub fn injected(kind: impl Into<String>, args: serde_json::Value) -> Self {
        Self::Injected(TaskSnapshot::new(kind, args))
    }

    /// Serialized form of the referenced task, if it has one.
    ///
    /// Injected references always have one; direct instances only if the
    /// task opted in through [`Task::snapshot`].
    #[must_use]
    pub fn snapshot(&self) -> Option<TaskSnapshot> {
        match self {
            Self::Direct(task) => task.snapshot(),
            Self::Injected(snapshot) => Some(snapshot.clone()),
        }
    }
}

impl fmt::Debug for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(task) => match task.snapshot() {
                Some(snapshot) => write!(f, "Direct({})", snapshot.kind),
                None => f.write_str("Direct(<process-local>)"),
            },
            Self::Injected(snapshot) => write!(f, "Injected({})", snapshot.kind),
        }
    }
}

impl<T> From<T> for TaskRef
where
    T: Task + 'static,
{
    fn from(task: T) -> Self {
        Self::direct(task)
    }
}

impl From<TaskSnapshot> for TaskRef {
    fn from(snapshot: TaskSnapshot) -> Self {
        Self::Injected(snapshot)
    }
}

/// One schedulable, persistable unit of work.
///
/// Carries the queue-assigned order number, the optional identity to execute
/// under, the resources it claims exclusively while running, the resources
/// it only waits on, and the task reference.
#[derive(Debug)]
pub struct UnitOfWork {
    order: u64,
    principal: Option<Principal>,
    blocks: Vec<Resource>,
    blocked_by: Vec<Resource>,
    task: TaskRef,
}

impl UnitOfWork {
    /// Create a unit of work.
    ///
    /// Normally the queue's admission builder creates units and assigns the
    /// order number; constructing one directly is useful when interacting
    /// with the durable store on its own.
    #[must_use]
    pub fn new(
        order: u64,
        principal: Option<Principal>,
        blocks: Vec<Resource>,
        blocked_by: Vec<Resource>,
        task: TaskRef,
    ) -> Self {
        Self {
            order,
            principal,
            blocks,
            blocked_by,
            task,
        }
    }

    /// Rebuild a unit from its persisted form. The task is resolved through
    /// the registry at execution time.
    #[must_use]
    pub fn from_stored(stored: StoredUnit) -> Self {
        Self {
            order: stored.order,
            principal: stored.principal,
            blocks: stored.blocks,
            blocked_by: stored.blocked_by,
            task: TaskRef::Injected(stored.task),
        }
    }

    /// The queue-assigned order number.
    #[must_use]
    pub fn order(&self) -> u64 {
        self.order
    }

    /// The identity this unit executes under, if any.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Resources this unit claims exclusively while running.
    #[must_use]
    pub fn blocks(&self) -> &[Resource] {
        &self.blocks
    }

    /// Resources this unit waits on without claiming them.
    #[must_use]
    pub fn blocked_by(&self) -> &[Resource] {
        &self.blocked_by
    }

    /// The task reference.
    #[must_use]
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Every resource that gates this unit's eligibility.
    pub(crate) fn waits_on(&self) -> impl Iterator<Item = &Resource> {
        self.blocks.iter().chain(self.blocked_by.iter())
    }

    /// Assign a fresh order number, used when re-admitting restored units.
    pub(crate) fn renumber(&mut self, order: u64) {
        self.order = order;
    }

    /// Persisted form of this unit, or `None` if the task has no serialized
    /// form and therefore cannot survive a restart.
    #[must_use]
    pub fn to_stored(&self) -> Option<StoredUnit> {
        let task = self.task.snapshot()?;
        Some(StoredUnit {
            order: self.order,
            principal: self.principal.clone(),
            blocks: self.blocks.clone(),
            blocked_by: self.blocked_by.clone(),
            task,
        })
    }

    /// Execute the task, establishing the principal as the active identity
    /// for the duration and resolving an injected reference immediately
    /// before invocation.
    ///
    /// # Errors
    ///
    /// Propagates task failures and, for injected references, resolution
    /// failures. Callers treat both as the terminal outcome of the unit.
    pub fn run(&self, registry: &dyn TaskRegistry, binder: &dyn IdentityBinder) -> AppResult<()> {
        match &self.task {
            TaskRef::Direct(task) => self.invoke(task.as_ref(), binder),
            TaskRef::Injected(snapshot) => {
                tracing::trace!(kind = %snapshot.kind, order = self.order, "resolving injected task");
                let task = registry.resolve(&snapshot.kind, &snapshot.args)?;
                self.invoke(task.as_ref(), binder)
            }
        }
    }

    fn invoke(&self, task: &dyn Task, binder: &dyn IdentityBinder) -> AppResult<()> {
        match &self.principal {
            Some(principal) => binder.run_as(principal, &mut || task.run()),
            None => task.run(),
        }
    }
}

/// Self-describing persisted layout of a unit of work.
///
/// The exact byte encoding is an internal detail of the durable store; this
/// struct only fixes what must survive: order, principal, both resource
/// sets, and the task snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUnit {
    /// Order at the time the unit was persisted; used only as a sort key
    /// during reload, then discarded.
    pub order: u64,
    /// Identity the unit executes under.
    pub principal: Option<Principal>,
    /// Resources claimed exclusively while running.
    pub blocks: Vec<Resource>,
    /// Resources waited on without being claimed.
    pub blocked_by: Vec<Resource>,
    /// Serialized task reference.
    pub task: TaskSnapshot,
}
