//! Identity context for units of work.
//!
//! The queue never interprets a principal itself; it threads the value into
//! the host-supplied [`IdentityBinder`] around each task execution. The
//! binder is where the host application establishes whatever ambient
//! security context it uses (a thread-local subject, a request scope, ...).

use serde::{Deserialize, Serialize};

use crate::core::AppResult;

/// An opaque identity a unit of work executes under.
///
/// Persisted together with the unit, so restored work runs under the same
/// identity it was admitted with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal(String);

impl Principal {
    /// Create a principal from its canonical name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The well-known internal system identity, used for maintenance work
    /// that runs on behalf of the application itself rather than a user.
    #[must_use]
    pub fn system() -> Self {
        Self::new("system")
    }

    /// The canonical name of the principal.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Principal {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Capability to establish a principal as the active identity for the
/// duration of a task execution.
///
/// Implementations must install the identity before invoking `task` and
/// clear it afterwards, even when the task fails.
pub trait IdentityBinder: Send + Sync {
    /// Run `task` with `principal` as the active identity.
    fn run_as(&self, principal: &Principal, task: &mut dyn FnMut() -> AppResult<()>)
        -> AppResult<()>;
}

/// Binder used when the host has no ambient identity mechanism; invokes the
/// task without establishing any context.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIdentityBinder;

impl IdentityBinder for NoopIdentityBinder {
    fn run_as(
        &self,
        _principal: &Principal,
        task: &mut dyn FnMut() -> AppResult<()>,
    ) -> AppResult<()> {
        task()
    }
}
