//! Core scheduling types and the central work queue controller.

pub mod error;
pub mod identity;
pub mod queue;
pub mod registry;
pub mod resource;
pub mod unit;

pub use error::{AppResult, StoreError};
pub use identity::{IdentityBinder, NoopIdentityBinder, Principal};
pub use queue::{CentralWorkQueue, Enqueue, QueueStats};
pub use registry::{FactoryRegistry, TaskRegistry};
pub use resource::Resource;
pub use unit::{StoredUnit, Task, TaskRef, TaskSnapshot, UnitOfWork};
