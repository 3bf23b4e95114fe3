//! Builders to construct the queue from its collaborators.

pub mod queue_builder;

pub use queue_builder::CentralWorkQueueBuilder;
