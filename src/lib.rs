//! # Central Work Queue
//!
//! A durable, resource-aware, in-process work queue that serializes access to
//! named contention domains while running unrelated work in parallel.
//!
//! The queue accepts units of work through a builder, evaluates their
//! eligibility against the resources currently claimed by running units, and
//! dispatches eligible units to a bounded pool of worker threads. Units that
//! have not yet started when the queue is closed are written to a durable
//! store and re-admitted on the next startup, preserving their relative
//! order.
//!
//! ## Core Problem Solved
//!
//! Server-side maintenance work often contends on dynamic, string-keyed
//! domains (a repository, an index, a cache namespace) rather than on a fixed
//! set of locks:
//!
//! - **Dynamic mutual exclusion**: The set of contention domains is unbounded
//!   and only known at enqueue time, so a fixed lock table does not fit
//! - **Independent work must not wait**: A global FIFO barrier would stall
//!   cheap unrelated jobs behind long draining chains
//! - **Queued work is valuable**: Jobs admitted but not yet started must
//!   survive a process restart
//!
//! ## Key Features
//!
//! - **Resource-keyed scheduling**: Units claiming mutually-blocking
//!   resources run strictly in admission order; disjoint units run in
//!   parallel
//! - **Bounded worker pool**: Sized once from host CPU count or an operator
//!   override, with an enforced floor of two workers
//! - **Durable pending set**: Not-yet-started units are persisted on close
//!   and drained back in on startup with fresh order numbers
//! - **Poison tolerance**: Unreadable or foreign stored entries are skipped
//!   individually, never failing a whole load
//!
//! ## Example
//!
//! ```rust,ignore
//! use central_work_queue::builders::CentralWorkQueueBuilder;
//! use central_work_queue::core::Resource;
//!
//! let queue = CentralWorkQueueBuilder::new().workers(4).build()?;
//!
//! queue.append()
//!     .blocks(Resource::with_id("repository", "42"))
//!     .enqueue(ReindexTask::new());
//!
//! queue.close()?;
//! ```
//!
//! For complete examples, see `tests/work_queue_test.rs`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling types: resources, units of work, and the queue controller.
pub mod core;
/// Configuration models and the worker-count policy.
pub mod config;
/// Builders to construct the queue from its collaborators.
pub mod builders;
/// Infrastructure adapters for the backing blob store and persistence.
pub mod infra;
/// Shared utilities.
pub mod util;
