#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Work queue for modsite
//!
//! Fetch requests are keyed by module version. The queue guarantees that a
//! key never runs twice concurrently: duplicate submissions join the task in
//! flight and observe its outcome. Where a task actually runs is decided by
//! a pluggable backend, either in this process or on a remote worker.

pub mod backend;
mod queue;

pub use backend::{
    DispatchRequest, HttpDispatchBackend, InProcessBackend, QueueBackend, TaskOutcome,
    TaskProcessor,
};
pub use queue::{TaskHandle, WorkQueue};
