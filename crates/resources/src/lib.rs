#![deny(clippy::pedantic, unsafe_code)]

//! Resource management utilities for modsite
//!
//! This crate provides the admission controller that bounds how many module
//! zip bytes may be held in memory at once, plus the semaphore helpers used
//! to bound worker concurrency.

pub mod limits;
pub mod semaphore;
pub mod shedder;

pub use limits::ShedderStats;
pub use semaphore::{acquire_semaphore_permit, create_semaphore};
pub use shedder::{Admission, LoadShedder, ReleaseGuard, ZipLoadShedder};
