#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Random-access module zips
//!
//! A module zip holds every file of one module version under a single
//! `module@version/` prefix. [`ModuleZip`] keeps the whole archive in memory
//! and hands out bounded reads of individual entries; [`ZipBuilder`]
//! produces archives in the same layout for synthetic sources and tests.

mod builder;
mod reader;

pub use builder::{build_module_zip, ZipBuilder};
pub use reader::{ModuleZip, ZipEntry};

/// Prefix every entry of a module zip must carry.
#[must_use]
pub fn module_prefix(module_path: &str, version: &str) -> String {
    format!("{module_path}@{version}/")
}
