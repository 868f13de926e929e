#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Module version fetching and processing
//!
//! A [`Fetcher`] resolves a requested module version, asks the load shedder
//! for admission, downloads the zip, extracts packages and documentation
//! and assembles the unit tree handed to the store. Progress of every
//! attempt is visible through the [`FetchInfoRegistry`].

pub mod buildctx;
pub mod extract;
pub mod fetch_info;
mod fetcher;
pub mod godoc;
pub mod modfile;
pub mod units;

pub use extract::{extract_packages, extract_readmes, ExtractLimits, Extraction};
pub use fetch_info::{FetchInfo, FetchInfoRegistry};
pub use fetcher::{terminal_phase, FetchResult, Fetcher};
pub use modfile::{ModFile, Retraction};
pub use units::assemble_units;
