#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! License detection for module zips
//!
//! A [`Detector`] finds license files anywhere in a module, classifies each
//! one, and answers which licenses govern a given directory. A directory is
//! redistributable only if at least one license governs it and every
//! governing license permits redistribution.

mod classify;
mod detector;

pub use classify::{Classification, KeywordClassifier, LicenseClassifier, REDISTRIBUTABLE_TYPES};
pub use detector::{is_license_file_name, Detector, MAX_LICENSE_SIZE, MIN_COVERAGE};
