//! Stable status codes recorded for module versions and packages.
//!
//! Module-level codes follow HTTP families so the frontend can surface them
//! directly. Package-level codes live in the 6xx range and never escape as a
//! module status.

pub const OK: u16 = 200;
/// At least one package could not be processed but the module has usable packages.
pub const HAS_INCOMPLETE_PACKAGES: u16 = 290;

pub const BAD_REQUEST: u16 = 400;
pub const FORBIDDEN: u16 = 403;
pub const NOT_FOUND: u16 = 404;
pub const REQUEST_TIMEOUT: u16 = 408;
pub const MODULE_TOO_LARGE: u16 = 413;
/// The module exists but cannot be processed (malformed zip, no packages, bad go.mod).
pub const BAD_MODULE: u16 = 490;
/// The go.mod file declares a different module path.
pub const ALTERNATIVE_MODULE: u16 = 491;

pub const INTERNAL: u16 = 500;
pub const SERVICE_UNAVAILABLE: u16 = 503;

pub const BUILD_CONTEXT_NOT_SUPPORTED: u16 = 600;
pub const MAX_IMPORTS_LIMIT_EXCEEDED: u16 = 601;
pub const MAX_FILE_SIZE_LIMIT_EXCEEDED: u16 = 602;
pub const DOCUMENTATION_HTML_TOO_LARGE: u16 = 603;
pub const BAD_IMPORT_PATH: u16 = 604;
pub const INVALID_CONTENTS: u16 = 605;

/// Whether a module-level status means data was stored.
#[must_use]
pub fn is_success(code: u16) -> bool {
    code == OK || code == HAS_INCOMPLETE_PACKAGES
}

/// Whether a module-level status means a prior copy of the module should be removed.
#[must_use]
pub fn deletes_module(code: u16) -> bool {
    matches!(code, NOT_FOUND | ALTERNATIVE_MODULE)
}
