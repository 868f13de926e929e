//! Default policy limits
//!
//! Every value here can be overridden from the configuration file; these are
//! the values used when nothing is configured.

pub const MIB: u64 = 1024 * 1024;

/// Largest single file read out of a module zip.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 30 * MIB;
/// Largest rendered documentation kept for a package.
pub const DEFAULT_MAX_DOCUMENTATION_HTML: u64 = 10 * MIB;
/// Longest string literal rendered verbatim in documentation.
pub const DEFAULT_MAX_LITERAL_LEN: usize = 2048;
/// Most elements of a composite literal rendered verbatim in documentation.
pub const DEFAULT_MAX_COMPOSITE_ELEMENTS: usize = 100;
pub const DEFAULT_MAX_IMPORTS_PER_PACKAGE: usize = 1000;
/// Largest module zip accepted at all.
pub const DEFAULT_MAX_MODULE_ZIP_SIZE: u64 = 300 * MIB;

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_FETCH_INFO_LINGER_SECS: u64 = 60;

pub const DEFAULT_PROXY_URL: &str = "https://proxy.golang.org";
pub const DEFAULT_DB_FILE: &str = "modsite.sqlite";
