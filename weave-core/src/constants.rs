//! Names shared by the application context, component authors and the
//! derive macro.

/// Hook called once all properties of a new instance are injected
pub const DONE_HOOK: &str = "done";

/// Hook called during teardown, expected to drop outgoing shared references
pub const CLEANUP_HOOK: &str = "cleanup";

/// Gate values that enable a property entry
pub const TRUTHY_VALUES: &[&str] = &["y", "yes", "true"];

/// Published value of a `yes-when` constant that holds
pub const YES: &str = "yes";

/// Published value of a `yes-when` constant that does not hold
pub const NO: &str = "no";

/// Separators of a `list` property value
pub const LIST_SEPARATORS: &[char] = &[',', ';'];

/// Environment key listing library search paths, separated like `PATH`
pub const LIBRARY_PATH_KEY: &str = "weave.library.path";

/// Configuration keys read by the logging setup
pub const LOGGING_LEVEL_KEY: &str = "logging.level";
pub const LOGGING_FORMAT_KEY: &str = "logging.format";
pub const LOGGING_FILTER_KEY: &str = "logging.filter";
