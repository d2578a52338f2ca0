//! Exit code policy for qgep-datamodel.
//!
//! ## Findings (0-1)
//!
//! `status` returns an exit code based on the reconciliation state:
//! - `0` = datamodel is up to date (or the command succeeded)
//! - `1` = state is not actionable (not initialized, cannot downgrade, ...)
//!
//! ## Operational Failures (10+)
//!
//! Failures to run at all use codes >= 10 so automation can tell
//! "the datamodel needs attention" apart from "we could not check":
//! - `10` = General operational failure
//! - `11` = Connection failure
//! - `12` = Configuration error (service file, datamodel package)
//! - `13` = Action unsupported on this platform
//! - `14` = External command failed or timed out

/// Exit code: success
pub const OK: i32 = 0;

/// Exit code: state reported but not actionable
pub const NOT_ACTIONABLE: i32 = 1;

/// Exit code: general operational failure
pub const OPERATIONAL_FAILURE: i32 = 10;

/// Exit code: connection failure
pub const CONNECTION_FAILURE: i32 = 11;

/// Exit code: configuration error
pub const CONFIG_ERROR: i32 = 12;

/// Exit code: unsupported platform
pub const UNSUPPORTED_PLATFORM: i32 = 13;

/// Exit code: external command failed or timed out
pub const COMMAND_FAILED: i32 = 14;
