//! Exit code policy for lockdown.
//!
//! ## Findings (0-1)
//!
//! `audit` and `fix` return exit codes based on the settings they touched:
//! - `0` = Every selected setting passed (or was fixed)
//! - `1` = At least one setting failed, or a fix run was declined
//!
//! ## Fatal errors
//!
//! Input errors (bad index, unknown command) and environment errors (wrong
//! host platform or version, failed signature check) also exit `1`; they abort
//! before any setting is processed.
//!
//! Operational failures (unreadable config, prompt I/O, internal errors) use
//! `10` so automation can tell "the Mac is misconfigured" apart from
//! "we couldn't check the Mac".

/// Exit code: all selected settings passed
pub const PASSED: i32 = 0;

/// Exit code: one or more settings failed (or a fix run was declined)
pub const SETTINGS_FAILED: i32 = 1;

/// Exit code: malformed input (bad index, unrecognized command)
pub const USAGE_ERROR: i32 = 1;

/// Exit code: host platform, version or signature precondition failed
pub const ENVIRONMENT_ERROR: i32 = 1;

/// Exit code: general operational failure
pub const OPERATIONAL_FAILURE: i32 = 10;

/// Exit code: interrupted by Ctrl+C (SIGINT)
pub const INTERRUPTED: i32 = 130;
