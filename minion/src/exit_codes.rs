//! Stable exit codes for the minion CLI.

/// Command succeeded (`once` converged or had nothing to do).
pub const OK: i32 = 0;
/// Missing overlord endpoint or an invalid config file.
pub const MISCONFIGURED: i32 = 1;
/// The container runtime did not answer at startup.
pub const RUNTIME_UNAVAILABLE: i32 = 2;
/// Instance id or region could not be resolved at startup.
pub const IDENTITY_UNAVAILABLE: i32 = 3;
/// The single cycle of `minion once` failed.
pub const CYCLE_FAILED: i32 = 4;
