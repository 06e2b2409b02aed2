//! Side-effecting adapters: subprocesses, HTTP, configuration, time.

pub mod config;
pub mod docker;
pub mod metadata;
pub mod overlord;
pub mod process;
pub mod registry_auth;
pub mod runtime;
pub mod sleep;
