//! Node-resident deployment agent.
//!
//! `minion` keeps exactly one managed container on a host in line with what a
//! remote control plane (the overlord) says should run there. Each poll cycle
//! fetches the desired image, tag and launch config, compares them with local
//! Docker state and pulls, stops and starts as needed.
//!
//! - **[`core`]**: Pure, deterministic logic (descriptor parsing, tag matching,
//!   launch config decoding, planning). No I/O.
//! - **[`io`]**: Side-effecting adapters behind traits (docker CLI, registry
//!   auth, HTTP clients, config file, sleeping).
//!
//! [`engine`] runs one cycle against those adapters and [`looping`] repeats it.

pub mod core;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
