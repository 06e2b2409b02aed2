//! Deterministic, pure logic shared by the reconciliation engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod descriptor;
pub mod image_ref;
pub mod launch;
pub mod matching;
pub mod planner;
pub mod types;
pub mod wait;
