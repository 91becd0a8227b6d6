//! Trace-driven simulator of a shared, inclusive MESI last-level cache.
//!
//! The engine (geometry, cache line/set/array, PLRU, MESI controller, bus
//! bridge, statistics) lives here as a library so it can be driven either by
//! the `llc-sim` binary or directly from integration tests. Argument
//! parsing and process wiring live in `main.rs`.

pub mod bus;
pub mod cache_array;
pub mod cache_line;
pub mod cache_set;
pub mod cli;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod plru;
pub mod sinks;
pub mod stats;
pub mod trace;
