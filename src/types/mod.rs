//! Public types exchanged with callers of the registry.
//!
//! Internal bookkeeping (sequence counters, in-flight uploads, status
//! channels) lives on the registry's internal job record instead.

pub mod job;

pub use job::*;
