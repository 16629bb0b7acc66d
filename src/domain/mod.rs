//! Domain types for internal job representation.
//!
//! [`JobRecord`] is only reachable through the registry's per-job lock;
//! nothing outside the crate can hold or mutate one.

pub(crate) mod record;

pub(crate) use record::*;
