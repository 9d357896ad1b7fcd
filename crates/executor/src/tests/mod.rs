//! Test modules for the executor crate.

pub mod fixtures;
