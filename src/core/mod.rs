//! Core types: errors, configuration, clock, path resolution.

pub mod clock;
pub mod config;
pub mod errors;
pub mod paths;
