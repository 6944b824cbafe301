//! Integrity scanner: exclusion rules, walker, fingerprints, diff, remediation.

pub mod diff;
pub mod engine;
pub mod exclusion;
pub mod fingerprint;
pub mod remediation;
pub mod walker;

#[cfg(test)]
mod diff_properties;
