#![forbid(unsafe_code)]

//! Integrity Guard (igd): file-integrity scanner for installed application trees.
//!
//! Walks the installation, fingerprints every relevant file, diffs the result
//! against the authoritative checksums of the installed release and lets an
//! operator remediate what changed:
//! 1. **Scan**: classify every path as stable, modified, removed or added
//! 2. **Remediate**: restore originals, delete foreign files, or accept changes
//! 3. **Suppress**: accepted discrepancies stay hidden until forgotten
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use integrity_guard::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use integrity_guard::core::config::Config;
//! use integrity_guard::scanner::walker::{PathWalker, WalkerConfig};
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod reference;
pub mod scanner;
pub mod store;
