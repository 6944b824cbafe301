//! Append-only JSONL audit log and the sinks the scanner reports through.

pub mod audit;
pub mod jsonl;
