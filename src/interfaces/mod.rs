//! File formats used by the operator CLI.

pub mod csv;
pub mod jsonl;
