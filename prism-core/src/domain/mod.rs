//! Core domain types
//!
//! Transient values produced while a pipeline run executes. None of these
//! outlive the run that created them.

pub mod image;
pub mod report;
