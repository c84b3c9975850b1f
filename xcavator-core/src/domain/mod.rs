//! Core domain types
//!
//! Structures shared between the pipeline engine and the runner that feeds it:
//! discovered candidates, the per-pipeline scratch-space and dedup records.

pub mod candidate;
pub mod tracker;
pub mod xcom;
