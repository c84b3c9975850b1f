//! Xcavator Core
//!
//! Core types and the task-pipeline engine.
//!
//! This crate contains:
//! - Domain types: candidates, the per-pipeline scratch-space, dedup records
//! - DTOs: bodies exchanged with the socials publishing service
//! - The `Task` contract and the `Pipeline` engine with reverse-order rollback

pub mod domain;
pub mod dto;
pub mod pipeline;
pub mod task;

pub use domain::candidate::Candidate;
pub use domain::xcom::{Article, Xcom, XcomValue, keys};
pub use pipeline::{Pipeline, PipelineOutcome, PipelineReport};
pub use task::{Task, TaskError};
