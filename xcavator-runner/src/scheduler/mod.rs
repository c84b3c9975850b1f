//! Scheduler layer for the runner
//!
//! This layer drives the discover → filter → dispatch → drain → wait loop and
//! owns the bounded worker pool pipelines execute on.

pub mod poller;
pub mod pool;

pub use poller::Scheduler;
