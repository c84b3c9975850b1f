//! Repository layer
//!
//! Repositories abstract the external collaborators the scheduler consumes:
//! where candidates come from and where "already processed" facts live.
//! They contain no scheduling logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod dedup;
mod discovery;

// Re-export traits
pub use dedup::DedupOracle;
pub use discovery::Discoverer;

// Re-export implementations
pub use dedup::{InMemoryDedupOracle, PgDedupOracle};
pub use discovery::{HtmlListingDiscoverer, ListingSelectors};
