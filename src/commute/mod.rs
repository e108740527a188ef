//! Commute resolution against a distance-matrix routing provider.
//!
//! [`CommuteResolver`] deduplicates origins, splits the origin x destination
//! grid into batches the provider accepts, and turns failed batches into
//! `Unavailable` entries instead of failing the run.

pub mod client;
pub mod resolver;
pub mod types;

pub use client::DistanceMatrixClient;
pub use resolver::{
    dedupe_origins, plan_batches, query_location, Batch, BatchLimits, CommuteResolver, Resolution,
};
pub use types::RoutingProvider;
