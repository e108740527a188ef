//! Enrich rental listing URLs with extracted listing details and commute
//! times to a set of destinations.

pub mod cache;
pub mod commute;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod scrapers;
pub mod table;

pub use config::Config;
pub use error::{ConfigError, ExtractError, FetchError, RoutingError};
pub use pipeline::{merge, Pipeline, PipelineOptions, RunSummary};
