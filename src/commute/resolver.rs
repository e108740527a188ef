//! Batch planning and result merging for commute lookups.

use super::types::RoutingProvider;
use crate::config::RoutingConfig;
use crate::error::RoutingError;
use crate::models::{CommuteDuration, CommuteResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-request limits of the routing provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Maximum origins x destinations pairs in one request
    pub max_elements: usize,
    pub max_origins: usize,
    pub max_destinations: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_elements: 100,
            max_origins: 25,
            max_destinations: 25,
        }
    }
}

impl From<&RoutingConfig> for BatchLimits {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            max_elements: config.max_elements,
            max_origins: config.max_origins,
            max_destinations: config.max_destinations,
        }
    }
}

/// One provider request
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub origins: Vec<String>,
    pub destinations: Vec<String>,
}

impl Batch {
    pub fn elements(&self) -> usize {
        self.origins.len() * self.destinations.len()
    }
}

/// Outcome of a resolution run
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub result: CommuteResult,
    pub batches: usize,
    pub failed_batches: usize,
}

/// Trimmed, non-empty origins in order of first appearance, without repeats
pub fn dedupe_origins<I, S>(origins: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    origins
        .into_iter()
        .map(|o| o.as_ref().trim().to_string())
        .filter(|o| !o.is_empty())
        .filter(|o| seen.insert(o.clone()))
        .collect()
}

/// Location as sent to the provider. `|` separates locations in a matrix
/// query, so one inside an address is replaced by a space.
pub fn query_location(location: &str) -> String {
    location
        .split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split the origins x destinations grid into batches within `limits`.
/// Every pair appears in exactly one batch.
pub fn plan_batches(
    origins: &[String],
    destinations: &[String],
    limits: &BatchLimits,
) -> Vec<Batch> {
    if origins.is_empty() || destinations.is_empty() {
        return Vec::new();
    }

    let max_elements = limits.max_elements.max(1);
    let dest_chunk = limits.max_destinations.clamp(1, max_elements);

    let mut batches = Vec::new();
    for dest_group in destinations.chunks(dest_chunk) {
        let origin_chunk =
            (max_elements / dest_group.len()).clamp(1, limits.max_origins.max(1));
        for origin_group in origins.chunks(origin_chunk) {
            batches.push(Batch {
                origins: origin_group.to_vec(),
                destinations: dest_group.to_vec(),
            });
        }
    }
    batches
}

/// Resolves commute durations for every (origin, destination) pair
pub struct CommuteResolver {
    provider: Arc<dyn RoutingProvider>,
    limits: BatchLimits,
}

impl CommuteResolver {
    pub fn new(provider: Arc<dyn RoutingProvider>, limits: BatchLimits) -> Self {
        Self { provider, limits }
    }

    /// Durations for every pair; failed batches come back as `Unavailable`
    pub async fn resolve<I, S>(&self, origins: I, destinations: &[String]) -> CommuteResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve_batches(origins, destinations).await.result
    }

    /// Like [`resolve`](Self::resolve), also reporting batch counts
    pub async fn resolve_batches<I, S>(&self, origins: I, destinations: &[String]) -> Resolution
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let origins = dedupe_origins(origins);
        let batches = plan_batches(&origins, destinations, &self.limits);

        info!(
            "Resolving commutes: {} origins x {} destinations in {} batches",
            origins.len(),
            destinations.len(),
            batches.len()
        );

        let mut resolution = Resolution {
            batches: batches.len(),
            ..Default::default()
        };

        for (i, batch) in batches.iter().enumerate() {
            match self.run_batch(batch).await {
                Ok(matrix) => {
                    for (origin, row) in batch.origins.iter().zip(matrix) {
                        for (destination, duration) in batch.destinations.iter().zip(row) {
                            resolution.result.insert(origin, destination, duration);
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Commute batch {}/{} failed ({} origins: {:?}; destinations: {:?}): {}",
                        i + 1,
                        batches.len(),
                        batch.origins.len(),
                        batch.origins,
                        batch.destinations,
                        e
                    );
                    resolution.failed_batches += 1;
                    for origin in &batch.origins {
                        for destination in &batch.destinations {
                            resolution
                                .result
                                .insert(origin, destination, CommuteDuration::Unavailable);
                        }
                    }
                }
            }
        }

        info!(
            "Resolved {}/{} commute pairs ({} failed batches)",
            resolution.result.available(),
            resolution.result.len(),
            resolution.failed_batches
        );

        resolution
    }

    /// One provider call, with the response shape checked against the request
    async fn run_batch(&self, batch: &Batch) -> Result<Vec<Vec<CommuteDuration>>, RoutingError> {
        let origins: Vec<String> = batch.origins.iter().map(|o| query_location(o)).collect();
        let destinations: Vec<String> =
            batch.destinations.iter().map(|d| query_location(d)).collect();
        let matrix = self.provider.matrix(&origins, &destinations).await?;

        if matrix.len() != batch.origins.len() {
            return Err(RoutingError::Shape(format!(
                "expected {} rows, got {}",
                batch.origins.len(),
                matrix.len()
            )));
        }
        if let Some(row) = matrix.iter().find(|r| r.len() != batch.destinations.len()) {
            return Err(RoutingError::Shape(format!(
                "expected {} elements per row, got {}",
                batch.destinations.len(),
                row.len()
            )));
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers with `origin.len() + destination.len()` minutes, failing any
    /// batch that contains an origin listed in `fail_on`.
    struct FakeProvider {
        calls: Mutex<Vec<Batch>>,
        fail_on: Vec<String>,
        truncate_rows: bool,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: Vec::new(),
                truncate_rows: false,
            }
        }
    }

    #[async_trait]
    impl RoutingProvider for FakeProvider {
        async fn matrix(
            &self,
            origins: &[String],
            destinations: &[String],
        ) -> Result<Vec<Vec<CommuteDuration>>, RoutingError> {
            self.calls.lock().unwrap().push(Batch {
                origins: origins.to_vec(),
                destinations: destinations.to_vec(),
            });
            if origins.iter().any(|o| self.fail_on.contains(o)) {
                return Err(RoutingError::Provider {
                    status: "UNKNOWN_ERROR".to_string(),
                    message: String::new(),
                });
            }
            let mut rows: Vec<Vec<CommuteDuration>> = origins
                .iter()
                .map(|o| {
                    destinations
                        .iter()
                        .map(|d| CommuteDuration::Minutes((o.len() + d.len()) as u32))
                        .collect()
                })
                .collect();
            if self.truncate_rows {
                rows.pop();
            }
            Ok(rows)
        }
    }

    fn names(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn dedupe_keeps_first_appearance_order() {
        let origins = dedupe_origins(["B St", " A St", "B St", "", "A St ", "C St"]);
        assert_eq!(origins, vec!["B St", "A St", "C St"]);
    }

    #[test]
    fn small_grid_is_one_batch() {
        let batches = plan_batches(&names("o", 3), &names("d", 2), &BatchLimits::default());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].elements(), 6);
    }

    #[test]
    fn large_grid_splits_within_limits_and_covers_every_pair_once() {
        let limits = BatchLimits {
            max_elements: 10,
            max_origins: 4,
            max_destinations: 3,
        };
        let origins = names("o", 11);
        let destinations = names("d", 5);
        let batches = plan_batches(&origins, &destinations, &limits);

        assert!(batches.len() > 1);
        let mut pairs = HashSet::new();
        for batch in &batches {
            assert!(batch.elements() <= limits.max_elements);
            assert!(batch.origins.len() <= limits.max_origins);
            assert!(batch.destinations.len() <= limits.max_destinations);
            for o in &batch.origins {
                for d in &batch.destinations {
                    assert!(pairs.insert((o.clone(), d.clone())), "duplicate pair {o}/{d}");
                }
            }
        }
        assert_eq!(pairs.len(), origins.len() * destinations.len());
    }

    #[test]
    fn destinations_wider_than_element_limit() {
        let limits = BatchLimits {
            max_elements: 2,
            max_origins: 25,
            max_destinations: 25,
        };
        let batches = plan_batches(&names("o", 3), &names("d", 5), &limits);
        assert!(batches.iter().all(|b| b.elements() <= 2));
        let total: usize = batches.iter().map(Batch::elements).sum();
        assert_eq!(total, 15);
    }

    #[test]
    fn empty_inputs_plan_nothing() {
        assert!(plan_batches(&[], &names("d", 2), &BatchLimits::default()).is_empty());
        assert!(plan_batches(&names("o", 2), &[], &BatchLimits::default()).is_empty());
    }

    #[tokio::test]
    async fn merged_result_has_one_entry_per_pair() {
        let provider = Arc::new(FakeProvider::new());
        let limits = BatchLimits {
            max_elements: 4,
            max_origins: 2,
            max_destinations: 2,
        };
        let resolver = CommuteResolver::new(provider.clone(), limits);
        let origins = names("origin", 7);
        let destinations = names("dest", 3);

        let resolution = resolver.resolve_batches(&origins, &destinations).await;
        assert_eq!(resolution.result.len(), 21);
        assert_eq!(resolution.failed_batches, 0);
        assert_eq!(resolution.batches, provider.calls.lock().unwrap().len());
        assert!(resolution.batches > 1);
        assert_eq!(
            resolution.result.get("origin0", "dest1"),
            Some(CommuteDuration::Minutes(12))
        );
    }

    #[tokio::test]
    async fn failed_batch_marks_only_its_pairs_unavailable() {
        let provider = Arc::new(FakeProvider {
            fail_on: vec!["bad".to_string()],
            ..FakeProvider::new()
        });
        let limits = BatchLimits {
            max_elements: 1,
            max_origins: 1,
            max_destinations: 1,
        };
        let resolver = CommuteResolver::new(provider, limits);
        let destinations = vec!["Office X".to_string()];

        let resolution = resolver
            .resolve_batches(["good", "bad"], &destinations)
            .await;
        assert_eq!(resolution.failed_batches, 1);
        assert_eq!(
            resolution.result.get("good", "Office X"),
            Some(CommuteDuration::Minutes(12))
        );
        assert_eq!(
            resolution.result.get("bad", "Office X"),
            Some(CommuteDuration::Unavailable)
        );
    }

    /// Splits every location on `|` the way the Distance Matrix API does.
    struct SplittingProvider;

    #[async_trait]
    impl RoutingProvider for SplittingProvider {
        async fn matrix(
            &self,
            origins: &[String],
            destinations: &[String],
        ) -> Result<Vec<Vec<CommuteDuration>>, RoutingError> {
            let columns = destinations.join("|").split('|').count();
            Ok(origins
                .join("|")
                .split('|')
                .map(|_| vec![CommuteDuration::Minutes(10); columns])
                .collect())
        }
    }

    #[test]
    fn query_location_drops_separator() {
        assert_eq!(query_location("2 B St | Unit 4"), "2 B St Unit 4");
        assert_eq!(query_location("1 A St"), "1 A St");
    }

    #[tokio::test]
    async fn separator_in_one_address_does_not_spoil_its_batch() {
        let resolver = CommuteResolver::new(Arc::new(SplittingProvider), BatchLimits::default());
        let destinations = vec!["Office X".to_string(), "Gym | Annex".to_string()];

        let resolution = resolver
            .resolve_batches(["1 A St", "2 B St | Unit 4", "3 C St"], &destinations)
            .await;
        assert_eq!(resolution.failed_batches, 0);
        for origin in ["1 A St", "2 B St | Unit 4", "3 C St"] {
            for destination in &destinations {
                assert_eq!(
                    resolution.result.get(origin, destination),
                    Some(CommuteDuration::Minutes(10))
                );
            }
        }
    }

    #[tokio::test]
    async fn shape_mismatch_fails_the_batch() {
        let provider = Arc::new(FakeProvider {
            truncate_rows: true,
            ..FakeProvider::new()
        });
        let resolver = CommuteResolver::new(provider, BatchLimits::default());
        let destinations = vec!["D".to_string()];

        let resolution = resolver.resolve_batches(["A", "B"], &destinations).await;
        assert_eq!(resolution.failed_batches, 1);
        assert_eq!(resolution.result.get("A", "D"), Some(CommuteDuration::Unavailable));
        assert_eq!(resolution.result.get("B", "D"), Some(CommuteDuration::Unavailable));
    }

    #[tokio::test]
    async fn duplicate_origins_are_queried_once() {
        let provider = Arc::new(FakeProvider::new());
        let resolver = CommuteResolver::new(provider.clone(), BatchLimits::default());
        let destinations = vec!["Office X".to_string()];

        let result = resolver
            .resolve(["123 Main St", "123 Main St"], &destinations)
            .await;
        assert_eq!(result.len(), 1);

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].origins, vec!["123 Main St".to_string()]);
    }
}
